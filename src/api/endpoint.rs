pub type Endpoint = str;

pub const AUTH_URL: &Endpoint = "http://api.dessmonitor.com/public/";
pub const API_URL: &Endpoint = "https://web.dessmonitor.com/public/";

pub type ApiAction = str;

pub const AUTH_SOURCE: &ApiAction = "authSource";
pub const QUERY_DEVICE_CTRL_VALUE: &ApiAction = "queryDeviceCtrlValue";
pub const CTRL_DEVICE: &ApiAction = "ctrlDevice";

/// Device control field holding the output source priority.
pub const OUTPUT_SOURCE_PRIORITY: &str = "los_output_source_priority";
