use serde::Deserialize;
use serde_json::Value;

/// `dat` of a `queryDeviceCtrlValue` call.
#[derive(Deserialize)]
pub struct CtrlValue {
    pub id: Option<String>,
    pub val: Option<Value>,
}
