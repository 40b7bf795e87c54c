use crate::api::endpoint::{self, ApiAction};
use crate::sign::Algorithm;
use chrono::{DateTime, Utc};
use num_derive::FromPrimitive;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    /// SHA-1 over salt, hashed password / session secret and token.
    Legacy,
    /// HMAC-SHA256 keyed with the per-session key handed out at login.
    Current,
}

impl AuthProtocol {
    pub fn algorithm(self) -> Algorithm {
        match self {
            AuthProtocol::Legacy => Algorithm::Sha1,
            AuthProtocol::Current => Algorithm::HmacSha256,
        }
    }
}

impl FromStr for AuthProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "sha1" => Ok(AuthProtocol::Legacy),
            "current" | "hmac" | "hmac-sha256" => Ok(AuthProtocol::Current),
            other => Err(format!("unknown auth protocol '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub pn: String,
    pub sn: String,
    pub devcode: String,
    pub devaddr: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        DeviceIdentity {
            pn: "Q0029389993714".to_string(),
            sn: "Q002938999371409AD05".to_string(),
            devcode: "2477".to_string(),
            devaddr: "5".to_string(),
        }
    }
}

/// Client identification sent along with login requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub company_key: String,
    pub app_client: String,
    pub app_id: String,
    pub app_version: String,
    /// `1` selects the energy storage product line.
    pub source: String,
    pub i18n: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        AppIdentity {
            company_key: "0123456789ABCDEF".to_string(),
            app_client: "web".to_string(),
            app_id: "com.dessmonitor.web".to_string(),
            app_version: "1.0.0".to_string(),
            source: "1".to_string(),
            i18n: "en_US".to_string(),
        }
    }
}

/// Everything needed to talk to the remote API, minus the session.
#[derive(Debug, Clone)]
pub struct Api {
    pub auth_url: String,
    pub api_url: String,
    pub protocol: AuthProtocol,
    pub device: DeviceIdentity,
    pub app: AppIdentity,
    /// `err` value the API uses for an invalid or expired token.
    pub token_invalid_code: i64,
    pub client: reqwest::Client,
}

impl Api {
    pub fn new(
        device: DeviceIdentity,
        protocol: AuthProtocol,
        timeout: Duration,
    ) -> Result<Api, crate::Error> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Api {
            auth_url: endpoint::AUTH_URL.to_string(),
            api_url: endpoint::API_URL.to_string(),
            protocol,
            device,
            app: AppIdentity::default(),
            token_invalid_code: crate::api::TOKEN_INVALID,
            client,
        })
    }
}

#[derive(Clone)]
pub struct Session {
    pub token: String,
    /// `secret` for the legacy protocol, signing `key` for the current one.
    pub secret: String,
    pub obtained_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, secret: String) -> Session {
        Session {
            token,
            secret,
            obtained_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum OutputPriority {
    Solar = 1,
    Sbu = 2,
}

impl OutputPriority {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Reads a priority from a `val` field, which the API sends either as a number or as a
    /// numeric string.
    pub fn from_value(value: &Value) -> Option<OutputPriority> {
        let raw = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        num::FromPrimitive::from_u64(raw)
    }
}

impl fmt::Display for OutputPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPriority::Solar => write!(f, "SOLAR"),
            OutputPriority::Sbu => write!(f, "SBU"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// Idempotent read; a missed one is corrected by the next scheduled run.
    Read,
    /// Changes inverter state.
    Write,
}

/// Process-level action, as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Action {
    ReadStatus,
    SetSolar,
    SetSbu,
}

impl Action {
    pub fn priority(self) -> Option<OutputPriority> {
        match self {
            Action::ReadStatus => None,
            Action::SetSolar => Some(OutputPriority::Solar),
            Action::SetSbu => Some(OutputPriority::Sbu),
        }
    }

    pub fn class(self) -> ActionClass {
        match self {
            Action::ReadStatus => ActionClass::Read,
            Action::SetSolar | Action::SetSbu => ActionClass::Write,
        }
    }

    pub fn description(self) -> String {
        match self.priority() {
            None => "Read output source priority".to_string(),
            Some(priority) => format!(
                "Set output source priority to {} (val={})",
                priority,
                priority.value()
            ),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ReadStatus => write!(f, "read-status"),
            Action::SetSolar => write!(f, "set-solar"),
            Action::SetSbu => write!(f, "set-sbu"),
        }
    }
}

static LAST_SALT: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds, bumped when needed so no two requests of this process share a
/// salt.
pub fn next_salt() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_SALT.load(Ordering::Relaxed);
    loop {
        let salt = now.max(last + 1);
        match LAST_SALT.compare_exchange_weak(last, salt, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return salt.to_string(),
            Err(current) => last = current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub action: &'static ApiAction,
    pub salt: String,
    /// Target value, only present for `ctrlDevice`.
    pub value: Option<OutputPriority>,
}

impl CommandRequest {
    pub fn read_status() -> CommandRequest {
        CommandRequest {
            action: endpoint::QUERY_DEVICE_CTRL_VALUE,
            salt: next_salt(),
            value: None,
        }
    }

    pub fn set_priority(priority: OutputPriority) -> CommandRequest {
        CommandRequest {
            action: endpoint::CTRL_DEVICE,
            salt: next_salt(),
            value: Some(priority),
        }
    }

    /// A read when `value` is `None`, otherwise a write of `value`.
    pub fn for_value(value: Option<OutputPriority>) -> CommandRequest {
        match value {
            None => CommandRequest::read_status(),
            Some(priority) => CommandRequest::set_priority(priority),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub api_error_code: i64,
    pub description: String,
    pub raw_payload: Value,
    /// Output priority reported by the device, when the payload carries one.
    pub priority: Option<OutputPriority>,
}
