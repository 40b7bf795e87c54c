use crate::api::dispatcher::Dispatcher;
use crate::api::session::SessionManager;
use crate::api::{endpoint, Error, TOKEN_INVALID};
use crate::model::{Api, AppIdentity, AuthProtocol, Credentials, DeviceIdentity, Session};
use crate::retry::{Backoff, RetryConfig, RetryPolicy};
use config::{Config, Environment};
use std::time::Duration;

pub const ENV_PREFIX: &str = "DESS";

/// Settings read from `DESS_*` environment variables.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Long-lived token, used together with `secret` instead of logging in.
    pub token: Option<String>,
    pub secret: Option<String>,
    pub auth_protocol: String,
    pub auth_url: String,
    pub api_url: String,
    pub pn: String,
    pub sn: String,
    pub devcode: String,
    pub devaddr: String,
    pub company_key: String,
    pub app_client: String,
    pub app_id: String,
    pub app_version: String,
    pub source: String,
    pub i18n: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub read_attempts: u32,
    pub login_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_secs: u64,
    pub token_invalid_code: i64,
}

fn config_err(e: config::ConfigError) -> Error {
    Error::Configuration(e.to_string())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn read_settings() -> Result<Settings, Error> {
    read_settings_with_prefix(ENV_PREFIX)
}

pub fn read_settings_with_prefix(prefix: &str) -> Result<Settings, Error> {
    let defaults = AppIdentity::default();
    let device = DeviceIdentity::default();
    let mut settings = Config::default();
    settings
        .set_default("auth_protocol", "legacy")
        .and_then(|s| s.set_default("auth_url", endpoint::AUTH_URL))
        .and_then(|s| s.set_default("api_url", endpoint::API_URL))
        .and_then(|s| s.set_default("pn", device.pn.clone()))
        .and_then(|s| s.set_default("sn", device.sn.clone()))
        .and_then(|s| s.set_default("devcode", device.devcode.clone()))
        .and_then(|s| s.set_default("devaddr", device.devaddr.clone()))
        .and_then(|s| s.set_default("company_key", defaults.company_key.clone()))
        .and_then(|s| s.set_default("app_client", defaults.app_client.clone()))
        .and_then(|s| s.set_default("app_id", defaults.app_id.clone()))
        .and_then(|s| s.set_default("app_version", defaults.app_version.clone()))
        .and_then(|s| s.set_default("source", defaults.source.clone()))
        .and_then(|s| s.set_default("i18n", defaults.i18n.clone()))
        .and_then(|s| s.set_default("timeout_secs", 30_i64))
        .and_then(|s| s.set_default("max_attempts", 5_i64))
        .and_then(|s| s.set_default("read_attempts", 1_i64))
        .and_then(|s| s.set_default("login_attempts", 1_i64))
        .and_then(|s| s.set_default("initial_backoff_ms", 1000_i64))
        .and_then(|s| s.set_default("max_backoff_secs", 60_i64))
        .and_then(|s| s.set_default("token_invalid_code", TOKEN_INVALID))
        .and_then(|s| s.merge(Environment::with_prefix(prefix)))
        .map_err(config_err)?;

    settings.try_into().map_err(config_err)
}

impl Settings {
    pub fn protocol(&self) -> Result<AuthProtocol, Error> {
        self.auth_protocol.parse().map_err(Error::Configuration)
    }

    pub fn device(&self) -> DeviceIdentity {
        DeviceIdentity {
            pn: self.pn.clone(),
            sn: self.sn.clone(),
            devcode: self.devcode.clone(),
            devaddr: self.devaddr.clone(),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        let backoff = Backoff {
            initial: Duration::from_millis(self.initial_backoff_ms),
            max: Duration::from_secs(self.max_backoff_secs),
            ..Backoff::default()
        };

        RetryConfig {
            read: RetryPolicy::new(self.read_attempts, backoff.clone()),
            write: RetryPolicy::new(self.max_attempts, backoff.clone()),
            login: RetryPolicy::new(self.login_attempts, backoff),
        }
    }

    pub fn api(&self) -> Result<Api, Error> {
        let mut api = Api::new(
            self.device(),
            self.protocol()?,
            Duration::from_secs(self.timeout_secs),
        )?;
        api.auth_url = self.auth_url.clone();
        api.api_url = self.api_url.clone();
        api.token_invalid_code = self.token_invalid_code;
        api.app = AppIdentity {
            company_key: self.company_key.clone(),
            app_client: self.app_client.clone(),
            app_id: self.app_id.clone(),
            app_version: self.app_version.clone(),
            source: self.source.clone(),
            i18n: self.i18n.clone(),
        };
        Ok(api)
    }

    /// Credentials win over a static token; with neither configured there is nothing to sign
    /// with.
    pub fn session_manager(&self) -> Result<SessionManager, Error> {
        match (
            non_empty(&self.username),
            non_empty(&self.password),
            non_empty(&self.token),
            non_empty(&self.secret),
        ) {
            (Some(username), Some(password), _, _) => Ok(SessionManager::with_credentials(
                Credentials { username, password },
                self.retry().login,
            )),
            (_, _, Some(token), Some(secret)) => {
                log::warn!(
                    "Using a static session token; it cannot be renewed once the API rejects it"
                );
                Ok(SessionManager::with_static_token(Session::new(token, secret)))
            }
            _ => Err(Error::Configuration(format!(
                "set {p}_USERNAME and {p}_PASSWORD, or {p}_TOKEN and {p}_SECRET",
                p = ENV_PREFIX
            ))),
        }
    }

    pub fn dispatcher(&self) -> Result<Dispatcher, Error> {
        Ok(Dispatcher::new(
            self.api()?,
            self.session_manager()?,
            self.retry(),
        ))
    }
}
