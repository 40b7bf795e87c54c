#![allow(dead_code)]

use dessmonitor_rs::model::{Api, AuthProtocol, Credentials, DeviceIdentity};
use dessmonitor_rs::retry::{Backoff, RetryConfig, RetryPolicy};
use mockito::Matcher;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn read_resource(filename: &str) -> String {
    let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    d.push(format!("resources/test/{}", filename));
    fs::read_to_string(d.as_path()).unwrap()
}

pub fn action(action: &str) -> Matcher {
    Matcher::UrlEncoded("action".to_string(), action.to_string())
}

pub struct Factory;

impl Factory {
    pub fn device() -> DeviceIdentity {
        DeviceIdentity {
            pn: "Q0000000000001".to_string(),
            sn: "Q000000000000100AA01".to_string(),
            devcode: "2477".to_string(),
            devaddr: "5".to_string(),
        }
    }

    pub fn credentials() -> Credentials {
        Credentials {
            username: "owner".to_string(),
            password: "correct horse".to_string(),
        }
    }

    /// Api pointing both endpoint families at `base_url`.
    pub fn api(base_url: &str, protocol: AuthProtocol) -> Api {
        let mut api = Api::new(Self::device(), protocol, Duration::from_secs(5)).unwrap();
        api.auth_url = format!("{}/public/", base_url);
        api.api_url = format!("{}/public/", base_url);
        api
    }

    pub fn backoff() -> Backoff {
        Backoff {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }

    pub fn retry(read_attempts: u32, write_attempts: u32, login_attempts: u32) -> RetryConfig {
        RetryConfig {
            read: RetryPolicy::new(read_attempts, Self::backoff()),
            write: RetryPolicy::new(write_attempts, Self::backoff()),
            login: RetryPolicy::new(login_attempts, Self::backoff()),
        }
    }
}
