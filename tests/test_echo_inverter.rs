mod common;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use common::*;
use dessmonitor_rs::model::{Action, AuthProtocol, OutputPriority};
use dessmonitor_rs::{Dispatcher, SessionManager};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const TOKEN: &str = "stub-token";
const SECRET: &str = "stub-secret";
const SESSION_KEY: &str = "stub-session-key";

const LOGIN_KEYS: [&str; 7] = [
    "action",
    "usr",
    "company-key",
    "source",
    "_app_client_",
    "_app_id_",
    "_app_version_",
];
const COMMAND_KEYS: [&str; 10] = [
    "action", "devaddr", "devcode", "i18n", "id", "pn", "salt", "sn", "source", "val",
];

/// Remembers the last `val` written and verifies every signature it receives.
struct Inverter {
    protocol: AuthProtocol,
    val: Mutex<Option<String>>,
    requests: Mutex<Vec<String>>,
}

fn sha1_hex(data: &str) -> String {
    hex::encode(Sha1::digest(data.as_bytes()))
}

fn hmac_hex(key: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn signing_string(query: &HashMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| query.get(*key).map(|value| format!("&{}={}", key, value)))
        .collect()
}

fn field<'a>(query: &'a HashMap<String, String>, key: &str) -> &'a str {
    query.get(key).map(String::as_str).unwrap_or_default()
}

impl Inverter {
    fn new(protocol: AuthProtocol) -> Self {
        Inverter {
            protocol,
            val: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn login_signature(&self, query: &HashMap<String, String>) -> String {
        let salt = field(query, "salt");
        let hashed_password = sha1_hex(&Factory::credentials().password);
        let params = signing_string(query, &LOGIN_KEYS);
        match self.protocol {
            AuthProtocol::Legacy => sha1_hex(&format!("{}{}{}", salt, hashed_password, params)),
            AuthProtocol::Current => hmac_hex(&hashed_password, &format!("{}{}", salt, params)),
        }
    }

    fn login_response(&self) -> Value {
        match self.protocol {
            AuthProtocol::Legacy => json!({"token": TOKEN, "secret": SECRET, "expire": 604800}),
            AuthProtocol::Current => json!({"token": TOKEN, "key": SESSION_KEY, "expire": 604800}),
        }
    }

    fn command_signature(&self, query: &HashMap<String, String>) -> String {
        let salt = field(query, "salt");
        let params = signing_string(query, &COMMAND_KEYS);
        match self.protocol {
            AuthProtocol::Legacy => sha1_hex(&format!("{}{}{}{}", salt, SECRET, TOKEN, params)),
            AuthProtocol::Current => {
                hmac_hex(SESSION_KEY, &format!("{}{}{}", salt, TOKEN, params))
            }
        }
    }
}

async fn public(
    State(inverter): State<Arc<Inverter>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let action = field(&query, "action").to_string();
    inverter.requests.lock().unwrap().push(action.clone());

    if action == "authSource" {
        if field(&query, "sign") != inverter.login_signature(&query) {
            return Json(json!({"err": 1, "desc": "ERR_SIGN"}));
        }
        return Json(json!({
            "err": 0,
            "desc": "ERR_NONE",
            "dat": inverter.login_response()
        }));
    }

    if field(&query, "token") != TOKEN || field(&query, "sign") != inverter.command_signature(&query)
    {
        return Json(json!({"err": 1, "desc": "ERR_SIGN"}));
    }

    match action.as_str() {
        "ctrlDevice" => {
            *inverter.val.lock().unwrap() = query.get("val").cloned();
            Json(json!({"err": 0, "desc": "ERR_NONE", "dat": {"status": 0}}))
        }
        "queryDeviceCtrlValue" => {
            let val = inverter.val.lock().unwrap().clone();
            Json(json!({
                "err": 0,
                "desc": "ERR_NONE",
                "dat": {"id": field(&query, "id"), "val": val}
            }))
        }
        _ => Json(json!({"err": 1, "desc": "ERR_FAIL"})),
    }
}

async fn spawn_inverter(protocol: AuthProtocol) -> (String, Arc<Inverter>) {
    let inverter = Arc::new(Inverter::new(protocol));
    let app = Router::new()
        .route("/public/", get(public))
        .with_state(inverter.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), inverter)
}

fn dispatcher(base_url: &str, protocol: AuthProtocol) -> Dispatcher {
    Dispatcher::new(
        Factory::api(base_url, protocol),
        SessionManager::with_credentials(Factory::credentials(), Factory::retry(1, 1, 1).login),
        Factory::retry(1, 1, 1),
    )
}

async fn set_solar_then_read(protocol: AuthProtocol) {
    common_setup();

    let (base_url, inverter) = spawn_inverter(protocol).await;
    let subject = dispatcher(&base_url, protocol);

    let written = subject.run(Action::SetSolar).await.unwrap();
    assert!(written.success);

    let read = subject.run(Action::ReadStatus).await.unwrap();
    assert_eq!(Some(OutputPriority::Solar), read.priority);

    assert_eq!(
        vec!["authSource", "ctrlDevice", "queryDeviceCtrlValue"],
        *inverter.requests.lock().unwrap()
    );
}

#[tokio::test]
async fn set_solar_then_read_reports_solar() {
    set_solar_then_read(AuthProtocol::Legacy).await;
}

#[tokio::test]
async fn set_solar_then_read_reports_solar_with_current_protocol() {
    set_solar_then_read(AuthProtocol::Current).await;
}

#[tokio::test]
async fn switching_back_and_forth_tracks_last_write() {
    common_setup();

    let (base_url, _inverter) = spawn_inverter(AuthProtocol::Legacy).await;
    let subject = dispatcher(&base_url, AuthProtocol::Legacy);

    subject.set_priority(OutputPriority::Sbu).await.unwrap();
    assert_eq!(
        Some(OutputPriority::Sbu),
        subject.read_status().await.unwrap().priority
    );

    subject.set_priority(OutputPriority::Solar).await.unwrap();
    assert_eq!(
        Some(OutputPriority::Solar),
        subject.read_status().await.unwrap().priority
    );
    assert_eq!(1, subject.logins().await);
}

#[tokio::test]
async fn read_before_any_write_has_no_priority() {
    common_setup();

    let (base_url, _inverter) = spawn_inverter(AuthProtocol::Legacy).await;
    let subject = dispatcher(&base_url, AuthProtocol::Legacy);

    let read = subject.read_status().await.unwrap();
    assert!(read.success);
    assert_eq!(None, read.priority);
}
