pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod response;
pub mod session;

use crate::model;
use crate::sign::{self, Params};
pub use error::Error;
use reqwest::Url;
use response::auth_source::AuthSource;
use response::ctrl_value::CtrlValue;
use response::Envelope;
use serde_json::Value;

/// `err` code (0x0105) the API answers with once a token has expired or was revoked.
pub const TOKEN_INVALID: i64 = 0x0105;

/// Map transport-level failures (including non-2xx statuses) to Error
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::TOO_MANY_REQUESTS) => {
            Error::Transport(format!("rate limited by server: {}", error))
        }
        Some(status) => Error::Transport(format!("server responded {}", status)),
        None if error.is_timeout() => Error::Transport(format!("request timed out: {}", error)),
        None => Error::Transport(error.to_string()),
    }
}

fn build_url(base: &str, leading: &[(&str, &str)], params: &Params) -> Result<Url, Error> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Configuration(format!("invalid base URL '{}': {}", base, e)))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in leading {
            query.append_pair(key, value);
        }
        for (key, value) in params.iter() {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Perform GET on `url` and parse body as JSON. Anything short of a 2xx JSON body is an Error.
async fn get(api: &model::Api, url: Url) -> Result<Value, Error> {
    let text = api
        .client
        .get(url)
        .send()
        .await
        .map_err(map_api_err)?
        .error_for_status()
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(|e| Error::Transport(format!("Error reading API response: {}", e)))?;

    log::trace!("response_text: {}", text);

    serde_json::from_str::<Value>(&text).map_err(|e| Error::MalformedResponse(text, e.to_string()))
}

/// `url` with the value of its `token` query pair masked, for logging.
fn redacted(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs.iter().map(|(key, value)| {
        if key == "token" {
            (key.as_str(), "REDACTED")
        } else {
            (key.as_str(), value.as_str())
        }
    }));
    redacted
}

fn envelope(value: &Value) -> Result<Envelope, Error> {
    serde_json::from_value::<Envelope>(value.clone())
        .map_err(|e| Error::MalformedResponse(value.to_string(), e.to_string()))
}

/// Parameters of an `authSource` request, in signing order.
pub fn login_params(api: &model::Api, credentials: &model::Credentials) -> Params {
    Params::new()
        .with("action", endpoint::AUTH_SOURCE)
        .with("usr", &credentials.username)
        .with("company-key", &api.app.company_key)
        .with("source", &api.app.source)
        .with("_app_client_", &api.app.app_client)
        .with("_app_id_", &api.app.app_id)
        .with("_app_version_", &api.app.app_version)
}

/// Login signature. The password only ever enters as its SHA-1 hex digest, either hashed along
/// (legacy) or as the HMAC key (current).
pub fn login_signature(
    protocol: model::AuthProtocol,
    salt: &str,
    password: &str,
    params: &Params,
) -> Result<String, Error> {
    sign::sign(
        protocol.algorithm(),
        salt,
        &sign::sha1_hex(password.as_bytes()),
        &params.to_signing_string(),
    )
}

/// Parameters of a device command, in signing order. `val` is only present for `ctrlDevice`.
pub fn command_params(api: &model::Api, request: &model::CommandRequest) -> Params {
    let params = Params::new()
        .with("action", request.action)
        .with("devaddr", &api.device.devaddr)
        .with("devcode", &api.device.devcode)
        .with("i18n", &api.app.i18n)
        .with("id", endpoint::OUTPUT_SOURCE_PRIORITY)
        .with("pn", &api.device.pn)
        .with("salt", &request.salt)
        .with("sn", &api.device.sn)
        .with("source", &api.app.source);

    match request.value {
        Some(priority) => params.with("val", priority.value()),
        None => params,
    }
}

pub fn command_signature(
    protocol: model::AuthProtocol,
    salt: &str,
    session: &model::Session,
    params: &Params,
) -> Result<String, Error> {
    match protocol {
        model::AuthProtocol::Legacy => sign::sign(
            sign::Algorithm::Sha1,
            salt,
            &format!("{}{}", session.secret, session.token),
            &params.to_signing_string(),
        ),
        model::AuthProtocol::Current => sign::sign(
            sign::Algorithm::HmacSha256,
            salt,
            &session.secret,
            &format!("{}{}", session.token, params.to_signing_string()),
        ),
    }
}

/// Exchange credentials for a session token and signing secret.
pub async fn login(
    api: &model::Api,
    credentials: &model::Credentials,
) -> Result<model::Session, Error> {
    let salt = model::next_salt();
    let params = login_params(api, credentials);
    let signature = login_signature(api.protocol, &salt, &credentials.password, &params)?;
    let url = build_url(
        &api.auth_url,
        &[("sign", signature.as_str()), ("salt", salt.as_str())],
        &params,
    )?;

    log::debug!("Calling URL: {}", url);

    let value = get(api, url).await?;
    let response = envelope(&value)?;

    if response.err != 0 {
        return Err(Error::Authentication(format!(
            "Error {}: {}",
            response.err,
            response.description()
        )));
    }

    let auth = response
        .dat
        .map(serde_json::from_value::<AuthSource>)
        .transpose()
        .map_err(|e| Error::MalformedResponse(value.to_string(), e.to_string()))?
        .ok_or_else(|| {
            Error::Authentication("login response carried no session data".to_string())
        })?;

    match auth.signing_secret() {
        Some(secret) if !auth.token.is_empty() => {
            if let Some(expire) = auth.expire {
                log::debug!("session token valid for {}s", expire);
            }
            Ok(model::Session::new(auth.token.clone(), secret.to_string()))
        }
        _ => Err(Error::Authentication(
            "login response carried no token or signing secret".to_string(),
        )),
    }
}

/// Sign and send a single device command. One HTTP round trip, no retries.
pub async fn send_command(
    api: &model::Api,
    session: &model::Session,
    request: &model::CommandRequest,
) -> Result<model::ActionResult, Error> {
    let params = command_params(api, request);
    let signature = command_signature(api.protocol, &request.salt, session, &params)?;

    let unsalted = params
        .iter()
        .filter(|(key, _)| *key != "salt")
        .fold(Params::new(), |acc, (key, value)| acc.with(key, value));
    let url = build_url(
        &api.api_url,
        &[
            ("sign", signature.as_str()),
            ("salt", request.salt.as_str()),
            ("token", session.token.as_str()),
        ],
        &unsalted,
    )?;

    log::debug!("Calling URL: {}", redacted(&url));

    let value = get(api, url).await?;
    let response = envelope(&value)?;

    log::info!("API Response for action '{}': {}", request.action, value);

    if response.err == api.token_invalid_code {
        return Err(Error::TokenExpired(response.description()));
    }
    if response.err != 0 {
        return Err(Error::RemoteApi {
            code: response.err,
            desc: response.description(),
        });
    }

    let priority = match request.value {
        Some(_) => None,
        None => response
            .dat
            .clone()
            .and_then(|dat| serde_json::from_value::<CtrlValue>(dat).ok())
            .and_then(|ctrl| ctrl.val)
            .as_ref()
            .and_then(model::OutputPriority::from_value),
    };

    Ok(model::ActionResult {
        success: true,
        api_error_code: response.err,
        description: response.description(),
        raw_payload: value,
        priority,
    })
}
