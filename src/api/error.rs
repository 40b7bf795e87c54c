use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Missing or inconsistent settings. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Login rejected by the remote API, or a rejected static token that cannot be renewed.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// API reported the session token as invalid. Triggers one re-login cycle.
    #[error("session token rejected: {0}")]
    TokenExpired(String),
    /// Network, timeout or non-2xx HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-zero API error code other than token expiry.
    #[error("API error {code}: {desc}")]
    RemoteApi { code: i64, desc: String },
    /// Body was not JSON or did not have the expected shape. Holds (body, reason).
    #[error("malformed response ({1}): {0}")]
    MalformedResponse(String, String),
    /// Retry budget spent; `last` is the error of the final attempt.
    #[error("giving up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        waited: Vec<Duration>,
        last: Box<Error>,
    },
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TokenExpired(_)
                | Error::Transport(_)
                | Error::RemoteApi { .. }
                | Error::MalformedResponse(..)
        )
    }

    /// Process exit status for a terminal failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Configuration(_) => 2,
            Error::Authentication(_) => 3,
            Error::RetriesExhausted { last, .. } => match **last {
                Error::Configuration(_) | Error::Authentication(_) => last.exit_code(),
                _ => 1,
            },
            _ => 1,
        }
    }
}
