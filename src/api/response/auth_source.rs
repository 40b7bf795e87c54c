use serde::Deserialize;

/// `dat` of a successful `authSource` call.
#[derive(Deserialize)]
pub struct AuthSource {
    pub token: String,
    /// Legacy protocol signing secret.
    pub secret: Option<String>,
    /// Current protocol signing key.
    pub key: Option<String>,
    /// Token lifetime in seconds.
    pub expire: Option<i64>,
}

impl AuthSource {
    /// Whichever signing material the server handed out; `secret` wins if both are present.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .or_else(|| self.key.as_deref())
            .filter(|s| !s.is_empty())
    }
}
