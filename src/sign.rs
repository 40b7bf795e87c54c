use crate::api::Error;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature flavour. `Sha1` belongs to the legacy auth protocol, `HmacSha256` to the current
/// one where the login exchange hands out a per-session signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    HmacSha256,
}

/// Ordered query parameters. The remote side recomputes the signature over the same ordering,
/// so insertion order is the wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(&'static str, String)>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Renders `&k1=v1&k2=v2...`, the form the signature is computed over.
    pub fn to_signing_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("&{}={}", k, v))
            .collect()
    }
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Signs `params` for a request carrying `salt`.
///
/// * `Sha1`: `SHA1(salt + secret + params)`, where the caller folds whatever secret material the
///   request needs (hashed password, or session secret followed by token) into `secret`.
/// * `HmacSha256`: `HMAC-SHA256(key = secret, salt + params)`.
pub fn sign(
    algorithm: Algorithm,
    salt: &str,
    secret: &str,
    params: &str,
) -> Result<String, Error> {
    match algorithm {
        Algorithm::Sha1 => Ok(sha1_hex(format!("{}{}{}", salt, secret, params).as_bytes())),
        Algorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| Error::Configuration(format!("invalid signing key: {}", e)))?;
            mac.update(salt.as_bytes());
            mac.update(params.as_bytes());
            Ok(hex::encode(mac.finalize().into_bytes()))
        }
    }
}
