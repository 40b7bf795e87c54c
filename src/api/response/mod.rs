pub mod auth_source;
pub mod ctrl_value;

use serde::Deserialize;
use serde_json::Value;

/* Every endpoint answers with this envelope; `err == 0` means success */
#[derive(Deserialize)]
pub struct Envelope {
    pub err: i64,
    pub desc: Option<String>,
    pub dat: Option<Value>,
}

impl Envelope {
    pub fn description(&self) -> String {
        self.desc
            .clone()
            .unwrap_or_else(|| "(no description received)".to_string())
    }
}

#[cfg(test)]
mod test {
    use super::auth_source::AuthSource;
    use super::ctrl_value::CtrlValue;
    use super::Envelope;
    use crate::model::OutputPriority;
    use std::fs;
    use std::path::PathBuf;

    fn read_resource(filename: &str) -> String {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        fs::read_to_string(d.as_path()).unwrap()
    }

    fn dat<T: serde::de::DeserializeOwned>(envelope: Envelope) -> T {
        serde_json::from_value(envelope.dat.unwrap()).unwrap()
    }

    #[test]
    fn auth_source_legacy() {
        let input = read_resource("authSource.json");
        let envelope: Envelope = serde_json::from_str(&input).unwrap();
        assert_eq!(0, envelope.err);
        let output: AuthSource = dat(envelope);
        assert_eq!(
            "0d4c2f8a6b1e3d5f7a9c0b2d4e6f8a1c3e5b7d9f0a2c4e6b8d1f3a5c7e9b0d2f",
            output.token
        );
        assert_eq!(
            Some("7c3f1a9e5b2d4c6e8f0a1b3c5d7e9f1a2b4c6d8e"),
            output.signing_secret()
        );
        assert_eq!(Some(604800), output.expire);
    }

    #[test]
    fn auth_source_current() {
        let input = read_resource("authSource_current.json");
        let output: AuthSource = dat(serde_json::from_str(&input).unwrap());
        assert_eq!(None, output.secret);
        assert_eq!(Some("b1d3f5a7c9e0b2d4f6a8c1e3b5d7f9a0"), output.signing_secret());
    }

    #[test]
    fn auth_source_rejected() {
        let input = read_resource("authSource_rejected.json");
        let envelope: Envelope = serde_json::from_str(&input).unwrap();
        assert_eq!(1, envelope.err);
        assert_eq!("ERR_FAIL", envelope.description());
        assert!(envelope.dat.is_none());
    }

    #[test]
    fn query_device_ctrl_value() {
        let input = read_resource("queryDeviceCtrlValue.json");
        let output: CtrlValue = dat(serde_json::from_str(&input).unwrap());
        assert_eq!(Some("los_output_source_priority"), output.id.as_deref());
        assert_eq!(
            Some(OutputPriority::Sbu),
            output.val.as_ref().and_then(OutputPriority::from_value)
        );
    }

    #[test]
    fn ctrl_device() {
        let input = read_resource("ctrlDevice.json");
        let envelope: Envelope = serde_json::from_str(&input).unwrap();
        assert_eq!(0, envelope.err);
        assert_eq!("ERR_NONE", envelope.description());
    }

    #[test]
    fn token_invalid() {
        let input = read_resource("tokenInvalid.json");
        let envelope: Envelope = serde_json::from_str(&input).unwrap();
        assert_eq!(crate::api::TOKEN_INVALID, envelope.err);
    }

    #[test]
    fn missing_description() {
        let envelope: Envelope = serde_json::from_str(r#"{"err": 12}"#).unwrap();
        assert_eq!("(no description received)", envelope.description());
    }

    #[test]
    #[should_panic]
    fn envelope_invalid_json() {
        let invalid_json_input = read_resource("invalid_json.json");
        let _invalid_json_output: Envelope = serde_json::from_str(&invalid_json_input).unwrap();
    }
}
