//! Host-to-document message shapes.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A message posted into a rendered document.
///
/// Serialized with a `type` tag, matching what the document's listener
/// switches on: `{"type":"environment","sunlight":0.3,"godrays":0.5}` and
/// `{"type":"toggleInstructions"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "environment")]
    Environment { sunlight: f64, godrays: f64 },
    #[serde(rename = "toggleInstructions")]
    ToggleInstructions,
}

impl ControlMessage {
    /// Parse a raw payload. Unknown or malformed messages yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"environment","sunlight":0.25,"godrays":1}"#),
            Some(ControlMessage::Environment {
                sunlight: 0.25,
                godrays: 1.0
            })
        );
    }

    #[test]
    fn test_parse_toggle_ignores_extra_fields() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"toggleInstructions","source":"ui"}"#),
            Some(ControlMessage::ToggleInstructions)
        );
    }

    #[test]
    fn test_unrecognized_messages_are_none() {
        for raw in [
            r#"{"type":"reload"}"#,
            r#"{"sunlight":0.2,"godrays":0.1}"#,
            r#"{"type":"environment","sunlight":"noon","godrays":0.1}"#,
            r#"{"type":"environment"}"#,
            "not json",
            "",
            "42",
        ] {
            assert_eq!(ControlMessage::parse(raw), None, "{}", raw);
        }
    }

    #[test]
    fn test_to_json_shapes() {
        let json = ControlMessage::Environment {
            sunlight: 0.5,
            godrays: 0.25,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "environment");
        assert_eq!(value["sunlight"], 0.5);
        assert_eq!(value["godrays"], 0.25);

        assert_eq!(
            ControlMessage::ToggleInstructions.to_json().unwrap(),
            r#"{"type":"toggleInstructions"}"#
        );
    }

    #[test]
    fn test_from_value() {
        let value = serde_json::json!({"type": "toggleInstructions"});
        assert_eq!(
            ControlMessage::from_value(&value),
            Some(ControlMessage::ToggleInstructions)
        );
    }
}
