//! Command surface shared by the CLI and the control bridge.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    ToggleEnabled { enabled: bool },
    SetOpacity { opacity: f64 },
    GetStatus,
    Reapply,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleEnabled { .. } => "toggleEnabled",
            Command::SetOpacity { .. } => "setOpacity",
            Command::GetStatus => "getStatus",
            Command::Reapply => "reapply",
        }
    }
}

pub fn parse_command(raw: &str) -> Result<Command, EngineError> {
    serde_json::from_str(raw).map_err(|err| EngineError::InvalidCommand(err.to_string()))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            ..Self::default()
        }
    }

    pub fn toggled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::ok()
        }
    }

    pub fn intensity(opacity: f64) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::ok()
        }
    }

    pub fn status(enabled: bool, opacity: f64) -> Self {
        Self {
            enabled: Some(enabled),
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    pub fn failure(error: &EngineError) -> Self {
        Self::rejected(error.to_string())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_action_tags() {
        assert_eq!(
            parse_command(r#"{"action":"setOpacity","opacity":0.6}"#).unwrap(),
            Command::SetOpacity { opacity: 0.6 }
        );
        assert_eq!(
            parse_command(r#"{"action":"toggleEnabled","enabled":false}"#).unwrap(),
            Command::ToggleEnabled { enabled: false }
        );
        assert_eq!(parse_command(r#"{"action":"getStatus"}"#).unwrap(), Command::GetStatus);
        assert!(matches!(
            parse_command(r#"{"action":"explode"}"#),
            Err(EngineError::InvalidCommand(_))
        ));
        assert!(parse_command(r#"{"action":"setOpacity"}"#).is_err());
    }

    #[test]
    fn responses_omit_absent_fields() {
        let json = serde_json::to_string(&CommandResponse::toggled(true)).unwrap();
        assert_eq!(json, r#"{"success":true,"enabled":true}"#);
        let json = serde_json::to_string(&CommandResponse::status(false, 0.3)).unwrap();
        assert_eq!(json, r#"{"enabled":false,"opacity":0.3}"#);
        let json = serde_json::to_string(&CommandResponse::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
