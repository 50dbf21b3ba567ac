use document_tree::DocumentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings storage unavailable: {0}")]
    Unavailable(String),
    #[error("settings io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings payload invalid: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
    #[error("intensity must be a finite number, got {0}")]
    InvalidIntensity(f64),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Document(_) => "document",
            EngineError::InvalidIntensity(_) => "invalid_intensity",
            EngineError::Settings(_) => "settings",
            EngineError::InvalidCommand(_) => "invalid_command",
        }
    }
}
