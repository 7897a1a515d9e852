use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unknown strategy profile: {0}")]
    UnknownStrategy(String),

    #[error("Unknown terrain layout: {0}")]
    UnknownTerrainLayout(String),

    #[error("Unknown mission scoring preset: {0}")]
    UnknownMission(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Recoverable data problem: logged and kept for the result's warning list
pub fn record_warning(warnings: &mut Vec<String>, message: impl Into<String>) {
    let message = message.into();
    tracing::warn!("{}", message);
    warnings.push(message);
}
