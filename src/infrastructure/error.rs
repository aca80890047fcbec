use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("authentication required: {0}")]
    Auth(String),
    #[error("calendar service error: {0}")]
    Calendar(String),
    #[error("could not parse time expression '{0}'")]
    Parse(String),
    #[error("task mirror error: {0}")]
    TaskMirror(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
