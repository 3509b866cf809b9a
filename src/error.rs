//! Error types shared by the engine, the games and their front-ends.

/// Main error type. Anything a frame can fail with ends up here.
#[derive(thiserror::Error, Debug)]
pub enum GameError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// A drawing backend refused an operation.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("surface backend: {0}")]
    Backend(String),

    #[error("terminal io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type GameResult<T> = Result<T, GameError>;
