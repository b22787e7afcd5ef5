use thiserror::Error;

#[derive(Debug, Error)]
pub enum RowscopeError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("screen configuration error: {0}")]
    ScreenConfig(String),
    #[error("duplicate screen name: {0}")]
    DuplicateScreen(String),
    #[error("invalid screen name: {0:?}")]
    InvalidScreenName(String),
}
