use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("measurement timeout")]
    Timeout,
    #[error("measurement stream disconnected")]
    Disconnected,
    #[error("measurement interrupted")]
    Interrupted,
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("invalid front-end parameters: {0}")]
    Params(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
