use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum VentError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid command: {0}")]
    Command(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pwm output")]
    MissingPwm,
    #[error("missing speed sensor")]
    MissingSensor,
    #[error("curve needs at least two points")]
    CurveTooSmall,
    #[error("curve x values must be unique")]
    CurveDuplicateX,
    #[error("level map must have sorted, unique levels")]
    BadLevelMap,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
