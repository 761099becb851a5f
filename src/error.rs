use burn::config::ConfigError;
use burn::record::RecorderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PpoError {
    #[error("invalid shape for {what}: expected {expected}, got {actual}")]
    InvalidShape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("checkpoint load failed: {0}")]
    CheckpointLoad(String),
    #[error("policy produced non-finite output: {0}")]
    NonFiniteOutput(String),
    #[error("optimization diverged during {stage}: {detail}")]
    OptimizationDivergence { stage: &'static str, detail: String },
    #[error("record error: {0}")]
    Recorder(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tensor data error: {0}")]
    TensorData(String),
}

// burn's record and config errors only guarantee Debug.
impl From<RecorderError> for PpoError {
    fn from(err: RecorderError) -> Self {
        PpoError::Recorder(format!("{err:?}"))
    }
}

impl From<ConfigError> for PpoError {
    fn from(err: ConfigError) -> Self {
        PpoError::Config(format!("{err:?}"))
    }
}

pub type Result<T> = std::result::Result<T, PpoError>;
