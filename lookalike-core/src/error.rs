use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookalikeError {
    #[error("Acquisition of {url} failed after {attempts} attempt(s): {cause}")]
    Acquisition {
        url: String,
        attempts: u32,
        cause: String,
    },

    #[error("Acquisition of {url} exceeded deadline of {deadline_ms}ms after {attempts} attempt(s)")]
    AcquisitionTimeout {
        url: String,
        attempts: u32,
        deadline_ms: u64,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signature computation error: {0}")]
    SignatureComputation(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl LookalikeError {
    /// Number of fetch attempts made before an acquisition failure, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Acquisition { attempts, .. } | Self::AcquisitionTimeout { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

impl From<image::ImageError> for LookalikeError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<tokio::task::JoinError> for LookalikeError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LookalikeError>;
