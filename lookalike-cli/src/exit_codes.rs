//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a bad invocation from an unreadable image or an
//! unreachable host without parsing messages.

use lookalike_core::LookalikeError;

/// Successful execution (a search with no match is still a success).
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Invalid configuration or arguments.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Input is not a usable image.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file or corpus.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Image host unreachable or failing.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Cannot write the corpus.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = match err.chain().find_map(|e| e.downcast_ref::<LookalikeError>()) {
            Some(e) => Self::classify(e),
            None if message.contains("Failed to read") => INPUT_ERROR,
            None if message.contains("Failed to write") => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn classify(err: &LookalikeError) -> i32 {
        match err {
            LookalikeError::Acquisition { cause, .. } if cause.contains("Failed to read") => {
                INPUT_ERROR
            }
            LookalikeError::Acquisition { cause, .. } if cause.contains("Not an image") => {
                DATA_ERROR
            }
            LookalikeError::Acquisition { .. } | LookalikeError::AcquisitionTimeout { .. } => {
                NETWORK_ERROR
            }
            LookalikeError::Decode(_) | LookalikeError::SignatureComputation(_) => DATA_ERROR,
            LookalikeError::Config(_) => USAGE_ERROR,
            LookalikeError::Repository(message) if message.contains("Failed to write") => IO_ERROR,
            LookalikeError::Repository(_) | LookalikeError::Serialization(_) => INPUT_ERROR,
            LookalikeError::Task(_) => GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn code_of(err: LookalikeError) -> i32 {
        let wrapped = Err::<(), _>(err).context("Command failed").unwrap_err();
        ExitCode::from_anyhow(&wrapped).code
    }

    #[test]
    fn test_classification() {
        assert_eq!(code_of(LookalikeError::Decode("bad".into())), DATA_ERROR);
        assert_eq!(code_of(LookalikeError::Config("floor".into())), USAGE_ERROR);
        assert_eq!(code_of(LookalikeError::Task("panicked".into())), GENERAL_ERROR);
        assert_eq!(
            code_of(LookalikeError::AcquisitionTimeout {
                url: "u".into(),
                attempts: 2,
                deadline_ms: 100
            }),
            NETWORK_ERROR
        );
        assert_eq!(
            code_of(LookalikeError::Acquisition {
                url: "photo.jpg".into(),
                attempts: 1,
                cause: "Failed to read photo.jpg: No such file".into()
            }),
            INPUT_ERROR
        );
        assert_eq!(
            code_of(LookalikeError::Repository("Failed to write corpus.cbor".into())),
            IO_ERROR
        );
    }

    #[test]
    fn test_plain_errors() {
        let err = anyhow::anyhow!("Failed to read file: x");
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
        assert_eq!(ExitCode::from_anyhow(&anyhow::anyhow!("boom")).code, GENERAL_ERROR);
    }
}
