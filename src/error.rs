// Errors for the command path and calibration persistence

use serde::Serialize;

/// Why a request was rejected. No rejected request mutates motor state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{field} {value} out of range (0..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("Calibration already active on motor {motor}")]
    AlreadyActive { motor: usize },

    #[error("No calibration is active")]
    NotActive,
}

/// Machine-readable error kind for status replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    OutOfRange,
    AlreadyActive,
    NotActive,
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            CommandError::OutOfRange { .. } => ErrorKind::OutOfRange,
            CommandError::AlreadyActive { .. } => ErrorKind::AlreadyActive,
            CommandError::NotActive => ErrorKind::NotActive,
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::MalformedPayload(e.to_string())
    }
}

/// Calibration persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Calibration file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
