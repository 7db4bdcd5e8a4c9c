use crate::models::NetworkError;

/// Errors that can occur while reading or writing network instances.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed instance at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Invalid network: {0}")]
    Invalid(#[from] NetworkError),
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
