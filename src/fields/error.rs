use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldError {
    /// Unknown field id, missing value or wrong value type. Rejected before
    /// any state access or hashing work.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence failure: {context}")]
    Persistence {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("hashing failure: {0}")]
    Hashing(String),
}

impl FieldError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type Result<T, E = FieldError> = std::result::Result<T, E>;
