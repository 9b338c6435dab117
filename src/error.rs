use thiserror::Error;

/// Failure reported by the storage backend.
///
/// Carried through the adapter untouched: whatever the backend put in
/// `code`, `reason` and `message` is what the caller sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .code.map(|c| format!(" (code {})", c)).unwrap_or_default())]
pub struct BackendError {
    code: Option<u16>,
    reason: Option<String>,
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(format!("No such object: {}", key))
            .with_code(404)
            .with_reason("NoSuchKey")
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("stream interrupted: {0}")]
    Stream(BackendError),

    #[error("response sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl Error {
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Error::Backend(err) | Error::Stream(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
