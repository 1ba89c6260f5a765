use std::fmt;

#[derive(Debug, Clone)]
pub enum ChainError {
    Transient(String),
    Permanent(String),
}

impl ChainError {
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }
    pub fn permanent<S: Into<String>>(msg: S) -> Self {
        Self::Permanent(msg.into())
    }
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
    pub fn message(&self) -> &str {
        match self {
            ChainError::Transient(s) | ChainError::Permanent(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ChainError {}

pub fn classify_transport_error<E: fmt::Display>(e: &E) -> ChainError {
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("connect") || lower.contains("timed out") || lower.contains("timeout") || lower.contains("broken pipe") {
        ChainError::transient(s)
    } else {
        ChainError::permanent(s)
    }
}

/// Failures surfaced by the register and verify flows.
#[derive(Debug)]
pub enum AppError {
    /// The node has not answered a probe yet.
    Unavailable,
    Chain(ChainError),
    Storage(String),
    BadRequest(String),
    /// Upload exceeds `MAX_UPLOAD_BYTES`.
    TooLarge(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Unavailable => f.write_str("blockchain node not connected yet"),
            AppError::Chain(e) => write!(f, "blockchain error: {}", e),
            AppError::Storage(s) => write!(f, "storage error: {}", s),
            AppError::BadRequest(s) => write!(f, "bad request: {}", s),
            AppError::TooLarge(s) => write!(f, "upload too large: {}", s),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ChainError> for AppError {
    fn from(e: ChainError) -> Self {
        AppError::Chain(e)
    }
}
