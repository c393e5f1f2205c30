/// Stack editing error types
#[derive(Debug, thiserror::Error)]
pub enum StackEditError {
    /// The imported stack has an illegal shape (multiple roots, merges,
    /// duplicate or unknown nodes)
    #[error("malformed stack: {0}")]
    Structural(String),

    /// An internal invariant no longer holds; indicates a bug in the caller
    /// or in the engine itself
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// An edit operation was invoked although its predicate returns false
    #[error("illegal edit: {0}")]
    IllegalEdit(String),

    /// A path is not tracked by the stack or its bottom files
    #[error("file '{0}' is not tracked by the stack")]
    NotTracked(String),

    /// UTF-8 content was requested for a binary file
    #[error("cannot decode binary file as text: {0}")]
    Decode(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StackEditError {
    pub fn structural<S: Into<String>>(msg: S) -> Self {
        StackEditError::Structural(msg.into())
    }

    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        StackEditError::Invariant(msg.into())
    }

    pub fn illegal_edit<S: Into<String>>(msg: S) -> Self {
        StackEditError::IllegalEdit(msg.into())
    }

    pub fn not_tracked<S: Into<String>>(path: S) -> Self {
        StackEditError::NotTracked(path.into())
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        StackEditError::Decode(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StackEditError>;
