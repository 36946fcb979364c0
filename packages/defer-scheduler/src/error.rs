use thiserror::Error;

/// The outcome a caller sees when a deferred call does not resolve.
#[derive(Debug, Error)]
pub enum CallError {
    /// The handler returned an error. It is passed through untouched.
    #[error(transparent)]
    Rejected(#[from] anyhow::Error),

    /// The handler panicked and the panic was caught for this call alone.
    ///
    /// The process panic hook runs before the unwind is caught, so the default
    /// hook still prints the panic to stderr; install a hook to change that.
    /// Under `panic = "abort"` nothing is caught and the process ends.
    #[error("handler `{name}` panicked: {message}")]
    Panicked { name: String, message: String },

    /// The call table outlived a handler table that still named this operation.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// The scheduler was dropped before the call ran.
    #[error("scheduler disposed before the call ran")]
    Disposed,
}

impl CallError {
    /// The handler's own error, when the call was rejected by it.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            CallError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("effect queue has been dropped")]
    Disposed,
}
