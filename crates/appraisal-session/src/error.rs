use thiserror::Error;

/// Session engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure aborts the whole call; no state changes survive an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Phase violation: {0}")]
    PhaseViolation(String),

    #[error("Deadline violation: {0}")]
    DeadlineViolation(String),

    #[error("Authorization violation: {0}")]
    AuthorizationViolation(String),

    #[error("Revealed appraisal does not match the stored commitment")]
    ConcealmentMismatch,

    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: String, available: String },

    #[error("Arithmetic fault: {0}")]
    ArithmeticFault(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Reentrant call rejected: {0}")]
    Reentrancy(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn phase(expected: impl std::fmt::Display, found: impl std::fmt::Debug) -> Self {
        Self::PhaseViolation(format!("expected {}, found {:?}", expected, found))
    }

    pub(crate) fn overflow(what: &str) -> Self {
        Self::ArithmeticFault(format!("{} overflowed", what))
    }
}
