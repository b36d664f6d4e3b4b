use thiserror::Error;

/// Errors from an [`crate::persistence::OutcomeStore`] implementation.
#[derive(Debug, Error)]
pub enum OutcomeError {
    /// The backing store rejected the record.
    #[error("outcome store rejected record: {0}")]
    Rejected(String),

    /// The backing store could not be reached.
    #[error("outcome store unavailable: {0}")]
    Unavailable(String),
}
