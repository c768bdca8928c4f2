use thiserror::Error;

/// Recoverable failures surfaced by core operations.
///
/// Invariant violations inside the tick are not represented here — those
/// abort via assertions because the sequence cannot continue past them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    /// The caller handed an operation a value it cannot accept; the
    /// operation had no effect.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Construction-time parameter out of range; fail fast.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operation is not legal in the component's current state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
}
