use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures of the assignment engine proper. Collaborator failures (paywall
/// fetches, rule evaluation) stay at their trait seams and never enter this
/// taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An empty variant option list was supplied to selection. A config or
    /// programmer error; surfaced to the caller, never retried internally.
    #[error("no variant options available for selection")]
    NoVariantsFound,

    /// Weighted selection fell through a non-empty partition with a positive
    /// weight sum. Signals a broken invariant; unreachable in correct code.
    #[error("variant selection fell through: broken weight partition")]
    InvalidState,
}
