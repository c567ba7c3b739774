//! Engine error taxonomy.
//!
//! One variant per error kind named in the engine's error handling design:
//! `invalid`, `not_found`, `alloc`, `again`, `invalid_edit`, `transient`, and
//! `fatal`. Parse-time errors (`Invalid`, `NotFound`) abort the directive
//! that produced them; execution-time errors abort only the rule or flush
//! call in progress.

use thiserror::Error;

/// Errors produced by rule parsing, rule execution, and the body filter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed directive, unknown phase/modifier, empty inputs, or a
    /// missing id on an external rule.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Unknown operator or action name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Allocation failure; always fatal to the current operation.
    #[error("allocation failed: {0}")]
    Alloc(String),

    /// A flush could not complete because an edit straddles the emit
    /// horizon. The caller should retry with more data, or with `last: true`.
    #[error("flush incomplete, retry with more data")]
    Again,

    /// An edit was dropped during flush because it overlapped already
    /// emitted bytes, or because it could not be applied on the final
    /// flush. Surfaced once per flush; never aborts the transaction.
    #[error("edit dropped: {0}")]
    InvalidEdit(String),

    /// The script gate could not be acquired; the failing rule yields
    /// false rather than propagating the error further.
    #[error("transient: {0}")]
    Transient(String),

    /// Anything else reported by the transport; propagated upward as an
    /// error event and tears down the filter.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// Build an [`EngineError::Invalid`] from a displayable reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self { Self::Invalid(reason.into()) }

    /// Build an [`EngineError::NotFound`] from a displayable reason.
    #[must_use]
    pub fn not_found(reason: impl Into<String>) -> Self { Self::NotFound(reason.into()) }

    /// Build an [`EngineError::InvalidEdit`] from a displayable reason.
    #[must_use]
    pub fn invalid_edit(reason: impl Into<String>) -> Self { Self::InvalidEdit(reason.into()) }

    /// Build an [`EngineError::Transient`] from a displayable reason.
    #[must_use]
    pub fn transient(reason: impl Into<String>) -> Self { Self::Transient(reason.into()) }

    /// Build an [`EngineError::Fatal`] from a displayable reason.
    #[must_use]
    pub fn fatal(reason: impl Into<String>) -> Self { Self::Fatal(reason.into()) }

    /// Whether this error should tear down the body filter.
    ///
    /// Only `again` and `invalid_edit` are recoverable flush outcomes; every
    /// other kind propagates as a transport `error` event.
    #[must_use]
    pub const fn is_filter_fatal(&self) -> bool {
        !matches!(self, Self::Again | Self::InvalidEdit(_))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(EngineError::Again, false)]
    #[case(EngineError::invalid_edit("overlap"), false)]
    #[case(EngineError::invalid("bad phase"), true)]
    #[case(EngineError::fatal("transport closed"), true)]
    fn filter_fatal_classification(#[case] err: EngineError, #[case] expected: bool) {
        assert_eq!(err.is_filter_fatal(), expected);
    }
}
