//! The Transport I/O port (spec §6): the external interface the body filter
//! drives to move bytes and signal downstream readiness.
//!
//! The source design enumerates buffer/reader primitives
//! (`buffer_create`, `reader_alloc`, `buffer_copy`, ...) because the
//! original transport has no refcounted byte type of its own. Rust already
//! has one: [`bytes::Bytes`] is cheaply cloned and reference-counted, so it
//! *is* the zero-copy buffer handle here rather than something wrapped
//! behind a `buffer_create`/`buffer_destroy` pair. What remains genuinely
//! host-specific is write-intent signalling, which is kept as its own
//! trait.

use bytes::Bytes;

use crate::error::EngineError;

/// An outstanding downstream write (`vio` in the source design).
///
/// Implementations represent a single direction's write-intent handle on
/// the host's native transform API.
pub trait WriteIntentPort: Send {
    /// Write committed bytes downstream. Called with verbatim, replacement,
    /// and final-commit segments as the filter emits them.
    ///
    /// # Errors
    /// Returns [`EngineError::Fatal`] on a transport-level failure.
    fn write(&mut self, bytes: &Bytes) -> Result<(), EngineError>;

    /// Record how many bytes are expected before the write is considered
    /// complete (`vio_set_nbytes`). `None` means unbounded.
    fn set_nbytes(&mut self, nbytes: Option<u64>);

    /// Ask the host to resume delivering write-ready events
    /// (`vio_reenable`).
    ///
    /// # Errors
    /// Returns [`EngineError::Fatal`] if the host rejects re-enabling (for
    /// example, the connection has already been torn down).
    fn reenable(&mut self) -> Result<(), EngineError>;

    /// How many bytes the host still expects (`vio_ntodo`).
    fn ntodo(&self) -> u64;

    /// Record that `n` more bytes have been delivered (`vio_ndone_inc`).
    fn ndone_inc(&mut self, n: u64);

    /// Signal that no more bytes will ever be written and the final size is
    /// committed.
    ///
    /// # Errors
    /// Returns [`EngineError::Fatal`] on a transport-level failure.
    fn commit(&mut self, final_size: u64) -> Result<(), EngineError>;

    /// Signal that the write has failed; no further bytes will be
    /// accepted.
    fn signal_error(&mut self);
}
