//! In-memory stand-ins for [`crate::transport::WriteIntentPort`], used by
//! this crate's own unit tests and, behind the `test-support` feature, by
//! the integration tests under `tests/`.
//!
//! Mirrors the role `Cursor<Vec<u8>>`/`BufReader` play in the teacher's
//! streaming-reader tests: a native-buffer stand-in that is simple enough
//! to assert against byte-for-byte.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};

use crate::{
    config::EngineConfig, engine::{Engine, EngineBuilder}, error::EngineError, flags::TxFlags,
    transport::WriteIntentPort, tx::Tx,
};

/// Build a `Tx` with no flags set and an empty attribute bag, for tests
/// that only need a well-formed transaction to pass around.
#[must_use]
pub fn blank_tx() -> Tx { Tx::new(1, TxFlags::empty()) }

/// Build a no-rules engine with the builtin operators/actions registered,
/// for tests that only need a well-formed `BodyFilter::new` argument and
/// don't care about firing any particular rule.
#[must_use]
pub fn test_engine() -> Arc<Engine> {
    Arc::new(
        EngineBuilder::new(EngineConfig::default())
            .with_builtins()
            .expect("builtins")
            .build(),
    )
}

#[derive(Debug, Default)]
struct RecordingState {
    written: BytesMut,
    committed_size: Option<u64>,
    reenable_count: u32,
    errored: bool,
    ntodo: u64,
}

/// An in-memory [`WriteIntentPort`] that appends every write to a growable
/// buffer and records the committed final size, if any.
///
/// `Clone`s share the same underlying state, so a test can hand one clone
/// into a `Box<dyn WriteIntentPort>` (which takes ownership) while keeping
/// another to assert against once the owning [`crate::filter::BodyFilter`]
/// is done with it.
#[derive(Debug, Default, Clone)]
pub struct RecordingWriteIntent {
    inner: Arc<Mutex<RecordingState>>,
}

impl RecordingWriteIntent {
    /// Build an intent with no bytes written yet.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Every byte written downstream so far, in order.
    #[must_use]
    pub fn written(&self) -> Bytes { Bytes::copy_from_slice(&self.lock().written) }

    /// The final size committed via [`WriteIntentPort::commit`], if the
    /// write has been committed yet.
    #[must_use]
    pub fn committed_size(&self) -> Option<u64> { self.lock().committed_size }

    /// Number of times `reenable` was called.
    #[must_use]
    pub fn reenable_count(&self) -> u32 { self.lock().reenable_count }

    /// Whether `signal_error` was called.
    #[must_use]
    pub fn errored(&self) -> bool { self.lock().errored }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriteIntentPort for RecordingWriteIntent {
    fn write(&mut self, bytes: &Bytes) -> Result<(), EngineError> {
        self.lock().written.extend_from_slice(bytes);
        Ok(())
    }

    fn set_nbytes(&mut self, nbytes: Option<u64>) { self.lock().ntodo = nbytes.unwrap_or(u64::MAX); }

    fn reenable(&mut self) -> Result<(), EngineError> {
        self.lock().reenable_count += 1;
        Ok(())
    }

    fn ntodo(&self) -> u64 { self.lock().ntodo }

    fn ndone_inc(&mut self, n: u64) {
        let mut state = self.lock();
        state.ntodo = state.ntodo.saturating_sub(n);
    }

    fn commit(&mut self, final_size: u64) -> Result<(), EngineError> {
        self.lock().committed_size = Some(final_size);
        Ok(())
    }

    fn signal_error(&mut self) { self.lock().errored = true; }
}
