//! The streaming body-edit filter (C7): buffers body chunks per direction,
//! applies the deferred edit list, and drives write-intent signalling
//! (spec §4.6-§4.8).

pub mod edit;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::{
    config::LimitAction,
    engine::Engine,
    error::EngineError,
    filter::edit::{Edit, FlushOutcome},
    flags::TxFlags,
    phase::Phase,
    transport::WriteIntentPort,
    tx::Tx,
};

/// Which half of the transaction a filter instance is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The request body, inbound from the client.
    Request,
    /// The response body, outbound to the client.
    Response,
}

/// The five buffering modes derived from configuration and TX flags
/// (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingMode {
    /// Every chunk is flushed immediately.
    NoBuf,
    /// Incoming data is dropped.
    Discard,
    /// Accumulate without bound until `on_end`.
    BufferAll,
    /// Flush the entire buffer before accepting a chunk that would push it
    /// past `buf_limit`.
    BufferFlushAll,
    /// Flush exactly the overflow when accumulated size exceeds
    /// `buf_limit`, leaving `buf_limit` bytes resident.
    BufferFlushPart,
}

/// How much of the resident buffer a `flush` call should emit.
#[derive(Debug, Clone, Copy)]
enum FlushAmount {
    All,
    N(u64),
}

/// Choose the buffering mode for one direction of one transaction, per
/// spec §4.7: the configured knobs pick a base mode, then inspection and
/// bypass flags can only ever downgrade it to `nobuf`.
#[must_use]
pub fn select_mode(
    direction: Direction,
    tx_flags: TxFlags,
    buffering_enabled: bool,
    buf_limit: i64,
    limit_action: LimitAction,
) -> BufferingMode {
    let inspects = match direction {
        Direction::Request => tx_flags.inspects_request_body(),
        Direction::Response => tx_flags.inspects_response_body(),
    };
    if !inspects {
        return BufferingMode::NoBuf;
    }
    if !buffering_enabled {
        return BufferingMode::NoBuf;
    }
    if buf_limit < 0 {
        return BufferingMode::BufferAll;
    }
    match limit_action {
        LimitAction::FlushAll => BufferingMode::BufferFlushAll,
        LimitAction::FlushPart => BufferingMode::BufferFlushPart,
    }
}

/// The per-direction body filter state machine.
pub struct BodyFilter {
    direction: Direction,
    engine: Arc<Engine>,
    write_intent: Box<dyn WriteIntentPort>,
    input: BytesMut,
    bytes_done: u64,
    offs: i64,
    buffering_enabled: bool,
    buf_limit: i64,
    limit_action: LimitAction,
    mode: BufferingMode,
    initialized: bool,
}

impl BodyFilter {
    /// Construct a filter for one direction. The buffering mode is not
    /// finalised until the first chunk arrives, so it can take the TX's
    /// inspection/bypass flags (not known at construction time in every
    /// host) into account (spec §4.6, lazy first-chunk initialisation).
    ///
    /// `engine` is the rule engine this filter notifies of raw body bytes
    /// on every chunk (spec §2, §4.6); registries are read-mostly once
    /// traffic starts (spec §5), so a shared `Arc` is the natural handle.
    #[must_use]
    pub fn new(
        direction: Direction,
        engine: Arc<Engine>,
        write_intent: Box<dyn WriteIntentPort>,
        buffering_enabled: bool,
        buf_limit: i64,
        limit_action: LimitAction,
    ) -> Self {
        Self {
            direction,
            engine,
            write_intent,
            input: BytesMut::new(),
            bytes_done: 0,
            offs: 0,
            buffering_enabled,
            buf_limit,
            limit_action,
            mode: BufferingMode::NoBuf,
            initialized: false,
        }
    }

    /// This filter's direction.
    #[must_use]
    pub const fn direction(&self) -> Direction { self.direction }

    /// Number of bytes already emitted downstream.
    #[must_use]
    pub const fn bytes_done(&self) -> u64 { self.bytes_done }

    /// Number of bytes currently resident in the input buffer.
    #[must_use]
    pub fn buffered(&self) -> usize { self.input.len() }

    /// Append a deferred edit to this direction's pending edit list, kept on
    /// the TX (spec §3's filter-context pair). Actions call this while a
    /// rule is firing; the edit is applied at the next `flush`.
    pub fn push_edit(&self, tx: &mut Tx, edit: Edit) { tx.edits_mut(self.direction).push(edit); }

    /// The body phase this direction's chunks are notified against.
    const fn body_phase(&self) -> Phase {
        match self.direction {
            Direction::Request => Phase::RequestBody,
            Direction::Response => Phase::ResponseBody,
        }
    }

    /// The attribute-bag field raw chunks are published under before the
    /// body phase fires, so operators can read them like any other input.
    const fn body_field(&self) -> &'static str {
        match self.direction {
            Direction::Request => "REQUEST_BODY",
            Direction::Response => "RESPONSE_BODY",
        }
    }

    fn ensure_initialized(&mut self, tx: &mut Tx) {
        if self.initialized {
            return;
        }
        self.mode = select_mode(
            self.direction,
            tx.flags(),
            self.buffering_enabled,
            self.buf_limit,
            self.limit_action,
        );
        self.initialized = true;
        debug!(direction = ?self.direction, mode = ?self.mode, "body filter initialised");
    }

    /// Notify the engine of one chunk of raw body bytes (spec §2: "the
    /// filter notifies the engine of the raw bytes, which may trigger
    /// further rules"). Runs before buffering, so a rule action firing here
    /// can append an edit via [`Tx::edits_mut`] in time for the chunk's own
    /// flush to see it.
    fn notify_engine(&self, tx: &mut Tx, data: &[u8]) {
        tx.bag_mut().set(self.body_field(), data.to_vec());
        self.engine.fire_phase(self.body_phase(), tx);
    }

    /// Notify the filter of one chunk of raw body bytes. May be followed by
    /// further edits being appended before the chunk is flushed.
    ///
    /// # Errors
    /// Propagates any [`EngineError::Fatal`] from the write-intent port.
    /// `EngineError::Again` (a straddling edit deferred to a later call) is
    /// not a filter-fatal condition and is swallowed here rather than
    /// surfaced to the caller, per [`EngineError::is_filter_fatal`].
    pub fn on_chunk(&mut self, tx: &mut Tx, data: &[u8]) -> Result<(), EngineError> {
        self.ensure_initialized(tx);
        self.notify_engine(tx, data);

        match self.mode {
            BufferingMode::Discard => Ok(()),
            BufferingMode::NoBuf => {
                self.input.extend_from_slice(data);
                self.flush_tolerating_again(tx, FlushAmount::All, false)
            }
            BufferingMode::BufferAll => {
                self.input.extend_from_slice(data);
                Ok(())
            }
            BufferingMode::BufferFlushAll => {
                let prospective = i64::try_from(self.input.len() + data.len()).unwrap_or(i64::MAX);
                if self.buf_limit >= 0 && prospective > self.buf_limit && !self.input.is_empty() {
                    self.flush_tolerating_again(tx, FlushAmount::All, false)?;
                }
                self.input.extend_from_slice(data);
                Ok(())
            }
            BufferingMode::BufferFlushPart => {
                self.input.extend_from_slice(data);
                let resident = i64::try_from(self.input.len()).unwrap_or(i64::MAX);
                if self.buf_limit >= 0 && resident > self.buf_limit {
                    let limit = u64::try_from(self.buf_limit).unwrap_or(0);
                    let overflow = u64::try_from(self.input.len()).unwrap_or(u64::MAX).saturating_sub(limit);
                    self.flush_tolerating_again(tx, FlushAmount::N(overflow), false)?;
                }
                Ok(())
            }
        }
    }

    /// Run [`Self::flush`], swallowing a non-filter-fatal outcome
    /// (`Again`/`InvalidEdit`) instead of propagating it: the straddling
    /// edit (or dropped edit) has already been accounted for in this
    /// filter's state, and the caller only needs to hear about it when it
    /// tears down the filter.
    fn flush_tolerating_again(&mut self, tx: &mut Tx, amount: FlushAmount, last: bool) -> Result<(), EngineError> {
        match self.flush(tx, amount, last) {
            Ok(()) => Ok(()),
            Err(err) if !err.is_filter_fatal() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Flush all remaining data with `last=true`, then signal
    /// write-complete upstream.
    ///
    /// # Errors
    /// Propagates any [`EngineError::Fatal`] from the write-intent port.
    pub fn on_end(&mut self, tx: &mut Tx) -> Result<(), EngineError> { self.flush(tx, FlushAmount::All, true) }

    /// Propagate an error event upstream and stop: discard any remaining
    /// buffered bytes and signal the write-intent as errored.
    pub fn on_error(&mut self, tx: &mut Tx) {
        self.input.clear();
        tx.edits_mut(self.direction).clear();
        self.write_intent.signal_error();
    }

    /// Apply the flush algorithm (spec §4.8).
    ///
    /// # Errors
    /// Propagates any [`EngineError::Fatal`] from the write-intent port.
    fn flush(&mut self, tx: &mut Tx, nbytes_or_all: FlushAmount, last: bool) -> Result<(), EngineError> {
        let resident = u64::try_from(self.input.len()).unwrap_or(u64::MAX);
        let requested = match nbytes_or_all {
            FlushAmount::All => resident,
            FlushAmount::N(n) => n.min(resident),
        };

        let available: Bytes = self.input.clone().freeze();
        let result = tx.edits_mut(self.direction).apply(self.bytes_done, &available, requested, last);

        for reason in &result.invalid_edits {
            warn!(direction = ?self.direction, %reason, "edit dropped during flush");
        }

        for segment in &result.emitted {
            self.write_intent.write(segment)?;
        }

        let consumed = usize::try_from(result.consumed).unwrap_or(self.input.len());
        let _ = self.input.split_to(consumed.min(self.input.len()));
        self.bytes_done = result.bytes_done;
        self.offs += result.offs_delta;

        if last {
            let signed_bytes_done = i64::try_from(self.bytes_done).unwrap_or(i64::MAX);
            let final_size = u64::try_from((signed_bytes_done + self.offs).max(0)).unwrap_or(0);
            self.write_intent.commit(final_size)?;
        }

        self.write_intent.reenable()?;

        match result.outcome {
            FlushOutcome::Complete => Ok(()),
            FlushOutcome::Again => Err(EngineError::Again),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testkit::RecordingWriteIntent;

    use super::*;

    fn request_filter(buf_limit: i64, limit_action: LimitAction) -> BodyFilter {
        BodyFilter::new(
            Direction::Request,
            crate::testkit::test_engine(),
            Box::new(RecordingWriteIntent::new()),
            true,
            buf_limit,
            limit_action,
        )
    }

    fn blank_tx() -> Tx { crate::testkit::blank_tx() }

    #[test]
    fn s1_nobuf_flushes_every_chunk_immediately() {
        let mut filter = BodyFilter::new(
            Direction::Request,
            crate::testkit::test_engine(),
            Box::new(RecordingWriteIntent::new()),
            false,
            -1,
            LimitAction::FlushAll,
        );
        let mut tx = blank_tx();
        tx.flags_mut().insert(TxFlags::INSPECT_REQBODY);
        for chunk in ["He", "ll", "oW", "or", "ld"] {
            filter.on_chunk(&mut tx, chunk.as_bytes()).expect("on_chunk");
        }
        filter.on_end(&mut tx).expect("on_end");
        assert_eq!(filter.bytes_done(), 10);
    }

    #[test]
    fn s2_edit_applies_within_buffered_data() {
        let mut filter = request_filter(-1, LimitAction::FlushAll);
        let mut tx = blank_tx();
        tx.flags_mut().insert(TxFlags::INSPECT_REQBODY);
        filter.on_chunk(&mut tx, b"HelloWorld").expect("on_chunk");
        filter.push_edit(&mut tx, Edit::new(5, 5, Bytes::from_static(b"There")));
        filter.on_end(&mut tx).expect("on_end");
        assert_eq!(filter.bytes_done(), 10);
    }

    #[test]
    fn s3_straddling_edit_yields_again_then_completes() {
        // nobuf mode flushes on every chunk, so the edit straddling the
        // first chunk's horizon actually exercises the deferred-again path;
        // under buffer_all the whole body would be flushed in one go at
        // `on_end` and never observe an intermediate `Again`.
        let mut filter = BodyFilter::new(
            Direction::Request,
            crate::testkit::test_engine(),
            Box::new(RecordingWriteIntent::new()),
            false,
            -1,
            LimitAction::FlushAll,
        );
        let mut tx = blank_tx();
        tx.flags_mut().insert(TxFlags::INSPECT_REQBODY);
        filter.push_edit(&mut tx, Edit::new(3, 4, Bytes::from_static(b"p!")));
        filter.on_chunk(&mut tx, b"Hello").expect("on_chunk tolerates again");
        assert_eq!(filter.buffered(), 2);
        assert_eq!(filter.bytes_done(), 3);
        filter.on_chunk(&mut tx, b"World").expect("on_chunk");
        filter.on_end(&mut tx).expect("on_end");
        assert_eq!(filter.bytes_done(), 10);
    }

    #[test]
    fn downgrades_to_nobuf_when_inspection_disabled() {
        let mode = select_mode(
            Direction::Request,
            TxFlags::empty(),
            true,
            -1,
            LimitAction::FlushAll,
        );
        assert_eq!(mode, BufferingMode::NoBuf);
    }

    #[test]
    fn downgrades_to_nobuf_under_allow_all() {
        let mode = select_mode(
            Direction::Request,
            TxFlags::INSPECT_REQBODY | TxFlags::ALLOW_ALL,
            true,
            -1,
            LimitAction::FlushAll,
        );
        assert_eq!(mode, BufferingMode::NoBuf);
    }

    #[test]
    fn buffer_flushpart_keeps_limit_bytes_resident() {
        let mut filter = request_filter(4, LimitAction::FlushPart);
        let mut tx = blank_tx();
        tx.flags_mut().insert(TxFlags::INSPECT_REQBODY);
        filter.on_chunk(&mut tx, b"HelloWorld").expect("on_chunk");
        assert_eq!(filter.buffered(), 4);
        assert_eq!(filter.bytes_done(), 6);
    }
}
