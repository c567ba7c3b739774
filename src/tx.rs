//! The per-transaction data model (spec §3).
//!
//! A `Tx` is owned exclusively by the thread currently processing its
//! event (spec §5); nothing here is `Sync`, and nothing needs to be.

use std::collections::HashMap;

use tracing::debug_span;

use crate::{
    field::AttributeBag,
    filter::{Direction, edit::EditList},
    flags::TxFlags,
};

/// What the source calls the "TX arena": not a bump allocator, but a LIFO
/// stack of cleanup closures for externally owned handles (transport
/// buffers, reader handles). Registered closures run in reverse order when
/// the owning `Tx` is dropped, regardless of which path led there (spec §9,
/// "cyclic resource graphs").
#[derive(Default)]
struct CleanupStack(Vec<Box<dyn FnOnce() + Send>>);

impl CleanupStack {
    fn push(&mut self, cleanup: Box<dyn FnOnce() + Send>) { self.0.push(cleanup); }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        while let Some(cleanup) = self.0.pop() {
            cleanup();
        }
    }
}

/// The unit of processing: one HTTP transaction observed by the engine.
pub struct Tx {
    id: u64,
    flags: TxFlags,
    bag: AttributeBag,
    cleanups: CleanupStack,
    /// Per-phase, per-rule-index chain producer results for this TX, used
    /// by the scheduler to evaluate `chained_to` (spec §4.4 step 1).
    chain_results: HashMap<(crate::phase::Phase, usize), bool>,
    /// The directional pair of filter contexts' edit lists (spec §3): the
    /// channel through which a body-phase rule action reaches the active
    /// `BodyFilter` to append an edit, and through which `BodyFilter::flush`
    /// reads back the edits pending for its direction.
    request_edits: EditList,
    response_edits: EditList,
}

impl Tx {
    /// Create a new transaction with the given stable id and initial flags.
    #[must_use]
    pub fn new(id: u64, flags: TxFlags) -> Self {
        Self {
            id,
            flags,
            bag: AttributeBag::new(),
            cleanups: CleanupStack::default(),
            chain_results: HashMap::new(),
            request_edits: EditList::new(),
            response_edits: EditList::new(),
        }
    }

    /// The transaction's stable id.
    #[must_use]
    pub const fn id(&self) -> u64 { self.id }

    /// The transaction's current lifecycle flags.
    #[must_use]
    pub const fn flags(&self) -> TxFlags { self.flags }

    /// Mutable access to the lifecycle flags, for `{set, clear, or}` updates.
    pub fn flags_mut(&mut self) -> &mut TxFlags { &mut self.flags }

    /// The attribute bag operators resolve their inputs against.
    #[must_use]
    pub const fn bag(&self) -> &AttributeBag { &self.bag }

    /// Mutable access to the attribute bag, for actions and host-supplied
    /// header/body metadata.
    pub fn bag_mut(&mut self) -> &mut AttributeBag { &mut self.bag }

    /// Register a cleanup closure to run when this transaction is
    /// dropped, regardless of exit path.
    pub fn defer_cleanup(&mut self, cleanup: impl FnOnce() + Send + 'static) {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Open a tracing span scoped to this transaction's lifetime.
    #[must_use]
    pub fn span(&self) -> tracing::Span { debug_span!("tx", id = self.id) }

    /// Record whether a chained rule at `(phase, index)` produced true, so
    /// the next adjacent rule in the same phase can consult it.
    pub fn record_chain_result(&mut self, phase: crate::phase::Phase, index: usize, result: bool) {
        self.chain_results.insert((phase, index), result);
    }

    /// Look up whether the rule immediately preceding `index` in `phase`
    /// produced true.
    #[must_use]
    pub fn chain_result(&self, phase: crate::phase::Phase, index: usize) -> Option<bool> {
        self.chain_results.get(&(phase, index)).copied()
    }

    /// Mutable access to the pending edit list for one direction. A custom
    /// [`crate::action::Action`] that wants to mutate the byte stream calls
    /// this during a body-phase rule firing to append an [`crate::filter::edit::Edit`];
    /// `BodyFilter::flush` reads from the same list when it next runs.
    pub fn edits_mut(&mut self, direction: Direction) -> &mut EditList {
        match direction {
            Direction::Request => &mut self.request_edits,
            Direction::Response => &mut self.response_edits,
        }
    }
}
