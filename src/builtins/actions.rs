//! Built-in actions: `block`, `allow`, `pass`, `deny`, `log`, `setflag`.
//!
//! None of these mutate the byte stream directly. A custom action that wants
//! to edit the body calls [`crate::tx::Tx::edits_mut`] during a body-phase
//! firing, appending to the direction's pending edit list; the active
//! [`crate::filter::BodyFilter`] applies it at its next flush. These
//! built-ins instead mutate the attribute bag and lifecycle flags, the
//! channel spec §3 gives actions to communicate a verdict back to the host.

use std::any::Any;

use tracing::info;

use crate::{
    action::{Action, ActionState},
    error::EngineError,
    flags::TxFlags,
    tx::Tx,
};

/// `block`: records a block verdict in the attribute bag under `BLOCK`. The
/// host inspects this field after the phase fires and decides how to
/// terminate the transaction; the core does not know how to send an error
/// document (spec §1 excludes the host's native transform API).
pub struct BlockAction;

impl Action for BlockAction {
    fn create(&self, _params: &str) -> Result<ActionState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, tx: &mut Tx, _state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> {
        tx.bag_mut().set("BLOCK", "1");
        Ok(())
    }
}

/// `allow`: sets the TX's `ALLOW_ALL` flag, bypassing further inspection.
pub struct AllowAction;

impl Action for AllowAction {
    fn create(&self, _params: &str) -> Result<ActionState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, tx: &mut Tx, _state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> {
        tx.flags_mut().insert(TxFlags::ALLOW_ALL);
        Ok(())
    }
}

/// `pass`: an explicit no-op, used to document "evaluate but take no
/// action" in a rule's action list.
pub struct PassAction;

impl Action for PassAction {
    fn create(&self, _params: &str) -> Result<ActionState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, _tx: &mut Tx, _state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> { Ok(()) }
}

/// `deny`: records a deny verdict in the attribute bag under `DENY`,
/// distinct from `block` in that the host is expected to reject the
/// transaction outright rather than substitute an error document.
pub struct DenyAction;

impl Action for DenyAction {
    fn create(&self, _params: &str) -> Result<ActionState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, tx: &mut Tx, _state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> {
        tx.bag_mut().set("DENY", "1");
        Ok(())
    }
}

/// `log <message>`: emits a `tracing::info!` event scoped to the firing TX.
pub struct LogAction;

impl Action for LogAction {
    fn create(&self, params: &str) -> Result<ActionState, EngineError> { Ok(Box::new(params.to_owned())) }

    fn execute(&self, tx: &mut Tx, state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> {
        let message = state
            .downcast_ref::<String>()
            .ok_or_else(|| EngineError::fatal("log action instance state corrupt"))?;
        info!(tx = tx.id(), %message, "rule log action");
        Ok(())
    }
}

/// `setflag <name>`: sets an attribute-bag field `FLAG:<name>` to `1`,
/// readable by later rules' input selectors as `FLAG:<name>`.
pub struct SetFlagAction;

impl Action for SetFlagAction {
    fn create(&self, params: &str) -> Result<ActionState, EngineError> {
        if params.trim().is_empty() {
            return Err(EngineError::invalid("setflag requires a flag name"));
        }
        Ok(Box::new(params.trim().to_owned()))
    }

    fn execute(&self, tx: &mut Tx, state: &(dyn Any + Send + Sync)) -> Result<(), EngineError> {
        let name = state
            .downcast_ref::<String>()
            .ok_or_else(|| EngineError::fatal("setflag action instance state corrupt"))?;
        tx.bag_mut().set(format!("FLAG:{name}"), "1");
        Ok(())
    }
}
