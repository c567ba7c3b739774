//! Action registry and instances (spec §3, §4.1).
//!
//! An action is a named side-effecting procedure `(tx) -> status`, created
//! with an optional parameter string and invoked once per rule firing on
//! either the on-true or on-false branch.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use crate::{error::EngineError, tx::Tx};

/// Per-instance state produced by [`Action::create`].
pub type ActionState = Box<dyn Any + Send + Sync>;

/// Which action list a given action instance belongs to on its owning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Runs when the rule's operator produced `true`.
    OnTrue,
    /// Runs when the rule's operator produced `false`.
    OnFalse,
}

/// A named side-effecting procedure.
pub trait Action: Send + Sync {
    /// Build the per-instance state from the action's argument string.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if `params` is malformed for this
    /// action.
    fn create(&self, params: &str) -> Result<ActionState, EngineError>;

    /// Run the action's side effect for one transaction.
    ///
    /// A hard error here aborts the owning rule's remaining actions but not
    /// the phase (spec §4.4 step 4).
    ///
    /// # Errors
    /// Implementations return any [`EngineError`] variant appropriate to the
    /// failure they encountered.
    fn execute(&self, tx: &mut Tx, state: &(dyn Any + Send + Sync)) -> Result<(), EngineError>;
}

impl fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("<action>") }
}

/// A compiled action bound to its instance state.
pub struct ActionInstance {
    descriptor: Arc<dyn Action>,
    state: ActionState,
}

impl ActionInstance {
    /// Run this action instance against one transaction.
    ///
    /// # Errors
    /// Propagates whatever the underlying action's `execute` returns.
    pub fn run(&self, tx: &mut Tx) -> Result<(), EngineError> {
        self.descriptor.execute(tx, self.state.as_ref())
    }
}

impl fmt::Debug for ActionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInstance").finish_non_exhaustive()
    }
}

/// Name-keyed catalogue of action descriptors (C2).
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register an action under `name`, idempotent on identical descriptors
    /// and erroring on conflicting re-registration (same contract as
    /// [`crate::operator::OperatorRegistry::register`]).
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] on a conflicting re-registration.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action>) -> Result<(), EngineError> {
        let name = name.into();
        if let Some(existing) = self.actions.get(&name) {
            if Arc::ptr_eq(existing, &action) {
                return Ok(());
            }
            return Err(EngineError::invalid(format!(
                "action '{name}' already registered with a different descriptor"
            )));
        }
        self.actions.insert(name, action);
        Ok(())
    }

    /// Instantiate a named action with the given parameter string.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `name` is not registered, or
    /// whatever [`Action::create`] returns for malformed `params`.
    pub fn instantiate(&self, name: &str, params: &str) -> Result<ActionInstance, EngineError> {
        let descriptor = self
            .actions
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("action '{name}'")))?
            .clone();
        let state = descriptor.create(params)?;
        Ok(ActionInstance { descriptor, state })
    }

    /// Whether an action is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.actions.contains_key(name) }
}
