//! Operator registry and instances (spec §3, §4.1).
//!
//! An operator is a named predicate `(tx, field) -> bool` with optional
//! per-instance state created once at registration time. The `create` /
//! `execute` / `destroy` triple from the source design is kept as two trait
//! methods plus `Drop`: `destroy` has no explicit method because dropping
//! the boxed state runs it.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::{error::EngineError, field::FieldValue, tx::Tx};

/// Per-instance state produced by [`Operator::create`]. Operators that need
/// no state return `Box::new(())`.
pub type OperatorState = Box<dyn Any + Send + Sync>;

/// A named predicate that can be instantiated against a parameter string.
pub trait Operator: Send + Sync {
    /// Build the per-instance state from the operator's argument string.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if `params` is malformed for this
    /// operator.
    fn create(&self, params: &str) -> Result<OperatorState, EngineError>;

    /// Evaluate the predicate for one transaction against one resolved
    /// field value (`None` when the owning rule is `external`).
    ///
    /// # Errors
    /// Implementations may return any [`EngineError`] variant appropriate to
    /// a runtime failure; parse-time problems belong in `create` instead.
    fn execute(
        &self,
        tx: &Tx,
        state: &(dyn Any + Send + Sync),
        field: Option<&FieldValue>,
    ) -> Result<bool, EngineError>;

    /// Whether this operator accepts being invoked with a null field
    /// (capability bit; most external-only operators need this).
    fn accepts_null_field(&self) -> bool { false }
}

impl fmt::Debug for dyn Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("<operator>") }
}

/// A compiled, ready-to-evaluate operator: the descriptor, its instance
/// state, and the `invert` flag (spec §3).
pub struct OperatorInstance {
    descriptor: Arc<dyn Operator>,
    state: OperatorState,
    invert: bool,
}

impl OperatorInstance {
    /// Evaluate this instance for one transaction, applying `invert`.
    ///
    /// # Errors
    /// Propagates whatever the underlying operator's `execute` returns.
    pub fn evaluate(&self, tx: &Tx, field: Option<&FieldValue>) -> Result<bool, EngineError> {
        let result = self.descriptor.execute(tx, self.state.as_ref(), field)?;
        Ok(result ^ self.invert)
    }

    /// Whether the underlying operator accepts a null field.
    #[must_use]
    pub fn accepts_null_field(&self) -> bool { self.descriptor.accepts_null_field() }
}

impl fmt::Debug for OperatorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorInstance")
            .field("invert", &self.invert)
            .finish_non_exhaustive()
    }
}

/// Name-keyed catalogue of operator descriptors (C1).
#[derive(Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register an operator under `name`.
    ///
    /// Re-registering the exact same descriptor under the same name is a
    /// no-op (idempotent); registering a different descriptor under a name
    /// already bound is an error.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] on a conflicting re-registration.
    pub fn register(&mut self, name: impl Into<String>, op: Arc<dyn Operator>) -> Result<(), EngineError> {
        let name = name.into();
        if let Some(existing) = self.operators.get(&name) {
            if Arc::ptr_eq(existing, &op) {
                return Ok(());
            }
            return Err(EngineError::invalid(format!(
                "operator '{name}' already registered with a different descriptor"
            )));
        }
        self.operators.insert(name, op);
        Ok(())
    }

    /// Instantiate a named operator with the given parameters and invert
    /// flag.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `name` is not registered, or
    /// whatever [`Operator::create`] returns for malformed `params`.
    pub fn instantiate(
        &self,
        name: &str,
        params: &str,
        invert: bool,
    ) -> Result<OperatorInstance, EngineError> {
        let descriptor = self
            .operators
            .get(name)
            .ok_or_else(|| EngineError::not_found(format!("operator '{name}'")))?
            .clone();
        let state = descriptor.create(params)?;
        Ok(OperatorInstance {
            descriptor,
            state,
            invert,
        })
    }

    /// Whether an operator is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.operators.contains_key(name) }
}
