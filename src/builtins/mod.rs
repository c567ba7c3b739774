//! The default operator and action catalogue (spec §4.1's "the catalogue",
//! left unspecified by shape in spec.md; shipped here per SPEC_FULL §10.5,
//! grounded on `modules/rules.c`'s rule-infrastructure registration pattern).
//!
//! Registration is opt-in via [`crate::engine::EngineBuilder::with_builtins`]
//! so a host embedding only script rules pays nothing for the regex engine
//! or the rest of this catalogue.

pub mod actions;
pub mod operators;

use crate::{action::ActionRegistry, error::EngineError, operator::OperatorRegistry};

/// Register every built-in operator under its catalogue name (`@rx`,
/// `@streq`, `@contains`, `@eq`, `@ge`, `@le`, `@true`, `@false`).
///
/// # Errors
/// Returns [`EngineError::Invalid`] if a name is already bound to a
/// different descriptor (should not happen on a freshly built registry).
pub fn register_operators(registry: &mut OperatorRegistry) -> Result<(), EngineError> {
    use std::sync::Arc;

    use operators::{ContainsOperator, EqOperator, GeOperator, LeOperator, RxOperator, StrEqOperator, TrueFalseOperator};

    registry.register("rx", Arc::new(RxOperator))?;
    registry.register("streq", Arc::new(StrEqOperator))?;
    registry.register("contains", Arc::new(ContainsOperator))?;
    registry.register("eq", Arc::new(EqOperator))?;
    registry.register("ge", Arc::new(GeOperator))?;
    registry.register("le", Arc::new(LeOperator))?;
    registry.register("true", Arc::new(TrueFalseOperator(true)))?;
    registry.register("false", Arc::new(TrueFalseOperator(false)))?;
    Ok(())
}

/// Register every built-in action under its catalogue name (`block`,
/// `allow`, `pass`, `deny`, `log`, `setflag`).
///
/// # Errors
/// Returns [`EngineError::Invalid`] if a name is already bound to a
/// different descriptor.
pub fn register_actions(registry: &mut ActionRegistry) -> Result<(), EngineError> {
    use std::sync::Arc;

    use actions::{AllowAction, BlockAction, DenyAction, LogAction, PassAction, SetFlagAction};

    registry.register("block", Arc::new(BlockAction))?;
    registry.register("allow", Arc::new(AllowAction))?;
    registry.register("pass", Arc::new(PassAction))?;
    registry.register("deny", Arc::new(DenyAction))?;
    registry.register("log", Arc::new(LogAction))?;
    registry.register("setflag", Arc::new(SetFlagAction))?;
    Ok(())
}
