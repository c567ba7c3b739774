//! The engine: owns the operator/action registries, the per-phase rule
//! lists, the script host gate, and the configuration for one embedded
//! instance (SPEC_FULL §10.5). Registries are read-mostly once traffic
//! processing starts (spec §5): everything here is built during
//! configuration, then only read from while transactions are in flight.

use std::sync::Arc;

use crate::{
    action::ActionRegistry,
    builtins,
    config::EngineConfig,
    error::EngineError,
    operator::OperatorRegistry,
    phase::Phase,
    rule::Rule,
    scheduler::PhaseScheduler,
    script::{ScriptGate, ScriptHost},
    tx::Tx,
};

/// Builds an [`Engine`]: registries and rules are only mutable up to this
/// point, mirroring the teacher's connection-pool builder
/// (`db::connection`'s pool construction) generalised from a single
/// resource to a registry bundle.
pub struct EngineBuilder {
    operators: OperatorRegistry,
    actions: ActionRegistry,
    scheduler: PhaseScheduler,
    config: EngineConfig,
    script_host: Option<Arc<dyn ScriptHost>>,
    script_gate: Arc<ScriptGate>,
}

impl EngineBuilder {
    /// Start with empty registries and the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            operators: OperatorRegistry::new(),
            actions: ActionRegistry::new(),
            scheduler: PhaseScheduler::new(),
            config,
            script_host: None,
            script_gate: Arc::new(ScriptGate::new()),
        }
    }

    /// Register the default operator and action catalogue
    /// (SPEC_FULL §10.5): `@rx`, `@streq`, `@contains`, `@eq`, `@ge`, `@le`,
    /// `@true`, `@false`, `block`, `allow`, `pass`, `deny`, `log`,
    /// `setflag`. Opt-in: a host that only drives script rules need not
    /// pay for the regex engine.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if a builtin name conflicts with an
    /// already-registered descriptor (should not happen on a fresh builder).
    pub fn with_builtins(mut self) -> Result<Self, EngineError> {
        builtins::register_operators(&mut self.operators)?;
        builtins::register_actions(&mut self.actions)?;
        Ok(self)
    }

    /// Attach the script host this engine's `RuleExt` directives will load
    /// functions into and invoke (spec §4.5).
    #[must_use]
    pub fn with_script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    /// Register a custom operator under `name`.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] on a conflicting re-registration.
    pub fn register_operator(&mut self, name: impl Into<String>, op: Arc<dyn crate::operator::Operator>) -> Result<(), EngineError> {
        self.operators.register(name, op)
    }

    /// Register a custom action under `name`.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] on a conflicting re-registration.
    pub fn register_action(&mut self, name: impl Into<String>, action: Arc<dyn crate::action::Action>) -> Result<(), EngineError> {
        self.actions.register(name, action)
    }

    /// Parse and register a `Rule` directive (spec §4.3).
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`]/[`EngineError::NotFound`] from
    /// parsing or rule registration (spec §3's chain-DAG invariant, among
    /// others).
    pub fn add_rule(&mut self, inputs: &str, operator: &str, modifiers: &[&str]) -> Result<(), EngineError> {
        let rule = crate::parser::parse_rule(inputs, operator, modifiers, &self.operators, &self.actions)?;
        self.scheduler.register(rule)
    }

    /// Parse and register a `RuleExt` directive (spec §4.3, §4.5).
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if no script host is attached or the
    /// uri's scheme is unrecognised, or whatever rule registration returns.
    pub fn add_rule_ext(&mut self, uri: &str, modifiers: &[&str]) -> Result<(), EngineError> {
        let host = self
            .script_host
            .clone()
            .ok_or_else(|| EngineError::invalid("RuleExt directive with no script host attached"))?;
        let rule = crate::parser::parse_rule_ext(uri, modifiers, host, self.script_gate.clone(), &mut self.operators, &self.actions)?;
        self.scheduler.register(rule)
    }

    /// Register an already-compiled [`Rule`] directly, bypassing the text
    /// parser (for hosts or tests that build rules programmatically).
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if the rule's chain flags are not a
    /// valid DAG segment within its phase (spec §3).
    pub fn register_rule(&mut self, rule: Rule) -> Result<(), EngineError> { self.scheduler.register(rule) }

    /// Seal the builder into an immutable, traffic-ready [`Engine`].
    #[must_use]
    pub fn build(self) -> Engine {
        Engine {
            scheduler: self.scheduler,
            config: self.config,
        }
    }
}

/// An immutable, traffic-ready rule engine instance. Registries and rule
/// lists are read-only from here on (spec §5); `fire_phase` takes `&self`.
pub struct Engine {
    scheduler: PhaseScheduler,
    config: EngineConfig,
}

impl Engine {
    /// This engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig { &self.config }

    /// Create a new transaction with this engine's default inspection flags
    /// (spec §6).
    #[must_use]
    pub fn new_tx(&self, id: u64) -> Tx { Tx::new(id, self.config.default_tx_flags()) }

    /// Fire every rule registered for `phase` against `tx`, in registration
    /// order (spec §4.4). The host calls this once per phase boundary it
    /// signals for the transaction.
    pub fn fire_phase(&self, phase: Phase, tx: &mut Tx) { self.scheduler.fire_phase(phase, tx); }

    /// Rules registered for `phase`, in registration order (introspection,
    /// e.g. for admin/debug tooling).
    #[must_use]
    pub fn rules_for(&self, phase: Phase) -> &[Rule] { self.scheduler.rules_for(phase) }
}

#[cfg(test)]
mod tests {
    use crate::{field::FieldValue, phase::Phase};

    use super::*;

    #[test]
    fn builtins_fire_end_to_end() {
        let mut builder = EngineBuilder::new(EngineConfig::default()).with_builtins().expect("builtins");
        builder
            .add_rule("ARGS", "@rx ^foo", &["phase:REQUEST_HEADER", "id:1", "block"])
            .expect("add_rule");
        let engine = builder.build();

        let mut tx = engine.new_tx(1);
        tx.bag_mut().set("ARGS", "foobar");
        engine.fire_phase(Phase::RequestHeader, &mut tx);
        assert_eq!(tx.bag().get("BLOCK"), Some(&FieldValue::from("1")));
    }

    #[test]
    fn non_matching_rule_does_not_fire_on_true_actions() {
        let mut builder = EngineBuilder::new(EngineConfig::default()).with_builtins().expect("builtins");
        builder
            .add_rule("ARGS", "@rx ^foo", &["phase:REQUEST_HEADER", "id:1", "block"])
            .expect("add_rule");
        let engine = builder.build();

        let mut tx = engine.new_tx(1);
        tx.bag_mut().set("ARGS", "barbaz");
        engine.fire_phase(Phase::RequestHeader, &mut tx);
        assert_eq!(tx.bag().get("BLOCK"), None);
    }

    #[test]
    fn rule_ext_without_script_host_is_invalid() {
        let mut builder = EngineBuilder::new(EngineConfig::default());
        let err = builder.add_rule_ext("lua:/tmp/x.lua", &["id:1"]).expect_err("should fail");
        assert!(matches!(err, EngineError::Invalid(_)));
    }
}
