//! The rule object (C3): a builder-style API producing an immutable,
//! sealed rule once registered (spec §4.2).

use crate::{
    action::{ActionInstance, ActionKind},
    error::EngineError,
    field::InputSelectors,
    flags::RuleFlags,
    operator::OperatorInstance,
    phase::Phase,
};

/// The three flag-update operations, reused at the rule-builder level
/// (spec §9, "Flag updates").
#[derive(Debug, Clone, Copy)]
pub enum FlagOp {
    /// Replace the flag set entirely.
    Set,
    /// Clear the given bits.
    Clear,
    /// Set the given bits in addition to whatever is already set.
    Or,
}

/// A rule under construction. Mutable until [`RuleBuilder::register`]
/// seals it into a [`Rule`].
pub struct RuleBuilder {
    id: Option<String>,
    phase: Phase,
    flags: RuleFlags,
    inputs: Vec<InputSelectors>,
    operator: Option<OperatorInstance>,
    on_true: Vec<ActionInstance>,
    on_false: Vec<ActionInstance>,
}

impl RuleBuilder {
    /// Start building a new rule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            phase: Phase::None,
            flags: RuleFlags::empty(),
            inputs: Vec::new(),
            operator: None,
            on_true: Vec::new(),
            on_false: Vec::new(),
        }
    }

    /// Set the rule's id.
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = Some(id.into());
        self
    }

    /// Set the rule's scheduling phase.
    pub fn set_phase(&mut self, phase: Phase) -> &mut Self {
        self.phase = phase;
        self
    }

    /// Append an input selector group parsed from an inputs string.
    pub fn add_input(&mut self, selectors: InputSelectors) -> &mut Self {
        self.inputs.push(selectors);
        self
    }

    /// Set the rule's operator instance.
    pub fn set_operator(&mut self, operator: OperatorInstance) -> &mut Self {
        self.operator = Some(operator);
        self
    }

    /// Append an action instance to the on-true or on-false list, in the
    /// order given.
    pub fn add_action(&mut self, action: ActionInstance, kind: ActionKind) -> &mut Self {
        match kind {
            ActionKind::OnTrue => self.on_true.push(action),
            ActionKind::OnFalse => self.on_false.push(action),
        }
        self
    }

    /// Apply a `{set, clear, or}` update to the rule's flags.
    pub fn update_flags(&mut self, op: FlagOp, mask: RuleFlags) -> &mut Self {
        match op {
            FlagOp::Set => self.flags = mask,
            FlagOp::Clear => self.flags.remove(mask),
            FlagOp::Or => self.flags.insert(mask),
        }
        self
    }

    /// Seal the rule, validating the invariants from spec §3: an
    /// `external`-less rule needs at least one input and a non-null
    /// operator; an id is required.
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if a required invariant is not met.
    pub fn register(self) -> Result<Rule, EngineError> {
        let id = self.id.ok_or_else(|| EngineError::invalid("rule id is required"))?;

        if !self.flags.contains(RuleFlags::EXTERNAL) {
            if self.inputs.is_empty() {
                return Err(EngineError::invalid(format!(
                    "rule '{id}' is not external but has no input selectors"
                )));
            }
            if self.operator.is_none() {
                return Err(EngineError::invalid(format!(
                    "rule '{id}' is not external but has no operator instance"
                )));
            }
        }

        // A `chained_to` rule's adjacency to a `chain` predecessor is a
        // property of the phase list, not of this rule alone; the
        // scheduler checks it when the rule is appended to its phase.

        Ok(Rule {
            id,
            phase: self.phase,
            flags: self.flags,
            inputs: self.inputs,
            operator: self.operator,
            on_true: self.on_true,
            on_false: self.on_false,
        })
    }
}

impl Default for RuleBuilder {
    fn default() -> Self { Self::new() }
}

/// A compiled, immutable rule (spec §3).
pub struct Rule {
    id: String,
    phase: Phase,
    flags: RuleFlags,
    inputs: Vec<InputSelectors>,
    operator: Option<OperatorInstance>,
    on_true: Vec<ActionInstance>,
    on_false: Vec<ActionInstance>,
}

impl Rule {
    /// The rule's id.
    #[must_use]
    pub fn id(&self) -> &str { &self.id }

    /// The phase this rule is scheduled against.
    #[must_use]
    pub const fn phase(&self) -> Phase { self.phase }

    /// The rule's flags.
    #[must_use]
    pub const fn flags(&self) -> RuleFlags { self.flags }

    /// The rule's input selector groups, in registration order.
    #[must_use]
    pub fn inputs(&self) -> &[InputSelectors] { &self.inputs }

    /// The rule's operator instance, if any (external rules may have
    /// none).
    #[must_use]
    pub const fn operator(&self) -> Option<&OperatorInstance> { self.operator.as_ref() }

    /// The on-true action list, in registration order.
    #[must_use]
    pub fn on_true(&self) -> &[ActionInstance] { &self.on_true }

    /// The on-false action list, in registration order.
    #[must_use]
    pub fn on_false(&self) -> &[ActionInstance] { &self.on_false }
}
