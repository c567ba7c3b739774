//! The phase scheduler (C5): per-phase ordered rule lists, fired when the
//! host signals a phase transition (spec §4.4).

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{error::EngineError, flags::RuleFlags, phase::Phase, rule::Rule, tx::Tx};

/// Per-phase ordered lists of registered rules.
#[derive(Default)]
pub struct PhaseScheduler {
    phases: HashMap<Phase, Vec<Rule>>,
}

impl PhaseScheduler {
    /// Build an empty scheduler.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register a rule into its phase's list. If the rule carries
    /// `chained_to`, the immediately preceding rule in the same phase must
    /// carry `chain` (spec §3's chain-DAG invariant, checked here because
    /// it is a property of adjacency within the list).
    ///
    /// # Errors
    /// Returns [`EngineError::Invalid`] if a `chained_to` rule has no
    /// `chain` predecessor immediately before it in the same phase.
    pub fn register(&mut self, rule: Rule) -> Result<(), EngineError> {
        let list = self.phases.entry(rule.phase()).or_default();
        if rule.flags().contains(RuleFlags::CHAINED_TO) {
            let predecessor_chains = list.last().is_some_and(|r| r.flags().contains(RuleFlags::CHAIN));
            if !predecessor_chains {
                return Err(EngineError::invalid(format!(
                    "rule '{}' has chained_to but no immediately preceding chain rule in phase {}",
                    rule.id(),
                    rule.phase()
                )));
            }
        }
        list.push(rule);
        Ok(())
    }

    /// Rules registered for `phase`, in registration order.
    #[must_use]
    pub fn rules_for(&self, phase: Phase) -> &[Rule] {
        self.phases.get(&phase).map_or(&[], Vec::as_slice)
    }

    /// Fire every rule registered for `phase` against `tx`, in registration
    /// order, honouring chain semantics (spec §4.4).
    ///
    /// A hard error from one rule's operator or actions aborts that rule
    /// only; the phase continues (spec §7 propagation policy).
    pub fn fire_phase(&self, phase: Phase, tx: &mut Tx) {
        let Some(rules) = self.phases.get(&phase) else {
            return;
        };
        for (index, rule) in rules.iter().enumerate() {
            if rule.flags().contains(RuleFlags::CHAINED_TO) {
                let predecessor_true = tx.chain_result(phase, index.saturating_sub(1)).unwrap_or(false);
                if !predecessor_true {
                    debug!(rule = rule.id(), "skipped: chain predecessor produced false");
                    continue;
                }
            }

            let field = if rule.flags().contains(RuleFlags::EXTERNAL) {
                None
            } else {
                rule.inputs().first().and_then(|selectors| {
                    selectors.resolve(tx.bag()).into_iter().find_map(|v| v)
                })
            };

            let Some(operator) = rule.operator() else {
                continue;
            };

            let outcome = operator.evaluate(tx, field);
            let matched = match outcome {
                Ok(matched) => matched,
                Err(err) => {
                    warn!(rule = rule.id(), %err, "rule operator failed; skipping actions");
                    continue;
                }
            };

            if rule.flags().contains(RuleFlags::CHAIN) {
                tx.record_chain_result(phase, index, matched);
            }

            let actions = if matched { rule.on_true() } else { rule.on_false() };
            for action in actions {
                if let Err(err) = action.run(tx) {
                    warn!(rule = rule.id(), %err, "action failed; aborting remaining actions for this rule");
                    break;
                }
            }
        }
    }
}
