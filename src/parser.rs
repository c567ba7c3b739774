//! The rule parser (C4): turns directive arguments into a compiled [`Rule`]
//! plus its registrations (spec §4.3).
//!
//! This module is the normalised tail end of the directive front-end (spec
//! §1 excludes the C-style directive dispatch table itself): callers already
//! have the inputs string, operator string, and modifier list split out of
//! whatever configuration syntax the host uses, the same way
//! `header_util`/`login`'s small hand-rolled grammars work over an
//! already-tokenised frame rather than raw wire bytes.

use std::sync::Arc;

use crate::{
    action::{ActionKind, ActionRegistry},
    error::EngineError,
    field::InputSelectors,
    flags::RuleFlags,
    operator::OperatorRegistry,
    phase::Phase,
    rule::{FlagOp, Rule, RuleBuilder},
    script::{ScriptGate, ScriptHost, ScriptRuleAdapter},
};

/// A parsed operator string: `!@name args` (spec §4.3).
struct ParsedOperator {
    invert: bool,
    name: String,
    args: String,
}

/// Parse an operator string: optional leading `!`, then `@name`, optional
/// whitespace, optional argument tail. Any non-whitespace character before
/// `@` that isn't `!` is invalid.
///
/// # Errors
/// Returns [`EngineError::Invalid`] if there is no `@`, the name is empty,
/// or the prefix before `@` contains anything other than whitespace or `!`.
fn parse_operator_string(raw: &str) -> Result<ParsedOperator, EngineError> {
    let at_pos = raw
        .find('@')
        .ok_or_else(|| EngineError::invalid(format!("operator string '{raw}' has no '@name'")))?;

    let mut invert = false;
    for ch in raw[..at_pos].chars() {
        if ch == '!' {
            invert = true;
        } else if !ch.is_whitespace() {
            return Err(EngineError::invalid(format!(
                "operator string '{raw}' has unexpected character '{ch}' before '@'"
            )));
        }
    }

    let rest = &raw[at_pos + 1..];
    let (name, args) = rest.find(char::is_whitespace).map_or((rest, ""), |idx| {
        let (name, tail) = rest.split_at(idx);
        (name, tail.trim())
    });

    if name.is_empty() {
        return Err(EngineError::invalid(format!("operator string '{raw}' has an empty name")));
    }

    Ok(ParsedOperator {
        invert,
        name: name.to_owned(),
        args: args.to_owned(),
    })
}

/// A parsed `name[:value]` modifier, resolved against the phase tag grammar
/// and the recognised modifier names (spec §4.3).
enum ParsedModifier {
    Id(String),
    Phase(Phase),
    Chain,
    Action { name: String, invert: bool, args: String },
}

/// Parse one modifier token.
///
/// # Errors
/// Returns [`EngineError::Invalid`] if `id:`/`phase:` is missing its
/// required value, or `phase:` carries an unrecognised tag.
fn parse_modifier(raw: &str) -> Result<ParsedModifier, EngineError> {
    let (name_part, value) = raw.split_once(':').map_or((raw, None), |(n, v)| (n, Some(v)));

    match name_part.to_ascii_lowercase().as_str() {
        "id" => {
            let value = value.ok_or_else(|| EngineError::invalid("modifier 'id' requires a value"))?;
            Ok(ParsedModifier::Id(value.to_owned()))
        }
        "phase" => {
            let value = value.ok_or_else(|| EngineError::invalid("modifier 'phase' requires a value"))?;
            let phase = value
                .parse::<Phase>()
                .map_err(|err| EngineError::invalid(err.to_string()))?;
            Ok(ParsedModifier::Phase(phase))
        }
        "chain" => Ok(ParsedModifier::Chain),
        _ => {
            let (invert, action_name) = name_part.strip_prefix('!').map_or((false, name_part), |rest| (true, rest));
            Ok(ParsedModifier::Action {
                name: action_name.to_owned(),
                invert,
                args: value.unwrap_or("").trim().to_owned(),
            })
        }
    }
}

/// Apply a parsed modifier to a rule under construction.
///
/// # Errors
/// Returns [`EngineError::NotFound`] if an action-name modifier does not
/// resolve in `actions`, or whatever [`crate::action::Action::create`]
/// returns for a malformed argument string.
fn apply_modifier(builder: &mut RuleBuilder, modifier: ParsedModifier, actions: &ActionRegistry) -> Result<(), EngineError> {
    match modifier {
        ParsedModifier::Id(id) => {
            builder.set_id(id);
        }
        ParsedModifier::Phase(phase) => {
            builder.set_phase(phase);
        }
        ParsedModifier::Chain => {
            builder.update_flags(FlagOp::Or, RuleFlags::CHAIN);
        }
        ParsedModifier::Action { name, invert, args } => {
            let instance = actions.instantiate(&name, &args)?;
            let kind = if invert { ActionKind::OnFalse } else { ActionKind::OnTrue };
            builder.add_action(instance, kind);
        }
    }
    Ok(())
}

/// Compile a `Rule <inputs> <operator> <modifier>*` directive (spec §4.3).
///
/// # Errors
/// Returns [`EngineError::Invalid`] for a malformed inputs/operator string
/// or an unmet rule invariant (spec §3), or [`EngineError::NotFound`] if the
/// operator or an action-name modifier does not resolve in its registry.
pub fn parse_rule(
    inputs: &str,
    operator: &str,
    modifiers: &[&str],
    operators: &OperatorRegistry,
    actions: &ActionRegistry,
) -> Result<Rule, EngineError> {
    let selectors = InputSelectors::parse(inputs)?;
    let parsed_op = parse_operator_string(operator)?;
    let operator_instance = operators.instantiate(&parsed_op.name, &parsed_op.args, parsed_op.invert)?;

    let mut builder = RuleBuilder::new();
    builder.add_input(selectors).set_operator(operator_instance);

    for raw_modifier in modifiers {
        let modifier = parse_modifier(raw_modifier)?;
        apply_modifier(&mut builder, modifier, actions)?;
    }

    builder.register()
}

/// Derive a rule id from a `RuleExt` uri when no `id` modifier is given:
/// the last path segment, with its extension stripped.
fn derive_id_from_uri(path: &str) -> String {
    let basename = path.rsplit('/').next().unwrap_or(path);
    basename.rsplit_once('.').map_or(basename, |(stem, _ext)| stem).to_owned()
}

/// Compile a `RuleExt <scheme:uri> <modifier>*` directive (spec §4.3, §4.5).
///
/// `uri`'s scheme must match `host.scheme()`; the remainder is loaded as a
/// function under the rule's id (supplied via the `id` modifier, or derived
/// from the uri's last path segment), then a synthetic operator bound to
/// that function is registered under the same id and set on the rule. The
/// `external` flag is always set.
///
/// # Errors
/// Returns [`EngineError::Invalid`] if `uri` has no recognised scheme or the
/// script fails to load, or whatever an action-name modifier's resolution
/// returns.
pub fn parse_rule_ext(
    uri: &str,
    modifiers: &[&str],
    host: Arc<dyn ScriptHost>,
    gate: Arc<ScriptGate>,
    operators: &mut OperatorRegistry,
    actions: &ActionRegistry,
) -> Result<Rule, EngineError> {
    let scheme = host.scheme();
    let path = uri
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| EngineError::invalid(format!("RuleExt uri '{uri}' has an unrecognised scheme")))?;

    let mut builder = RuleBuilder::new();
    builder.update_flags(FlagOp::Or, RuleFlags::EXTERNAL);

    let mut id_override = None;
    let mut pending_modifiers = Vec::new();
    for raw_modifier in modifiers {
        match parse_modifier(raw_modifier)? {
            ParsedModifier::Id(id) => id_override = Some(id),
            other => pending_modifiers.push(other),
        }
    }

    let id = id_override.unwrap_or_else(|| derive_id_from_uri(path));
    host.load_function(path, &id)?;

    let adapter = ScriptRuleAdapter::new(host, gate, id.clone());
    operators.register(id.clone(), Arc::new(adapter))?;
    let operator_instance = operators.instantiate(&id, "", false)?;

    builder.set_id(id).set_operator(operator_instance);
    for modifier in pending_modifiers {
        apply_modifier(&mut builder, modifier, actions)?;
    }

    builder.register()
}
