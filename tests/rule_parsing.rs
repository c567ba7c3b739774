//! S5: a `Rule` directive parses into a compiled rule with the expected
//! shape, and re-parsing the same directive text is structurally
//! idempotent (property 5).

#![cfg(feature = "test-support")]

use interlock::action::ActionRegistry;
use interlock::builtins;
use interlock::operator::OperatorRegistry;
use interlock::parser::parse_rule;
use interlock::phase::Phase;

fn registries() -> (OperatorRegistry, ActionRegistry) {
    let mut operators = OperatorRegistry::new();
    builtins::register_operators(&mut operators).expect("register operators");
    let mut actions = ActionRegistry::new();
    builtins::register_actions(&mut actions).expect("register actions");
    (operators, actions)
}

#[test]
fn s5_directive_parses_to_expected_shape() {
    let (operators, actions) = registries();

    let rule = parse_rule(
        "ARGS",
        "@rx ^foo",
        &["phase:REQUEST_HEADER", "id:1", "block"],
        &operators,
        &actions,
    )
    .expect("parse");

    assert_eq!(rule.id(), "1");
    assert_eq!(rule.phase(), Phase::RequestHeader);
    assert_eq!(rule.inputs().len(), 1);
    assert_eq!(rule.inputs()[0].names(), ["ARGS"]);
    assert_eq!(rule.on_true().len(), 1);
    assert!(rule.on_false().is_empty());
}

#[test]
fn property5_reparsing_same_directive_is_structurally_idempotent() {
    let (operators, actions) = registries();
    let directive_modifiers = ["phase:REQUEST_HEADER", "id:1", "block"];

    let first = parse_rule("ARGS", "@rx ^foo", &directive_modifiers, &operators, &actions).expect("parse");
    let second = parse_rule("ARGS", "@rx ^foo", &directive_modifiers, &operators, &actions).expect("reparse");

    assert_eq!(first.id(), second.id());
    assert_eq!(first.phase(), second.phase());
    assert_eq!(first.inputs()[0].names(), second.inputs()[0].names());
    assert_eq!(first.on_true().len(), second.on_true().len());
    assert_eq!(first.on_false().len(), second.on_false().len());
}

#[test]
fn multiple_selectors_and_chain_modifiers_round_trip() {
    let (operators, actions) = registries();

    let rule = parse_rule(
        "ARGS|REQUEST_HEADERS",
        "!@contains admin",
        &["phase:RESPONSE", "id:block-admin", "chain"],
        &operators,
        &actions,
    )
    .expect("parse");

    assert_eq!(rule.phase(), Phase::ResponseBody);
    assert_eq!(rule.inputs()[0].names(), ["ARGS", "REQUEST_HEADERS"]);
    assert!(rule.flags().contains(interlock::flags::RuleFlags::CHAIN));
}
