//! S6: a `RuleExt` directive loads a script function and wires it into a
//! synthetic operator whose integer result coerces to the rule's boolean
//! match.

#![cfg(feature = "test-support")]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use interlock::action::ActionRegistry;
use interlock::error::EngineError;
use interlock::flags::RuleFlags;
use interlock::operator::OperatorRegistry;
use interlock::parser::parse_rule_ext;
use interlock::phase::Phase;
use interlock::script::{ScriptContextId, ScriptGate, ScriptHost};
use interlock::testkit::blank_tx;
use interlock::tx::Tx;

/// A fixture host that records the path it was asked to load and returns a
/// caller-controlled integer result from every call, standing in for a real
/// Lua VM the way the teacher's in-memory transport stands in for a socket.
struct FixtureHost {
    loaded_path: std::sync::Mutex<Option<String>>,
    result: AtomicI64,
}

impl FixtureHost {
    fn new(result: i64) -> Self {
        Self {
            loaded_path: std::sync::Mutex::new(None),
            result: AtomicI64::new(result),
        }
    }
}

impl ScriptHost for FixtureHost {
    fn scheme(&self) -> &str { "lua" }

    fn load_function(&self, path: &str, _name: &str) -> Result<(), EngineError> {
        *self.loaded_path.lock().expect("lock") = Some(path.to_owned());
        Ok(())
    }

    fn new_context(&self) -> Result<ScriptContextId, EngineError> { Ok(ScriptContextId(0)) }

    fn dispose_context(&self, _ctx: ScriptContextId) {}

    fn call(&self, _ctx: ScriptContextId, _name: &str, _tx: &Tx) -> Result<i64, EngineError> {
        Ok(self.result.load(Ordering::SeqCst))
    }
}

#[test]
fn s6_rule_ext_loads_script_and_coerces_result_to_bool() {
    let mut operators = OperatorRegistry::new();
    let actions = ActionRegistry::new();
    let host = Arc::new(FixtureHost::new(1));
    let gate = Arc::new(ScriptGate::new());

    let rule = parse_rule_ext(
        "lua:/etc/ib/check.lua",
        &["phase:REQUEST", "id:99"],
        host.clone(),
        gate,
        &mut operators,
        &actions,
    )
    .expect("parse");

    assert_eq!(rule.id(), "99");
    assert_eq!(rule.phase(), Phase::RequestBody);
    assert!(rule.flags().contains(RuleFlags::EXTERNAL));
    assert_eq!(*host.loaded_path.lock().expect("lock"), Some("/etc/ib/check.lua".to_owned()));

    let tx = blank_tx();
    let operator = rule.operator().expect("synthetic operator set");
    assert!(operator.evaluate(&tx, None).expect("evaluate"));
}

#[test]
fn zero_result_does_not_match() {
    let mut operators = OperatorRegistry::new();
    let actions = ActionRegistry::new();
    let host = Arc::new(FixtureHost::new(0));
    let gate = Arc::new(ScriptGate::new());

    let rule = parse_rule_ext("lua:/etc/ib/check.lua", &["id:1"], host, gate, &mut operators, &actions).expect("parse");

    let tx = blank_tx();
    let operator = rule.operator().expect("synthetic operator set");
    assert!(!operator.evaluate(&tx, None).expect("evaluate"));
}
