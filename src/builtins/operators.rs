//! Built-in operators: `@rx`, `@streq`, `@contains`, `@eq`, `@ge`, `@le`,
//! `@true`, `@false`.

use std::any::Any;

use regex::bytes::Regex;

use crate::{error::EngineError, field::FieldValue, operator::{Operator, OperatorState}, tx::Tx};

fn field_bytes<'a>(field: Option<&'a FieldValue>) -> Option<&'a [u8]> {
    field.and_then(FieldValue::as_bytes)
}

fn field_i64(field: Option<&FieldValue>) -> Result<i64, EngineError> {
    let bytes = field_bytes(field).ok_or_else(|| EngineError::invalid("operator requires a field value"))?;
    let text = std::str::from_utf8(bytes).map_err(|_| EngineError::invalid("field is not valid UTF-8"))?;
    text.trim()
        .parse::<i64>()
        .map_err(|_| EngineError::invalid(format!("field '{text}' is not an integer")))
}

/// `@rx <pattern>`: true if the field matches the regular expression.
pub struct RxOperator;

impl Operator for RxOperator {
    fn create(&self, params: &str) -> Result<OperatorState, EngineError> {
        let regex = Regex::new(params).map_err(|err| EngineError::invalid(format!("bad @rx pattern: {err}")))?;
        Ok(Box::new(regex))
    }

    fn execute(&self, _tx: &Tx, state: &(dyn Any + Send + Sync), field: Option<&FieldValue>) -> Result<bool, EngineError> {
        let regex = state
            .downcast_ref::<Regex>()
            .ok_or_else(|| EngineError::fatal("@rx instance state corrupt"))?;
        let Some(bytes) = field_bytes(field) else {
            return Ok(false);
        };
        Ok(regex.is_match(bytes))
    }
}

/// `@streq <value>`: true if the field is byte-for-byte equal to `value`.
pub struct StrEqOperator;

impl Operator for StrEqOperator {
    fn create(&self, params: &str) -> Result<OperatorState, EngineError> { Ok(Box::new(params.to_owned())) }

    fn execute(&self, _tx: &Tx, state: &(dyn Any + Send + Sync), field: Option<&FieldValue>) -> Result<bool, EngineError> {
        let expected = state
            .downcast_ref::<String>()
            .ok_or_else(|| EngineError::fatal("@streq instance state corrupt"))?;
        Ok(field_bytes(field).is_some_and(|bytes| bytes == expected.as_bytes()))
    }
}

/// `@contains <needle>`: true if the field contains `needle` as a substring.
pub struct ContainsOperator;

impl Operator for ContainsOperator {
    fn create(&self, params: &str) -> Result<OperatorState, EngineError> { Ok(Box::new(params.to_owned())) }

    fn execute(&self, _tx: &Tx, state: &(dyn Any + Send + Sync), field: Option<&FieldValue>) -> Result<bool, EngineError> {
        let needle = state
            .downcast_ref::<String>()
            .ok_or_else(|| EngineError::fatal("@contains instance state corrupt"))?;
        let Some(haystack) = field_bytes(field) else {
            return Ok(false);
        };
        Ok(windows_contain(haystack, needle.as_bytes()))
    }
}

fn windows_contain(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// The three numeric comparison operators share a create/execute shape that
/// differs only in the comparison itself.
macro_rules! numeric_comparison_operator {
    ($name:ident, $doc:literal, $cmp:expr) => {
        #[doc = $doc]
        pub struct $name;

        impl Operator for $name {
            fn create(&self, params: &str) -> Result<OperatorState, EngineError> {
                let threshold = params
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| EngineError::invalid(format!("bad numeric operand: '{params}'")))?;
                Ok(Box::new(threshold))
            }

            fn execute(
                &self,
                _tx: &Tx,
                state: &(dyn Any + Send + Sync),
                field: Option<&FieldValue>,
            ) -> Result<bool, EngineError> {
                let threshold = *state
                    .downcast_ref::<i64>()
                    .ok_or_else(|| EngineError::fatal("numeric operator instance state corrupt"))?;
                let value = field_i64(field)?;
                let cmp: fn(i64, i64) -> bool = $cmp;
                Ok(cmp(value, threshold))
            }
        }
    };
}

numeric_comparison_operator!(EqOperator, "`@eq <n>`: true if the field equals `n`.", |v, t| v == t);
numeric_comparison_operator!(GeOperator, "`@ge <n>`: true if the field is greater than or equal to `n`.", |v, t| v >= t);
numeric_comparison_operator!(LeOperator, "`@le <n>`: true if the field is less than or equal to `n`.", |v, t| v <= t);

/// `@true`/`@false`: ignores both params and field, always returns the
/// constant it was built with. Accepts a null field, since it never reads
/// one; useful as an unconditional chain producer or catch-all rule.
pub struct TrueFalseOperator(
    /// The constant this instance always returns.
    pub bool,
);

impl Operator for TrueFalseOperator {
    fn create(&self, _params: &str) -> Result<OperatorState, EngineError> { Ok(Box::new(())) }

    fn execute(&self, _tx: &Tx, _state: &(dyn Any + Send + Sync), _field: Option<&FieldValue>) -> Result<bool, EngineError> {
        Ok(self.0)
    }

    fn accepts_null_field(&self) -> bool { true }
}
