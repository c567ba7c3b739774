//! The per-transaction attribute bag and input-selector parsing.

use indexmap::IndexMap;

use crate::error::EngineError;

/// A value an operator reads from the attribute bag, or passes as its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// UTF-8 text, the common case for header and argument values.
    Text(String),
    /// Opaque bytes, for body fragments or binary header values.
    Bytes(Vec<u8>),
    /// A list of values, for multi-valued selectors such as repeated headers.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Borrow the value as bytes, regardless of which variant it is.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::Bytes(b) => Some(b.as_slice()),
            Self::List(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(b) }
}

/// Ordered mapping from field name to value, read by operator input
/// selectors (spec §3).
///
/// Iteration order is insertion order and is observable to `external` rules
/// that enumerate the bag themselves, so a plain hash map is not
/// substitutable here.
#[derive(Debug, Clone, Default)]
pub struct AttributeBag {
    fields: IndexMap<String, FieldValue>,
}

impl AttributeBag {
    /// Build an empty attribute bag.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Insert or overwrite a field's value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Resolve a single selector name to its current value, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> { self.fields.get(name) }

    /// Iterate the bag in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A parsed `Rule` inputs string: one or more selector names, in the order
/// given (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSelectors(Vec<String>);

impl InputSelectors {
    /// Parse an inputs string: selectors separated by `|` or `,`, with
    /// leading whitespace on each selector stripped. An empty string is
    /// `invalid`.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        if raw.trim().is_empty() {
            return Err(EngineError::invalid("empty inputs string"));
        }
        let selectors: Vec<String> = raw
            .split(['|', ','])
            .map(|s| s.trim_start().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if selectors.is_empty() {
            return Err(EngineError::invalid("empty inputs string"));
        }
        Ok(Self(selectors))
    }

    /// Resolve each selector against an attribute bag in order, producing a
    /// field value per selector. Missing fields resolve to `None`.
    #[must_use]
    pub fn resolve<'bag>(&self, bag: &'bag AttributeBag) -> Vec<Option<&'bag FieldValue>> {
        self.0.iter().map(|name| bag.get(name)).collect()
    }

    /// Borrow the selector names in order.
    #[must_use]
    pub fn names(&self) -> &[String] { &self.0 }
}
