//! The resolved parameter context.
//!
//! Built once by [`super::ParamLoader`], read-only afterwards, and passed
//! by reference into every pipeline stage.

use indexmap::IndexMap;

use crate::error::{ParamsError, Result, SkyliftError};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A boolean value.
    Bool(bool),
}

impl ParamValue {
    /// Returns the string form used when the value is spliced into
    /// resource names, settings maps, and log lines.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Returns true for an empty string value.
    #[must_use]
    pub fn is_empty_str(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// The immutable, insertion-ordered parameter context.
///
/// Invariant: once the loader finishes validation no entry is ever added,
/// removed, or replaced. Stages hold `&ParamContext`.
#[derive(Debug, Clone, Default)]
pub struct ParamContext {
    values: IndexMap<String, ParamValue>,
}

impl ParamContext {
    /// Creates an empty context. Only the loader should populate it.
    #[must_use]
    pub(super) fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Inserts a value. Loader-internal; later writes to an existing key
    /// are a programming error and panic in debug builds.
    pub(super) fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        let previous = self.values.insert(name.clone(), value);
        debug_assert!(previous.is_none(), "parameter '{name}' written twice");
    }

    /// Returns true if the parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Looks up a raw value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Returns a string parameter.
    ///
    /// # Errors
    ///
    /// Returns a named error if the parameter is absent or not a string.
    pub fn str_value(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => Ok(s),
            Some(_) => Err(SkyliftError::Params(ParamsError::WrongType {
                name: name.to_string(),
                expected: "string",
            })),
            None => Err(SkyliftError::Params(ParamsError::missing(name))),
        }
    }

    /// Returns an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns a named error if the parameter is absent or not an integer.
    pub fn int_value(&self, name: &str) -> Result<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(i)) => Ok(*i),
            Some(_) => Err(SkyliftError::Params(ParamsError::WrongType {
                name: name.to_string(),
                expected: "integer",
            })),
            None => Err(SkyliftError::Params(ParamsError::missing(name))),
        }
    }

    /// Returns a boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns a named error if the parameter is absent or not a boolean.
    pub fn bool_value(&self, name: &str) -> Result<bool> {
        match self.values.get(name) {
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(_) => Err(SkyliftError::Params(ParamsError::WrongType {
                name: name.to_string(),
                expected: "boolean",
            })),
            None => Err(SkyliftError::Params(ParamsError::missing(name))),
        }
    }

    /// Iterates parameters in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of resolved parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::names;

    fn context_with(entries: &[(&str, ParamValue)]) -> ParamContext {
        let mut ctx = ParamContext::new();
        for (name, value) in entries {
            ctx.insert(*name, value.clone());
        }
        ctx
    }

    #[test]
    fn typed_accessors_return_values() {
        let ctx = context_with(&[
            (names::LOCATION, ParamValue::Str(String::from("westeurope"))),
            (names::GATEWAY_CAPACITY, ParamValue::Int(2)),
            (names::DEBUG, ParamValue::Bool(true)),
        ]);

        assert_eq!(ctx.str_value(names::LOCATION).unwrap(), "westeurope");
        assert_eq!(ctx.int_value(names::GATEWAY_CAPACITY).unwrap(), 2);
        assert!(ctx.bool_value(names::DEBUG).unwrap());
    }

    #[test]
    fn wrong_type_is_a_named_error() {
        let ctx = context_with(&[(names::DEBUG, ParamValue::Bool(false))]);

        let err = ctx.str_value(names::DEBUG).unwrap_err();
        assert!(err.to_string().contains("debug"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn absent_key_is_a_named_error() {
        let ctx = ParamContext::new();
        let err = ctx.str_value(names::SUBSCRIPTION_ID).unwrap_err();
        assert!(err.to_string().contains("subscription_id"));
    }

    #[test]
    fn iteration_preserves_document_order() {
        let ctx = context_with(&[
            ("zeta", ParamValue::Int(1)),
            ("alpha", ParamValue::Int(2)),
            ("mid", ParamValue::Int(3)),
        ]);

        let order: Vec<&str> = ctx.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }
}
