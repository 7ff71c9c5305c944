//! Replayable filter action records.
//!
//! A [`FilterAction`] names a filter, its version, and the ordered parameter
//! set it ran with. Randomized filters always record the seed they actually
//! used under [`SEED_PARAMETER`], so replaying an action reproduces the
//! output exactly.

use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter name under which randomized filters store their seed.
pub const SEED_PARAMETER: &str = "randomSeed";

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParamValue {
    /// Signed integer
    Integer(i64),
    /// Real number
    Float(f64),
    /// Boolean flag
    Boolean(bool),
    /// Free text
    Text(String),
    /// List of reals, used for custom kernels
    FloatList(Vec<f64>),
}

impl ParamValue {
    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Integer(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Boolean(_) => "boolean",
            ParamValue::Text(_) => "text",
            ParamValue::FloatList(_) => "float list",
        }
    }

    /// Numeric view. Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether `other` can stand in for a value of this type.
    pub fn same_kind(&self, other: &ParamValue) -> bool {
        matches!(
            (self, other),
            (ParamValue::Integer(_), ParamValue::Integer(_))
                | (ParamValue::Float(_), ParamValue::Float(_))
                | (ParamValue::Float(_), ParamValue::Integer(_))
                | (ParamValue::Boolean(_), ParamValue::Boolean(_))
                | (ParamValue::Text(_), ParamValue::Text(_))
                | (ParamValue::FloatList(_), ParamValue::FloatList(_))
        )
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Boolean(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::FloatList(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Integer(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Boolean(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::FloatList(v)
    }
}

/// Description of one filter run that can be stored and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterAction {
    /// Filter identifier, e.g. `"distortion"`
    pub identifier: String,
    /// Parameter schema version
    pub version: u32,
    /// Parameters in insertion order
    #[serde(default)]
    pub parameters: IndexMap<String, ParamValue>,
}

impl FilterAction {
    /// Create an action with no parameters.
    pub fn new(identifier: impl Into<String>, version: u32) -> Self {
        Self {
            identifier: identifier.into(),
            version,
            parameters: IndexMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.add_parameter(name, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Look up a parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    /// Whether a parameter is present.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Required integer parameter.
    pub fn integer(&self, name: &str) -> ConfigResult<i64> {
        match self.require(name)? {
            ParamValue::Integer(v) => Ok(*v),
            other => Err(type_error(name, "integer", other)),
        }
    }

    /// Required real parameter. Integers are accepted.
    pub fn float(&self, name: &str) -> ConfigResult<f64> {
        let value = self.require(name)?;
        value
            .as_float()
            .ok_or_else(|| type_error(name, "float", value))
    }

    /// Required boolean parameter.
    pub fn boolean(&self, name: &str) -> ConfigResult<bool> {
        match self.require(name)? {
            ParamValue::Boolean(v) => Ok(*v),
            other => Err(type_error(name, "boolean", other)),
        }
    }

    /// Required text parameter.
    pub fn text(&self, name: &str) -> ConfigResult<&str> {
        match self.require(name)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(type_error(name, "text", other)),
        }
    }

    /// Required list parameter.
    pub fn float_list(&self, name: &str) -> ConfigResult<&[f64]> {
        match self.require(name)? {
            ParamValue::FloatList(v) => Ok(v),
            other => Err(type_error(name, "float list", other)),
        }
    }

    /// Integer parameter falling back to `default` when absent.
    pub fn integer_or(&self, name: &str, default: i64) -> ConfigResult<i64> {
        if self.has_parameter(name) {
            self.integer(name)
        } else {
            Ok(default)
        }
    }

    /// Real parameter falling back to `default` when absent.
    pub fn float_or(&self, name: &str, default: f64) -> ConfigResult<f64> {
        if self.has_parameter(name) {
            self.float(name)
        } else {
            Ok(default)
        }
    }

    /// Boolean parameter falling back to `default` when absent.
    pub fn boolean_or(&self, name: &str, default: bool) -> ConfigResult<bool> {
        if self.has_parameter(name) {
            self.boolean(name)
        } else {
            Ok(default)
        }
    }

    /// Integer parameter converted to `u32`, rejecting negative or oversized values.
    pub fn u32_or(&self, name: &str, default: u32) -> ConfigResult<u32> {
        let value = self.integer_or(name, default as i64)?;
        u32::try_from(value)
            .map_err(|_| ConfigurationError::invalid(name, format!("{} is not a valid count", value)))
    }

    /// Recorded seed, if any.
    pub fn seed(&self) -> ConfigResult<Option<u32>> {
        if !self.has_parameter(SEED_PARAMETER) {
            return Ok(None);
        }
        let value = self.integer(SEED_PARAMETER)?;
        u32::try_from(value)
            .map(Some)
            .map_err(|_| ConfigurationError::invalid(SEED_PARAMETER, "seed must fit in 32 bits"))
    }

    /// Reject actions written by a newer implementation.
    pub fn check_version(&self, supported: u32) -> ConfigResult<()> {
        if self.version > supported {
            return Err(ConfigurationError::UnsupportedVersion {
                id: self.identifier.clone(),
                version: self.version,
                supported,
            });
        }
        Ok(())
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> FilterResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> FilterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn require(&self, name: &str) -> ConfigResult<&ParamValue> {
        self.parameters
            .get(name)
            .ok_or_else(|| ConfigurationError::MissingParameter {
                name: name.to_string(),
            })
    }
}

fn type_error(name: &str, expected: &str, got: &ParamValue) -> ConfigurationError {
    ConfigurationError::ParameterType {
        name: name.to_string(),
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let action = FilterAction::new("distortion", 1)
            .with_parameter("level", 50)
            .with_parameter("antiAlias", true)
            .with_parameter("sigma", 1.5);

        assert_eq!(action.integer("level").unwrap(), 50);
        assert!(action.boolean("antiAlias").unwrap());
        assert_eq!(action.float("level").unwrap(), 50.0);
        assert!(matches!(
            action.integer("sigma"),
            Err(ConfigurationError::ParameterType { .. })
        ));
        assert!(matches!(
            action.integer("missing"),
            Err(ConfigurationError::MissingParameter { .. })
        ));
        assert_eq!(action.integer_or("missing", 3).unwrap(), 3);
    }

    #[test]
    fn test_json_preserves_order_and_seed() {
        let action = FilterAction::new("filmgrain", 1)
            .with_parameter("grainSize", 3)
            .with_parameter("lumaIntensity", 10)
            .with_parameter(SEED_PARAMETER, 123456);

        let json = action.to_json().unwrap();
        let back = FilterAction::from_json(&json).unwrap();
        assert_eq!(back, action);
        assert_eq!(back.seed().unwrap(), Some(123456));
        let names: Vec<&str> = back.parameters.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, ["grainSize", "lumaIntensity", SEED_PARAMETER]);
    }

    #[test]
    fn test_negative_seed_is_rejected() {
        let action = FilterAction::new("raindrop", 1).with_parameter(SEED_PARAMETER, -1);
        assert!(action.seed().is_err());
    }

    #[test]
    fn test_version_check() {
        let action = FilterAction::new("charcoal", 3);
        assert!(action.check_version(3).is_ok());
        assert!(matches!(
            action.check_version(2),
            Err(ConfigurationError::UnsupportedVersion { .. })
        ));
    }
}
