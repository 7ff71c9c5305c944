//! Filter metadata and parameter definitions.
//!
//! Metadata drives the registry listing, the CLI `info` command, default
//! actions, and synchronous parameter validation.

use crate::core::action::{FilterAction, ParamValue};
use crate::core::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};

/// Category for organizing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Kernel-based filters
    Convolution,
    /// Blur effects
    Blur,
    /// Geometric distortions
    Distort,
    /// Noise and grain
    Noise,
    /// Artistic composites
    Artistic,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Convolution => "Convolution",
            Category::Blur => "Blur",
            Category::Distort => "Distort",
            Category::Noise => "Noise",
            Category::Artistic => "Artistic",
        }
    }

    /// Get all categories in display order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Convolution,
            Category::Blur,
            Category::Distort,
            Category::Noise,
            Category::Artistic,
        ]
    }
}

/// Constraints applied to parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Integer must be one of the listed values
    OneOf(Vec<i64>),
    /// List must hold an odd number of entries
    OddLength,
}

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &ParamValue) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                if let Some(num) = value.as_float() {
                    if !num.is_finite() || num < *min || num > *max {
                        return Err(format!("Value {} is out of range [{}, {}]", num, min, max));
                    }
                }
            }
            Constraint::OneOf(options) => {
                if let Some(v) = value.as_integer() {
                    if !options.contains(&v) {
                        return Err(format!("Value {} is not one of {:?}", v, options));
                    }
                }
            }
            Constraint::OddLength => {
                if let ParamValue::FloatList(list) = value {
                    if list.len() % 2 == 0 {
                        return Err(format!("Length {} is not odd", list.len()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A named filter parameter with its default and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Name as stored in filter actions
    pub name: String,
    /// Default value, also fixes the parameter type
    pub default_value: ParamValue,
    /// Description for documentation
    pub description: String,
    /// Constraints for validation
    pub constraints: Vec<Constraint>,
}

impl ParameterDefinition {
    /// Create a new parameter definition.
    pub fn new(name: impl Into<String>, default_value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Restrict to a set of integer choices.
    pub fn with_choices(mut self, choices: impl IntoIterator<Item = i64>) -> Self {
        self.constraints
            .push(Constraint::OneOf(choices.into_iter().collect()));
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Validate a value against this parameter's type and constraints.
    pub fn validate(&self, value: &ParamValue) -> ConfigResult<()> {
        if !self.default_value.same_kind(value) {
            return Err(ConfigurationError::ParameterType {
                name: self.name.clone(),
                expected: self.default_value.type_name().to_string(),
                got: value.type_name().to_string(),
            });
        }
        for constraint in &self.constraints {
            constraint
                .validate(value)
                .map_err(|reason| ConfigurationError::invalid(&self.name, reason))?;
        }
        Ok(())
    }
}

/// Static description of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Identifier used in filter actions
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What the filter does
    pub description: String,
    /// Grouping for listings
    pub category: Category,
    /// Current parameter schema version
    pub version: u32,
    /// Whether the filter records a random seed
    pub randomized: bool,
    /// Parameter definitions in display order
    pub parameters: Vec<ParameterDefinition>,
}

impl FilterMetadata {
    /// Start building metadata.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> FilterMetadataBuilder {
        FilterMetadataBuilder::new(id, name)
    }

    /// Look up a parameter definition.
    pub fn get_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter names in order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// An action with every parameter at its default.
    pub fn default_action(&self) -> FilterAction {
        let mut action = FilterAction::new(&self.id, self.version);
        for param in &self.parameters {
            action.add_parameter(&param.name, param.default_value.clone());
        }
        action
    }

    /// Check an action against this metadata.
    ///
    /// Absent parameters are allowed and take their defaults; unknown names,
    /// wrong types, and out-of-range values are rejected.
    pub fn check(&self, action: &FilterAction) -> ConfigResult<()> {
        if action.identifier != self.id {
            return Err(ConfigurationError::UnknownFilter(action.identifier.clone()));
        }
        action.check_version(self.version)?;
        for (name, value) in &action.parameters {
            match self.get_parameter(name) {
                Some(definition) => definition.validate(value)?,
                None => {
                    return Err(ConfigurationError::invalid(
                        name.as_str(),
                        format!("not a parameter of '{}'", self.id),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`FilterMetadata`].
pub struct FilterMetadataBuilder {
    metadata: FilterMetadata,
}

impl FilterMetadataBuilder {
    /// Create a new builder.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: FilterMetadata {
                id: id.into(),
                name: name.into(),
                description: String::new(),
                category: Category::Convolution,
                version: 1,
                randomized: false,
                parameters: Vec::new(),
            },
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.metadata.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Set the schema version.
    pub fn version(mut self, version: u32) -> Self {
        self.metadata.version = version;
        self
    }

    /// Mark the filter as seeded.
    pub fn randomized(mut self) -> Self {
        self.metadata.randomized = true;
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.metadata.parameters.push(param);
        self
    }

    /// Build the metadata.
    pub fn build(self) -> FilterMetadata {
        self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FilterMetadata {
        FilterMetadata::builder("waves", "Waves")
            .category(Category::Distort)
            .parameter(ParameterDefinition::new("level", 50).with_range(0.0, 100.0))
            .parameter(ParameterDefinition::new("type", 7).with_choices([7, 8]))
            .parameter(ParameterDefinition::new("antiAlias", true))
            .build()
    }

    #[test]
    fn test_default_action_passes_check() {
        let meta = sample();
        let action = meta.default_action();
        assert_eq!(action.parameters.len(), 3);
        assert!(meta.check(&action).is_ok());
    }

    #[test]
    fn test_range_violation() {
        let meta = sample();
        let action = FilterAction::new("waves", 1).with_parameter("level", 101);
        assert!(matches!(
            meta.check(&action),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_choice_violation() {
        let meta = sample();
        let action = FilterAction::new("waves", 1).with_parameter("type", 3);
        assert!(meta.check(&action).is_err());
    }

    #[test]
    fn test_type_and_unknown_parameter() {
        let meta = sample();
        let wrong_type = FilterAction::new("waves", 1).with_parameter("antiAlias", 1);
        assert!(matches!(
            meta.check(&wrong_type),
            Err(ConfigurationError::ParameterType { .. })
        ));
        let unknown = FilterAction::new("waves", 1).with_parameter("speed", 1);
        assert!(meta.check(&unknown).is_err());
    }

    #[test]
    fn test_identifier_mismatch() {
        let meta = sample();
        let action = FilterAction::new("twirl", 1);
        assert_eq!(
            meta.check(&action),
            Err(ConfigurationError::UnknownFilter("twirl".to_string()))
        );
    }
}
