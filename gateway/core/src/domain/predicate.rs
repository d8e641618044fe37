// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Predicate definitions and state updates.
//!
//! A predicate is a named, typed schema for an application-state object the
//! verifier tracks. Definitions are sent once with `defineState`; each
//! intercepted firing later reports concrete values with `updateState`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredicateError {
    #[error("Predicate name cannot be empty")]
    EmptyName,

    #[error("Variable name cannot be empty in predicate '{0}'")]
    EmptyVariableName(String),

    #[error("Duplicate variable '{variable}' in predicate '{predicate}'")]
    DuplicateVariable { predicate: String, variable: String },

    #[error("Predicate '{predicate}' marks {count} variables as key (at most one allowed)")]
    MultipleKeys { predicate: String, count: usize },

    #[error("Enum variable '{variable}' in predicate '{predicate}' needs at least one enum value")]
    MissingEnumValues { predicate: String, variable: String },

    #[error("Variable '{variable}' in predicate '{predicate}' lists enum values but is not an Enum")]
    UnexpectedEnumValues { predicate: String, variable: String },
}

/// Declared type of a predicate variable. Serialized with the exact
/// capitalised names the verifier expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Text,
    Number,
    Boolean,
    Enum,
    Date,
    Time,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    /// Marks the variable identifying a predicate instance
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_key: bool,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub var_type: Option<VariableType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        Self {
            name: name.into(),
            is_key: false,
            var_type: Some(var_type),
            enum_values: None,
        }
    }

    /// A variable with no declared type; the verifier infers it.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_key: false,
            var_type: None,
            enum_values: None,
        }
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            is_key: false,
            var_type: Some(VariableType::Enum),
            enum_values: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl PredicateDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// The key variable, if exactly one is marked.
    pub fn key_variable(&self) -> Option<&Variable> {
        let mut keys = self.variables.iter().filter(|v| v.is_key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    /// Check the authoring conventions the wire format does not enforce.
    pub fn validate(&self) -> Result<(), PredicateError> {
        if self.name.trim().is_empty() {
            return Err(PredicateError::EmptyName);
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if variable.name.trim().is_empty() {
                return Err(PredicateError::EmptyVariableName(self.name.clone()));
            }
            if !seen.insert(variable.name.as_str()) {
                return Err(PredicateError::DuplicateVariable {
                    predicate: self.name.clone(),
                    variable: variable.name.clone(),
                });
            }
            match (variable.var_type, &variable.enum_values) {
                (Some(VariableType::Enum), None) => {
                    return Err(PredicateError::MissingEnumValues {
                        predicate: self.name.clone(),
                        variable: variable.name.clone(),
                    });
                }
                (Some(VariableType::Enum), Some(values)) if values.is_empty() => {
                    return Err(PredicateError::MissingEnumValues {
                        predicate: self.name.clone(),
                        variable: variable.name.clone(),
                    });
                }
                (Some(VariableType::Enum), Some(_)) | (_, None) => {}
                (_, Some(_)) => {
                    return Err(PredicateError::UnexpectedEnumValues {
                        predicate: self.name.clone(),
                        variable: variable.name.clone(),
                    });
                }
            }
        }

        let key_count = self.variables.iter().filter(|v| v.is_key).count();
        if key_count > 1 {
            return Err(PredicateError::MultipleKeys {
                predicate: self.name.clone(),
                count: key_count,
            });
        }

        Ok(())
    }
}

/// Concrete values for one predicate instance.
///
/// Serializes flat: `{"stateName": "...", "<field>": <value>, ...}`. Field
/// values are not checked against the predicate's declared types; the
/// verifier owns that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(rename = "stateName")]
    pub state_name: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StateUpdate {
    pub fn new(state_name: impl Into<String>) -> Self {
        Self {
            state_name: state_name.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn restaurant() -> PredicateDefinition {
        PredicateDefinition::new("RestaurantInfo", "Information about the restaurant")
            .with_variable(Variable::new("name", VariableType::Text).key())
            .with_variable(Variable::new("location", VariableType::Text))
            .with_variable(Variable::enumeration("price", ["$", "$$", "$$$"]))
    }

    #[test]
    fn test_variable_serialization_omits_defaults() {
        let json = serde_json::to_value(Variable::untyped("location")).unwrap();
        assert_eq!(json, json!({"name": "location"}));

        let json = serde_json::to_value(Variable::new("id", VariableType::Number).key()).unwrap();
        assert_eq!(json, json!({"name": "id", "is_key": true, "type": "Number"}));
    }

    #[test]
    fn test_enum_variable_wire_shape() {
        let json = serde_json::to_value(Variable::enumeration("size", ["S", "M"])).unwrap();
        assert_eq!(
            json,
            json!({"name": "size", "type": "Enum", "enum_values": ["S", "M"]})
        );
    }

    #[test]
    fn test_definition_roundtrip_preserves_variable_order() {
        let defs = vec![restaurant()];
        let encoded = serde_json::to_string(&defs).unwrap();
        let decoded: Vec<PredicateDefinition> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, defs);

        let names: Vec<_> = decoded[0].variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["name", "location", "price"]);
        assert!(decoded[0].variables[0].is_key);
        assert_eq!(
            decoded[0].variables[2].enum_values.as_deref(),
            Some(&["$".to_string(), "$$".to_string(), "$$$".to_string()][..])
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_definition() {
        assert_eq!(restaurant().validate(), Ok(()));
        assert_eq!(restaurant().key_variable().map(|v| v.name.as_str()), Some("name"));
    }

    #[test]
    fn test_validate_rejects_multiple_keys() {
        let def = PredicateDefinition::new("Post", "")
            .with_variable(Variable::new("id", VariableType::Text).key())
            .with_variable(Variable::new("slug", VariableType::Text).key());
        assert_eq!(
            def.validate(),
            Err(PredicateError::MultipleKeys {
                predicate: "Post".to_string(),
                count: 2
            })
        );
        assert!(def.key_variable().is_none());
    }

    #[test]
    fn test_validate_enum_rules() {
        let missing = PredicateDefinition::new("Order", "")
            .with_variable(Variable::new("status", VariableType::Enum));
        assert!(matches!(
            missing.validate(),
            Err(PredicateError::MissingEnumValues { .. })
        ));

        let mut stray = Variable::new("status", VariableType::Text);
        stray.enum_values = Some(vec!["open".to_string()]);
        let stray = PredicateDefinition::new("Order", "").with_variable(stray);
        assert!(matches!(
            stray.validate(),
            Err(PredicateError::UnexpectedEnumValues { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty_names() {
        let dup = PredicateDefinition::new("Post", "")
            .with_variable(Variable::untyped("id"))
            .with_variable(Variable::untyped("id"));
        assert!(matches!(
            dup.validate(),
            Err(PredicateError::DuplicateVariable { .. })
        ));

        assert_eq!(
            PredicateDefinition::new(" ", "").validate(),
            Err(PredicateError::EmptyName)
        );
    }

    #[test]
    fn test_state_update_is_flat() {
        let update = StateUpdate::new("Post").with_field("id", "1");
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"stateName":"Post","id":"1"}"#);

        let parsed: StateUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state_name, "Post");
        assert_eq!(parsed.field("id"), Some(&json!("1")));
        assert!(parsed.field("stateName").is_none());
    }
}
