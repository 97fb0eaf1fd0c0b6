//! User-configurable wallpaper properties.
//!
//! A project description carries a `general.properties` table whose entries
//! hold the user's chosen `value`. Scene values elsewhere may reference those
//! entries instead of carrying a literal:
//!
//! ```json
//! { "user": "speed", "value": 1.0 }
//! { "user": { "name": "style", "condition": "neon" }, "value": false }
//! ```
//!
//! [`UserProperties::resolve`] replaces such references with the property's
//! value, falling back to the literal default when the property is unknown.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("failed to parse project description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("project description has no general.properties table")]
    MissingProperties,
}

/// Name → value table of user properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProperties {
    values: BTreeMap<String, Value>,
}

impl UserProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `general.properties.<name>.value` from a project description.
    /// Entries without a `value` are skipped.
    pub fn from_project_json(input: &str) -> Result<Self, PropertyError> {
        let project: Value = serde_json::from_str(input)?;
        let properties = project
            .get("general")
            .and_then(|general| general.get("properties"))
            .and_then(Value::as_object)
            .ok_or(PropertyError::MissingProperties)?;

        let mut values = BTreeMap::new();
        for (name, property) in properties {
            if let Some(value) = property.get("value") {
                tracing::debug!(property = %name, %value, "user property");
                values.insert(name.clone(), value.clone());
            }
        }
        Ok(Self { values })
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Replaces project values with user-supplied ones. Unknown names are
    /// added.
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in overrides {
            tracing::debug!(property = %name, %value, "user property override");
            self.values.insert(name, value);
        }
    }

    /// Whether property `name` exists and its string form equals `condition`.
    pub fn matches_condition(&self, condition: &str, name: &str) -> bool {
        self.get(name)
            .is_some_and(|value| string_form(value) == condition)
    }

    /// Resolves a scene value that may reference a user property.
    pub fn resolve(&self, value: &Value) -> Value {
        let Some(object) = value.as_object() else {
            return value.clone();
        };
        let Some(user) = object.get("user") else {
            return value.clone();
        };

        let (name, condition) = match user {
            Value::String(name) => (name.as_str(), None),
            Value::Object(reference) => match reference.get("name").and_then(Value::as_str) {
                Some(name) => (
                    name,
                    reference
                        .get("condition")
                        .and_then(Value::as_str)
                        .filter(|condition| !condition.is_empty()),
                ),
                None => return default_or(object, value),
            },
            _ => return default_or(object, value),
        };

        let Some(property) = self.get(name) else {
            return default_or(object, value);
        };

        if let Some(condition) = condition {
            // Visibility toggles compare the property against the condition.
            if object.get("value").is_some_and(Value::is_boolean) {
                return Value::Bool(string_form(property) == condition);
            }
        }
        property.clone()
    }
}

fn default_or(object: &Map<String, Value>, original: &Value) -> Value {
    object.get("value").unwrap_or(original).clone()
}

fn string_form(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
