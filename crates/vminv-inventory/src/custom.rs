//! Custom attribute resolution
//!
//! Maps an object's custom values to display names via the endpoint's field
//! definitions and derives group memberships from them.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;
use vminv_session::{CustomFieldDef, InventoryObject};

use crate::config::Config;
use crate::rules::normalize_value;

/// Resolved custom attributes of one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomAttributes {
    /// Lower-cased display name to value
    pub custom_values: Map<String, Value>,
    /// Groups derived from the values
    pub groups: Vec<String>,
}

/// Resolves custom values for hosts and VMs alike
#[derive(Debug, Clone, Default)]
pub struct CustomAttributeResolver {
    fields: Vec<CustomFieldDef>,
    filters: Option<HashSet<String>>,
    group_by_value: HashSet<String>,
    group_by_key_and_value: bool,
}

impl CustomAttributeResolver {
    /// Create a resolver over the endpoint's field definitions
    #[must_use]
    pub fn new(fields: Vec<CustomFieldDef>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Create a resolver configured from `config`
    #[must_use]
    pub fn from_config(fields: Vec<CustomFieldDef>, config: &Config) -> Self {
        let resolver = Self::new(fields)
            .with_group_by_value(&config.custom_value_group_by_value)
            .with_group_by_key_and_value(config.custom_value_group_by_key_and_value);

        match &config.custom_value_filters {
            Some(filters) => resolver.with_filters(filters),
            None => resolver,
        }
    }

    /// Only record attributes with these names; an empty list disables filtering
    #[must_use]
    pub fn with_filters<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.filters = if names.is_empty() {
            None
        } else {
            Some(lowercase_set(names))
        };
        self
    }

    /// Attributes whose value alone names the group
    #[must_use]
    pub fn with_group_by_value<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.group_by_value = lowercase_set(names);
        self
    }

    /// Group every other attribute as `key_value`
    #[must_use]
    pub fn with_group_by_key_and_value(mut self, enabled: bool) -> Self {
        self.group_by_key_and_value = enabled;
        self
    }

    /// Display name for an internal key, or the key itself if undefined
    fn field_name(&self, key: i32) -> String {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map_or_else(|| key.to_string(), |field| field.name.clone())
    }

    /// Resolve the custom values attached to `object`
    #[must_use]
    pub fn resolve(&self, object: &dyn InventoryObject) -> CustomAttributes {
        let mut resolved = CustomAttributes::default();

        for entry in object.custom_values() {
            let key = self.field_name(entry.key).to_lowercase();

            if let Some(filters) = &self.filters
                && !filters.contains(&key)
            {
                trace!(object = object.name(), key = %key, "custom value filtered out");
                continue;
            }

            let value = normalize_value(entry.value.clone());

            let group = if self.group_by_value.contains(&key) {
                Some(value_label(&value))
            } else if self.group_by_key_and_value {
                Some(format!("{key}_{}", value_label(&value)))
            } else {
                None
            };

            if let Some(group) = group
                && !resolved.groups.contains(&group)
            {
                resolved.groups.push(group);
            }

            resolved.custom_values.insert(key, value);
        }

        resolved
    }
}

fn lowercase_set<S: AsRef<str>>(names: &[S]) -> HashSet<String> {
    names.iter().map(|n| n.as_ref().to_lowercase()).collect()
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}
