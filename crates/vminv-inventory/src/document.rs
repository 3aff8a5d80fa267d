//! Inventory document
//!
//! Serialized as a single JSON object: every top-level key except `_meta` is a
//! group name mapping to a list of host names, and `_meta.hostvars` maps each
//! host name to its variables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Reserved top-level key holding per-host variables
pub const META_KEY: &str = "_meta";

/// Per-host variable section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Variables keyed by host name
    #[serde(default)]
    pub hostvars: BTreeMap<String, Map<String, Value>>,
}

/// Dynamic inventory document
///
/// Host and group names are lower-cased on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(flatten)]
    groups: BTreeMap<String, Vec<String>>,
    #[serde(rename = "_meta", default)]
    meta: Meta,
}

impl InventoryDocument {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host to a group, ignoring duplicates
    pub fn add_group_member(&mut self, group: &str, host: &str) {
        let group = group.to_lowercase();
        if group == META_KEY {
            warn!(host, "refusing to register group named {META_KEY}");
            return;
        }

        let host = host.to_lowercase();
        let members = self.groups.entry(group).or_default();
        if !members.contains(&host) {
            members.push(host);
        }
    }

    /// Make sure a host has a hostvars entry
    pub fn seed_host(&mut self, host: &str) {
        self.meta.hostvars.entry(host.to_lowercase()).or_default();
    }

    /// Set a single host variable
    pub fn set_host_var(&mut self, host: &str, key: impl Into<String>, value: Value) {
        self.meta
            .hostvars
            .entry(host.to_lowercase())
            .or_default()
            .insert(key.into(), value);
    }

    /// Merge variables into a host's hostvars, later keys winning
    pub fn merge_host_vars(&mut self, host: &str, vars: Map<String, Value>) {
        self.meta
            .hostvars
            .entry(host.to_lowercase())
            .or_default()
            .extend(vars);
    }

    /// Drop a host's variables and group memberships
    ///
    /// Groups left without members are removed.
    pub fn remove_host(&mut self, host: &str) {
        let host = host.to_lowercase();
        self.meta.hostvars.remove(&host);
        for members in self.groups.values_mut() {
            members.retain(|m| *m != host);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    /// Members of a group
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// All groups
    #[must_use]
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Variables of a host
    #[must_use]
    pub fn host_vars(&self, host: &str) -> Option<&Map<String, Value>> {
        self.meta.hostvars.get(host)
    }

    /// All hostvars
    #[must_use]
    pub fn hostvars(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.meta.hostvars
    }

    /// Check if nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.meta.hostvars.is_empty()
    }

    /// Render as compact JSON
    ///
    /// # Errors
    /// Returns an error if a host variable cannot be serialized
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
