//! Discovered object model
//!
//! Clusters, hosts and VMs as exported by the management endpoint. Each
//! object carries a property tree that rules address with dotted paths
//! such as `config.guestId` or `summary.guest.ipAddress`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AttributeLookupError;

// ============================================================================
// Connection
// ============================================================================

/// Connection details for a management endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Endpoint hostname
    pub hostname: String,
    /// Endpoint port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub username: String,
    /// Password
    pub password: String,
    /// Verify the endpoint's TLS certificate
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,
    /// Exported object tree to serve instead of a live endpoint
    pub snapshot: Option<PathBuf>,
}

fn default_port() -> u16 {
    443
}

fn default_validate_certs() -> bool {
    true
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            validate_certs: default_validate_certs(),
            snapshot: None,
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set snapshot path
    #[must_use]
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }
}

impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("validate_certs", &self.validate_certs)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Custom fields
// ============================================================================

/// Custom field definition from the endpoint's field manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    /// Internal key identifier
    pub key: i32,
    /// Display name
    pub name: String,
}

/// Custom value attached to an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomValue {
    /// Internal key identifier, resolved through [`CustomFieldDef`]
    pub key: i32,
    /// Attribute value
    pub value: Value,
}

// ============================================================================
// Inventory objects
// ============================================================================

/// Read-only view over a discovered object
pub trait InventoryObject {
    /// Object name as reported by the endpoint
    fn name(&self) -> &str;

    /// Property tree
    fn properties(&self) -> &Value;

    /// Custom values attached to this object
    fn custom_values(&self) -> &[CustomValue];

    /// Resolve a dotted attribute path against the property tree
    ///
    /// Array elements are addressed by numeric segments. A bare `name`
    /// falls back to [`InventoryObject::name`] when the tree has no such key.
    ///
    /// # Errors
    /// Returns `AttributeLookupError` naming the first segment that does not resolve
    fn resolve_path(&self, path: &str) -> Result<Value, AttributeLookupError> {
        let mut current = self.properties();

        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };

            match next {
                Some(value) => current = value,
                None if path == "name" => return Ok(Value::String(self.name().to_string())),
                None => {
                    return Err(AttributeLookupError {
                        object: self.name().to_string(),
                        path: path.to_string(),
                        segment: segment.to_string(),
                    });
                }
            }
        }

        Ok(current.clone())
    }
}

fn empty_tree() -> Value {
    Value::Object(Map::new())
}

/// Compute cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster name
    pub name: String,
    /// Member hosts
    #[serde(default)]
    pub hosts: Vec<HostSystem>,
}

/// Hypervisor host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSystem {
    /// Host name
    pub name: String,
    /// Management network address
    #[serde(default)]
    pub management_ip: Option<String>,
    /// Property tree
    #[serde(default = "empty_tree")]
    pub properties: Value,
    /// Custom values
    #[serde(default)]
    pub custom_values: Vec<CustomValue>,
    /// VMs registered on this host
    #[serde(default)]
    pub vms: Vec<VirtualMachine>,
}

impl HostSystem {
    /// Create a host with no properties, custom values or VMs
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            management_ip: None,
            properties: empty_tree(),
            custom_values: Vec::new(),
            vms: Vec::new(),
        }
    }

    /// Set management address
    #[must_use]
    pub fn with_management_ip(mut self, ip: impl Into<String>) -> Self {
        self.management_ip = Some(ip.into());
        self
    }

    /// Attach a custom value
    #[must_use]
    pub fn with_custom_value(mut self, key: i32, value: impl Into<Value>) -> Self {
        self.custom_values.push(CustomValue {
            key,
            value: value.into(),
        });
        self
    }

    /// Register a VM
    #[must_use]
    pub fn with_vm(mut self, vm: VirtualMachine) -> Self {
        self.vms.push(vm);
        self
    }
}

impl InventoryObject for HostSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &Value {
        &self.properties
    }

    fn custom_values(&self) -> &[CustomValue] {
        &self.custom_values
    }
}

/// Virtual machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// VM name
    pub name: String,
    /// Property tree
    #[serde(default = "empty_tree")]
    pub properties: Value,
    /// Custom values
    #[serde(default)]
    pub custom_values: Vec<CustomValue>,
    /// Extended facts served by fact gathering
    #[serde(default)]
    pub facts: Map<String, Value>,
}

impl VirtualMachine {
    /// Create a VM with an empty property tree
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: empty_tree(),
            custom_values: Vec::new(),
            facts: Map::new(),
        }
    }

    /// Replace the property tree
    #[must_use]
    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    /// Attach a custom value
    #[must_use]
    pub fn with_custom_value(mut self, key: i32, value: impl Into<Value>) -> Self {
        self.custom_values.push(CustomValue {
            key,
            value: value.into(),
        });
        self
    }

    /// Add an extended fact
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }
}

impl InventoryObject for VirtualMachine {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &Value {
        &self.properties
    }

    fn custom_values(&self) -> &[CustomValue] {
        &self.custom_values
    }
}
