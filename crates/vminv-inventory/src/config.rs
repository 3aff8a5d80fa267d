//! Configuration loading and types
//!
//! Values are layered: compiled-in defaults, then the TOML file, then
//! `VMWARE_`-prefixed environment variables. Later layers win per key. The
//! merged map is normalized, validated against the key schema and frozen
//! into a [`Config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};
use vminv_session::ConnectionInfo;

use crate::error::ConfigError;
use crate::rules::{PropertyRule, sort_rules};

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "VMWARE_";

/// Configuration file name, looked up next to the executable
pub const CONFIG_FILE_NAME: &str = "vmware_inventory.toml";

/// Tokens accepted as `true` for boolean environment overrides
const TRUTHY: &[&str] = &["true", "yes", "y", "1"];

/// Keys that must be present and non-empty
const REQUIRED: &[&str] = &["hostname", "username", "password", "clusters"];

/// Declared type class of a configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Text,
    Bool,
    Integer,
    List,
    Rules,
}

impl KeyKind {
    fn describe(self) -> &'static str {
        match self {
            KeyKind::Text => "a string",
            KeyKind::Bool => "a boolean",
            KeyKind::Integer => "an integer",
            KeyKind::List => "a list of strings",
            KeyKind::Rules => "a list of property rules",
        }
    }
}

const SCHEMA: &[(&str, KeyKind)] = &[
    ("hostname", KeyKind::Text),
    ("username", KeyKind::Text),
    ("password", KeyKind::Text),
    ("port", KeyKind::Integer),
    ("validate_certs", KeyKind::Bool),
    ("clusters", KeyKind::List),
    ("properties", KeyKind::Rules),
    ("custom_value_filters", KeyKind::List),
    ("custom_value_group_by_value", KeyKind::List),
    ("custom_value_group_by_key_and_value", KeyKind::Bool),
    ("gather_vm_facts", KeyKind::Bool),
    ("cache_max_age", KeyKind::Integer),
    ("cache_path", KeyKind::Text),
    ("snapshot", KeyKind::Text),
];

fn kind_of(key: &str) -> Option<KeyKind> {
    SCHEMA.iter().find(|(k, _)| *k == key).map(|(_, kind)| *kind)
}

/// Resolved, immutable configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Management endpoint hostname
    pub hostname: String,
    /// Endpoint username
    pub username: String,
    /// Endpoint password
    pub password: String,
    /// Endpoint port
    pub port: u16,
    /// Verify the endpoint's TLS certificate
    pub validate_certs: bool,
    /// Clusters to traverse, in order
    pub clusters: Vec<String>,
    /// Property rules, exclusion rules first
    #[serde(default)]
    pub properties: Vec<PropertyRule>,
    /// Only record custom values with these names
    #[serde(default)]
    pub custom_value_filters: Option<Vec<String>>,
    /// Custom values grouped by value alone
    #[serde(default)]
    pub custom_value_group_by_value: Vec<String>,
    /// Group remaining custom values as `key_value`
    pub custom_value_group_by_key_and_value: bool,
    /// Merge extended VM facts into hostvars
    pub gather_vm_facts: bool,
    /// Cache lifetime in seconds, 0 disables caching
    pub cache_max_age: u64,
    /// Cache file location
    pub cache_path: PathBuf,
    /// Exported endpoint object tree
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("validate_certs", &self.validate_certs)
            .field("clusters", &self.clusters)
            .field("properties", &self.properties)
            .field("custom_value_filters", &self.custom_value_filters)
            .field("custom_value_group_by_value", &self.custom_value_group_by_value)
            .field(
                "custom_value_group_by_key_and_value",
                &self.custom_value_group_by_key_and_value,
            )
            .field("gather_vm_facts", &self.gather_vm_facts)
            .field("cache_max_age", &self.cache_max_age)
            .field("cache_path", &self.cache_path)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Check if inventory caching is enabled
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        self.cache_max_age > 0
    }

    /// Cache lifetime
    #[must_use]
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age)
    }

    /// Connection details for the session provider
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo::new(&self.hostname, &self.username, &self.password)
            .with_port(self.port);
        info.validate_certs = self.validate_certs;
        if let Some(snapshot) = &self.snapshot {
            info = info.with_snapshot(snapshot);
        }
        info
    }
}

/// Default location of the configuration file
///
/// The directory of the running executable, or the working directory if
/// that cannot be determined.
#[must_use]
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vmware_inventory")
        .join("inventory.json")
}

/// Compiled-in defaults
#[must_use]
pub fn default_values() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("port".into(), Value::from(443));
    defaults.insert("validate_certs".into(), Value::Bool(true));
    defaults.insert("properties".into(), Value::Array(Vec::new()));
    defaults.insert("custom_value_group_by_value".into(), Value::Array(Vec::new()));
    defaults.insert("custom_value_group_by_key_and_value".into(), Value::Bool(false));
    defaults.insert("gather_vm_facts".into(), Value::Bool(false));
    defaults.insert("cache_max_age".into(), Value::from(0));
    defaults.insert(
        "cache_path".into(),
        Value::String(default_cache_path().display().to_string()),
    );
    defaults
}

/// Merges configuration layers into a [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: Map<String, Value>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Create a resolver with the compiled-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::with_defaults(default_values())
    }

    /// Create a resolver with custom defaults
    #[must_use]
    pub fn with_defaults(defaults: Map<String, Value>) -> Self {
        Self { defaults }
    }

    /// Read a TOML configuration file
    ///
    /// A missing file yields `None`.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn read_file(path: &Path) -> Result<Option<Map<String, Value>>, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, skipping");
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let values: Map<String, Value> =
            toml::from_str(&content).map_err(|e| ConfigError::FileParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), keys = values.len(), "read configuration file");
        Ok(Some(values))
    }

    /// Load the file at `path` and resolve it with `environment`
    ///
    /// # Errors
    /// Returns `ConfigError` if the file is unreadable or the merged values are invalid
    pub fn load<I>(&self, path: &Path, environment: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file = Self::read_file(path)?;
        self.resolve(file, environment)
    }

    /// Merge defaults, file values and environment overrides
    ///
    /// # Errors
    /// Returns `ConfigError` for the first violated constraint
    pub fn resolve<I>(
        &self,
        file: Option<Map<String, Value>>,
        environment: I,
    ) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = self.defaults.clone();

        if let Some(file) = file {
            for (key, value) in file {
                if kind_of(&key) == Some(KeyKind::Rules) && !parses_as_rules(&value) {
                    warn!(key = %key, source = "file", "malformed property rules, ignoring");
                    continue;
                }
                merged.insert(key, value);
            }
        }

        for (name, raw) in environment {
            let Some(key) = name.strip_prefix(ENV_PREFIX).map(str::to_lowercase) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            match coerce_env_value(&key, &raw) {
                Some(value) => {
                    debug!(key = %key, "environment override");
                    merged.insert(key, value);
                }
                None => warn!(key = %key, source = "environment", "malformed property rules, ignoring"),
            }
        }

        normalize(&mut merged).and_then(|()| validate(&merged)).map_err(|e| {
            error!(error = %e, "invalid configuration");
            e
        })?;

        let mut config: Config = serde_json::from_value(Value::Object(merged)).map_err(|e| {
            error!(error = %e, "invalid configuration");
            ConfigError::Invalid(e.to_string())
        })?;
        sort_rules(&mut config.properties);

        debug!(?config, "configuration resolved");
        Ok(config)
    }
}

fn wrap_scalar(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Null => value,
        scalar => Value::Array(vec![scalar]),
    }
}

fn parses_as_rules(value: &Value) -> bool {
    serde_json::from_value::<Vec<PropertyRule>>(wrap_scalar(value.clone())).is_ok()
}

/// Coerce a raw environment string; `None` for a malformed rule list
fn coerce_env_value(key: &str, raw: &str) -> Option<Value> {
    match kind_of(key) {
        Some(KeyKind::List) => Some(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )),
        Some(KeyKind::Rules) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(parses_as_rules),
        Some(KeyKind::Bool) => Some(Value::Bool(
            TRUTHY.contains(&raw.trim().to_lowercase().as_str()),
        )),
        _ => Some(Value::String(raw.to_string())),
    }
}

fn normalize(merged: &mut Map<String, Value>) -> Result<(), ConfigError> {
    for (key, kind) in SCHEMA {
        let Some(value) = merged.remove(*key) else {
            continue;
        };

        let value = match kind {
            KeyKind::List | KeyKind::Rules => wrap_scalar(value),
            KeyKind::Integer => coerce_integer(key, value)?,
            _ => value,
        };
        merged.insert((*key).to_string(), value);
    }
    Ok(())
}

fn coerce_integer(key: &str, value: Value) -> Result<Value, ConfigError> {
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed.map(Value::from).ok_or_else(|| ConfigError::InvalidInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn validate(merged: &Map<String, Value>) -> Result<(), ConfigError> {
    for key in REQUIRED {
        if !merged.get(*key).is_some_and(is_truthy) {
            return Err(ConfigError::MissingRequired((*key).to_string()));
        }
    }

    for (key, kind) in SCHEMA {
        let Some(value) = merged.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };

        let valid = match kind {
            KeyKind::Text => value.is_string(),
            KeyKind::Bool => value.is_boolean(),
            KeyKind::Integer => value.is_u64(),
            KeyKind::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            KeyKind::Rules => value.is_array(),
        };

        if !valid {
            return Err(ConfigError::WrongType {
                key: (*key).to_string(),
                expected: kind.describe(),
            });
        }
    }

    Ok(())
}
