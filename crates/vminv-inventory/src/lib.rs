//! vminv-inventory: inventory construction engine
//!
//! Resolves configuration, walks clusters, hosts and VMs through a read-only
//! session, applies property rules and custom attributes, and renders the
//! result as a dynamic inventory document with an optional on-disk cache.

pub mod builder;
pub mod cache;
pub mod config;
pub mod custom;
pub mod document;
pub mod error;
pub mod rules;

pub use builder::InventoryBuilder;
pub use cache::CacheStore;
pub use config::{Config, ConfigResolver};
pub use custom::{CustomAttributeResolver, CustomAttributes};
pub use document::InventoryDocument;
pub use error::{BuildError, CacheError, ConfigError};
pub use rules::{PropertyRule, RuleOutcome};
