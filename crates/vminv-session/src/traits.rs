//! Session traits

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::objects::{Cluster, ConnectionInfo, CustomFieldDef, VirtualMachine};

/// Read-only handle to a management endpoint
#[async_trait]
pub trait Session: Send + Sync {
    /// Look up a cluster by name, `None` if the endpoint has no such cluster
    async fn find_cluster(&self, name: &str) -> Result<Option<Cluster>, SessionError>;

    /// Custom field definitions known to the endpoint
    async fn custom_fields(&self) -> Result<Vec<CustomFieldDef>, SessionError>;

    /// Extended fact set for a single VM
    async fn gather_vm_facts(&self, vm: &VirtualMachine)
    -> Result<Map<String, Value>, SessionError>;

    /// Short identifier for logging
    fn session_type(&self) -> &'static str;
}

/// Opens sessions against an endpoint
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connect and authenticate
    async fn connect(&self, info: &ConnectionInfo) -> Result<Arc<dyn Session>, SessionError>;
}
