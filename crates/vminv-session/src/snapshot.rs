//! Snapshot-backed session
//!
//! Serves an exported JSON object tree of the endpoint. Useful for offline
//! inventory runs and as a deterministic session in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::error::SessionError;
use crate::objects::{Cluster, ConnectionInfo, CustomFieldDef, VirtualMachine};
use crate::traits::{Session, SessionProvider};

/// Credentials recorded alongside a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Accepted username
    pub username: String,
    /// Accepted password
    pub password: String,
}

/// Exported endpoint object tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    /// Credentials the endpoint accepts (any are accepted when absent)
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Custom field manager definitions
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
    /// Clusters
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

impl EndpointSnapshot {
    /// Create an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom field definition
    #[must_use]
    pub fn with_custom_field(mut self, key: i32, name: impl Into<String>) -> Self {
        self.custom_fields.push(CustomFieldDef {
            key,
            name: name.into(),
        });
        self
    }

    /// Add a cluster
    #[must_use]
    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Require credentials
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Session over an in-memory snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSession {
    snapshot: EndpointSnapshot,
}

impl SnapshotSession {
    /// Create a session serving the given snapshot
    #[must_use]
    pub fn new(snapshot: EndpointSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file
    ///
    /// # Errors
    /// Returns `SessionError::Connectivity` if the file cannot be read and
    /// `SessionError::Snapshot` if it is not a valid snapshot
    pub async fn from_file(path: &Path, endpoint: &str) -> Result<Self, SessionError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SessionError::Connectivity {
                endpoint: endpoint.to_string(),
                reason: format!("{}: {e}", path.display()),
            }
        })?;

        let snapshot: EndpointSnapshot =
            serde_json::from_str(&content).map_err(|e| SessionError::Snapshot(e.to_string()))?;

        debug!(
            path = %path.display(),
            clusters = snapshot.clusters.len(),
            "loaded endpoint snapshot"
        );

        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl Session for SnapshotSession {
    async fn find_cluster(&self, name: &str) -> Result<Option<Cluster>, SessionError> {
        Ok(self
            .snapshot
            .clusters
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn custom_fields(&self) -> Result<Vec<CustomFieldDef>, SessionError> {
        Ok(self.snapshot.custom_fields.clone())
    }

    async fn gather_vm_facts(
        &self,
        vm: &VirtualMachine,
    ) -> Result<Map<String, Value>, SessionError> {
        Ok(vm.facts.clone())
    }

    fn session_type(&self) -> &'static str {
        "snapshot"
    }
}

/// Opens [`SnapshotSession`]s from the snapshot path in [`ConnectionInfo`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotProvider;

impl SnapshotProvider {
    /// Create a new provider
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionProvider for SnapshotProvider {
    #[instrument(skip(self, info), fields(endpoint = %info.hostname))]
    async fn connect(&self, info: &ConnectionInfo) -> Result<Arc<dyn Session>, SessionError> {
        let Some(path) = &info.snapshot else {
            return Err(SessionError::Connectivity {
                endpoint: info.hostname.clone(),
                reason: "no endpoint snapshot configured".to_string(),
            });
        };

        let session = SnapshotSession::from_file(path, &info.hostname).await?;

        if let Some(creds) = &session.snapshot.credentials
            && (creds.username != info.username || creds.password != info.password)
        {
            return Err(SessionError::Authentication {
                endpoint: info.hostname.clone(),
                username: info.username.clone(),
            });
        }

        info!(port = info.port, validate_certs = info.validate_certs, "session established");

        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::HostSystem;

    fn write_snapshot(snapshot: &EndpointSnapshot) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(snapshot).unwrap()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_find_cluster() {
        let session = SnapshotSession::new(EndpointSnapshot::new().with_cluster(Cluster {
            name: "C1".to_string(),
            hosts: vec![HostSystem::new("esx1")],
        }));

        let found = session.find_cluster("C1").await.unwrap();
        assert_eq!(found.unwrap().hosts.len(), 1);
        assert!(session.find_cluster("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_without_snapshot() {
        let info = ConnectionInfo::new("vc1", "u", "p");
        let result = SnapshotProvider::new().connect(&info).await;

        assert!(matches!(result, Err(SessionError::Connectivity { .. })));
    }

    #[tokio::test]
    async fn test_connect_missing_file() {
        let info = ConnectionInfo::new("vc1", "u", "p").with_snapshot("/nonexistent/vc1.json");
        let result = SnapshotProvider::new().connect(&info).await;

        assert!(matches!(result, Err(SessionError::Connectivity { .. })));
    }

    #[tokio::test]
    async fn test_connect_bad_credentials() {
        let file = write_snapshot(&EndpointSnapshot::new().with_credentials("admin", "secret"));
        let info = ConnectionInfo::new("vc1", "admin", "wrong").with_snapshot(file.path());
        let result = SnapshotProvider::new().connect(&info).await;

        assert!(matches!(result, Err(SessionError::Authentication { .. })));
    }

    #[tokio::test]
    async fn test_connect_success() {
        let file = write_snapshot(
            &EndpointSnapshot::new()
                .with_credentials("admin", "secret")
                .with_custom_field(101, "Owner"),
        );
        let info = ConnectionInfo::new("vc1", "admin", "secret").with_snapshot(file.path());
        let session = SnapshotProvider::new().connect(&info).await.unwrap();

        assert_eq!(session.session_type(), "snapshot");
        assert_eq!(session.custom_fields().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_invalid_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not json").unwrap();
        let info = ConnectionInfo::new("vc1", "u", "p").with_snapshot(file.path());
        let result = SnapshotProvider::new().connect(&info).await;

        assert!(matches!(result, Err(SessionError::Snapshot(_))));
    }
}
