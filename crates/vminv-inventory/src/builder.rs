//! Inventory traversal
//!
//! Walks configured clusters, their hosts and each host's VMs strictly in
//! order, committing rule and custom attribute results into one document.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use vminv_session::{Cluster, HostSystem, Session, VirtualMachine};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::custom::{CustomAttributeResolver, CustomAttributes};
use crate::document::InventoryDocument;
use crate::error::BuildError;
use crate::rules;

/// Group every hypervisor host joins
pub const HOST_GROUP: &str = "esxi";

/// Hostvar holding resolved custom values
pub const CUSTOM_VALUES_VAR: &str = "customvalues";

/// Hostvar holding a host's management address
pub const HOST_ADDRESS_VAR: &str = "ansible_host";

/// Fact fields that hold snapshot trees and are never merged
const NON_SERIALIZABLE_FACTS: &[&str] = &["snapshot", "snapshots", "current_snapshot"];

/// Builds the inventory document for one run
pub struct InventoryBuilder<'a> {
    config: &'a Config,
    session: Arc<dyn Session>,
    cancel: CancellationToken,
}

impl<'a> InventoryBuilder<'a> {
    /// Create a builder over an open session
    pub fn new(config: &'a Config, session: Arc<dyn Session>) -> Self {
        Self {
            config,
            session,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop traversal when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Serve from cache when possible, otherwise traverse and refresh the cache
    ///
    /// `refresh` forces a rebuild and discards any cached document.
    ///
    /// # Errors
    /// Returns `BuildError::Interrupted` with the partial document if cancelled,
    /// or a fatal session or lookup error. Cache failures are only logged.
    #[instrument(skip(self), fields(endpoint = %self.config.hostname))]
    pub async fn build(&self, refresh: bool) -> Result<InventoryDocument, BuildError> {
        if !self.config.caching_enabled() {
            return self.traverse().await;
        }

        let cache = CacheStore::new(&self.config.cache_path);
        if refresh || !cache.is_fresh(self.config.cache_max_age()) {
            debug!(refresh, "inventory cache not usable");
            cache.invalidate();
        } else if let Some(document) = cache.load() {
            info!("using cached inventory");
            return Ok(document);
        }

        let document = self.traverse().await?;

        if let Err(e) = cache.save(&document) {
            warn!(error = %e, "failed to write inventory cache");
        }

        Ok(document)
    }

    /// Walk every configured cluster and build a fresh document
    ///
    /// # Errors
    /// See [`InventoryBuilder::build`]
    #[instrument(skip(self), fields(session = self.session.session_type()))]
    pub async fn traverse(&self) -> Result<InventoryDocument, BuildError> {
        info!(clusters = self.config.clusters.len(), "building inventory");

        let mut document = InventoryDocument::new();
        let fields = self.session.custom_fields().await?;
        let resolver = CustomAttributeResolver::from_config(fields, self.config);

        for name in &self.config.clusters {
            self.checkpoint(&mut document)?;

            match self.session.find_cluster(name).await {
                Ok(Some(cluster)) => self.add_cluster(&mut document, &resolver, &cluster).await?,
                Ok(None) => tolerate(BuildError::ClusterNotFound(name.clone()))?,
                Err(e) => tolerate(e.into())?,
            }
        }

        info!(
            groups = document.groups().len(),
            hosts = document.hostvars().len(),
            "inventory built"
        );

        Ok(document)
    }

    fn checkpoint(&self, document: &mut InventoryDocument) -> Result<(), BuildError> {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Interrupted(Box::new(std::mem::take(document))));
        }
        Ok(())
    }

    async fn add_cluster(
        &self,
        document: &mut InventoryDocument,
        resolver: &CustomAttributeResolver,
        cluster: &Cluster,
    ) -> Result<(), BuildError> {
        debug!(cluster = %cluster.name, hosts = cluster.hosts.len(), "traversing cluster");

        for host in &cluster.hosts {
            self.checkpoint(document)?;
            add_host(document, resolver, host);

            for vm in &host.vms {
                self.checkpoint(document)?;
                self.add_vm(document, resolver, vm).await?;
            }
        }

        Ok(())
    }

    async fn add_vm(
        &self,
        document: &mut InventoryDocument,
        resolver: &CustomAttributeResolver,
        vm: &VirtualMachine,
    ) -> Result<(), BuildError> {
        let name = vm.name.to_lowercase();
        document.seed_host(&name);

        if !self.config.properties.is_empty() {
            let outcome = rules::evaluate(&self.config.properties, vm)?;
            if outcome.excluded {
                document.remove_host(&name);
                return Ok(());
            }

            document.merge_host_vars(&name, outcome.hostvars);
            for group in &outcome.groups {
                document.add_group_member(group, &name);
            }
        }

        commit_custom_attributes(document, &name, resolver.resolve(vm));

        if self.config.gather_vm_facts {
            match self.session.gather_vm_facts(vm).await {
                Ok(facts) => document.merge_host_vars(&name, strip_facts(facts)),
                Err(e) => tolerate(e.into())?,
            }
        }

        Ok(())
    }
}

/// Log and continue past recoverable errors, propagate the rest
fn tolerate(err: BuildError) -> Result<(), BuildError> {
    if !err.is_recoverable() {
        return Err(err);
    }
    warn!(error = %err, "continuing past error");
    Ok(())
}

fn add_host(
    document: &mut InventoryDocument,
    resolver: &CustomAttributeResolver,
    host: &HostSystem,
) {
    let name = host.name.to_lowercase();
    document.add_group_member(HOST_GROUP, &name);

    match &host.management_ip {
        Some(ip) => document.set_host_var(&name, HOST_ADDRESS_VAR, Value::String(ip.clone())),
        None => {
            debug!(host = %name, "host has no management address");
            document.seed_host(&name);
        }
    }

    commit_custom_attributes(document, &name, resolver.resolve(host));
}

fn commit_custom_attributes(document: &mut InventoryDocument, host: &str, attrs: CustomAttributes) {
    document.set_host_var(host, CUSTOM_VALUES_VAR, Value::Object(attrs.custom_values));
    for group in &attrs.groups {
        document.add_group_member(group, host);
    }
}

fn strip_facts(mut facts: Map<String, Value>) -> Map<String, Value> {
    for key in NON_SERIALIZABLE_FACTS {
        facts.remove(*key);
    }
    facts
}
