//! vminv-session: read-only access to a virtualization management endpoint
//!
//! Provides the session traits consumed by the inventory engine, the
//! discovered-object model, and a snapshot-backed session implementation.

pub mod error;
pub mod objects;
pub mod snapshot;
pub mod traits;

pub use error::{AttributeLookupError, SessionError};
pub use objects::{
    Cluster, ConnectionInfo, CustomFieldDef, CustomValue, HostSystem, InventoryObject,
    VirtualMachine,
};
pub use snapshot::{Credentials, EndpointSnapshot, SnapshotProvider, SnapshotSession};
pub use traits::{Session, SessionProvider};
