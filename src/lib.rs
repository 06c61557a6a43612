//! pg-gateway: configuration-driven multi-database MCP gateway library.

pub mod capability;
pub mod config;
pub mod connector;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod policy;
pub mod router;
pub mod server;
pub mod state;
pub mod topology;

pub use capability::{CapabilityProvider, CapabilitySet, Operation};
pub use config::{load_settings, AccessMode, BackendSpec, MountMode, Role, SecretUri, Settings, Transport};
pub use connector::{Connector, PgConnector};
pub use error::{ConfigError, GatewayError};
pub use instance::{BackendInstance, InstanceState};
pub use lifecycle::{AppLifecycle, Coordinator, ShutdownReport, SubApp};
pub use policy::{resolve, AccessPolicy, WriteLevel};
pub use router::build_router;
pub use server::Gateway;
pub use state::{ProcessState, Readiness, ResourceStack, ServiceStatus};
pub use topology::{RouteEntry, Topology};
