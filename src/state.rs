//! Process-wide state: instances, topology, the acquisition-order resource
//! stack and the shared readiness flag. Owned by the coordinator and passed
//! by reference into the router, never a global.

use crate::connector::Connector;
use crate::error::GatewayError;
use crate::instance::BackendInstance;
use crate::topology::Topology;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    Starting,
    Healthy,
    Unhealthy,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Starting => "starting",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Shared readiness flag. `healthy` only between a fully successful startup
/// and the first shutdown signal.
#[derive(Clone)]
pub struct Readiness(Arc<RwLock<ServiceStatus>>);

impl Readiness {
    pub fn new() -> Self {
        Readiness(Arc::new(RwLock::new(ServiceStatus::Starting)))
    }

    pub fn get(&self) -> ServiceStatus {
        *self.0.read().expect("readiness lock poisoned")
    }

    pub fn set(&self, status: ServiceStatus) {
        *self.0.write().expect("readiness lock poisoned") = status;
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::new()
    }
}

pub type ReleaseFn =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>> + Send>;

/// Resources in acquisition order; unwound in strict reverse order on every
/// exit path (success, startup failure, external shutdown).
#[derive(Default)]
pub struct ResourceStack {
    entries: Mutex<Vec<(String, ReleaseFn)>>,
}

impl ResourceStack {
    pub fn new() -> Self {
        ResourceStack::default()
    }

    pub fn push(&self, label: impl Into<String>, release: ReleaseFn) {
        self.entries
            .lock()
            .expect("resource stack lock poisoned")
            .push((label.into(), release));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("resource stack lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything, last-acquired first. The stack is empty afterwards,
    /// which is what makes a second teardown a no-op.
    pub fn drain_reversed(&self) -> Vec<(String, ReleaseFn)> {
        let mut entries = std::mem::take(
            &mut *self.entries.lock().expect("resource stack lock poisoned"),
        );
        entries.reverse();
        entries
    }
}

/// Aggregate created once at startup and torn down exactly once at shutdown.
pub struct ProcessState<C: Connector> {
    pub instances: Vec<Arc<BackendInstance<C>>>,
    pub topology: Topology,
    pub stack: ResourceStack,
    pub readiness: Readiness,
}

impl<C: Connector> ProcessState<C> {
    pub fn new(instances: Vec<Arc<BackendInstance<C>>>, topology: Topology) -> Self {
        ProcessState {
            instances,
            topology,
            stack: ResourceStack::new(),
            readiness: Readiness::new(),
        }
    }

    pub fn instance(&self, name: &str) -> Option<&Arc<BackendInstance<C>>> {
        self.instances.iter().find(|i| i.name() == name)
    }
}
