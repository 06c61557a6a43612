//! Shared fixtures: an in-memory connector with scripted latency/failures
//! and a stub capability provider.
#![allow(dead_code)]

use async_trait::async_trait;
use pg_gateway::capability::OperationFuture;
use pg_gateway::{
    AccessMode, BackendSpec, CapabilityProvider, CapabilitySet, ConfigError, Connector,
    GatewayError, MountMode, Role, SecretUri,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct FakeResource {
    pub name: String,
}

/// Clones share the call records, so a test can keep one handle while the
/// gateway consumes another.
#[derive(Clone, Default)]
pub struct FakeConnector {
    latency_ms: HashMap<String, u64>,
    fail_connect: HashSet<String>,
    fail_verify: HashSet<String>,
    fail_release: HashSet<String>,
    connects: Arc<AtomicUsize>,
    /// Release calls in the order they happened.
    released: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        FakeConnector::default()
    }

    pub fn with_latency(mut self, name: &str, ms: u64) -> Self {
        self.latency_ms.insert(name.to_string(), ms);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.fail_connect.insert(name.to_string());
        self
    }

    pub fn failing_verify(mut self, name: &str) -> Self {
        self.fail_verify.insert(name.to_string());
        self
    }

    pub fn failing_release(mut self, name: &str) -> Self {
        self.fail_release.insert(name.to_string());
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn release_order(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Resource = FakeResource;

    async fn connect(&self, spec: &BackendSpec) -> Result<FakeResource, GatewayError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.latency_ms.get(&spec.name) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.fail_connect.contains(&spec.name) {
            return Err(GatewayError::Connect {
                name: spec.name.clone(),
                message: "scripted connect failure".into(),
            });
        }
        Ok(FakeResource {
            name: spec.name.clone(),
        })
    }

    async fn verify(&self, spec: &BackendSpec, _resource: &FakeResource) -> Result<(), GatewayError> {
        if self.fail_verify.contains(&spec.name) {
            return Err(ConfigError::IdentityMismatch {
                name: spec.name.clone(),
                expected: spec.name.clone(),
                actual: "template1".into(),
            }
            .into());
        }
        Ok(())
    }

    async fn release(&self, spec: &BackendSpec, _resource: FakeResource) -> Result<(), GatewayError> {
        self.released.lock().unwrap().push(spec.name.clone());
        if self.fail_release.contains(&spec.name) {
            return Err(GatewayError::Connect {
                name: spec.name.clone(),
                message: "scripted release failure".into(),
            });
        }
        Ok(())
    }
}

/// Binds every resolved capability name to an operation that reports which
/// backend served it.
pub struct StubProvider;

#[async_trait]
impl CapabilityProvider<FakeResource> for StubProvider {
    async fn bind(
        &self,
        spec: &BackendSpec,
        _resource: &FakeResource,
        capabilities: &[&'static str],
    ) -> Result<CapabilitySet, GatewayError> {
        let mut set = CapabilitySet::new();
        for &name in capabilities {
            let backend = spec.name.clone();
            set.insert(
                name,
                Arc::new(move |arguments: Value| -> OperationFuture {
                    let backend = backend.clone();
                    Box::pin(async move {
                        Ok(json!({
                            "backend": backend,
                            "operation": name,
                            "arguments": arguments,
                        }))
                    })
                }),
            );
        }
        Ok(set)
    }
}

pub fn spec(name: &str, mount_mode: MountMode, role: Role, access_mode: AccessMode) -> BackendSpec {
    BackendSpec {
        name: name.to_string(),
        connection_uri: SecretUri::new(format!("postgresql://localhost/{name}")),
        role,
        access_mode,
        mount_mode,
        transport: None,
        pool_min_size: 1,
        pool_max_size: 5,
        connect_timeout_secs: 10,
    }
}

pub fn composed(name: &str) -> BackendSpec {
    spec(name, MountMode::Composed, Role::User, AccessMode::Restricted)
}
