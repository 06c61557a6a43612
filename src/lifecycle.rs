//! Lifecycle coordination: concurrent backend acquisition, all-or-nothing
//! startup, and guaranteed reverse-acquisition-order teardown.

use crate::capability::{CapabilityProvider, CapabilitySet};
use crate::connector::Connector;
use crate::error::GatewayError;
use crate::policy;
use crate::state::{ProcessState, ServiceStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

/// Uniform startup/shutdown hook carried by every mountable sub-application,
/// so the coordinator never has to introspect. Defaults are no-ops.
#[async_trait]
pub trait AppLifecycle: Send + Sync {
    fn name(&self) -> &str;

    async fn on_start(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// Plain mountable sub-application with the default no-op hooks.
pub struct SubApp {
    name: String,
}

impl SubApp {
    pub fn new(name: impl Into<String>) -> Self {
        SubApp { name: name.into() }
    }
}

#[async_trait]
impl AppLifecycle for SubApp {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Per-resource release errors collected during teardown. Teardown never
/// stops early; everything that can be released is released.
#[derive(Default)]
pub struct ShutdownReport {
    pub errors: Vec<(String, GatewayError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Coordinator<C: Connector> {
    state: Arc<ProcessState<C>>,
    shutdown_signal: watch::Sender<bool>,
    shutdown_done: Mutex<bool>,
}

impl<C: Connector> Coordinator<C> {
    pub fn new(state: Arc<ProcessState<C>>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Coordinator {
            state,
            shutdown_signal: tx,
            shutdown_done: Mutex::new(false),
        }
    }

    pub fn state(&self) -> &Arc<ProcessState<C>> {
        &self.state
    }

    /// Signal shutdown. During startup this cancels the in-flight fan-out;
    /// after startup it stops the serve loop. The signal latches, so it is
    /// never lost to a moment when no receiver is subscribed.
    pub fn trigger_shutdown(&self) {
        self.shutdown_signal.send_replace(true);
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Open, verify and bind every backend concurrently. All-or-nothing:
    /// the first failure (or an external shutdown signal) aborts the rest,
    /// releases everything acquired so far in reverse order, and surfaces
    /// the failure. On success the gateway is marked healthy and the bound
    /// capability sets are returned keyed by backend name.
    pub async fn startup<P>(
        &self,
        provider: Arc<P>,
        apps: &[Arc<dyn AppLifecycle>],
    ) -> Result<HashMap<String, CapabilitySet>, GatewayError>
    where
        P: CapabilityProvider<C::Resource>,
    {
        let mut cancel = self.shutdown_signal.subscribe();
        if *cancel.borrow() {
            return Err(GatewayError::Cancelled);
        }

        tracing::info!(backends = self.state.instances.len(), "starting backend acquisition");

        let mut join: JoinSet<Result<(String, CapabilitySet), (String, GatewayError)>> =
            JoinSet::new();
        for instance in &self.state.instances {
            let instance = Arc::clone(instance);
            let provider = Arc::clone(&provider);
            join.spawn(async move {
                let name = instance.name().to_string();
                let resource = instance.open().await.map_err(|e| (name.clone(), e))?;
                let access = policy::resolve(instance.spec().role, instance.spec().access_mode);
                let set = provider
                    .bind(instance.spec(), &resource, &access.capabilities)
                    .await
                    .map_err(|e| (name.clone(), e))?;
                Ok((name, set))
            });
        }

        let mut bound: HashMap<String, CapabilitySet> = HashMap::new();
        let mut failure: Option<GatewayError> = None;

        while !join.is_empty() && failure.is_none() {
            tokio::select! {
                _ = cancel.changed() => {
                    tracing::info!("shutdown signal during startup, cancelling acquisition");
                    failure = Some(GatewayError::Cancelled);
                }
                next = join.join_next() => match next {
                    Some(Ok(Ok((name, set)))) => {
                        if let Some(instance) = self.state.instance(&name) {
                            let instance = Arc::clone(instance);
                            self.state.stack.push(
                                format!("backend:{name}"),
                                Box::new(move || Box::pin(async move { instance.close().await })),
                            );
                        }
                        tracing::info!(backend = %name, operations = set.len(), "backend ready");
                        bound.insert(name, set);
                    }
                    Some(Ok(Err((name, e)))) => {
                        tracing::error!(backend = %name, error = %e, "backend failed to start");
                        failure = Some(e);
                    }
                    Some(Err(join_err)) => {
                        if !join_err.is_cancelled() {
                            failure = Some(GatewayError::Internal(format!(
                                "startup task panicked: {join_err}"
                            )));
                        }
                    }
                    None => break,
                }
            }
        }

        if let Some(e) = failure {
            join.abort_all();
            while join.join_next().await.is_some() {}
            let report = self.shutdown().await;
            if !report.is_clean() {
                tracing::warn!(errors = report.errors.len(), "teardown after aborted startup reported errors");
            }
            return Err(e);
        }

        // Backends are up; enter every sub-application context, recording
        // its stop hook on the same stack as the pools it sits above.
        for app in apps {
            if let Err(e) = app.on_start().await {
                tracing::error!(app = app.name(), error = %e, "sub-application failed to start");
                let _ = self.shutdown().await;
                return Err(e);
            }
            let app = Arc::clone(app);
            let label = format!("app:{}", app.name());
            self.state
                .stack
                .push(label, Box::new(move || Box::pin(async move { app.on_stop().await })));
        }

        self.state.readiness.set(ServiceStatus::Healthy);
        tracing::info!("all backends ready, gateway serving");
        Ok(bound)
    }

    /// Release every acquired resource in strict reverse acquisition order.
    /// One failed release never prevents attempting the rest. Idempotent:
    /// a second call against a completed or in-progress teardown is a no-op.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut done = self.shutdown_done.lock().await;
        if *done {
            tracing::debug!("shutdown already completed, ignoring");
            return ShutdownReport::default();
        }
        self.state.readiness.set(ServiceStatus::Unhealthy);

        let mut report = ShutdownReport::default();
        for (label, release) in self.state.stack.drain_reversed() {
            tracing::info!(resource = %label, "releasing");
            if let Err(e) = release().await {
                tracing::warn!(resource = %label, error = %e, "release failed");
                report.errors.push((label, e));
            }
        }

        // Instances the stack never saw (startup aborted mid-flight) still
        // get a close attempt; close is idempotent for the rest.
        for instance in &self.state.instances {
            if let Err(e) = instance.close().await {
                tracing::warn!(backend = %instance.name(), error = %e, "close failed");
                report.errors.push((format!("backend:{}", instance.name()), e));
            }
        }

        *done = true;
        tracing::info!(errors = report.errors.len(), "teardown complete");
        report
    }
}
