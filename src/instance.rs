//! Backend runtime entity: one exclusively-owned connection resource and its
//! lifecycle state machine.

use crate::config::BackendSpec;
use crate::connector::Connector;
use crate::error::GatewayError;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;

/// Created -> Connecting -> {Ready | Failed} -> Closing -> Closed.
/// Transitions are driven solely by the lifecycle coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Created,
    Connecting,
    Ready,
    Closing,
    Closed,
    Failed,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Created => "created",
            InstanceState::Connecting => "connecting",
            InstanceState::Ready => "ready",
            InstanceState::Closing => "closing",
            InstanceState::Closed => "closed",
            InstanceState::Failed => "failed",
        }
    }
}

struct Inner<R> {
    state: InstanceState,
    resource: Option<R>,
}

pub struct BackendInstance<C: Connector> {
    spec: BackendSpec,
    connector: Arc<C>,
    /// At most one in-flight open/close per instance; concurrent callers
    /// queue here and coalesce onto the completed attempt.
    serial: Mutex<()>,
    /// Never held across an await.
    inner: StdMutex<Inner<C::Resource>>,
}

impl<C: Connector> BackendInstance<C> {
    pub fn new(spec: BackendSpec, connector: Arc<C>) -> Self {
        BackendInstance {
            spec,
            connector,
            serial: Mutex::new(()),
            inner: StdMutex::new(Inner {
                state: InstanceState::Created,
                resource: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    pub fn state(&self) -> InstanceState {
        self.inner.lock().expect("instance lock poisoned").state
    }

    pub fn resource(&self) -> Option<C::Resource> {
        self.inner.lock().expect("instance lock poisoned").resource.clone()
    }

    fn transition(&self, next: InstanceState) {
        let mut inner = self.inner.lock().expect("instance lock poisoned");
        tracing::debug!(backend = %self.spec.name, from = inner.state.as_str(), to = next.as_str(), "state");
        inner.state = next;
    }

    /// Open and verify the connection resource. Idempotent: a caller that
    /// arrives while another open is in flight waits for it and shares the
    /// outcome. Bounded by the configured connect timeout; no internal retry.
    pub async fn open(&self) -> Result<C::Resource, GatewayError> {
        let _guard = self.serial.lock().await;
        match self.state() {
            InstanceState::Ready => {
                // Coalesced with an earlier successful open.
                return self.resource().ok_or_else(|| GatewayError::Internal(
                    format!("backend {} ready without a resource", self.spec.name),
                ));
            }
            InstanceState::Failed => {
                return Err(GatewayError::Connect {
                    name: self.spec.name.clone(),
                    message: "previous open attempt failed".into(),
                });
            }
            InstanceState::Closing | InstanceState::Closed => {
                return Err(GatewayError::InvalidState {
                    name: self.spec.name.clone(),
                    state: self.state().as_str(),
                });
            }
            // Connecting is only observable here if a previous attempt was
            // cancelled mid-flight; the attempt below replaces it.
            InstanceState::Created | InstanceState::Connecting => {}
        }

        self.transition(InstanceState::Connecting);
        let attempt = async {
            let resource = self.connector.connect(&self.spec).await?;
            if let Err(e) = self.connector.verify(&self.spec, &resource).await {
                if let Err(release_err) = self.connector.release(&self.spec, resource).await {
                    tracing::warn!(backend = %self.spec.name, error = %release_err, "release after failed verify");
                }
                return Err(e);
            }
            Ok(resource)
        };

        let timeout = Duration::from_secs(self.spec.connect_timeout_secs);
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(resource)) => {
                {
                    let mut inner = self.inner.lock().expect("instance lock poisoned");
                    inner.resource = Some(resource.clone());
                    inner.state = InstanceState::Ready;
                }
                tracing::debug!(backend = %self.spec.name, "open complete");
                Ok(resource)
            }
            Ok(Err(e)) => {
                self.transition(InstanceState::Failed);
                Err(e)
            }
            Err(_) => {
                self.transition(InstanceState::Failed);
                Err(GatewayError::Timeout {
                    name: self.spec.name.clone(),
                    seconds: self.spec.connect_timeout_secs,
                })
            }
        }
    }

    /// Release the resource exactly once. Idempotent; always attempts the
    /// release even if the instance never reached Ready.
    pub async fn close(&self) -> Result<(), GatewayError> {
        let _guard = self.serial.lock().await;
        let resource = {
            let mut inner = self.inner.lock().expect("instance lock poisoned");
            if inner.state == InstanceState::Closed {
                return Ok(());
            }
            inner.state = InstanceState::Closing;
            inner.resource.take()
        };
        let result = match resource {
            Some(resource) => self.connector.release(&self.spec, resource).await,
            None => Ok(()),
        };
        self.transition(InstanceState::Closed);
        result
    }
}
