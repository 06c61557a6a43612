//! Gateway assembly: topology build, coordinated startup, the serve loop and
//! guaranteed teardown.

use crate::capability::CapabilityProvider;
use crate::config::Settings;
use crate::connector::Connector;
use crate::error::GatewayError;
use crate::instance::BackendInstance;
use crate::lifecycle::{AppLifecycle, Coordinator, SubApp};
use crate::router::build_router;
use crate::state::ProcessState;
use crate::topology;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Gateway<C: Connector, P> {
    settings: Settings,
    connector: Arc<C>,
    provider: Arc<P>,
}

impl<C, P> Gateway<C, P>
where
    C: Connector,
    P: CapabilityProvider<C::Resource>,
{
    pub fn new(settings: Settings, connector: C, provider: P) -> Self {
        Gateway {
            settings,
            connector: Arc::new(connector),
            provider: Arc::new(provider),
        }
    }

    /// Run to completion: validate topology, acquire every backend, serve
    /// until a shutdown signal, then release everything in reverse order.
    pub async fn run(self) -> Result<(), GatewayError> {
        // Routing decisions and all configuration checks come first, before
        // any connection is opened.
        let topology = topology::build(
            &self.settings.backends,
            self.settings.transport,
            &self.settings.endpoint,
        )?;

        let instances = self
            .settings
            .backends
            .iter()
            .cloned()
            .map(|spec| Arc::new(BackendInstance::new(spec, Arc::clone(&self.connector))))
            .collect();
        let state = Arc::new(ProcessState::new(instances, topology));
        let coordinator = Arc::new(Coordinator::new(Arc::clone(&state)));

        {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, shutting down");
                    coordinator.trigger_shutdown();
                }
            });
        }

        // Root app always exists; separate backends each carry their own
        // sub-application context.
        let mut apps: Vec<Arc<dyn AppLifecycle>> = vec![Arc::new(SubApp::new("root"))];
        for route in &state.topology.routes {
            if let Some(backend) = &route.backend {
                apps.push(Arc::new(SubApp::new(backend.clone())));
            }
        }

        let bound = match coordinator.startup(Arc::clone(&self.provider), &apps).await {
            Ok(bound) => bound,
            Err(e) => {
                tracing::error!(error = %e, "startup failed, not serving");
                return Err(e);
            }
        };

        let app = build_router(
            &self.settings.name,
            &state.topology,
            bound,
            state.readiness.clone(),
        );

        // Everything after a successful startup exits through the
        // coordinator's teardown, a failed bind included.
        let serve_result = serve(&self.settings, app, &coordinator).await;

        let report = coordinator.shutdown().await;
        for (resource, error) in &report.errors {
            tracing::warn!(resource = %resource, error = %error, "release error during shutdown");
        }

        serve_result
    }
}

async fn serve<C: Connector>(
    settings: &Settings,
    app: Router,
    coordinator: &Coordinator<C>,
) -> Result<(), GatewayError> {
    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        endpoint = %settings.endpoint,
        "listening"
    );

    let mut shutdown = coordinator.shutdown_receiver();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // The signal may have latched before this receiver existed.
            if !*shutdown.borrow_and_update() {
                let _ = shutdown.changed().await;
            }
        })
        .await
        .map_err(GatewayError::Io)
}
