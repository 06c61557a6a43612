//! Demo gateway: loads settings from a JSON file (CONFIG_PATH, default
//! config.json) and serves with a placeholder capability provider that echoes
//! the call. A real deployment supplies its own `CapabilityProvider`.

use async_trait::async_trait;
use pg_gateway::{
    load_settings, BackendSpec, CapabilityProvider, CapabilitySet, Gateway, GatewayError,
    PgConnector,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct EchoProvider;

#[async_trait]
impl CapabilityProvider<PgPool> for EchoProvider {
    async fn bind(
        &self,
        spec: &BackendSpec,
        _pool: &PgPool,
        capabilities: &[&'static str],
    ) -> Result<CapabilitySet, GatewayError> {
        let mut set = CapabilitySet::new();
        for &name in capabilities {
            let backend = spec.name.clone();
            set.insert(
                name,
                Arc::new(move |arguments: Value| -> pg_gateway::capability::OperationFuture {
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pg_gateway=info".parse()?))
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".into());
    let settings = load_settings(&config_path).await?;

    Gateway::new(settings, PgConnector, EchoProvider).run().await?;
    Ok(())
}
