//! Connection acquisition seam. Production backends use [`PgConnector`];
//! tests substitute an in-memory implementation.

use crate::config::BackendSpec;
use crate::error::{ConfigError, GatewayError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Opens, verifies and releases one backend's connection resource.
///
/// `release` is the graceful path. A resource dropped without it (an open
/// task cancelled mid-flight, for instance) must still free its underlying
/// handles on drop, the way a connection pool does.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Resource: Clone + Send + Sync + 'static;

    async fn connect(&self, spec: &BackendSpec) -> Result<Self::Resource, GatewayError>;

    /// Confirm the live resource matches the configured target identity.
    /// A mismatch is a fatal configuration error, not a retryable one.
    async fn verify(&self, spec: &BackendSpec, resource: &Self::Resource) -> Result<(), GatewayError>;

    async fn release(&self, spec: &BackendSpec, resource: Self::Resource) -> Result<(), GatewayError>;
}

/// sqlx-backed connector: one exclusively-owned pool per backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Resource = PgPool;

    async fn connect(&self, spec: &BackendSpec) -> Result<PgPool, GatewayError> {
        PgPoolOptions::new()
            .min_connections(spec.pool_min_size)
            .max_connections(spec.pool_max_size)
            .connect(spec.connection_uri.expose())
            .await
            .map_err(|e| GatewayError::Connect {
                name: spec.name.clone(),
                message: e.to_string(),
            })
    }

    async fn verify(&self, spec: &BackendSpec, pool: &PgPool) -> Result<(), GatewayError> {
        match database_name_from_uri(spec.connection_uri.expose()) {
            Some(expected) => {
                let actual: String = sqlx::query_scalar("SELECT current_database()")
                    .fetch_one(pool)
                    .await?;
                if actual != expected {
                    return Err(ConfigError::IdentityMismatch {
                        name: spec.name.clone(),
                        expected,
                        actual,
                    }
                    .into());
                }
                Ok(())
            }
            // URI carries no database name; a liveness probe is all we can do.
            None => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
        }
    }

    async fn release(&self, spec: &BackendSpec, pool: PgPool) -> Result<(), GatewayError> {
        tracing::debug!(backend = %spec.name, "closing connection pool");
        pool.close().await;
        Ok(())
    }
}

/// Database name from a postgres URI path, if present.
fn database_name_from_uri(uri: &str) -> Option<String> {
    let path_start = uri.rfind('/')? + 1;
    let path_and_query = uri.get(path_start..)?;
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    // "postgresql://host" leaves the scheme's own slashes as the last '/'
    if db_name.is_empty() || db_name.contains('@') || db_name.contains(':') {
        return None;
    }
    Some(db_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_is_extracted_from_uri() {
        assert_eq!(
            database_name_from_uri("postgresql://u:p@localhost:5432/app1"),
            Some("app1".into())
        );
        assert_eq!(
            database_name_from_uri("postgresql://localhost/app2?sslmode=disable"),
            Some("app2".into())
        );
        assert_eq!(database_name_from_uri("postgresql://u:p@localhost:5432/"), None);
        assert_eq!(database_name_from_uri("postgresql://u:p@localhost"), None);
    }
}
