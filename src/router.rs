//! Request dispatch over the finished topology. Mechanical: axum nesting
//! gives longest-prefix matching, unmatched paths fall through to a JSON
//! not-found body.

use crate::capability::CapabilitySet;
use crate::error::GatewayError;
use crate::state::{Readiness, ServiceStatus};
use crate::topology::Topology;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct HealthState {
    service: String,
    readiness: Readiness,
}

#[derive(Clone)]
struct MountState {
    ops: Arc<CapabilitySet>,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: String,
}

#[derive(Deserialize)]
struct CallRequest {
    operation: String,
    #[serde(default)]
    arguments: Value,
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let status = state.readiness.get();
    let code = match status {
        ServiceStatus::Healthy => StatusCode::OK,
        ServiceStatus::Starting | ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        code,
        Json(HealthBody {
            status: status.as_str(),
            service: state.service,
        }),
    )
}

async fn list_operations(State(state): State<MountState>) -> Json<Value> {
    Json(serde_json::json!({ "operations": state.ops.names() }))
}

async fn call_operation(
    State(state): State<MountState>,
    Json(req): Json<CallRequest>,
) -> Result<Json<Value>, GatewayError> {
    let Some(op) = state.ops.get(&req.operation) else {
        return Err(GatewayError::NotFound(format!("operation '{}'", req.operation)));
    };
    let result = op
        .call(req.arguments)
        .await
        .map_err(|e| match e {
            // A lost connection after Ready is local to this request.
            GatewayError::Db(err) => GatewayError::Operation(req.operation.clone(), err.to_string()),
            other => other,
        })?;
    Ok(Json(result))
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound("no such route".into())
}

fn mount_router(endpoint: &str, ops: CapabilitySet) -> Router {
    let state = MountState { ops: Arc::new(ops) };
    Router::new()
        .route(
            &format!("/{endpoint}"),
            get(list_operations).post(call_operation),
        )
        .with_state(state)
}

/// Assemble the serving router from the topology and the capability sets
/// bound during startup. Composed backends merge (prefixed per the topology
/// rule) into the root mount; separate backends get their own path.
pub fn build_router(
    service: &str,
    topology: &Topology,
    mut bound: HashMap<String, CapabilitySet>,
    readiness: Readiness,
) -> Router {
    let mut root_ops = CapabilitySet::new();
    for name in &topology.composed {
        let set = bound.remove(name).unwrap_or_default();
        match topology.capability_prefix(name) {
            Some(prefix) => root_ops.merge(set.prefixed(prefix)),
            None => root_ops.merge(set),
        }
    }

    let mut router = Router::new();
    for route in &topology.routes {
        let Some(backend) = route.backend.as_deref() else {
            continue;
        };
        let set = bound.remove(backend).unwrap_or_default();
        let set = match topology.capability_prefix(backend) {
            Some(prefix) => set.prefixed(prefix),
            None => set,
        };
        tracing::info!(
            backend = %backend,
            path = %format!("{}/{}", route.path, topology.endpoint),
            transport = route.transport.as_str(),
            operations = set.len(),
            "separate endpoint mounted"
        );
        router = router.nest(&route.path, mount_router(&topology.endpoint, set));
    }

    tracing::info!(
        path = %format!("/{}", topology.endpoint),
        operations = root_ops.len(),
        "root endpoint mounted"
    );

    router
        .merge(mount_router(&topology.endpoint, root_ops))
        .route(
            "/health",
            get(health).with_state(HealthState {
                service: service.to_string(),
                readiness,
            }),
        )
        .fallback(not_found)
}
