//! Opaque named-operation sets and the provider seam that binds them.

use crate::config::BackendSpec;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type OperationFuture = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

/// One named action exposed by a backend. The gateway never looks inside.
pub trait Operation: Send + Sync {
    fn call(&self, arguments: Value) -> OperationFuture;
}

impl<F> Operation for F
where
    F: Fn(Value) -> OperationFuture + Send + Sync,
{
    fn call(&self, arguments: Value) -> OperationFuture {
        self(arguments)
    }
}

/// Ordered map from operation name to its handler.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    ops: BTreeMap<String, Arc<dyn Operation>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        CapabilitySet::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, op: Arc<dyn Operation>) {
        self.ops.insert(name.into(), op);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.ops.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.ops.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// New set with every name rewritten to `{prefix}_{name}`.
    pub fn prefixed(&self, prefix: &str) -> CapabilitySet {
        let ops = self
            .ops
            .iter()
            .map(|(name, op)| (format!("{}_{}", prefix, name), Arc::clone(op)))
            .collect();
        CapabilitySet { ops }
    }

    /// Absorb another set. Names are expected to be disjoint already
    /// (backend names are unique and prefixing keeps them apart); a
    /// duplicate keeps the incoming handler.
    pub fn merge(&mut self, other: CapabilitySet) {
        self.ops.extend(other.ops);
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilitySet").field(&self.names()).finish()
    }
}

/// External collaborator that turns (spec, live resource, resolved names)
/// into a bound operation set. Query execution, SQL safety and analyzers
/// all live behind this seam.
#[async_trait]
pub trait CapabilityProvider<R>: Send + Sync + 'static {
    async fn bind(
        &self,
        spec: &BackendSpec,
        resource: &R,
        capabilities: &[&'static str],
    ) -> Result<CapabilitySet, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_op(name: &'static str) -> Arc<dyn Operation> {
        Arc::new(move |args: Value| -> OperationFuture {
            Box::pin(async move { Ok(json!({"operation": name, "arguments": args})) })
        })
    }

    #[test]
    fn prefixed_rewrites_every_name() {
        let mut set = CapabilitySet::new();
        set.insert("execute_sql", echo_op("execute_sql"));
        set.insert("list_objects", echo_op("list_objects"));
        let prefixed = set.prefixed("app1");
        assert_eq!(prefixed.names(), vec!["app1_execute_sql", "app1_list_objects"]);
        assert!(prefixed.get("execute_sql").is_none());
    }

    #[tokio::test]
    async fn merged_sets_dispatch_to_the_right_backend() {
        let mut root = CapabilitySet::new();
        root.merge(CapabilitySet::new());
        let mut a = CapabilitySet::new();
        a.insert("op", echo_op("a"));
        root.merge(a.prefixed("app1"));
        let mut b = CapabilitySet::new();
        b.insert("op", echo_op("b"));
        root.merge(b.prefixed("app2"));

        assert_eq!(root.len(), 2);
        let result = root.get("app2_op").unwrap().call(json!({})).await.unwrap();
        assert_eq!(result["operation"], "b");
    }
}
