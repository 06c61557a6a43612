//! Pure routing-topology construction: mount paths, the prefixing rule and
//! per-backend effective transport. Runs strictly before any connection is
//! opened.

use crate::config::{BackendSpec, MountMode, Transport};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Path segment owned by the root management surface.
pub const HEALTH_SEGMENT: &str = "health";

/// Immutable (mount path, backend) pair. `backend: None` is the root
/// sub-application that always exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: String,
    pub backend: Option<String>,
    pub transport: Transport,
}

#[derive(Clone, Debug)]
pub struct Topology {
    /// Separate mounts first, root last, so the root never shadows them.
    pub routes: Vec<RouteEntry>,
    /// Backends merged into the root mount, in spec order.
    pub composed: Vec<String>,
    /// Protocol endpoint path segment (e.g. "mcp").
    pub endpoint: String,
    /// Capability names carry a `{name}_` prefix iff more than one backend.
    pub prefix_capabilities: bool,
    /// Composed backends whose transport override was ignored.
    pub ignored_overrides: Vec<String>,
}

impl Topology {
    pub fn capability_prefix<'a>(&self, backend: &'a str) -> Option<&'a str> {
        self.prefix_capabilities.then_some(backend)
    }

    pub fn route_for(&self, backend: &str) -> Option<&RouteEntry> {
        self.routes
            .iter()
            .find(|r| r.backend.as_deref() == Some(backend))
    }
}

/// Valid as both a path segment and an identifier prefix.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn build(
    specs: &[BackendSpec],
    default_transport: Transport,
    endpoint: &str,
) -> Result<Topology, ConfigError> {
    if !is_valid_name(endpoint) {
        return Err(ConfigError::InvalidEndpoint(endpoint.to_string()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for spec in specs {
        if !is_valid_name(&spec.name) {
            return Err(ConfigError::InvalidName(spec.name.clone()));
        }
        if spec.name == HEALTH_SEGMENT || spec.name == endpoint {
            return Err(ConfigError::ReservedPath(spec.name.clone()));
        }
        if !seen.insert(&spec.name) {
            return Err(ConfigError::DuplicateName(spec.name.clone()));
        }
    }

    let mut routes = Vec::new();
    let mut composed = Vec::new();
    let mut ignored_overrides = Vec::new();
    let mut mounts: HashSet<String> = HashSet::new();

    for spec in specs {
        match spec.mount_mode {
            MountMode::Separate => {
                let path = format!("/{}", spec.name);
                if !mounts.insert(path.clone()) {
                    return Err(ConfigError::MountCollision(path));
                }
                let transport = spec.transport.unwrap_or(default_transport);
                routes.push(RouteEntry {
                    path,
                    backend: Some(spec.name.clone()),
                    transport,
                });
            }
            MountMode::Composed => {
                if let Some(t) = spec.transport {
                    tracing::warn!(
                        backend = %spec.name,
                        transport = t.as_str(),
                        "transport override on composed backend is ineffective"
                    );
                    ignored_overrides.push(spec.name.clone());
                }
                composed.push(spec.name.clone());
            }
        }
    }

    routes.push(RouteEntry {
        path: "/".to_string(),
        backend: None,
        transport: default_transport,
    });

    Ok(Topology {
        routes,
        composed,
        endpoint: endpoint.to_string(),
        prefix_capabilities: specs.len() > 1,
        ignored_overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretUri;

    fn spec(name: &str, mount_mode: MountMode, transport: Option<Transport>) -> BackendSpec {
        BackendSpec {
            name: name.into(),
            connection_uri: SecretUri::new(format!("postgresql://localhost/{name}")),
            role: Default::default(),
            access_mode: Default::default(),
            mount_mode,
            transport,
            pool_min_size: 1,
            pool_max_size: 5,
            connect_timeout_secs: 10,
        }
    }

    #[test]
    fn every_backend_gets_a_non_colliding_mount() {
        let specs = vec![
            spec("a", MountMode::Separate, None),
            spec("b", MountMode::Separate, None),
            spec("c", MountMode::Composed, None),
        ];
        let topology = build(&specs, Transport::Http, "mcp").unwrap();
        // Two separate mounts plus the root.
        assert_eq!(topology.routes.len(), 3);
        assert_eq!(topology.routes[0].path, "/a");
        assert_eq!(topology.routes[1].path, "/b");
        assert_eq!(topology.routes.last().unwrap().path, "/");
        assert_eq!(topology.composed, vec!["c"]);
    }

    #[test]
    fn prefixing_applies_iff_more_than_one_backend() {
        let one = build(&[spec("solo", MountMode::Composed, None)], Transport::Http, "mcp").unwrap();
        assert!(!one.prefix_capabilities);
        assert_eq!(one.capability_prefix("solo"), None);

        let two = build(
            &[
                spec("a", MountMode::Composed, None),
                spec("b", MountMode::Separate, None),
            ],
            Transport::Http,
            "mcp",
        )
        .unwrap();
        assert!(two.prefix_capabilities);
        assert_eq!(two.capability_prefix("a"), Some("a"));
    }

    #[test]
    fn duplicate_names_fail_at_build_time() {
        let specs = vec![
            spec("db", MountMode::Composed, None),
            spec("db", MountMode::Separate, None),
        ];
        assert!(matches!(
            build(&specs, Transport::Http, "mcp"),
            Err(ConfigError::DuplicateName(_))
        ));
    }

    #[test]
    fn reserved_root_paths_are_rejected() {
        assert!(matches!(
            build(&[spec("health", MountMode::Separate, None)], Transport::Http, "mcp"),
            Err(ConfigError::ReservedPath(_))
        ));
        assert!(matches!(
            build(&[spec("mcp", MountMode::Separate, None)], Transport::Http, "mcp"),
            Err(ConfigError::ReservedPath(_))
        ));
    }

    #[test]
    fn invalid_path_segment_names_are_rejected() {
        assert!(matches!(
            build(&[spec("1db", MountMode::Composed, None)], Transport::Http, "mcp"),
            Err(ConfigError::InvalidName(_))
        ));
        let mut bad = spec("ok", MountMode::Composed, None);
        bad.name = "a/b".into();
        assert!(matches!(
            build(&[bad], Transport::Http, "mcp"),
            Err(ConfigError::InvalidName(_))
        ));
    }

    #[test]
    fn separate_override_wins_composed_override_is_ignored() {
        let specs = vec![
            spec("sep", MountMode::Separate, Some(Transport::StreamableHttp)),
            spec("comp", MountMode::Composed, Some(Transport::StreamableHttp)),
        ];
        let topology = build(&specs, Transport::Http, "mcp").unwrap();
        assert_eq!(topology.route_for("sep").unwrap().transport, Transport::StreamableHttp);
        assert_eq!(topology.ignored_overrides, vec!["comp"]);
        // Root keeps the global default.
        assert_eq!(topology.routes.last().unwrap().transport, Transport::Http);
    }

    #[test]
    fn separate_backend_without_override_uses_global_default() {
        let specs = vec![spec("sep", MountMode::Separate, None), spec("x", MountMode::Composed, None)];
        let topology = build(&specs, Transport::StreamableHttp, "mcp").unwrap();
        assert_eq!(topology.route_for("sep").unwrap().transport, Transport::StreamableHttp);
    }
}
