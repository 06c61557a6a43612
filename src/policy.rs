//! Access policy table: pure lookup from (role, access_mode) to the
//! capability-name set and permitted SQL write level.

use crate::config::{AccessMode, Role};
use crate::error::ConfigError;
use serde::Serialize;

/// Every capability the gateway can expose, in registration order.
pub const ALL_CAPABILITIES: &[&str] = &[
    "list_schemas",
    "list_objects",
    "get_object_details",
    "explain_query",
    "execute_sql",
    "analyze_workload_indexes",
    "analyze_query_indexes",
    "analyze_db_health",
    "get_top_queries",
];

/// Capabilities reserved for the full role.
pub const EXTENDED_CAPABILITIES: &[&str] = &[
    "list_schemas",
    "analyze_workload_indexes",
    "analyze_query_indexes",
    "analyze_db_health",
    "get_top_queries",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteLevel {
    ReadOnly,
    /// DML permitted, no schema changes.
    ReadWrite,
    /// Schema changes allowed.
    Full,
}

#[derive(Clone, Debug)]
pub struct AccessPolicy {
    pub capabilities: Vec<&'static str>,
    pub write_level: WriteLevel,
}

/// Total over the four valid (role, access_mode) combinations. Invalid
/// combinations cannot be represented once the strings have parsed; see
/// [`resolve_named`] for the fallible string entry point.
pub fn resolve(role: Role, access_mode: AccessMode) -> AccessPolicy {
    let capabilities: Vec<&'static str> = match role {
        Role::Full => ALL_CAPABILITIES.to_vec(),
        Role::User => ALL_CAPABILITIES
            .iter()
            .copied()
            .filter(|c| !EXTENDED_CAPABILITIES.contains(c))
            .collect(),
    };
    let write_level = match (role, access_mode) {
        (_, AccessMode::Restricted) => WriteLevel::ReadOnly,
        (Role::User, AccessMode::Unrestricted) => WriteLevel::ReadWrite,
        (Role::Full, AccessMode::Unrestricted) => WriteLevel::Full,
    };
    AccessPolicy {
        capabilities,
        write_level,
    }
}

/// Resolve from raw strings; unknown values fail before any connection is
/// attempted.
pub fn resolve_named(role: &str, access_mode: &str) -> Result<AccessPolicy, ConfigError> {
    Ok(resolve(role.parse()?, access_mode.parse()?))
}
