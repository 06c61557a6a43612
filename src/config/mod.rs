//! Gateway configuration: settings types and the JSON loader.

mod loader;
mod types;

pub use loader::load_settings;
pub use types::{AccessMode, BackendSpec, MountMode, Role, SecretUri, Settings, Transport};
