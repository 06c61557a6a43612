//! Load settings from a JSON file. Source precedence (env/CLI merging) is the
//! caller's concern; this only turns one document into a `Settings`.

use crate::config::Settings;
use crate::error::ConfigError;
use std::path::Path;

pub async fn load_settings(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let settings: Settings = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if settings.backends.is_empty() {
        return Err(ConfigError::Load("at least one backend required".into()));
    }
    Ok(settings)
}
