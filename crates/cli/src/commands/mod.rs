pub mod ask;
pub mod config_cmd;
pub mod index;
pub mod plan;
pub mod search;
pub mod serve;

use scholar_config::AppConfig;
use std::path::Path;

/// Load the configuration or explain where it was looked for.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    tracing::debug!(path = ?path, "Loading configuration");
    AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}").into())
}
