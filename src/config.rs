use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the provider configuration file
pub const PROVIDER_CONFIG_VAR: &str = "MULTIVERSE_PROVIDER_CONFIG";

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// Load provider-level defaults.
///
/// The file may be JSON, YAML or TOML. No path means no defaults, in which
/// case every resource must carry its own parameters.
pub fn load_provider(path: Option<&Path>) -> Result<Option<Value>> {
    let Some(path) = path else {
        log::debug!("no provider configuration given");
        return Ok(None);
    };

    let path = expand_path(path);
    let content =
        fs::read(&path).with_context(|| format!("Could not read {}", path.display()))?;
    let map = reconciler::decode_map(&content)
        .with_context(|| format!("Invalid provider configuration in {}", path.display()))?;

    log::debug!("loaded {} provider defaults from {}", map.len(), path.display());
    Ok(Some(Value::Object(map)))
}
