use anyhow::{Context, Result};
use reconciler::ResourceInstance;
use std::fs;
use std::path::Path;

/// Load a resource record from a JSON file.
pub fn load(path: &Path) -> Result<ResourceInstance> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid resource record in {}", path.display()))
}

/// Save a resource record as pretty JSON.
pub fn save(path: &Path, instance: &ResourceInstance) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(instance)?;
    fs::write(path, content + "\n").with_context(|| format!("Could not write {}", path.display()))
}
