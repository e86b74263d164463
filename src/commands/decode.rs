use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::expand_path;

/// Print the canonical JSON of a configuration file
pub fn run(file: &Path) -> Result<()> {
    let path = expand_path(file);
    let content = fs::read(&path).with_context(|| format!("Could not read {}", path.display()))?;
    let canonical = reconciler::decode(&content)
        .with_context(|| format!("Could not decode {}", path.display()))?;
    println!("{}", String::from_utf8_lossy(&canonical));
    Ok(())
}
