//! `multiverse refresh` - read many records in parallel
//!
//! Each record is read through its own executor invocation on a rayon pool.
//! Records share the provider but nothing mutable.

use anyhow::{Result, bail};
use colored::Colorize;
use rayon::prelude::*;
use reconciler::{Provider, ResourceInstance};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::RefreshArgs;
use crate::{config, state, ui};

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum RefreshStatus {
    Unchanged,
    Changed,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub path: PathBuf,
    pub identity: String,
    pub status: RefreshStatus,
}

pub fn run(ctx: &Context, args: RefreshArgs) -> Result<()> {
    let defaults = config::load_provider(args.provider.provider.as_deref())?;
    let provider = Provider::new(defaults);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    let reports: Vec<RefreshReport> = pool.install(|| {
        args.states
            .par_iter()
            .map(|path| refresh_one(&provider, path, args.dry_run))
            .collect()
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if !ctx.quiet {
        show_reports(ctx, &reports, args.dry_run);
    }

    let failed = reports
        .iter()
        .filter(|r| matches!(r.status, RefreshStatus::Failed(_)))
        .count();
    if failed > 0 {
        bail!("{} of {} records failed to refresh", failed, reports.len());
    }

    Ok(())
}

/// Read one record and store the result unless `dry_run`.
pub fn refresh_one(provider: &Provider, path: &Path, dry_run: bool) -> RefreshReport {
    let report = |identity: &str, status| RefreshReport {
        path: path.to_path_buf(),
        identity: identity.to_string(),
        status,
    };

    let instance = match state::load(path) {
        Ok(instance) => instance,
        Err(e) => return report("", RefreshStatus::Failed(format!("{e:#}"))),
    };

    if !instance.has_identity() {
        return report("", RefreshStatus::Skipped("not created yet".to_string()));
    }

    let updated = match provider.read(&instance) {
        Ok(updated) => updated,
        Err(e) => {
            log::debug!("read failed for {}: {e}", path.display());
            return report(instance.identity.as_str(), RefreshStatus::Failed(e.to_string()));
        }
    };

    if !has_changed(&instance, &updated) {
        return report(instance.identity.as_str(), RefreshStatus::Unchanged);
    }

    if !dry_run {
        if let Err(e) = state::save(path, &updated) {
            return report(instance.identity.as_str(), RefreshStatus::Failed(format!("{e:#}")));
        }
    }

    report(instance.identity.as_str(), RefreshStatus::Changed)
}

fn has_changed(before: &ResourceInstance, after: &ResourceInstance) -> bool {
    !reconciler::suppress(&before.declared_config, &after.declared_config)
        || before.computed_config != after.computed_config
}

fn show_reports(ctx: &Context, reports: &[RefreshReport], dry_run: bool) {
    for r in reports {
        let name = format!("{} ({})", r.path.display(), r.identity);
        match &r.status {
            RefreshStatus::Unchanged => {
                if ctx.verbose > 0 {
                    ui::dim(&format!("{name} unchanged"));
                }
            }
            RefreshStatus::Changed if dry_run => ui::info(&format!("{name} would change")),
            RefreshStatus::Changed => ui::success(&format!("{name} updated")),
            RefreshStatus::Skipped(reason) => ui::warn(&format!("{name} skipped: {reason}")),
            RefreshStatus::Failed(reason) => ui::error(&format!("{name}: {reason}")),
        }
    }

    let changed = reports
        .iter()
        .filter(|r| r.status == RefreshStatus::Changed)
        .count();
    println!();
    println!(
        "{} {} of {} records changed",
        "→".cyan(),
        changed,
        reports.len()
    );
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use reconciler::AmbientEnvironment;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn provider(dir: &TempDir) -> Provider {
        let script = dir.path().join("albums.sh");
        fs::write(
            &script,
            "case \"$id\" in\n  1) echo '{\"album\": \"white\"}' ;;\n  2) echo '{\"album\": \"abbey road\"}' ;;\n  *) echo \"unknown album $id\" >&2; exit 1 ;;\nesac\n",
        )
        .unwrap();
        let ambient: AmbientEnvironment = std::env::var("PATH")
            .map(|path| vec![("PATH".to_string(), path)])
            .unwrap_or_default()
            .into_iter()
            .collect();
        Provider::new(Some(json!({
            "id_key": "id",
            "executor": "sh",
            "script": script.to_string_lossy(),
        })))
        .with_ambient(ambient)
    }

    fn record(dir: &TempDir, name: &str, identity: &str, config: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut instance = ResourceInstance::new(config);
        instance.identity = identity.to_string();
        state::save(&path, &instance).unwrap();
        path
    }

    #[test]
    fn test_refresh_statuses() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);

        let same = record(&dir, "same.json", "1", "album: white\n");
        let drifted = record(&dir, "drifted.json", "2", r#"{"album": "white"}"#);
        let missing = record(&dir, "missing.json", "3", "{}");
        let fresh = record(&dir, "fresh.json", "", "{}");

        assert_eq!(refresh_one(&provider, &same, false).status, RefreshStatus::Unchanged);
        assert_eq!(refresh_one(&provider, &drifted, false).status, RefreshStatus::Changed);
        assert!(matches!(
            refresh_one(&provider, &missing, false).status,
            RefreshStatus::Failed(ref reason) if reason.contains("unknown album 3")
        ));
        assert!(matches!(
            refresh_one(&provider, &fresh, false).status,
            RefreshStatus::Skipped(_)
        ));

        assert_eq!(
            state::load(&drifted).unwrap().declared_config,
            r#"{"album":"abbey road"}"#
        );
    }

    #[test]
    fn test_dry_run_leaves_records_alone() {
        let dir = TempDir::new().unwrap();
        let provider = provider(&dir);
        let drifted = record(&dir, "drifted.json", "2", r#"{"album": "white"}"#);

        assert_eq!(refresh_one(&provider, &drifted, true).status, RefreshStatus::Changed);
        assert_eq!(
            state::load(&drifted).unwrap().declared_config,
            r#"{"album": "white"}"#
        );
    }

    #[test]
    fn test_unreadable_record_fails() {
        let dir = TempDir::new().unwrap();
        let report = refresh_one(&provider(&dir), &dir.path().join("absent.json"), false);
        assert!(matches!(report.status, RefreshStatus::Failed(_)));
    }
}
