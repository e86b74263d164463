//! `multiverse diff` - would the host see a change between two snapshots?

use anyhow::{Context as _, Result};
use colored::Colorize;
use reconciler::{ConfigDiff, suppress};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::config::expand_path;
use crate::ui;

pub fn run(ctx: &Context, old: &Path, new: &Path) -> Result<()> {
    let old_text = read(old)?;
    let new_text = read(new)?;

    if suppress(&old_text, &new_text) {
        if !ctx.quiet {
            ui::success("No significant changes (computed fields ignored)");
        }
        return Ok(());
    }

    let diff = ConfigDiff::between(&old_text, &new_text);
    ui::header(&format!("{} field(s) differ", diff.total()));

    for (name, value) in &diff.added {
        println!("  {} {name}: {value}", "+".green());
    }
    for (name, value) in &diff.removed {
        println!("  {} {name}: {value}", "-".red());
    }
    for change in &diff.changed {
        println!(
            "  {} {}: {} → {}",
            "~".yellow(),
            change.name,
            change.old.to_string().red(),
            change.new.to_string().green()
        );
    }

    if diff.total() == 0 {
        // Same fields, but one side could not be decoded
        ui::warn("One of the snapshots could not be decoded");
    }

    if ctx.verbose > 0 {
        println!();
        show_text_diff(&pretty(&diff_side(&old_text)), &pretty(&diff_side(&new_text)));
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    let path = expand_path(path);
    fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))
}

fn diff_side(text: &str) -> Map<String, Value> {
    let mut map = reconciler::decode_map(text.as_bytes()).unwrap_or_default();
    map.retain(|name, _| !name.starts_with(reconciler::COMPUTED_MARKER));
    map
}

fn pretty(map: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(map).unwrap_or_default() + "\n"
}

fn show_text_diff(old: &str, new: &str) {
    let diff = similar::TextDiff::from_lines(old, new);

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => print!("    {}", format!("- {change}").red()),
            similar::ChangeTag::Insert => print!("    {}", format!("+ {change}").green()),
            similar::ChangeTag::Equal => print!("      {}", change.to_string().dimmed()),
        }
    }
}
