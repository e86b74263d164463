use anyhow::Result;

use crate::Context;
use crate::{bootstrap, ui};

/// List the resource types exposed under the current provider name
pub fn run(ctx: &Context) -> Result<()> {
    let name = bootstrap::current_name();
    let types = bootstrap::current_resource_types(&name);

    if ctx.quiet {
        for t in &types {
            println!("{t}");
        }
        return Ok(());
    }

    ui::header(&format!("Provider {name}"));
    for t in &types {
        ui::dim(t);
    }
    ui::kv("extra types from", &bootstrap::resource_types_var(&name));
    Ok(())
}
