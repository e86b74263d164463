//! `multiverse run` - one lifecycle event against one record

use anyhow::{Context as _, Result};
use reconciler::{EffectiveParameters, Event, Outcome, Provider, ResourceInstance};

use crate::Context;
use crate::cli::RunArgs;
use crate::commands::report_failure;
use crate::{config, state, ui};

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let defaults = config::load_provider(args.provider.provider.as_deref())?;
    let instance = state::load(&args.state)?;
    let provider = Provider::new(defaults);

    if args.dry_run {
        let params = provider.parameters(args.event, &instance).map_err(|e| {
            report_failure(ctx, &e);
            e
        })?;
        show_parameters(args.event, &instance, &params);
        return Ok(());
    }

    let outcome = provider
        .call(args.event, &instance)
        .map_err(|e| {
            report_failure(ctx, &e);
            e
        })
        .with_context(|| format!("{} failed for {}", args.event, args.state.display()))?;

    match outcome {
        Outcome::Exists(exists) => println!("{exists}"),
        Outcome::Applied(updated) => match &args.output {
            Some(path) => {
                state::save(path, &updated)?;
                if !ctx.quiet {
                    ui::success(&format!(
                        "{} {} -> {}",
                        args.event,
                        describe(&updated),
                        path.display()
                    ));
                }
            }
            None => println!("{}", serde_json::to_string_pretty(&updated)?),
        },
    }

    Ok(())
}

fn describe(instance: &ResourceInstance) -> String {
    if instance.has_identity() {
        format!("'{}'", instance.identity)
    } else {
        "(no identity)".to_string()
    }
}

fn show_parameters(event: Event, instance: &ResourceInstance, params: &EffectiveParameters) {
    ui::header(&format!("{event} {}", describe(instance)));
    for (name, value) in params.string_entries() {
        ui::kv(name, value);
    }
    if !params.environment.is_empty() {
        ui::section("environment");
        for (name, value) in &params.environment {
            ui::kv(name, value);
        }
    }
    if !params.computed.is_empty() {
        ui::section("computed");
        for name in &params.computed {
            ui::dim(name);
        }
    }
}
