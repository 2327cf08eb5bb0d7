// metrics.rs - Metrics subcommands: refresh.

use clap::Subcommand;

use super::Context;

#[derive(Subcommand)]
pub enum MetricsCommands {
    /// Re-read `.planwise/metrics.toml` values into resource dependencies.
    Refresh,
}

pub fn execute(cmd: &MetricsCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        MetricsCommands::Refresh => {
            let resolution = ctx.planner.refresh_metrics(&ctx.household)?;
            println!(
                "Metrics refreshed: {} goal(s) re-evaluated, {} transition(s).",
                resolution.affected.len(),
                resolution.transitions
            );
            Ok(())
        }
    }
}
