//! # pw
//!
//! Command-line front end for Planwise household planning:
//! - `pw goal create/list/show/commit-plan/transition/retro/ack` - goals and their lifecycle
//! - `pw dep add/remove/override/readiness/list` - dependencies between goals, events and resources
//! - `pw event declare/apply/cancel/resolve/list` - life events and their impact
//! - `pw metrics refresh` - re-read resource measurements
//! - `pw audit` - season audit of the household plan

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pw_service::{Planner, PlannerConfig};
use tracing_subscriber::EnvFilter;

use commands::Context;

/// Planwise: goals, dependencies and life events for a household.
#[derive(Parser)]
#[command(name = "pw", version, about)]
struct Cli {
    /// Directory holding the `.planwise/` state (defaults to current directory).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Household to operate on (defaults to `default_household` in planwise.toml).
    #[arg(long)]
    household: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect and move goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Manage dependencies.
    Dep {
        #[command(subcommand)]
        command: commands::dep::DepCommands,
    },
    /// Declare and apply life events.
    Event {
        #[command(subcommand)]
        command: commands::event::EventCommands,
    },
    /// Resource measurements.
    Metrics {
        #[command(subcommand)]
        command: commands::metrics::MetricsCommands,
    },
    /// Run the season audit.
    Audit {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// `RUST_LOG` plus `info` for every workspace crate.
fn log_filter() -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for krate in ["pw_service", "pw_goal", "pw_life_events", "pw_graph", "pw_audit"] {
        filter = filter.add_directive(format!("{krate}=info").parse()?);
    }
    Ok(filter)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter()?)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let config = PlannerConfig::for_root(&root);
    let settings = config.settings()?;
    let ctx = Context {
        planner: Planner::from_config(&config)?,
        household: cli.household.unwrap_or(settings.default_household),
    };
    tracing::debug!(root = %root.display(), household = %ctx.household, "planner ready");

    match &cli.command {
        Commands::Goal { command } => commands::goal::execute(command, &ctx),
        Commands::Dep { command } => commands::dep::execute(command, &ctx),
        Commands::Event { command } => commands::event::execute(command, &ctx),
        Commands::Metrics { command } => commands::metrics::execute(command, &ctx),
        Commands::Audit { json } => commands::audit::execute(*json, &ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn household_flag_and_event_declare_parse() {
        let goal = uuid::Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "pw",
            "--household",
            "smiths",
            "event",
            "declare",
            "--type",
            "relocation",
            "--impact",
            "derails",
            "--goal",
            goal.as_str(),
        ])
        .unwrap();
        assert_eq!(cli.household.as_deref(), Some("smiths"));
        assert!(matches!(
            cli.command,
            Commands::Event {
                command: commands::event::EventCommands::Declare { .. }
            }
        ));
    }

    #[test]
    fn declare_requires_type_without_file() {
        assert!(Cli::try_parse_from(["pw", "event", "declare", "--impact", "blocks"]).is_err());
    }

    #[test]
    fn log_filter_covers_every_crate() {
        let filter = log_filter().unwrap().to_string();
        for krate in ["pw_service", "pw_goal", "pw_life_events", "pw_graph", "pw_audit"] {
            assert!(filter.contains(&format!("{krate}=info")), "{krate} missing from {filter}");
        }
    }

    #[test]
    fn audit_json_flag() {
        let cli = Cli::try_parse_from(["pw", "audit", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Audit { json: true }));
    }
}
