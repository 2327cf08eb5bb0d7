// dep.rs - Dependency subcommands: add, remove, override, readiness, list.

use chrono::Utc;
use clap::Subcommand;
use pw_graph::{Dependency, DependencyKind};
use uuid::Uuid;

use super::Context;

#[derive(Subcommand)]
pub enum DepCommands {
    /// Make a goal wait on another goal, a life event, or a resource level.
    Add {
        /// The goal being held back.
        blocked: Uuid,
        /// Goal that must be achieved first.
        #[arg(long, conflicts_with_all = ["awaits", "resource"])]
        requires: Option<Uuid>,
        /// Make the goal edge a recommendation that can be overridden.
        #[arg(long, requires = "requires")]
        recommended: bool,
        /// Life event that must clear first.
        #[arg(long, conflicts_with = "resource")]
        awaits: Option<Uuid>,
        /// Resource name (e.g., "savings").
        #[arg(long, requires = "threshold")]
        resource: Option<String>,
        /// Minimum resource level.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Remove a dependency.
    Remove {
        id: Uuid,
    },
    /// Override a recommended dependency so it no longer blocks.
    Override {
        id: Uuid,
    },
    /// Show whether a goal can commit, and what it waits on.
    Readiness {
        goal: Uuid,
    },
    /// List all dependencies.
    List,
}

pub fn execute(cmd: &DepCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        DepCommands::Add {
            blocked,
            requires,
            recommended,
            awaits,
            resource,
            threshold,
        } => {
            let now = Utc::now();
            let dep = match (requires, awaits, resource) {
                (Some(req), _, _) if *recommended => Dependency::recommended(*blocked, *req, now),
                (Some(req), _, _) => Dependency::prerequisite(*blocked, *req, now),
                (None, Some(event), _) => Dependency::life_event(*blocked, *event, now),
                (None, None, Some(name)) => {
                    let threshold = threshold
                        .ok_or_else(|| anyhow::anyhow!("--resource needs --threshold"))?;
                    Dependency::resource(*blocked, name.clone(), threshold, now)
                }
                (None, None, None) => {
                    anyhow::bail!("one of --requires, --awaits or --resource is required")
                }
            };
            let stored = ctx.planner.add_dependency(&ctx.household, dep)?;
            println!("Dependency added: {} ({}, {})", stored.id, stored.kind.type_name(), stored.status);
            Ok(())
        }
        DepCommands::Remove { id } => {
            ctx.planner.remove_dependency(&ctx.household, *id)?;
            println!("Dependency removed: {}", id);
            Ok(())
        }
        DepCommands::Override { id } => {
            ctx.planner.override_dependency(&ctx.household, *id)?;
            println!("Dependency overridden: {}", id);
            Ok(())
        }
        DepCommands::Readiness { goal } => {
            let readiness = ctx.planner.get_readiness(&ctx.household, *goal)?;
            if readiness.satisfied {
                println!("Goal {} is ready to commit.", goal);
            } else {
                println!("Goal {} is waiting on {} dependency(ies):", goal, readiness.unsatisfied.len());
                for dep in &readiness.unsatisfied {
                    println!("  {}  {}", dep.id, describe(&dep.kind));
                }
            }
            Ok(())
        }
        DepCommands::List => {
            let deps = ctx.planner.dependencies(&ctx.household)?;
            if deps.is_empty() {
                println!("No dependencies.");
                return Ok(());
            }
            println!("{:<38} {:<38} {:<10} {}", "ID", "BLOCKED GOAL", "STATUS", "ON");
            println!("{}", "-".repeat(110));
            for dep in &deps {
                println!(
                    "{:<38} {:<38} {:<10} {}",
                    dep.id,
                    dep.blocked_goal,
                    dep.status.to_string(),
                    describe(&dep.kind)
                );
            }
            Ok(())
        }
    }
}

fn describe(kind: &DependencyKind) -> String {
    match kind {
        DependencyKind::Prerequisite { requires_goal } => format!("prerequisite {}", requires_goal),
        DependencyKind::Recommended {
            requires_goal,
            overridden,
        } => format!(
            "recommended {}{}",
            requires_goal,
            if *overridden { " (overridden)" } else { "" }
        ),
        DependencyKind::LifeEvent { awaits_event } => format!("life event {}", awaits_event),
        DependencyKind::Resource {
            resource,
            threshold,
            current,
        } => match current {
            Some(value) => format!("{} {}/{}", resource, value, threshold),
            None => format!("{} (no measurement)/{}", resource, threshold),
        },
    }
}
