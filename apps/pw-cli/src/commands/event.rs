// event.rs - Life event subcommands: declare, apply, cancel, resolve, list.
//
// Declarations from flags are turned into the same JSON payload a file would
// carry, so both paths go through one validation.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use pw_life_events::ImpactReport;
use serde_json::json;
use uuid::Uuid;

use super::{truncate, Context};

#[derive(Subcommand)]
pub enum EventCommands {
    /// Declare a life event, from a JSON file or from flags.
    Declare {
        /// JSON payload to ingest; all other flags are ignored.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Event category (e.g., "relocation", "new_baby").
        #[arg(long = "type", required_unless_present = "file")]
        event_type: Option<String>,
        /// blocks, derails, invalidates, transforms or cascades.
        #[arg(long, required_unless_present = "file")]
        impact: Option<String>,
        /// Affected goal; repeat for several.
        #[arg(long = "goal")]
        goals: Vec<Uuid>,
        /// temporary, indefinite or permanent.
        #[arg(long, default_value = "indefinite")]
        duration: String,
        /// What ends a temporary event.
        #[arg(long)]
        resolution: Option<String>,
        /// Note attached to goals flagged by a transforms event.
        #[arg(long)]
        note: Option<String>,
        /// Declare as anticipated instead of occurred.
        #[arg(long)]
        anticipated: bool,
        /// Expected date of an anticipated event (YYYY-MM-DD).
        #[arg(long)]
        expected: Option<NaiveDate>,
    },
    /// Apply an event (marks an anticipated event as occurred).
    Apply {
        id: Uuid,
    },
    /// Cancel an anticipated event.
    Cancel {
        id: Uuid,
    },
    /// Mark a temporary or indefinite event as over.
    Resolve {
        id: Uuid,
    },
    /// List declared events.
    List,
}

pub fn execute(cmd: &EventCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        EventCommands::Declare {
            file,
            event_type,
            impact,
            goals,
            duration,
            resolution,
            note,
            anticipated,
            expected,
        } => {
            let payload = match file {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => {
                    let impact_type = impact.as_deref().unwrap_or_default();
                    let mut impact_block = if impact_type == "cascades" {
                        let effects: Vec<_> = goals.iter().map(|g| json!({ "goal_id": g })).collect();
                        json!({ "impact_type": impact_type, "effects": effects })
                    } else {
                        json!({ "impact_type": impact_type, "goals": goals })
                    };
                    if let Some(note) = note {
                        impact_block["note"] = json!(note);
                    }

                    let now = Utc::now();
                    let mut payload = json!({
                        "id": Uuid::new_v4(),
                        "type": event_type.as_deref().unwrap_or_default(),
                        "status": if *anticipated { "anticipated" } else { "occurred" },
                        "duration_type": duration,
                        "impact": impact_block,
                        "declared_at": now,
                    });
                    if !*anticipated {
                        payload["occurred_at"] = json!(now);
                    }
                    if let Some(text) = resolution {
                        payload["resolution"] = json!({ "description": text });
                    }
                    if let Some(date) = expected.and_then(|d| d.and_hms_opt(0, 0, 0)) {
                        payload["expected_date"] = json!(date.and_utc());
                    }
                    payload
                }
            };

            let report = ctx.planner.declare_life_event_json(&ctx.household, payload)?;
            print_report("Life event declared", &report);
            Ok(())
        }
        EventCommands::Apply { id } => {
            let report = ctx.planner.apply_life_event(&ctx.household, *id)?;
            print_report("Life event applied", &report);
            Ok(())
        }
        EventCommands::Cancel { id } => {
            ctx.planner.cancel_life_event(&ctx.household, *id)?;
            println!("Life event cancelled: {}", id);
            Ok(())
        }
        EventCommands::Resolve { id } => {
            let resolution = ctx.planner.resolve_life_event(&ctx.household, *id)?;
            println!(
                "Life event resolved: {} ({} goal(s) re-evaluated, {} transition(s))",
                id,
                resolution.affected.len(),
                resolution.transitions
            );
            Ok(())
        }
        EventCommands::List => {
            let events = ctx.planner.life_events(&ctx.household)?;
            if events.is_empty() {
                println!("No life events.");
                return Ok(());
            }
            println!("{:<38} {:<20} {:<12} {:<12} {:<10}", "ID", "TYPE", "IMPACT", "STATUS", "DURATION");
            println!("{}", "-".repeat(96));
            for e in &events {
                let resolved = if e.resolved_at.is_some() { " (resolved)" } else { "" };
                println!(
                    "{:<38} {:<20} {:<12} {:<12} {:<10}{}",
                    e.id,
                    truncate(&e.event_type, 18),
                    e.impact.impact_type(),
                    e.status.to_string(),
                    e.duration_type.to_string(),
                    resolved
                );
            }
            Ok(())
        }
    }
}

fn print_report(headline: &str, report: &ImpactReport) {
    println!("{}: {}", headline, report.event_id);
    println!("  Goals affected: {}", report.goals_affected.len());
    println!("  Transitions:    {}", report.transitions_applied);
    if report.ceremony_triggered {
        println!("  Emergency retrospective requested.");
    }
    if !report.skipped.is_empty() {
        println!("  Skipped goals:  {}", report.skipped.len());
        for id in &report.skipped {
            println!("    {}", id);
        }
    }
}
