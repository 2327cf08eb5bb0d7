// goal.rs - Goal subcommands: create, list, show, commit-plan, transition, retro, ack.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use pw_goal::{Goal, GoalState};
use pw_service::Commitment;
use uuid::Uuid;

use super::{truncate, Context};

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a new goal (starts as a dream).
    Create {
        /// Goal name (e.g., "Run a marathon").
        name: String,
        #[command(flatten)]
        commitment: CommitmentArgs,
    },
    /// List goals in the household.
    List {
        /// Only goals in this state (e.g., "ready", "committed").
        #[arg(long, value_parser = parse_state)]
        state: Option<GoalState>,
    },
    /// Show a goal with its history.
    Show {
        id: Uuid,
    },
    /// Set commitment fields (why, sacrifice, deadline, metrics).
    CommitPlan {
        id: Uuid,
        #[command(flatten)]
        commitment: CommitmentArgs,
    },
    /// Move a goal to another state.
    Transition {
        id: Uuid,
        /// Target state.
        #[arg(value_parser = parse_state)]
        state: GoalState,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Record a retrospective on a finished goal.
    Retro {
        id: Uuid,
        text: String,
    },
    /// Acknowledge a review flag left by a life event.
    Ack {
        id: Uuid,
    },
}

#[derive(Args, Default)]
pub struct CommitmentArgs {
    /// Why this goal matters.
    #[arg(long)]
    why: Option<String>,
    /// What will be given up for it.
    #[arg(long)]
    sacrifice: Option<String>,
    /// Deadline (YYYY-MM-DD).
    #[arg(long)]
    deadline: Option<NaiveDate>,
    /// Success metric; repeat for several.
    #[arg(long = "metric")]
    metrics: Vec<String>,
    /// Quality this goal serves.
    #[arg(long)]
    quality: Option<String>,
    /// How audacious it is.
    #[arg(long)]
    audacity: Option<String>,
}

impl CommitmentArgs {
    fn to_commitment(&self) -> Commitment {
        Commitment {
            quality: self.quality.clone(),
            why: self.why.clone(),
            sacrifice: self.sacrifice.clone(),
            deadline: self.deadline,
            metrics: (!self.metrics.is_empty()).then(|| self.metrics.clone()),
            audacity: self.audacity.clone(),
        }
    }
}

fn parse_state(s: &str) -> Result<GoalState, String> {
    s.parse()
}

pub fn execute(cmd: &GoalCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        GoalCommands::Create { name, commitment } => create_goal(ctx, name, commitment),
        GoalCommands::List { state } => list_goals(ctx, *state),
        GoalCommands::Show { id } => show_goal(ctx, *id),
        GoalCommands::CommitPlan { id, commitment } => {
            let goal = ctx
                .planner
                .set_commitment(&ctx.household, *id, commitment.to_commitment())?;
            println!("Commitment updated for {}", goal.id);
            print_missing(&goal);
            Ok(())
        }
        GoalCommands::Transition { id, state, reason } => {
            let goal = ctx
                .planner
                .transition_goal(&ctx.household, *id, *state, reason)?;
            println!("{} is now {}", goal.name, goal.state());
            Ok(())
        }
        GoalCommands::Retro { id, text } => {
            ctx.planner.record_retrospective(&ctx.household, *id, text)?;
            println!("Retrospective recorded.");
            Ok(())
        }
        GoalCommands::Ack { id } => {
            ctx.planner.acknowledge_review(&ctx.household, *id)?;
            println!("Review acknowledged.");
            Ok(())
        }
    }
}

fn create_goal(ctx: &Context, name: &str, commitment: &CommitmentArgs) -> anyhow::Result<()> {
    let mut goal = ctx.planner.create_goal(&ctx.household, name)?;
    let commitment = commitment.to_commitment();
    if commitment != Commitment::default() {
        goal = ctx.planner.set_commitment(&ctx.household, goal.id, commitment)?;
    }
    println!("Goal created: {}", goal.id);
    println!("  Name:  {}", goal.name);
    println!("  State: {}", goal.state());
    print_missing(&goal);
    Ok(())
}

fn list_goals(ctx: &Context, state: Option<GoalState>) -> anyhow::Result<()> {
    let goals: Vec<Goal> = ctx
        .planner
        .goals(&ctx.household)?
        .into_iter()
        .filter(|g| state.map_or(true, |s| g.state() == s))
        .collect();

    if goals.is_empty() {
        println!("No goals found.");
        return Ok(());
    }

    println!("{:<38} {:<32} {:<12} {:<10}", "ID", "NAME", "STATE", "DEADLINE");
    println!("{}", "-".repeat(94));
    for g in &goals {
        let deadline = g.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let flag = if g.review_flag.is_some() { " (review)" } else { "" };
        println!(
            "{:<38} {:<32} {:<12} {:<10}{}",
            g.id,
            truncate(&g.name, 30),
            g.state().to_string(),
            deadline,
            flag
        );
    }
    println!("\n{} goal(s) total.", goals.len());
    Ok(())
}

fn show_goal(ctx: &Context, id: Uuid) -> anyhow::Result<()> {
    let g = ctx.planner.goal(&ctx.household, id)?;
    println!("Goal:      {}", g.id);
    println!("Name:      {}", g.name);
    println!("State:     {}", g.state());
    println!("Created:   {}", g.created_at.to_rfc3339());
    if let Some(ref why) = g.why {
        println!("Why:       {}", why);
    }
    if let Some(ref sacrifice) = g.sacrifice {
        println!("Sacrifice: {}", sacrifice);
    }
    if let Some(deadline) = g.deadline {
        println!("Deadline:  {}", deadline);
    }
    if !g.metrics.is_empty() {
        println!("Metrics:   {}", g.metrics.join(", "));
    }
    if let Some(ref flag) = g.review_flag {
        println!(
            "Review:    flagged by event {}{}",
            flag.event_id,
            flag.note.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default()
        );
    }
    if let Some(ref retro) = g.retrospective {
        println!("Retro:     {}", retro);
    }

    println!("\nHistory:");
    for change in g.state_history() {
        println!(
            "  {}  {:<12} {:?}  {}",
            change.timestamp.to_rfc3339(),
            change.state.to_string(),
            change.trigger,
            change.reason
        );
    }

    let readiness = ctx.planner.get_readiness(&ctx.household, id)?;
    if !readiness.unsatisfied.is_empty() {
        println!("\nWaiting on:");
        for dep in &readiness.unsatisfied {
            println!("  {} ({})", dep.id, dep.kind.type_name());
        }
    }
    Ok(())
}

fn print_missing(goal: &Goal) {
    let missing = goal.missing_commitment_fields();
    if !missing.is_empty() {
        println!("  Missing before commit: {}", missing.join(", "));
    }
}
