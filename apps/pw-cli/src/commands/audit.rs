// audit.rs - Season audit of the household plan.

use pw_audit::AuditReport;

use super::Context;

pub fn execute(json: bool, ctx: &Context) -> anyhow::Result<()> {
    let report = ctx.planner.run_season_audit(&ctx.household)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(ctx, &report);
    }
    Ok(())
}

fn print_report(ctx: &Context, report: &AuditReport) {
    println!("Season audit for household '{}'", ctx.household);
    println!("  Generated: {}", report.generated_at.to_rfc3339());
    println!("  Snapshot:  {}", &report.snapshot_digest[..16.min(report.snapshot_digest.len())]);
    println!();
    println!("Ready goals:   {}", report.ready_goals);
    println!("Blocked goals: {}", report.blocked_goals);

    if !report.bottlenecks.is_empty() {
        println!("\nBottlenecks:");
        for b in &report.bottlenecks {
            println!(
                "  {} {:<30} blocks {} goal(s)",
                b.goal_id,
                b.name.as_deref().unwrap_or("<missing goal>"),
                b.dependents
            );
        }
    }

    if !report.stale_events.is_empty() {
        println!("\nOverdue anticipated events:");
        for e in &report.stale_events {
            println!("  {} {:<20} {} day(s) overdue", e.event_id, e.event_type, e.overdue_days);
        }
    }

    if !report.unreachable_dependencies.is_empty() {
        println!("\nDependencies that can never clear:");
        for d in &report.unreachable_dependencies {
            println!("  {} (goal {}): {}", d.dependency_id, d.blocked_goal, d.reason);
        }
    }

    if !report.flagged_for_review.is_empty() {
        println!("\nFlagged for review:");
        for id in &report.flagged_for_review {
            println!("  {}", id);
        }
    }

    if !report.orphaned_goals.is_empty() {
        println!("\nGoals with no dependencies: {}", report.orphaned_goals.len());
    }
}
