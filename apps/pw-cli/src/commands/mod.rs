pub mod audit;
pub mod dep;
pub mod event;
pub mod goal;
pub mod metrics;

use pw_service::Planner;

/// What every command runs against.
pub struct Context {
    pub planner: Planner,
    pub household: String,
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
