//! # pw-life-events
//!
//! External life events and what they do to a household's goals.
//!
//! An event is declared (usually `anticipated`), then either occurs or is
//! cancelled. Only occurred events have effect. Depending on its impact type
//! an event blocks, derails, invalidates, or flags goals for review; a
//! cascading event additionally asks for an emergency retrospective, once.
//!
//! ## Key components
//!
//! - [`LifeEvent`] and [`EventImpact`]: the event record and its tagged
//!   impact payload, validated at ingestion by [`LifeEvent::from_json`].
//! - [`LifeEventProcessor`]: applies events through the dependency
//!   resolver, one goal at a time.
//! - [`CeremonyScheduler`]: where emergency retrospectives are handed off.

pub mod ceremony;
pub mod error;
pub mod event;
pub mod processor;

pub use ceremony::{CeremonyRequest, CeremonyScheduler, LogCeremonyScheduler};
pub use error::LifeEventError;
pub use event::{
    CascadeEffect, DurationType, EventImpact, GoalEffect, LifeEvent, LifeEventStatus,
    ResolutionCondition,
};
pub use processor::{AppliedImpact, EmergencyRetro, ImpactReport, LifeEventProcessor};
