//! Domain models for the lab-operations core.

mod catalog;
mod collector;
mod event;
mod order;
mod patient;
mod result;

pub use catalog::*;
pub use collector::*;
pub use event::*;
pub use order::*;
pub use patient::*;
pub use result::*;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to the precision the store persists (microseconds),
/// so an entity compares equal before and after a round trip.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
