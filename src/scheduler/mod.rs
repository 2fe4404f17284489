//! Daily research digest scheduler.
//!
//! Fires one digest cycle per day at a configured local time, tolerates
//! late fires within a grace window, and catches up on startup when
//! today's digest is missing.

pub mod digest;
pub mod record;
pub mod runner;
pub mod schedule;

pub use digest::{CycleOutcome, DigestEngine};
pub use record::{ArticleCard, DigestRecord, DigestStore, PaperRef};
pub use runner::{Clock, DigestScheduler, LocalClock, SchedulerHandle, TriggerOutcome};
pub use schedule::{DailySchedule, FireDecision};
