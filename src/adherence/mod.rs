//! Adherence engine
//!
//! Pure computations over the medicine list and the dose log: schedule
//! expansion, virtual/persisted reconciliation, and adherence statistics.

pub mod engine;

pub use engine::{
    adherence, expand_day, expand_range, health_summary, missed_in_window, reconcile,
    reconcile_all, weekly_report, DayTally, HealthSummary, Occurrence, OccurrenceKey,
    WeeklyReport,
};
