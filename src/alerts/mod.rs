//! Caregiver alerting
//!
//! Detects overdue doses, notifies caregivers through the external relay,
//! and materializes misses in the dose log.

pub mod notify;
pub mod sweep;

pub use notify::{LogOnlyNotifier, Notifier, NotifyError, RelayClient};
pub use sweep::{find_overdue, run_sweep, spawn_monitor, OverdueDose, SweepOutcome};
