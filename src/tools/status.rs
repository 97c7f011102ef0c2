//! medtrack status tool
//!
//! Runtime status information about the service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;

/// Medication tracking instructions for AI assistants
pub const MEDICATION_INSTRUCTIONS: &str = r#"
# medtrack Usage Instructions

## Overview

medtrack keeps a medicine cabinet, weekly dose schedules, and a dose log,
and computes adherence statistics from them.

1. **Medicines** - name, dosage text, stock quantity, category. Each owns
   schedule entries (time of day + weekdays, 0 = Sunday).
2. **Dose log** - one record per acknowledged dose. Doses nobody acted on
   are "virtual": they appear in schedules with an id like
   "virtual-12-2026-08-19-08:00" and taken = false.
3. **Caregivers** - contacts alerted when a dose goes unacknowledged past
   its scheduled time.

## Typical flows

- Set up: add_medicine with a schedule list, or add_schedule_entry later.
- Morning check: today_schedule or health_summary.
- Marking a dose:
  - If the occurrence is virtual (id starts with "virtual-"), call
    record_taken with the medicine id, time, and date.
  - If it already has a numeric id, call update_tracking_record with that
    id and the new taken flag.
- Weekly review: weekly_report; send_weekly_report mails it to caregivers.

## Notes

- Dates are YYYY-MM-DD and times are HH:MM in the patient's local clock.
- Adherence percentages count virtual (untouched) doses as not taken.
- missed_medications only lists doses that were explicitly logged as not
  taken; untouched overdue doses are not in it until the alert sweep runs.
- Deleting a medicine keeps its dose history.
"#;

/// Service status response
#[derive(Debug, Serialize)]
pub struct MedtrackStatus {
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Tracks service start time and exposes runtime status
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    /// Get the current status
    pub fn get_status(&self) -> MedtrackStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        MedtrackStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
