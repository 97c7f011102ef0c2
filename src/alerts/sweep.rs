//! Overdue-dose sweep
//!
//! A minute-interval poll over the day's schedule: any active dose whose
//! time passed more than the grace period ago with no taken record gets one
//! alert to every notifiable caregiver, then a miss is materialized in the
//! log. The alert_log check keeps repeated polls idempotent even when the
//! store changed between runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::Database;
use crate::models::{time_to_minutes, AlertRecord, Caregiver, Medicine, TrackingRecord};

use super::notify::Notifier;

/// Minutes a dose may run late before it counts as overdue
pub const DEFAULT_GRACE_MINUTES: i64 = 5;

/// Grace period from MEDTRACK_ALERT_GRACE_MINUTES, defaulting to 5
pub fn grace_minutes_from_env() -> i64 {
    std::env::var("MEDTRACK_ALERT_GRACE_MINUTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_GRACE_MINUTES)
}

/// An overdue, unacknowledged dose occurrence
#[derive(Debug, Clone, Serialize)]
pub struct OverdueDose {
    pub medicine_id: i64,
    pub medicine_name: String,
    pub dosage: String,
    pub scheduled_time: String,
    pub date: String,
}

/// What one sweep did
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub overdue: usize,
    pub alerted: usize,
    pub already_alerted: usize,
    pub caregivers_notified: usize,
}

/// Find today's doses that are past their grace period with no taken record.
///
/// Pure over the snapshot; `now` is the local wall clock of the caller.
/// Entries with malformed times never become overdue.
pub fn find_overdue(
    medicines: &[Medicine],
    records: &[TrackingRecord],
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Vec<OverdueDose> {
    let today = now.date();
    let weekday = today.weekday().num_days_from_sunday() as u8;
    let date_str = today.format("%Y-%m-%d").to_string();
    let now_minutes = (now.time().hour() * 60 + now.time().minute()) as i64;

    let mut overdue = Vec::new();
    for medicine in medicines {
        for entry in &medicine.schedule {
            if !entry.fires_on(weekday) {
                continue;
            }
            let scheduled_minutes = match time_to_minutes(&entry.time) {
                Some(m) => m,
                None => continue,
            };
            if now_minutes - scheduled_minutes < grace_minutes {
                continue;
            }
            let was_taken = records
                .iter()
                .any(|r| r.matches(medicine.id, &date_str, &entry.time) && r.taken);
            if was_taken {
                continue;
            }
            overdue.push(OverdueDose {
                medicine_id: medicine.id,
                medicine_name: medicine.name.clone(),
                dosage: medicine.dosage.clone(),
                scheduled_time: entry.time.clone(),
                date: date_str.clone(),
            });
        }
    }
    overdue
}

/// Run one sweep: detect, notify, record.
///
/// Nothing happens when no caregiver is reachable. A failed send to one
/// caregiver is logged and does not block the others; the alert still
/// counts as sent once every recipient was attempted.
pub async fn run_sweep(
    db: &Database,
    notifier: &dyn Notifier,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Result<SweepOutcome, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let caregivers =
        Caregiver::list_notifiable(&conn).map_err(|e| format!("Failed to load caregivers: {}", e))?;
    if caregivers.is_empty() {
        return Ok(SweepOutcome::default());
    }

    let medicines =
        Medicine::list_all(&conn).map_err(|e| format!("Failed to load medicines: {}", e))?;
    let records =
        TrackingRecord::list_all(&conn).map_err(|e| format!("Failed to load tracking: {}", e))?;

    let overdue = find_overdue(&medicines, &records, now, grace_minutes);
    let mut outcome = SweepOutcome {
        overdue: overdue.len(),
        caregivers_notified: caregivers.len(),
        ..Default::default()
    };

    for dose in &overdue {
        let sent = AlertRecord::was_sent(&conn, dose.medicine_id, &dose.scheduled_time, &dose.date)
            .map_err(|e| format!("Failed to check alert log: {}", e))?;
        if sent {
            outcome.already_alerted += 1;
            continue;
        }

        for caregiver in &caregivers {
            match notifier
                .send_alert(caregiver, &dose.medicine_name, &dose.dosage, &dose.scheduled_time)
                .await
            {
                Ok(()) => info!(
                    caregiver = %caregiver.name,
                    medicine = %dose.medicine_name,
                    time = %dose.scheduled_time,
                    "missed-dose alert sent"
                ),
                Err(e) => warn!(
                    caregiver = %caregiver.name,
                    medicine = %dose.medicine_name,
                    "alert send failed: {}",
                    e
                ),
            }
        }

        AlertRecord::record(&conn, dose.medicine_id, &dose.scheduled_time, &dose.date)
            .map_err(|e| format!("Failed to record alert: {}", e))?;
        TrackingRecord::record_missed(
            &conn,
            dose.medicine_id,
            &dose.medicine_name,
            &dose.scheduled_time,
            &dose.date,
        )
        .map_err(|e| format!("Failed to record miss: {}", e))?;
        outcome.alerted += 1;
    }

    Ok(outcome)
}

/// Spawn the background poll. Fire-and-forget; dropping the handle does not
/// stop the task, process exit does.
pub fn spawn_monitor(
    db: Database,
    notifier: Arc<dyn Notifier>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let now = Local::now().naive_local();
            match run_sweep(&db, notifier.as_ref(), now, grace_minutes_from_env()).await {
                Ok(outcome) if outcome.alerted > 0 => {
                    info!(alerted = outcome.alerted, overdue = outcome.overdue, "sweep complete");
                }
                Ok(_) => {}
                Err(e) => warn!("sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{
        CaregiverCreate, MedicineCreate, NotificationType, ScheduleEntry, ScheduleEntryCreate,
    };
    use crate::alerts::notify::NotifyError;
    use std::sync::Mutex;

    /// Records every send; fails for caregivers whose name is in `fail_for`
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_alert(
            &self,
            caregiver: &Caregiver,
            medicine_name: &str,
            _dosage: &str,
            _scheduled_time: &str,
        ) -> Result<(), NotifyError> {
            if self.fail_for.contains(&caregiver.name) {
                return Err(NotifyError::Rejected("simulated failure".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((caregiver.name.clone(), medicine_name.to_string()));
            Ok(())
        }

        async fn send_report(
            &self,
            _caregiver: &Caregiver,
            _subject: &str,
            _body: &str,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn snapshot_medicine(entries: Vec<(&str, Vec<u8>, bool)>) -> Medicine {
        Medicine {
            id: 1,
            name: "Metformin".into(),
            dosage: "500 mg".into(),
            quantity: 30,
            category: "diabetes".into(),
            notes: None,
            created_at: "2026-01-01T00:00:00".into(),
            schedule: entries
                .into_iter()
                .enumerate()
                .map(|(i, (time, days, active))| ScheduleEntry {
                    id: i as i64 + 1,
                    medicine_id: 1,
                    time: time.into(),
                    days_of_week: days,
                    active,
                })
                .collect(),
        }
    }

    // Wednesday 2026-08-19, 08:10 local
    fn test_now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 8, 19)
            .unwrap()
            .and_hms_opt(8, 10, 0)
            .unwrap()
    }

    #[test]
    fn test_find_overdue_respects_grace() {
        let all_days = vec![0, 1, 2, 3, 4, 5, 6];
        let meds = vec![snapshot_medicine(vec![
            ("08:00", all_days.clone(), true),  // 10 minutes late: overdue
            ("08:07", all_days.clone(), true),  // 3 minutes late: within grace
            ("09:00", all_days.clone(), true),  // not due yet
            ("07:00", all_days.clone(), false), // inactive
            ("bogus", all_days, true),          // malformed time, skipped
        ])];
        let overdue = find_overdue(&meds, &[], test_now(), DEFAULT_GRACE_MINUTES);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].scheduled_time, "08:00");
        assert_eq!(overdue[0].date, "2026-08-19");
    }

    #[test]
    fn test_find_overdue_skips_taken_doses() {
        let meds = vec![snapshot_medicine(vec![("08:00", vec![0, 1, 2, 3, 4, 5, 6], true)])];
        let records = vec![TrackingRecord {
            id: 1,
            medicine_id: 1,
            medicine_name: "Metformin".into(),
            scheduled_time: "08:00".into(),
            date: "2026-08-19".into(),
            taken: true,
            taken_at: Some("2026-08-19T08:02:00".into()),
            notes: None,
        }];
        assert!(find_overdue(&meds, &records, test_now(), DEFAULT_GRACE_MINUTES).is_empty());
    }

    fn seed_db(db: &Database, caregiver_names: &[&str]) {
        let conn = db.get_conn().unwrap();
        run_migrations(&conn).unwrap();
        Medicine::create(
            &conn,
            &MedicineCreate {
                name: "Metformin".into(),
                dosage: "500 mg".into(),
                quantity: 30,
                category: "diabetes".into(),
                notes: None,
                schedule: vec![ScheduleEntryCreate {
                    time: "08:00".into(),
                    days_of_week: vec![0, 1, 2, 3, 4, 5, 6],
                }],
            },
        )
        .unwrap();
        for name in caregiver_names {
            Caregiver::create(
                &conn,
                &CaregiverCreate {
                    name: (*name).into(),
                    phone: "+5511999990000".into(),
                    email: None,
                    notification_type: NotificationType::Sms,
                    relationship: "family".into(),
                },
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed_db(&db, &["Ana"]);
        let notifier = RecordingNotifier::default();

        let first = run_sweep(&db, &notifier, test_now(), DEFAULT_GRACE_MINUTES).await.unwrap();
        assert_eq!(first.overdue, 1);
        assert_eq!(first.alerted, 1);

        let second = run_sweep(&db, &notifier, test_now(), DEFAULT_GRACE_MINUTES).await.unwrap();
        assert_eq!(second.alerted, 0);
        assert_eq!(second.already_alerted, 1);

        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        // Exactly one miss materialized
        let conn = db.get_conn().unwrap();
        let records = TrackingRecord::list_all(&conn).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].taken);
        assert!(records[0].taken_at.is_none());
    }

    #[tokio::test]
    async fn test_sweep_noop_without_caregivers() {
        let db = Database::open_in_memory().unwrap();
        seed_db(&db, &[]);
        let notifier = RecordingNotifier::default();

        let outcome = run_sweep(&db, &notifier, test_now(), DEFAULT_GRACE_MINUTES).await.unwrap();
        assert_eq!(outcome.overdue, 0);
        assert_eq!(outcome.alerted, 0);

        // No alert log entry and no materialized miss
        let conn = db.get_conn().unwrap();
        assert!(TrackingRecord::list_all(&conn).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_recipient_does_not_block_others() {
        let db = Database::open_in_memory().unwrap();
        seed_db(&db, &["Ana", "Bruno"]);
        let notifier = RecordingNotifier {
            fail_for: vec!["Ana".into()],
            ..Default::default()
        };

        let outcome = run_sweep(&db, &notifier, test_now(), DEFAULT_GRACE_MINUTES).await.unwrap();
        assert_eq!(outcome.alerted, 1);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Bruno");
    }
}
