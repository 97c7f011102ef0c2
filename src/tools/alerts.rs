//! Alert MCP tools
//!
//! Manual entry points into the alerting layer: run a sweep on demand and
//! fire a test alert to verify the relay wiring.

use chrono::Local;
use serde::Serialize;

use crate::alerts::notify::Notifier;
use crate::alerts::sweep::{self, SweepOutcome};
use crate::db::Database;
use crate::models::{Caregiver, Medicine};

/// Response for send_test_alert
#[derive(Debug, Serialize)]
pub struct TestAlertResponse {
    pub success: bool,
    pub message: String,
}

/// Run one overdue sweep immediately
pub async fn check_alerts_now(
    db: &Database,
    notifier: &dyn Notifier,
) -> Result<SweepOutcome, String> {
    let now = Local::now().naive_local();
    sweep::run_sweep(db, notifier, now, sweep::grace_minutes_from_env()).await
}

/// Send an immediate test alert to the first reachable caregiver, using the
/// first medicine's first active schedule time (or the current time).
pub async fn send_test_alert(
    db: &Database,
    notifier: &dyn Notifier,
) -> Result<TestAlertResponse, String> {
    let (caregiver, medicine) = {
        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
        let caregiver = Caregiver::list_notifiable(&conn)
            .map_err(|e| format!("Failed to load caregivers: {}", e))?
            .into_iter()
            .next();
        let medicine = Medicine::list_all(&conn)
            .map_err(|e| format!("Failed to load medicines: {}", e))?
            .into_iter()
            .next();
        (caregiver, medicine)
    };

    let caregiver = match caregiver {
        Some(c) => c,
        None => {
            return Ok(TestAlertResponse {
                success: false,
                message: "No caregiver with a usable contact found".to_string(),
            })
        }
    };
    let medicine = match medicine {
        Some(m) => m,
        None => {
            return Ok(TestAlertResponse {
                success: false,
                message: "No medicine found to use for the test".to_string(),
            })
        }
    };

    let time = medicine
        .schedule
        .iter()
        .find(|s| s.active)
        .or_else(|| medicine.schedule.first())
        .map(|s| s.time.clone())
        .unwrap_or_else(|| Local::now().format("%H:%M").to_string());

    match notifier
        .send_alert(&caregiver, &medicine.name, &medicine.dosage, &time)
        .await
    {
        Ok(()) => Ok(TestAlertResponse {
            success: true,
            message: format!("Test alert sent to {}", caregiver.name),
        }),
        Err(e) => Ok(TestAlertResponse {
            success: false,
            message: format!("Test alert failed: {}", e),
        }),
    }
}
