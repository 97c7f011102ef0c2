//! Adherence report tools
//!
//! The weekly adherence breakdown, its plain-text rendering, and delivery
//! to caregivers through the notifier.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::adherence::{self, DayTally, WeeklyReport};
use crate::alerts::notify::Notifier;
use crate::db::Database;
use crate::models::{Caregiver, Medicine, TrackingRecord};

/// Response for weekly_report
#[derive(Debug, Serialize)]
pub struct WeeklyReportResponse {
    pub start_date: String,
    pub end_date: String,
    pub weekly_adherence: u32,
    pub daily: BTreeMap<String, DayTally>,
}

impl From<WeeklyReport> for WeeklyReportResponse {
    fn from(report: WeeklyReport) -> Self {
        Self {
            start_date: report.start_date,
            end_date: report.end_date,
            weekly_adherence: report.weekly_adherence,
            daily: report.daily,
        }
    }
}

/// Response for send_weekly_report
#[derive(Debug, Serialize)]
pub struct SendWeeklyReportResponse {
    pub sent_to: Vec<String>,
    pub failed: Vec<String>,
    pub weekly_adherence: u32,
}

/// Compute the seven-day report ending at `today`
pub fn weekly_report(db: &Database, today: NaiveDate) -> Result<WeeklyReportResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let medicines =
        Medicine::list_all(&conn).map_err(|e| format!("Failed to load medicines: {}", e))?;
    let records =
        TrackingRecord::list_all(&conn).map_err(|e| format!("Failed to load tracking: {}", e))?;
    Ok(adherence::weekly_report(&medicines, &records, today).into())
}

/// Render a report as the plain text sent to caregivers
pub fn format_weekly_report(patient_name: &str, report: &WeeklyReport) -> String {
    let mut lines = vec![
        "WEEKLY MEDICATION ADHERENCE REPORT".to_string(),
        "==================================".to_string(),
        format!("Patient: {}", patient_name),
        format!("Period: {} to {}", report.start_date, report.end_date),
        format!("Overall adherence: {}%", report.weekly_adherence),
        String::new(),
        "Daily breakdown:".to_string(),
    ];

    for (date, tally) in &report.daily {
        let percentage = if tally.scheduled > 0 {
            (tally.taken as f64 / tally.scheduled as f64 * 100.0).round() as u32
        } else {
            0
        };
        lines.push(format!(
            "  {}: {}/{} doses ({}%)",
            date, tally.taken, tally.scheduled, percentage
        ));
    }

    lines.join("\n")
}

/// Send the weekly report to every notifiable caregiver.
///
/// Per-recipient failures are collected, not fatal.
pub async fn send_weekly_report(
    db: &Database,
    notifier: &dyn Notifier,
    patient_name: &str,
    today: NaiveDate,
) -> Result<SendWeeklyReportResponse, String> {
    let (report, caregivers) = {
        let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
        let medicines =
            Medicine::list_all(&conn).map_err(|e| format!("Failed to load medicines: {}", e))?;
        let records = TrackingRecord::list_all(&conn)
            .map_err(|e| format!("Failed to load tracking: {}", e))?;
        let caregivers = Caregiver::list_notifiable(&conn)
            .map_err(|e| format!("Failed to load caregivers: {}", e))?;
        (adherence::weekly_report(&medicines, &records, today), caregivers)
    };

    let subject = format!("Weekly adherence report for {}", patient_name);
    let body = format_weekly_report(patient_name, &report);

    let mut sent_to = Vec::new();
    let mut failed = Vec::new();
    for caregiver in &caregivers {
        match notifier.send_report(caregiver, &subject, &body).await {
            Ok(()) => sent_to.push(caregiver.name.clone()),
            Err(e) => {
                warn!(caregiver = %caregiver.name, "weekly report send failed: {}", e);
                failed.push(caregiver.name.clone());
            }
        }
    }

    Ok(SendWeeklyReportResponse {
        sent_to,
        failed,
        weekly_adherence: report.weekly_adherence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_weekly_report_layout() {
        let mut daily = BTreeMap::new();
        daily.insert("2026-08-18".to_string(), DayTally { taken: 1, scheduled: 2 });
        daily.insert("2026-08-19".to_string(), DayTally { taken: 0, scheduled: 0 });
        let report = WeeklyReport {
            start_date: "2026-08-13".into(),
            end_date: "2026-08-19".into(),
            daily,
            weekly_adherence: 50,
        };

        let text = format_weekly_report("Maria", &report);
        assert!(text.contains("Patient: Maria"));
        assert!(text.contains("Overall adherence: 50%"));
        assert!(text.contains("2026-08-18: 1/2 doses (50%)"));
        // Empty day reports 0%, not a division error
        assert!(text.contains("2026-08-19: 0/0 doses (0%)"));
    }
}
