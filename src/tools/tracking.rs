//! Tracking and adherence MCP tools
//!
//! Today's schedule, the health summary, and the two log mutations
//! (record a taken dose, toggle an existing record).

use chrono::NaiveDate;
use serde::Serialize;

use crate::adherence::{self, Occurrence};
use crate::db::Database;
use crate::models::{time_to_minutes, Medicine, TrackingRecord};

/// A reconciled dose occurrence as returned by the tools.
///
/// `id` is the numeric row id for persisted records and a deterministic
/// "virtual-..." key for doses nobody acted on yet; `virtual` tells callers
/// which mutation applies (record_taken vs update_tracking_record).
#[derive(Debug, Serialize)]
pub struct OccurrenceView {
    pub id: String,
    pub r#virtual: bool,
    pub medicine_id: i64,
    pub medicine_name: String,
    pub scheduled_time: String,
    pub date: String,
    pub taken: bool,
    pub taken_at: Option<String>,
    pub notes: Option<String>,
}

impl From<&Occurrence> for OccurrenceView {
    fn from(occurrence: &Occurrence) -> Self {
        Self {
            id: occurrence.display_id(),
            r#virtual: occurrence.is_virtual(),
            medicine_id: occurrence.medicine_id(),
            medicine_name: occurrence.medicine_name().to_string(),
            scheduled_time: occurrence.scheduled_time().to_string(),
            date: occurrence.date().to_string(),
            taken: occurrence.taken(),
            taken_at: occurrence.taken_at().map(String::from),
            notes: occurrence.notes().map(String::from),
        }
    }
}

/// A persisted tracking record as returned by the tools
#[derive(Debug, Serialize)]
pub struct TrackingRecordView {
    pub id: i64,
    pub medicine_id: i64,
    pub medicine_name: String,
    pub scheduled_time: String,
    pub date: String,
    pub taken: bool,
    pub taken_at: Option<String>,
    pub notes: Option<String>,
}

impl From<&TrackingRecord> for TrackingRecordView {
    fn from(r: &TrackingRecord) -> Self {
        Self {
            id: r.id,
            medicine_id: r.medicine_id,
            medicine_name: r.medicine_name.clone(),
            scheduled_time: r.scheduled_time.clone(),
            date: r.date.clone(),
            taken: r.taken,
            taken_at: r.taken_at.clone(),
            notes: r.notes.clone(),
        }
    }
}

/// Response for today_schedule
#[derive(Debug, Serialize)]
pub struct TodayScheduleResponse {
    pub date: String,
    pub adherence_rate: u32,
    pub occurrences: Vec<OccurrenceView>,
}

/// Response for health_summary
#[derive(Debug, Serialize)]
pub struct HealthSummaryResponse {
    pub adherence_rate: u32,
    pub total_scheduled_today: usize,
    pub total_taken_today: usize,
    pub total_pending_today: usize,
    pub this_week_adherence: u32,
    pub this_month_adherence: u32,
    pub missed_medications: Vec<TrackingRecordView>,
    pub today_schedule: Vec<OccurrenceView>,
}

/// Response for missed_medications
#[derive(Debug, Serialize)]
pub struct MissedMedicationsResponse {
    pub days: i64,
    pub total: usize,
    pub missed: Vec<TrackingRecordView>,
}

fn parse_date(date: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", date))
}

fn load_snapshot(db: &Database) -> Result<(Vec<Medicine>, Vec<TrackingRecord>), String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let medicines =
        Medicine::list_all(&conn).map_err(|e| format!("Failed to load medicines: {}", e))?;
    let records =
        TrackingRecord::list_all(&conn).map_err(|e| format!("Failed to load tracking: {}", e))?;
    Ok((medicines, records))
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Reconciled schedule for one date
pub fn today_schedule(db: &Database, today: NaiveDate) -> Result<TodayScheduleResponse, String> {
    let (medicines, records) = load_snapshot(db)?;
    let occurrences =
        adherence::reconcile_all(adherence::expand_day(&medicines, today), &records);
    Ok(TodayScheduleResponse {
        date: today.format("%Y-%m-%d").to_string(),
        adherence_rate: adherence::adherence(&occurrences),
        occurrences: occurrences.iter().map(OccurrenceView::from).collect(),
    })
}

/// Full health summary as of `today`
pub fn health_summary(db: &Database, today: NaiveDate) -> Result<HealthSummaryResponse, String> {
    let (medicines, records) = load_snapshot(db)?;
    let summary = adherence::health_summary(&medicines, &records, today);
    Ok(HealthSummaryResponse {
        adherence_rate: summary.adherence_rate,
        total_scheduled_today: summary.total_scheduled_today,
        total_taken_today: summary.total_taken_today,
        total_pending_today: summary.total_pending_today,
        this_week_adherence: summary.this_week_adherence,
        this_month_adherence: summary.this_month_adherence,
        missed_medications: summary
            .missed_medications
            .iter()
            .map(TrackingRecordView::from)
            .collect(),
        today_schedule: summary
            .today_schedule
            .iter()
            .map(OccurrenceView::from)
            .collect(),
    })
}

/// Persisted misses in the last `days` days
pub fn missed_medications(
    db: &Database,
    today: NaiveDate,
    days: i64,
) -> Result<MissedMedicationsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let records =
        TrackingRecord::list_all(&conn).map_err(|e| format!("Failed to load tracking: {}", e))?;
    let missed = adherence::missed_in_window(&records, today, days);
    Ok(MissedMedicationsResponse {
        days,
        total: missed.len(),
        missed: missed.iter().map(TrackingRecordView::from).collect(),
    })
}

/// Record a dose as taken. For virtual occurrences only; the medicine name
/// is snapshotted from the cabinet at this moment.
pub fn record_taken(
    db: &Database,
    medicine_id: i64,
    scheduled_time: &str,
    date: &str,
) -> Result<TrackingRecordView, String> {
    if time_to_minutes(scheduled_time).is_none() {
        return Err(format!("Invalid time '{}': expected HH:MM", scheduled_time));
    }
    parse_date(date)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let medicine = Medicine::get_by_id(&conn, medicine_id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("Medicine {} not found", medicine_id))?;

    let record =
        TrackingRecord::record_taken(&conn, medicine.id, &medicine.name, scheduled_time, date)
            .map_err(|e| format!("Failed to record dose: {}", e))?;
    Ok(TrackingRecordView::from(&record))
}

/// Toggle an existing record. Returns None for an unknown id.
pub fn update_tracking_record(
    db: &Database,
    id: i64,
    taken: bool,
    notes: Option<&str>,
) -> Result<Option<TrackingRecordView>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let record = TrackingRecord::update(&conn, id, taken, notes)
        .map_err(|e| format!("Failed to update record: {}", e))?;
    Ok(record.as_ref().map(TrackingRecordView::from))
}

/// Delete a tracking record
pub fn delete_tracking_record(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    TrackingRecord::delete(&conn, id).map_err(|e| format!("Failed to delete record: {}", e))
}
