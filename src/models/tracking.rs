//! Medication tracking model
//!
//! The append-biased dose log. One row per acknowledged occurrence: either
//! the user toggled a dose, or the alert sweep materialized a miss. Doses
//! nobody acted on have no row; the adherence engine synthesizes them.
//!
//! `medicine_name` is a deliberate denormalized snapshot so history reads
//! the same after the medicine is renamed or deleted.

use chrono::Local;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A persisted dose-log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: i64,
    pub medicine_id: i64,
    pub medicine_name: String,
    /// HH:MM, matches a schedule entry's time at creation
    pub scheduled_time: String,
    /// YYYY-MM-DD, local
    pub date: String,
    pub taken: bool,
    /// Set on the first transition into taken, then never changed
    pub taken_at: Option<String>,
    pub notes: Option<String>,
}

impl TrackingRecord {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            medicine_id: row.get("medicine_id")?,
            medicine_name: row.get("medicine_name")?,
            scheduled_time: row.get("scheduled_time")?,
            date: row.get("date")?,
            taken: row.get::<_, i32>("taken")? != 0,
            taken_at: row.get("taken_at")?,
            notes: row.get("notes")?,
        })
    }

    /// Whether this row belongs to the given dose occurrence
    pub fn matches(&self, medicine_id: i64, date: &str, scheduled_time: &str) -> bool {
        self.medicine_id == medicine_id && self.date == date && self.scheduled_time == scheduled_time
    }

    /// Record that a dose was taken, with taken_at = now.
    ///
    /// No duplicate check: callers must only use this for doses that have no
    /// row yet (the tool layer branches on the virtual occurrence variant).
    pub fn record_taken(
        conn: &Connection,
        medicine_id: i64,
        medicine_name: &str,
        scheduled_time: &str,
        date: &str,
    ) -> DbResult<Self> {
        let taken_at = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        conn.execute(
            "INSERT INTO medication_tracking
                 (medicine_id, medicine_name, scheduled_time, date, taken, taken_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![medicine_id, medicine_name, scheduled_time, date, taken_at],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Materialize an overdue, unacknowledged dose as missed (taken = false,
    /// no taken_at). Used by the alert sweep.
    pub fn record_missed(
        conn: &Connection,
        medicine_id: i64,
        medicine_name: &str,
        scheduled_time: &str,
        date: &str,
    ) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO medication_tracking
                 (medicine_id, medicine_name, scheduled_time, date, taken)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![medicine_id, medicine_name, scheduled_time, date],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a record by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medication_tracking WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full log, oldest first
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM medication_tracking ORDER BY date, scheduled_time, id")?;
        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Toggle a record's taken flag and optionally replace its notes.
    ///
    /// Returns Ok(None) when the id doesn't exist; that is a recoverable
    /// no-op, not an error. taken_at is set only on the first transition
    /// into taken and is never cleared afterwards.
    pub fn update(
        conn: &Connection,
        id: i64,
        taken: bool,
        notes: Option<&str>,
    ) -> DbResult<Option<Self>> {
        let existing = match Self::get_by_id(conn, id)? {
            Some(r) => r,
            None => return Ok(None),
        };

        let taken_at = if taken && existing.taken_at.is_none() {
            Some(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string())
        } else {
            existing.taken_at.clone()
        };
        let notes = match notes {
            Some(n) => Some(n.to_string()),
            None => existing.notes.clone(),
        };

        conn.execute(
            "UPDATE medication_tracking SET taken = ?1, taken_at = ?2, notes = ?3 WHERE id = ?4",
            params![taken as i32, taken_at, notes, id],
        )?;

        Self::get_by_id(conn, id)
    }

    /// Delete a record
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM medication_tracking WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_record_taken_sets_taken_at() {
        let conn = test_conn();
        let record = TrackingRecord::record_taken(&conn, 1, "Metformin", "08:00", "2026-08-19").unwrap();
        assert!(record.taken);
        assert!(record.taken_at.is_some());
        assert_eq!(record.medicine_name, "Metformin");
    }

    #[test]
    fn test_record_missed_has_no_taken_at() {
        let conn = test_conn();
        let record = TrackingRecord::record_missed(&conn, 1, "Metformin", "08:00", "2026-08-19").unwrap();
        assert!(!record.taken);
        assert!(record.taken_at.is_none());
    }

    #[test]
    fn test_update_preserves_original_taken_at() {
        let conn = test_conn();
        let record = TrackingRecord::record_taken(&conn, 1, "Metformin", "08:00", "2026-08-19").unwrap();
        let original_taken_at = record.taken_at.clone();

        // Untoggle: taken_at is retained
        let untoggled = TrackingRecord::update(&conn, record.id, false, None).unwrap().unwrap();
        assert!(!untoggled.taken);
        assert_eq!(untoggled.taken_at, original_taken_at);

        // Re-toggle: the original timestamp is not clobbered
        let retoggled = TrackingRecord::update(&conn, record.id, true, None).unwrap().unwrap();
        assert_eq!(retoggled.taken_at, original_taken_at);
    }

    #[test]
    fn test_update_sets_taken_at_on_first_taken_transition() {
        let conn = test_conn();
        let missed = TrackingRecord::record_missed(&conn, 1, "Metformin", "08:00", "2026-08-19").unwrap();
        assert!(missed.taken_at.is_none());

        let taken = TrackingRecord::update(&conn, missed.id, true, Some("late")).unwrap().unwrap();
        assert!(taken.taken);
        assert!(taken.taken_at.is_some());
        assert_eq!(taken.notes.as_deref(), Some("late"));
    }

    #[test]
    fn test_update_missing_id_is_none() {
        let conn = test_conn();
        assert!(TrackingRecord::update(&conn, 42, true, None).unwrap().is_none());
    }

    #[test]
    fn test_history_survives_medicine_deletion() {
        let conn = test_conn();
        use crate::models::{Medicine, MedicineCreate};
        let med = Medicine::create(
            &conn,
            &MedicineCreate {
                name: "Metformin".into(),
                dosage: "500 mg".into(),
                quantity: 10,
                category: "diabetes".into(),
                notes: None,
                schedule: vec![],
            },
        )
        .unwrap();
        let record = TrackingRecord::record_taken(&conn, med.id, &med.name, "08:00", "2026-08-19").unwrap();

        assert!(Medicine::delete(&conn, med.id).unwrap());
        let kept = TrackingRecord::get_by_id(&conn, record.id).unwrap().unwrap();
        assert_eq!(kept.medicine_name, "Metformin");
    }
}
