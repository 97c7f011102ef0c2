//! Schedule entry model
//!
//! Weekly recurring dose times. Each entry belongs to one medicine and fires
//! on the calendar dates whose weekday is in `days_of_week` (0 = Sunday).

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A recurring schedule entry for a medicine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub medicine_id: i64,
    /// Wall-clock time of day, "HH:MM". No timezone handling anywhere.
    pub time: String,
    /// Weekdays the entry fires on, 0-6 with 0 = Sunday
    pub days_of_week: Vec<u8>,
    /// Inactive entries are kept but ignored by all computations
    pub active: bool,
}

/// Data for creating a schedule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryCreate {
    pub time: String,
    pub days_of_week: Vec<u8>,
}

impl ScheduleEntry {
    /// Create from a database row.
    ///
    /// A days_of_week column that fails to parse yields the empty set, so a
    /// corrupted entry simply never fires instead of poisoning every read.
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let days_json: String = row.get("days_of_week")?;
        let days_of_week = serde_json::from_str(&days_json).unwrap_or_default();
        Ok(Self {
            id: row.get("id")?,
            medicine_id: row.get("medicine_id")?,
            time: row.get("time")?,
            days_of_week,
            active: row.get::<_, i32>("active")? != 0,
        })
    }

    /// Whether this entry fires on the given weekday (0 = Sunday)
    pub fn fires_on(&self, weekday: u8) -> bool {
        self.active && self.days_of_week.contains(&weekday)
    }

    /// Add a schedule entry to a medicine
    pub fn create(conn: &Connection, medicine_id: i64, data: &ScheduleEntryCreate) -> DbResult<Self> {
        let days_json = serde_json::to_string(&data.days_of_week).unwrap_or_else(|_| "[]".into());
        conn.execute(
            "INSERT INTO schedules (medicine_id, time, days_of_week, active) VALUES (?1, ?2, ?3, 1)",
            params![medicine_id, data.time, days_json],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a schedule entry by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM schedules WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List schedule entries for one medicine, earliest time first
    pub fn list_for_medicine(conn: &Connection, medicine_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM schedules WHERE medicine_id = ?1 ORDER BY time, id")?;
        let entries = stmt
            .query_map([medicine_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Update time, days, or active flag. Returns None if the id doesn't exist.
    pub fn update(
        conn: &Connection,
        id: i64,
        time: Option<&str>,
        days_of_week: Option<&[u8]>,
        active: Option<bool>,
    ) -> DbResult<Option<Self>> {
        let existing = match Self::get_by_id(conn, id)? {
            Some(e) => e,
            None => return Ok(None),
        };

        let time = time.unwrap_or(&existing.time);
        let days = days_of_week.unwrap_or(&existing.days_of_week);
        let active = active.unwrap_or(existing.active);
        let days_json = serde_json::to_string(days).unwrap_or_else(|_| "[]".into());

        conn.execute(
            "UPDATE schedules SET time = ?1, days_of_week = ?2, active = ?3 WHERE id = ?4",
            params![time, days_json, active as i32, id],
        )?;

        Self::get_by_id(conn, id)
    }

    /// Remove a schedule entry
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

/// Parse "HH:MM" into minutes since midnight. None for anything malformed.
pub fn time_to_minutes(time: &str) -> Option<i64> {
    let (h, m) = time.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_minutes() {
        assert_eq!(time_to_minutes("00:00"), Some(0));
        assert_eq!(time_to_minutes("08:30"), Some(510));
        assert_eq!(time_to_minutes("23:59"), Some(1439));
        assert_eq!(time_to_minutes("24:00"), None);
        assert_eq!(time_to_minutes("8:30"), None);
        assert_eq!(time_to_minutes("08.30"), None);
        assert_eq!(time_to_minutes(""), None);
    }

    #[test]
    fn test_fires_on_respects_active_flag() {
        let entry = ScheduleEntry {
            id: 1,
            medicine_id: 1,
            time: "08:00".into(),
            days_of_week: vec![1, 3, 5],
            active: false,
        };
        for day in 0..7 {
            assert!(!entry.fires_on(day));
        }
    }
}
