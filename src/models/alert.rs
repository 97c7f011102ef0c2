//! Alert log model
//!
//! One row per alert sent for a dose occurrence. The minute poll checks this
//! log before notifying so a dose alerts at most once.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::DbResult;

/// A sent-alert record
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub id: i64,
    pub medicine_id: i64,
    pub scheduled_time: String,
    pub date: String,
    pub alert_sent_at: String,
}

impl AlertRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            medicine_id: row.get("medicine_id")?,
            scheduled_time: row.get("scheduled_time")?,
            date: row.get("date")?,
            alert_sent_at: row.get("alert_sent_at")?,
        })
    }

    /// Whether an alert was already sent for this occurrence
    pub fn was_sent(
        conn: &Connection,
        medicine_id: i64,
        scheduled_time: &str,
        date: &str,
    ) -> DbResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM alert_log
             WHERE medicine_id = ?1 AND scheduled_time = ?2 AND date = ?3",
            params![medicine_id, scheduled_time, date],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record that an alert was sent for this occurrence
    pub fn record(
        conn: &Connection,
        medicine_id: i64,
        scheduled_time: &str,
        date: &str,
    ) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO alert_log (medicine_id, scheduled_time, date) VALUES (?1, ?2, ?3)",
            params![medicine_id, scheduled_time, date],
        )?;

        let id = conn.last_insert_rowid();
        let mut stmt = conn.prepare("SELECT * FROM alert_log WHERE id = ?1")?;
        Ok(stmt.query_row([id], Self::from_row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    #[test]
    fn test_was_sent_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert!(!AlertRecord::was_sent(&conn, 1, "08:00", "2026-08-19").unwrap());
        AlertRecord::record(&conn, 1, "08:00", "2026-08-19").unwrap();
        assert!(AlertRecord::was_sent(&conn, 1, "08:00", "2026-08-19").unwrap());
        // Other occurrences unaffected
        assert!(!AlertRecord::was_sent(&conn, 1, "20:00", "2026-08-19").unwrap());
        assert!(!AlertRecord::was_sent(&conn, 2, "08:00", "2026-08-19").unwrap());
    }
}
