//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- MEDICINES
        -- The user's medicine cabinet
        -- ============================================
        CREATE TABLE medicines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            dosage TEXT NOT NULL,                -- free text, e.g. "500 mg"
            quantity INTEGER NOT NULL DEFAULT 0 CHECK(quantity >= 0),
            category TEXT NOT NULL DEFAULT '',
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_medicines_name ON medicines(name);
        CREATE INDEX idx_medicines_category ON medicines(category);

        -- ============================================
        -- SCHEDULES
        -- Weekly recurring dose times, owned by a medicine
        -- ============================================
        CREATE TABLE schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medicine_id INTEGER NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
            time TEXT NOT NULL,                  -- HH:MM, local wall clock
            days_of_week TEXT NOT NULL,          -- JSON array of 0-6, 0 = Sunday
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX idx_schedules_medicine ON schedules(medicine_id);

        -- ============================================
        -- MEDICATION TRACKING
        -- One row per acknowledged dose occurrence.
        -- medicine_name is a denormalized snapshot and medicine_id has
        -- no foreign key: history survives medicine rename and deletion.
        -- No uniqueness over (medicine_id, date, scheduled_time); readers
        -- tolerate duplicates.
        -- ============================================
        CREATE TABLE medication_tracking (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medicine_id INTEGER NOT NULL,
            medicine_name TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,        -- HH:MM
            date TEXT NOT NULL,                  -- YYYY-MM-DD, local
            taken INTEGER NOT NULL DEFAULT 0,
            taken_at TEXT,                       -- ISO timestamp of first "taken"
            notes TEXT
        );

        CREATE INDEX idx_tracking_medicine_date ON medication_tracking(medicine_id, date);
        CREATE INDEX idx_tracking_date ON medication_tracking(date);

        -- ============================================
        -- CAREGIVERS
        -- Contacts notified about missed doses
        -- ============================================
        CREATE TABLE caregivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            notification_type TEXT NOT NULL CHECK(notification_type IN ('sms', 'whatsapp', 'email')),
            relationship TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- ALERT LOG
        -- One row per alert sent, keyed by dose occurrence.
        -- Used to keep the minute poll idempotent.
        -- ============================================
        CREATE TABLE alert_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medicine_id INTEGER NOT NULL,
            scheduled_time TEXT NOT NULL,
            date TEXT NOT NULL,
            alert_sent_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_alert_log_occurrence ON alert_log(medicine_id, date, scheduled_time);
        "#,
    )?;

    Ok(())
}
