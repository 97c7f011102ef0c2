//! Medicine model
//!
//! The user's medicine cabinet: name, dosage, stock, and the weekly
//! schedule entries owned by each medicine.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

use super::schedule::{ScheduleEntry, ScheduleEntryCreate};

/// A medicine and its schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    /// Free text, e.g. "500 mg" or "2 drops"
    pub dosage: String,
    /// Stock count
    pub quantity: i64,
    pub category: String,
    pub notes: Option<String>,
    pub created_at: String,
    /// Owned schedule entries, loaded alongside the row
    pub schedule: Vec<ScheduleEntry>,
}

/// Data for creating a new medicine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineCreate {
    pub name: String,
    pub dosage: String,
    pub quantity: i64,
    pub category: String,
    pub notes: Option<String>,
    /// Initial schedule entries, created active
    pub schedule: Vec<ScheduleEntryCreate>,
}

/// Data for updating a medicine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub quantity: Option<i64>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

/// Cabinet-level stats
#[derive(Debug, Clone, Serialize)]
pub struct MedicineStats {
    pub total_medicines: i64,
    pub total_stock: i64,
}

impl Medicine {
    /// Create from a database row. The schedule is loaded separately.
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            dosage: row.get("dosage")?,
            quantity: row.get("quantity")?,
            category: row.get("category")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            schedule: Vec::new(),
        })
    }

    /// Create a new medicine with its initial schedule entries
    pub fn create(conn: &Connection, data: &MedicineCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO medicines (name, dosage, quantity, category, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![data.name, data.dosage, data.quantity, data.category, data.notes],
        )?;

        let id = conn.last_insert_rowid();
        for entry in &data.schedule {
            ScheduleEntry::create(conn, id, entry)?;
        }

        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a medicine by ID, schedule included
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medicines WHERE id = ?1")?;
        let mut med = match stmt.query_row([id], Self::from_row) {
            Ok(med) => med,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        med.schedule = ScheduleEntry::list_for_medicine(conn, med.id)?;
        Ok(Some(med))
    }

    /// List all medicines with their schedules, by name
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM medicines ORDER BY name, id")?;
        let mut meds = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for med in &mut meds {
            med.schedule = ScheduleEntry::list_for_medicine(conn, med.id)?;
        }
        Ok(meds)
    }

    /// Update medicine fields. Returns None if the id doesn't exist.
    pub fn update(conn: &Connection, id: i64, data: &MedicineUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.clone()));
        }
        if let Some(ref dosage) = data.dosage {
            updates.push(format!("dosage = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(dosage.clone()));
        }
        if let Some(quantity) = data.quantity {
            updates.push(format!("quantity = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(quantity));
        }
        if let Some(ref category) = data.category {
            updates.push(format!("category = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(category.clone()));
        }
        if let Some(ref notes) = data.notes {
            updates.push(format!("notes = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(notes.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        let sql = format!(
            "UPDATE medicines SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a medicine. Schedules cascade; tracking history is retained.
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM medicines WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Search medicines by name or category substring
    pub fn search(conn: &Connection, query: &str) -> DbResult<Vec<Self>> {
        let pattern = format!("%{}%", query);
        let mut stmt = conn.prepare(
            "SELECT * FROM medicines WHERE name LIKE ?1 OR category LIKE ?1 ORDER BY name, id",
        )?;
        let mut meds = stmt
            .query_map([&pattern], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for med in &mut meds {
            med.schedule = ScheduleEntry::list_for_medicine(conn, med.id)?;
        }
        Ok(meds)
    }

    /// Medicines at or below the stock threshold
    pub fn low_stock(conn: &Connection, threshold: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT * FROM medicines WHERE quantity <= ?1 ORDER BY quantity, name")?;
        let meds = stmt
            .query_map([threshold], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meds)
    }

    /// Count and total stock
    pub fn stats(conn: &Connection) -> DbResult<MedicineStats> {
        let (total_medicines, total_stock) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(quantity), 0) FROM medicines",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(MedicineStats {
            total_medicines,
            total_stock,
        })
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

    fn sample_create() -> MedicineCreate {
        MedicineCreate {
            name: "Metformin".into(),
            dosage: "500 mg".into(),
            quantity: 60,
            category: "diabetes".into(),
            notes: None,
            schedule: vec![
                ScheduleEntryCreate {
                    time: "08:00".into(),
                    days_of_week: vec![0, 1, 2, 3, 4, 5, 6],
                },
                ScheduleEntryCreate {
                    time: "20:00".into(),
                    days_of_week: vec![1, 3, 5],
                },
            ],
        }
    }

    #[test]
    fn test_create_loads_schedule() {
        let conn = test_conn();
        let med = Medicine::create(&conn, &sample_create()).unwrap();
        assert_eq!(med.schedule.len(), 2);
        assert_eq!(med.schedule[0].time, "08:00");
        assert!(med.schedule.iter().all(|s| s.active));
        assert!(med.schedule.iter().all(|s| s.medicine_id == med.id));
    }

    #[test]
    fn test_delete_cascades_schedules_only() {
        let conn = test_conn();
        let med = Medicine::create(&conn, &sample_create()).unwrap();
        assert!(Medicine::delete(&conn, med.id).unwrap());
        assert!(Medicine::get_by_id(&conn, med.id).unwrap().is_none());
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM schedules WHERE medicine_id = ?1",
                [med.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_update_partial_fields() {
        let conn = test_conn();
        let med = Medicine::create(&conn, &sample_create()).unwrap();
        let updated = Medicine::update(
            &conn,
            med.id,
            &MedicineUpdate {
                quantity: Some(30),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.quantity, 30);
        assert_eq!(updated.name, "Metformin");
        assert_eq!(updated.schedule.len(), 2);
    }

    #[test]
    fn test_update_missing_id_is_none() {
        let conn = test_conn();
        let result = Medicine::update(&conn, 999, &MedicineUpdate::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_search_matches_name_and_category() {
        let conn = test_conn();
        Medicine::create(&conn, &sample_create()).unwrap();
        assert_eq!(Medicine::search(&conn, "metf").unwrap().len(), 1);
        assert_eq!(Medicine::search(&conn, "diab").unwrap().len(), 1);
        assert!(Medicine::search(&conn, "aspirin").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_days_of_week_never_fires() {
        let conn = test_conn();
        let med = Medicine::create(&conn, &sample_create()).unwrap();
        conn.execute(
            "UPDATE schedules SET days_of_week = 'not json' WHERE medicine_id = ?1",
            [med.id],
        )
        .unwrap();
        let med = Medicine::get_by_id(&conn, med.id).unwrap().unwrap();
        for entry in &med.schedule {
            assert!(entry.days_of_week.is_empty());
            for day in 0..7 {
                assert!(!entry.fires_on(day));
            }
        }
    }

    #[test]
    fn test_stats_and_low_stock() {
        let conn = test_conn();
        Medicine::create(&conn, &sample_create()).unwrap();
        let mut other = sample_create();
        other.name = "Aspirin".into();
        other.quantity = 5;
        Medicine::create(&conn, &other).unwrap();

        let stats = Medicine::stats(&conn).unwrap();
        assert_eq!(stats.total_medicines, 2);
        assert_eq!(stats.total_stock, 65);

        let low = Medicine::low_stock(&conn, 10).unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Aspirin");
    }
}
