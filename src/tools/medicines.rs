//! Medicine MCP tools
//!
//! Managing the medicine cabinet and each medicine's weekly schedule.

use serde::Serialize;

use crate::db::Database;
use crate::models::{
    time_to_minutes, Medicine, MedicineCreate, MedicineStats, MedicineUpdate, ScheduleEntry,
    ScheduleEntryCreate,
};

/// Schedule entry as returned by the tools
#[derive(Debug, Serialize)]
pub struct ScheduleEntryView {
    pub id: i64,
    pub medicine_id: i64,
    pub time: String,
    pub days_of_week: Vec<u8>,
    pub active: bool,
}

impl From<&ScheduleEntry> for ScheduleEntryView {
    fn from(entry: &ScheduleEntry) -> Self {
        Self {
            id: entry.id,
            medicine_id: entry.medicine_id,
            time: entry.time.clone(),
            days_of_week: entry.days_of_week.clone(),
            active: entry.active,
        }
    }
}

/// Full medicine detail
#[derive(Debug, Serialize)]
pub struct MedicineDetail {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub quantity: i64,
    pub category: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub schedule: Vec<ScheduleEntryView>,
}

impl From<&Medicine> for MedicineDetail {
    fn from(med: &Medicine) -> Self {
        Self {
            id: med.id,
            name: med.name.clone(),
            dosage: med.dosage.clone(),
            quantity: med.quantity,
            category: med.category.clone(),
            notes: med.notes.clone(),
            created_at: med.created_at.clone(),
            schedule: med.schedule.iter().map(ScheduleEntryView::from).collect(),
        }
    }
}

/// Response for list/search tools
#[derive(Debug, Serialize)]
pub struct ListMedicinesResponse {
    pub medicines: Vec<MedicineDetail>,
    pub total: usize,
}

/// Response for delete_medicine
#[derive(Debug, Serialize)]
pub struct DeleteMedicineResponse {
    pub success: bool,
    pub deleted_id: i64,
    pub note: &'static str,
}

// ============================================================================
// Validation
// ============================================================================

fn validate_schedule_entry(entry: &ScheduleEntryCreate) -> Result<(), String> {
    if time_to_minutes(&entry.time).is_none() {
        return Err(format!("Invalid schedule time '{}': expected HH:MM", entry.time));
    }
    if entry.days_of_week.is_empty() {
        return Err("Schedule entry needs at least one day of week".to_string());
    }
    if entry.days_of_week.iter().any(|d| *d > 6) {
        return Err("Days of week must be 0-6 (0 = Sunday)".to_string());
    }
    Ok(())
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Add a new medicine with optional initial schedule entries
pub fn add_medicine(db: &Database, data: MedicineCreate) -> Result<MedicineDetail, String> {
    if data.name.trim().is_empty() {
        return Err("Medicine name cannot be empty".to_string());
    }
    if data.quantity < 0 {
        return Err("Quantity cannot be negative".to_string());
    }
    for entry in &data.schedule {
        validate_schedule_entry(entry)?;
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let med = Medicine::create(&conn, &data)
        .map_err(|e| format!("Failed to create medicine: {}", e))?;
    Ok(MedicineDetail::from(&med))
}

/// Get a medicine by ID
pub fn get_medicine(db: &Database, id: i64) -> Result<Option<MedicineDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let med = Medicine::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get medicine: {}", e))?;
    Ok(med.as_ref().map(MedicineDetail::from))
}

/// List all medicines
pub fn list_medicines(db: &Database) -> Result<ListMedicinesResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let meds = Medicine::list_all(&conn)
        .map_err(|e| format!("Failed to list medicines: {}", e))?;
    Ok(ListMedicinesResponse {
        total: meds.len(),
        medicines: meds.iter().map(MedicineDetail::from).collect(),
    })
}

/// Update medicine fields
pub fn update_medicine(
    db: &Database,
    id: i64,
    data: MedicineUpdate,
) -> Result<Option<MedicineDetail>, String> {
    if let Some(quantity) = data.quantity {
        if quantity < 0 {
            return Err("Quantity cannot be negative".to_string());
        }
    }
    if let Some(ref name) = data.name {
        if name.trim().is_empty() {
            return Err("Medicine name cannot be empty".to_string());
        }
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let med = Medicine::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update medicine: {}", e))?;
    Ok(med.as_ref().map(MedicineDetail::from))
}

/// Delete a medicine. Dose history is kept.
pub fn delete_medicine(db: &Database, id: i64) -> Result<Option<DeleteMedicineResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let deleted = Medicine::delete(&conn, id)
        .map_err(|e| format!("Failed to delete medicine: {}", e))?;
    Ok(deleted.then_some(DeleteMedicineResponse {
        success: true,
        deleted_id: id,
        note: "Tracking history for this medicine is retained",
    }))
}

/// Search medicines by name or category
pub fn search_medicines(db: &Database, query: &str) -> Result<ListMedicinesResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let meds = Medicine::search(&conn, query)
        .map_err(|e| format!("Failed to search medicines: {}", e))?;
    Ok(ListMedicinesResponse {
        total: meds.len(),
        medicines: meds.iter().map(MedicineDetail::from).collect(),
    })
}

/// Medicines at or below the stock threshold
pub fn low_stock(db: &Database, threshold: i64) -> Result<ListMedicinesResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let meds = Medicine::low_stock(&conn, threshold)
        .map_err(|e| format!("Failed to list low stock: {}", e))?;
    Ok(ListMedicinesResponse {
        total: meds.len(),
        medicines: meds.iter().map(MedicineDetail::from).collect(),
    })
}

/// Cabinet stats
pub fn medicine_stats(db: &Database) -> Result<MedicineStats, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    Medicine::stats(&conn).map_err(|e| format!("Failed to compute stats: {}", e))
}

/// Add a schedule entry to an existing medicine
pub fn add_schedule_entry(
    db: &Database,
    medicine_id: i64,
    data: ScheduleEntryCreate,
) -> Result<ScheduleEntryView, String> {
    validate_schedule_entry(&data)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    if Medicine::get_by_id(&conn, medicine_id)
        .map_err(|e| format!("Database error: {}", e))?
        .is_none()
    {
        return Err(format!("Medicine {} not found", medicine_id));
    }
    let entry = ScheduleEntry::create(&conn, medicine_id, &data)
        .map_err(|e| format!("Failed to add schedule entry: {}", e))?;
    Ok(ScheduleEntryView::from(&entry))
}

/// Update a schedule entry's time, days, or active flag
pub fn update_schedule_entry(
    db: &Database,
    id: i64,
    time: Option<String>,
    days_of_week: Option<Vec<u8>>,
    active: Option<bool>,
) -> Result<Option<ScheduleEntryView>, String> {
    if let Some(ref t) = time {
        if time_to_minutes(t).is_none() {
            return Err(format!("Invalid schedule time '{}': expected HH:MM", t));
        }
    }
    if let Some(ref days) = days_of_week {
        if days.is_empty() || days.iter().any(|d| *d > 6) {
            return Err("Days of week must be a non-empty set of 0-6".to_string());
        }
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let entry = ScheduleEntry::update(&conn, id, time.as_deref(), days_of_week.as_deref(), active)
        .map_err(|e| format!("Failed to update schedule entry: {}", e))?;
    Ok(entry.as_ref().map(ScheduleEntryView::from))
}

/// Remove a schedule entry
pub fn remove_schedule_entry(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    ScheduleEntry::delete(&conn, id).map_err(|e| format!("Failed to remove schedule entry: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            crate::db::migrations::run_migrations(conn)?;
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn test_add_medicine_validates_schedule() {
        let db = test_db();
        let result = add_medicine(
            &db,
            MedicineCreate {
                name: "Metformin".into(),
                dosage: "500 mg".into(),
                quantity: 30,
                category: "diabetes".into(),
                notes: None,
                schedule: vec![ScheduleEntryCreate {
                    time: "8am".into(),
                    days_of_week: vec![1],
                }],
            },
        );
        assert!(result.is_err());

        let result = add_medicine(
            &db,
            MedicineCreate {
                name: "".into(),
                dosage: "500 mg".into(),
                quantity: 30,
                category: "diabetes".into(),
                notes: None,
                schedule: vec![],
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_schedule_entry_lifecycle() {
        let db = test_db();
        let med = add_medicine(
            &db,
            MedicineCreate {
                name: "Metformin".into(),
                dosage: "500 mg".into(),
                quantity: 30,
                category: "diabetes".into(),
                notes: None,
                schedule: vec![],
            },
        )
        .unwrap();

        let entry = add_schedule_entry(
            &db,
            med.id,
            ScheduleEntryCreate {
                time: "08:00".into(),
                days_of_week: vec![1, 3, 5],
            },
        )
        .unwrap();
        assert!(entry.active);

        let updated = update_schedule_entry(&db, entry.id, None, None, Some(false))
            .unwrap()
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.time, "08:00");

        assert!(remove_schedule_entry(&db, entry.id).unwrap());
        assert!(!remove_schedule_entry(&db, entry.id).unwrap());
    }

    #[test]
    fn test_add_schedule_entry_unknown_medicine() {
        let db = test_db();
        let result = add_schedule_entry(
            &db,
            42,
            ScheduleEntryCreate {
                time: "08:00".into(),
                days_of_week: vec![1],
            },
        );
        assert!(result.is_err());
    }
}
