//! Caregiver MCP tools

use serde::Serialize;

use crate::db::Database;
use crate::models::{Caregiver, CaregiverCreate, CaregiverUpdate};

/// Caregiver as returned by the tools
#[derive(Debug, Serialize)]
pub struct CaregiverView {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notification_type: String,
    pub relationship: String,
    pub active: bool,
    pub has_contact: bool,
    pub created_at: String,
}

impl From<&Caregiver> for CaregiverView {
    fn from(c: &Caregiver) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            phone: c.phone.clone(),
            email: c.email.clone(),
            notification_type: c.notification_type.as_str().to_string(),
            relationship: c.relationship.clone(),
            active: c.active,
            has_contact: c.contact().is_some(),
            created_at: c.created_at.clone(),
        }
    }
}

/// Response for list_caregivers
#[derive(Debug, Serialize)]
pub struct ListCaregiversResponse {
    pub caregivers: Vec<CaregiverView>,
    pub total: usize,
    pub notifiable: usize,
}

/// Add a new caregiver
pub fn add_caregiver(db: &Database, data: CaregiverCreate) -> Result<CaregiverView, String> {
    if data.name.trim().is_empty() {
        return Err("Caregiver name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let caregiver = Caregiver::create(&conn, &data)
        .map_err(|e| format!("Failed to create caregiver: {}", e))?;
    Ok(CaregiverView::from(&caregiver))
}

/// Get a caregiver by ID
pub fn get_caregiver(db: &Database, id: i64) -> Result<Option<CaregiverView>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let caregiver = Caregiver::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get caregiver: {}", e))?;
    Ok(caregiver.as_ref().map(CaregiverView::from))
}

/// List caregivers
pub fn list_caregivers(db: &Database) -> Result<ListCaregiversResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let caregivers = Caregiver::list_all(&conn)
        .map_err(|e| format!("Failed to list caregivers: {}", e))?;
    let notifiable = caregivers
        .iter()
        .filter(|c| c.active && c.contact().is_some())
        .count();
    Ok(ListCaregiversResponse {
        total: caregivers.len(),
        notifiable,
        caregivers: caregivers.iter().map(CaregiverView::from).collect(),
    })
}

/// Update caregiver fields
pub fn update_caregiver(
    db: &Database,
    id: i64,
    data: CaregiverUpdate,
) -> Result<Option<CaregiverView>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let caregiver = Caregiver::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update caregiver: {}", e))?;
    Ok(caregiver.as_ref().map(CaregiverView::from))
}

/// Delete a caregiver
pub fn delete_caregiver(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    Caregiver::delete(&conn, id).map_err(|e| format!("Failed to delete caregiver: {}", e))
}
