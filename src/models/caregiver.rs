//! Caregiver model
//!
//! Contacts that receive missed-dose alerts and weekly adherence reports.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// How a caregiver prefers to be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Sms,
    Whatsapp,
    Email,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Sms => "sms",
            NotificationType::Whatsapp => "whatsapp",
            NotificationType::Email => "email",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "whatsapp" | "wa" => NotificationType::Whatsapp,
            "email" | "mail" => NotificationType::Email,
            _ => NotificationType::Sms,
        }
    }
}

/// A caregiver contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notification_type: NotificationType,
    pub relationship: String,
    pub active: bool,
    pub created_at: String,
}

/// Data for creating a caregiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaregiverCreate {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notification_type: NotificationType,
    pub relationship: String,
}

/// Data for updating a caregiver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaregiverUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub relationship: Option<String>,
    pub active: Option<bool>,
}

impl Caregiver {
    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            notification_type: NotificationType::from_str(
                &row.get::<_, String>("notification_type")?,
            ),
            relationship: row.get("relationship")?,
            active: row.get::<_, i32>("active")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    /// The contact address for this caregiver's channel, if present
    pub fn contact(&self) -> Option<&str> {
        match self.notification_type {
            NotificationType::Email => self.email.as_deref().filter(|e| !e.is_empty()),
            NotificationType::Sms | NotificationType::Whatsapp => {
                if self.phone.is_empty() {
                    None
                } else {
                    Some(&self.phone)
                }
            }
        }
    }

    /// Create a new caregiver
    pub fn create(conn: &Connection, data: &CaregiverCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO caregivers (name, phone, email, notification_type, relationship)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                data.name,
                data.phone,
                data.email,
                data.notification_type.as_str(),
                data.relationship,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or_else(|| crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a caregiver by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM caregivers WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List caregivers, active first
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM caregivers ORDER BY active DESC, name, id")?;
        let caregivers = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(caregivers)
    }

    /// Active caregivers that actually have a usable contact address
    pub fn list_notifiable(conn: &Connection) -> DbResult<Vec<Self>> {
        let caregivers = Self::list_all(conn)?;
        Ok(caregivers
            .into_iter()
            .filter(|c| c.active && c.contact().is_some())
            .collect())
    }

    /// Update caregiver fields. Returns None if the id doesn't exist.
    pub fn update(conn: &Connection, id: i64, data: &CaregiverUpdate) -> DbResult<Option<Self>> {
        let existing = match Self::get_by_id(conn, id)? {
            Some(c) => c,
            None => return Ok(None),
        };

        let name = data.name.as_ref().unwrap_or(&existing.name);
        let phone = data.phone.as_ref().unwrap_or(&existing.phone);
        let email = data.email.as_ref().or(existing.email.as_ref());
        let notification_type = data.notification_type.unwrap_or(existing.notification_type);
        let relationship = data.relationship.as_ref().unwrap_or(&existing.relationship);
        let active = data.active.unwrap_or(existing.active);

        conn.execute(
            "UPDATE caregivers SET name = ?1, phone = ?2, email = ?3,
                 notification_type = ?4, relationship = ?5, active = ?6
             WHERE id = ?7",
            params![
                name,
                phone,
                email,
                notification_type.as_str(),
                relationship,
                active as i32,
                id,
            ],
        )?;

        Self::get_by_id(conn, id)
    }

    /// Delete a caregiver
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM caregivers WHERE id = ?1", [id])?;
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

    fn sample(nt: NotificationType, email: Option<&str>) -> CaregiverCreate {
        CaregiverCreate {
            name: "Ana".into(),
            phone: "+5511999990000".into(),
            email: email.map(String::from),
            notification_type: nt,
            relationship: "daughter".into(),
        }
    }

    #[test]
    fn test_contact_follows_channel() {
        let conn = test_conn();
        let sms = Caregiver::create(&conn, &sample(NotificationType::Sms, None)).unwrap();
        assert_eq!(sms.contact(), Some("+5511999990000"));

        let email_missing =
            Caregiver::create(&conn, &sample(NotificationType::Email, None)).unwrap();
        assert_eq!(email_missing.contact(), None);

        let email =
            Caregiver::create(&conn, &sample(NotificationType::Email, Some("ana@example.com")))
                .unwrap();
        assert_eq!(email.contact(), Some("ana@example.com"));
    }

    #[test]
    fn test_list_notifiable_filters_inactive_and_contactless() {
        let conn = test_conn();
        let a = Caregiver::create(&conn, &sample(NotificationType::Sms, None)).unwrap();
        Caregiver::create(&conn, &sample(NotificationType::Email, None)).unwrap();
        let c = Caregiver::create(&conn, &sample(NotificationType::Whatsapp, None)).unwrap();
        Caregiver::update(
            &conn,
            c.id,
            &CaregiverUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        let notifiable = Caregiver::list_notifiable(&conn).unwrap();
        assert_eq!(notifiable.len(), 1);
        assert_eq!(notifiable[0].id, a.id);
    }

    #[test]
    fn test_update_missing_id_is_none() {
        let conn = test_conn();
        assert!(Caregiver::update(&conn, 7, &CaregiverUpdate::default())
            .unwrap()
            .is_none());
        assert!(!Caregiver::delete(&conn, 7).unwrap());
    }
}
