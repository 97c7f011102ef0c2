//! medtrack MCP server implementation
//!
//! Implements the MCP server with all medtrack tools.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::alerts::notify::Notifier;
use crate::db::Database;
use crate::models::{
    CaregiverCreate, CaregiverUpdate, MedicineCreate, MedicineUpdate, NotificationType,
    ScheduleEntryCreate,
};
use crate::tools::status::StatusTracker;
use crate::tools::{alerts, caregivers, medicines, reports, tracking};

/// medtrack MCP service
#[derive(Clone)]
pub struct MedtrackService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    notifier: Arc<dyn Notifier>,
    tool_router: ToolRouter<MedtrackService>,
}

impl MedtrackService {
    pub fn new(database_path: PathBuf, database: Database, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            notifier,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn not_found(what: &str, id: i64) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(format!(
        r#"{{"error": "{} not found", "id": {}}}"#,
        what, id
    ))]))
}

fn parse_date_or_today(date: Option<&str>) -> Result<NaiveDate, McpError> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            McpError::invalid_params(format!("Invalid date '{}': expected YYYY-MM-DD", s), None)
        }),
        None => Ok(Local::now().date_naive()),
    }
}

fn patient_name_from_env() -> String {
    std::env::var("MEDTRACK_PATIENT_NAME").unwrap_or_else(|_| "the patient".to_string())
}

// ============================================================================
// Medicine Parameter Structs
// ============================================================================

/// One schedule entry in add_medicine / add_schedule_entry
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScheduleEntryParam {
    /// Time of day, HH:MM
    pub time: String,
    /// Weekdays, 0-6 with 0 = Sunday
    pub days_of_week: Vec<u8>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMedicineParams {
    pub name: String,
    /// Free-text dosage, e.g. "500 mg"
    pub dosage: String,
    /// Stock count
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub category: String,
    pub notes: Option<String>,
    /// Initial schedule entries (created active)
    #[serde(default)]
    pub schedule: Vec<ScheduleEntryParam>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetMedicineParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMedicineParams {
    pub id: i64,
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub quantity: Option<i64>,
    pub category: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMedicineParams {
    /// Medicine ID to delete. Dose history is kept.
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchMedicinesParams {
    /// Substring matched against name and category
    pub query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LowStockParams {
    /// Stock threshold (default 10)
    #[serde(default = "default_low_stock_threshold")]
    pub threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    10
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddScheduleEntryParams {
    pub medicine_id: i64,
    /// Time of day, HH:MM
    pub time: String,
    /// Weekdays, 0-6 with 0 = Sunday
    pub days_of_week: Vec<u8>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateScheduleEntryParams {
    pub id: i64,
    pub time: Option<String>,
    pub days_of_week: Option<Vec<u8>>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveScheduleEntryParams {
    pub id: i64,
}

// ============================================================================
// Tracking Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DateParams {
    /// Anchor date YYYY-MM-DD (default: today)
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MissedMedicationsParams {
    /// Window size in days (default 7)
    #[serde(default = "default_missed_days")]
    pub days: i64,
}

fn default_missed_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordTakenParams {
    pub medicine_id: i64,
    /// The schedule time this dose belongs to, HH:MM
    pub scheduled_time: String,
    /// Dose date YYYY-MM-DD (default: today)
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateTrackingRecordParams {
    /// Numeric id of a persisted tracking record
    pub id: i64,
    pub taken: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteTrackingRecordParams {
    pub id: i64,
}

// ============================================================================
// Caregiver Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddCaregiverParams {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// "sms", "whatsapp", or "email"
    pub notification_type: String,
    #[serde(default)]
    pub relationship: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCaregiverParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateCaregiverParams {
    pub id: i64,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// "sms", "whatsapp", or "email"
    pub notification_type: Option<String>,
    pub relationship: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteCaregiverParams {
    pub id: i64,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl MedtrackService {
    // --- Status ---

    #[tool(description = "Get the current status of the medtrack service including build info, database status, and process information")]
    async fn medtrack_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        json_result(&status)
    }

    #[tool(description = "Get step-by-step instructions for tracking medications. Call this when starting a session or when unsure how to use the medtrack tools.")]
    fn medication_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::MEDICATION_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(
            MEDICATION_INSTRUCTIONS,
        )]))
    }

    // --- Medicines ---

    #[tool(description = "Add a medicine to the cabinet, optionally with its weekly schedule entries")]
    fn add_medicine(&self, Parameters(p): Parameters<AddMedicineParams>) -> Result<CallToolResult, McpError> {
        let data = MedicineCreate {
            name: p.name,
            dosage: p.dosage,
            quantity: p.quantity,
            category: p.category,
            notes: p.notes,
            schedule: p
                .schedule
                .into_iter()
                .map(|s| ScheduleEntryCreate {
                    time: s.time,
                    days_of_week: s.days_of_week,
                })
                .collect(),
        };
        let result = medicines::add_medicine(&self.database, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get full details for a medicine including its schedule")]
    fn get_medicine(&self, Parameters(p): Parameters<GetMedicineParams>) -> Result<CallToolResult, McpError> {
        let result = medicines::get_medicine(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(med) => json_result(&med),
            None => not_found("Medicine", p.id),
        }
    }

    #[tool(description = "List all medicines with their schedules")]
    fn list_medicines(&self) -> Result<CallToolResult, McpError> {
        let result = medicines::list_medicines(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Update a medicine's name, dosage, quantity, category, or notes")]
    fn update_medicine(&self, Parameters(p): Parameters<UpdateMedicineParams>) -> Result<CallToolResult, McpError> {
        let data = MedicineUpdate {
            name: p.name,
            dosage: p.dosage,
            quantity: p.quantity,
            category: p.category,
            notes: p.notes,
        };
        let result = medicines::update_medicine(&self.database, p.id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(med) => json_result(&med),
            None => not_found("Medicine", p.id),
        }
    }

    #[tool(description = "Delete a medicine and its schedule. Dose history is retained.")]
    fn delete_medicine(&self, Parameters(p): Parameters<DeleteMedicineParams>) -> Result<CallToolResult, McpError> {
        let result = medicines::delete_medicine(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(response) => json_result(&response),
            None => not_found("Medicine", p.id),
        }
    }

    #[tool(description = "Search medicines by name or category substring")]
    fn search_medicines(&self, Parameters(p): Parameters<SearchMedicinesParams>) -> Result<CallToolResult, McpError> {
        let result = medicines::search_medicines(&self.database, &p.query)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "List medicines at or below a stock threshold")]
    fn low_stock(&self, Parameters(p): Parameters<LowStockParams>) -> Result<CallToolResult, McpError> {
        let result = medicines::low_stock(&self.database, p.threshold)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get cabinet statistics: medicine count and total stock")]
    fn medicine_stats(&self) -> Result<CallToolResult, McpError> {
        let result = medicines::medicine_stats(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Add a weekly schedule entry to an existing medicine")]
    fn add_schedule_entry(&self, Parameters(p): Parameters<AddScheduleEntryParams>) -> Result<CallToolResult, McpError> {
        let data = ScheduleEntryCreate {
            time: p.time,
            days_of_week: p.days_of_week,
        };
        let result = medicines::add_schedule_entry(&self.database, p.medicine_id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Update a schedule entry's time, weekdays, or active flag. Inactive entries are kept but never fire.")]
    fn update_schedule_entry(&self, Parameters(p): Parameters<UpdateScheduleEntryParams>) -> Result<CallToolResult, McpError> {
        let result = medicines::update_schedule_entry(
            &self.database,
            p.id,
            p.time,
            p.days_of_week,
            p.active,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(entry) => json_result(&entry),
            None => not_found("Schedule entry", p.id),
        }
    }

    #[tool(description = "Remove a schedule entry from its medicine")]
    fn remove_schedule_entry(&self, Parameters(p): Parameters<RemoveScheduleEntryParams>) -> Result<CallToolResult, McpError> {
        let deleted = medicines::remove_schedule_entry(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        if deleted {
            json_result(&serde_json::json!({ "success": true, "deleted_id": p.id }))
        } else {
            not_found("Schedule entry", p.id)
        }
    }

    // --- Tracking / Adherence ---

    #[tool(description = "Get the reconciled dose schedule for a date (default today). Virtual entries have ids starting with 'virtual-' and need record_taken; persisted ones need update_tracking_record.")]
    fn today_schedule(&self, Parameters(p): Parameters<DateParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or_today(p.date.as_deref())?;
        let result = tracking::today_schedule(&self.database, date)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get the health summary: today's schedule and counts, 7- and 30-day adherence percentages, and recently missed doses")]
    fn health_summary(&self, Parameters(p): Parameters<DateParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or_today(p.date.as_deref())?;
        let result = tracking::health_summary(&self.database, date)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "List doses explicitly logged as missed within the last N days (default 7). Untouched overdue doses are not included.")]
    fn missed_medications(&self, Parameters(p): Parameters<MissedMedicationsParams>) -> Result<CallToolResult, McpError> {
        let today = Local::now().date_naive();
        let result = tracking::missed_medications(&self.database, today, p.days)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Record a dose as taken now. Use only for virtual occurrences; persisted records are toggled with update_tracking_record.")]
    fn record_taken(&self, Parameters(p): Parameters<RecordTakenParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or_today(p.date.as_deref())?;
        let date_str = date.format("%Y-%m-%d").to_string();
        let result =
            tracking::record_taken(&self.database, p.medicine_id, &p.scheduled_time, &date_str)
                .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Toggle a persisted tracking record's taken flag and optionally replace its notes")]
    fn update_tracking_record(&self, Parameters(p): Parameters<UpdateTrackingRecordParams>) -> Result<CallToolResult, McpError> {
        let result =
            tracking::update_tracking_record(&self.database, p.id, p.taken, p.notes.as_deref())
                .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(record) => json_result(&record),
            None => not_found("Tracking record", p.id),
        }
    }

    #[tool(description = "Delete a tracking record")]
    fn delete_tracking_record(&self, Parameters(p): Parameters<DeleteTrackingRecordParams>) -> Result<CallToolResult, McpError> {
        let deleted = tracking::delete_tracking_record(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        if deleted {
            json_result(&serde_json::json!({ "success": true, "deleted_id": p.id }))
        } else {
            not_found("Tracking record", p.id)
        }
    }

    // --- Reports ---

    #[tool(description = "Get the seven-day adherence report with per-day taken/scheduled tallies")]
    fn weekly_report(&self, Parameters(p): Parameters<DateParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or_today(p.date.as_deref())?;
        let result = reports::weekly_report(&self.database, date)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Send the weekly adherence report to every active caregiver with a usable contact")]
    async fn send_weekly_report(&self) -> Result<CallToolResult, McpError> {
        let today = Local::now().date_naive();
        let result = reports::send_weekly_report(
            &self.database,
            self.notifier.as_ref(),
            &patient_name_from_env(),
            today,
        )
        .await
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Caregivers ---

    #[tool(description = "Add a caregiver contact for missed-dose alerts and reports")]
    fn add_caregiver(&self, Parameters(p): Parameters<AddCaregiverParams>) -> Result<CallToolResult, McpError> {
        let data = CaregiverCreate {
            name: p.name,
            phone: p.phone,
            email: p.email,
            notification_type: NotificationType::from_str(&p.notification_type),
            relationship: p.relationship,
        };
        let result = caregivers::add_caregiver(&self.database, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a caregiver by id")]
    fn get_caregiver(&self, Parameters(p): Parameters<GetCaregiverParams>) -> Result<CallToolResult, McpError> {
        let result = caregivers::get_caregiver(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(caregiver) => json_result(&caregiver),
            None => not_found("Caregiver", p.id),
        }
    }

    #[tool(description = "List caregivers, active first")]
    fn list_caregivers(&self) -> Result<CallToolResult, McpError> {
        let result = caregivers::list_caregivers(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Update a caregiver's contact details, channel, or active flag")]
    fn update_caregiver(&self, Parameters(p): Parameters<UpdateCaregiverParams>) -> Result<CallToolResult, McpError> {
        let data = CaregiverUpdate {
            name: p.name,
            phone: p.phone,
            email: p.email,
            notification_type: p.notification_type.as_deref().map(NotificationType::from_str),
            relationship: p.relationship,
            active: p.active,
        };
        let result = caregivers::update_caregiver(&self.database, p.id, data)
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(caregiver) => json_result(&caregiver),
            None => not_found("Caregiver", p.id),
        }
    }

    #[tool(description = "Delete a caregiver")]
    fn delete_caregiver(&self, Parameters(p): Parameters<DeleteCaregiverParams>) -> Result<CallToolResult, McpError> {
        let deleted = caregivers::delete_caregiver(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        if deleted {
            json_result(&serde_json::json!({ "success": true, "deleted_id": p.id }))
        } else {
            not_found("Caregiver", p.id)
        }
    }

    // --- Alerts ---

    #[tool(description = "Run one overdue-dose sweep immediately: alert caregivers about unacknowledged doses past their grace period and log the misses")]
    async fn check_alerts_now(&self) -> Result<CallToolResult, McpError> {
        let result = alerts::check_alerts_now(&self.database, self.notifier.as_ref())
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Send a test alert to the first reachable caregiver to verify relay wiring")]
    async fn send_test_alert(&self) -> Result<CallToolResult, McpError> {
        let result = alerts::send_test_alert(&self.database, self.notifier.as_ref())
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }
}

#[tool_handler]
impl ServerHandler for MedtrackService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "medtrack".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Medication Tracker".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "medtrack - personal medication tracking and adherence. \
                 IMPORTANT: Call medication_instructions when starting a session. \
                 Medicines: add/get/list/update/delete/search_medicines, low_stock, medicine_stats, \
                 add/update/remove_schedule_entry. \
                 Doses: today_schedule, record_taken (virtual occurrences), \
                 update/delete_tracking_record (persisted records). \
                 Adherence: health_summary, missed_medications, weekly_report, send_weekly_report. \
                 Caregivers: add/get/list/update/delete_caregiver. \
                 Alerts: check_alerts_now, send_test_alert."
                    .into(),
            ),
        }
    }
}
