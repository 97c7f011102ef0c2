//! Data models
//!
//! Rust structs representing database entities.

mod alert;
mod caregiver;
mod medicine;
mod schedule;
mod tracking;

pub use alert::AlertRecord;
pub use caregiver::{Caregiver, CaregiverCreate, CaregiverUpdate, NotificationType};
pub use medicine::{Medicine, MedicineCreate, MedicineStats, MedicineUpdate};
pub use schedule::{time_to_minutes, ScheduleEntry, ScheduleEntryCreate};
pub use tracking::TrackingRecord;
