//! medtrack library
//!
//! Medication tracking, weekly schedules, adherence statistics, and
//! caregiver alerting.

pub mod adherence;
pub mod alerts;
pub mod build_info;
pub mod db;
pub mod mcp;
pub mod models;
pub mod tools;
