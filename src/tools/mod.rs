//! medtrack tools module
//!
//! MCP tool implementations.

pub mod alerts;
pub mod caregivers;
pub mod medicines;
pub mod reports;
pub mod status;
pub mod tracking;
