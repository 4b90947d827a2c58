//! HTTP API handlers for acp-lc

pub mod health;
pub mod leads;

pub use health::health_routes;
pub use leads::{partial_lead, submit_lead};
