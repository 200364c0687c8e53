//! Metro fleet operations optimizer
//!
//! Synthesizes per-train operational features, runs them through delay,
//! readiness, selection and scheduling capabilities, and reconciles the
//! outputs into a final service/standby/maintenance plan.

pub mod api;
pub mod capability;
pub mod compare;
pub mod config;
pub mod error;
pub mod fleet;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod synth;

pub use error::{FleetError, Result};
