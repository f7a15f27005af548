//! # Conclave Monitor
//!
//! Liveness probing for managed agents.
//!
//! ## Features
//!
//! - One probe timer per monitored agent
//! - Probes go through the agent's ordinary single-flight exchange path
//! - Healthy/Unhealthy classification with change notifications

pub mod error;
pub mod health;
pub mod monitor;

pub use error::MonitorError;
pub use health::{AgentHealth, HealthChange, HealthStatus};
pub use monitor::{probe_once, HealthMonitor, ProbeOutcome};
