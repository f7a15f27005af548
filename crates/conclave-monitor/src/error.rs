//! Monitor errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Agent '{0}' is already monitored")]
    AlreadyMonitored(String),

    #[error("Agent '{0}' is not monitored")]
    NotMonitored(String),

    #[error("Health monitor has been shut down")]
    ShutDown,
}
