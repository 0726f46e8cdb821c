//! Engine error taxonomy.

use thiserror::Error;

use crate::devices::types::{DeviceId, MemberId, ScheduleId};

/// Every failure the engine can surface to its callers.
///
/// Validation and authorization errors are caller mistakes and abort the
/// offending operation. Device and timeout errors are environmental: the
/// runtime logs them, isolates the affected device or home, and retries on
/// the next tick.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected input (malformed schedule window, bad day set, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A member acted on a schedule outside their permission scope.
    #[error("member {member} is not permitted to act on schedule {schedule}")]
    Authorization {
        member: MemberId,
        schedule: ScheduleId,
    },

    /// Command delivery to a device failed.
    #[error("device {device} unreachable: {reason}")]
    DeviceUnreachable { device: DeviceId, reason: String },

    /// An active schedule references a device that no longer exists.
    #[error("schedule {schedule} references missing device {device}")]
    InconsistentState {
        schedule: ScheduleId,
        device: DeviceId,
    },

    /// An external call exceeded the runtime's I/O bound.
    #[error("operation `{0}` timed out")]
    Timeout(&'static str),

    /// Bad configuration, scenario, or lookup target.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifiers() {
        let err = EngineError::InconsistentState {
            schedule: 7,
            device: 42,
        };
        let message = err.to_string();
        assert!(message.contains('7'));
        assert!(message.contains("42"));
    }

    #[test]
    fn unreachable_device_carries_the_reason() {
        let err = EngineError::DeviceUnreachable {
            device: 3,
            reason: "relay offline".to_string(),
        };
        assert!(err.to_string().contains("relay offline"));
    }
}
