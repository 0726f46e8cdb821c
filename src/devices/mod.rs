//! Device model and registry adapter.

/// Normalization of manual and detected device feeds.
pub mod registry;
pub mod types;

// Re-export the main types for convenience
pub use types::{Device, DeviceId, DeviceState, DeviceType, HomeId, PowerSource, PriorityLevel};
