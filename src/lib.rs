//! Household energy load arbitration and scheduling engine.
//!
//! Arbitrates which appliances may draw power at any moment, balancing
//! member comfort against a prepaid energy budget: priority-tiered shedding
//! under Economy Mode, time-window schedules, a thermal-rest governor for
//! compressor appliances, grid-vs-solar source optimization for hybrid
//! homes, and an append-only savings ledger.

pub mod config;
/// Device model, priority tiers, and the manual/detected registry merge.
pub mod devices;
/// Arbitration engine: the pure per-tick decision core.
pub mod engine;
pub mod error;
pub mod ports;
pub mod runtime;
pub mod savings;
pub mod scenario;
pub mod suggestion;

#[cfg(feature = "api")]
pub mod api;
