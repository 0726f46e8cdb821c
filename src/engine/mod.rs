//! Arbitration engine: classification, schedule evaluation, thermal rest,
//! source optimization, and the per-tick Economy Mode controller.

pub mod controller;
pub mod economy;
/// Priority tier classification.
pub mod priority;
/// Time-window schedules and their evaluator.
pub mod schedule;
pub mod source;
/// Thermal-rest governor for compressor appliances.
pub mod thermal;

pub use controller::{EconomyController, HomeSnapshot, TickContext, TickOutcome};
pub use economy::EconomySettings;
pub use schedule::{Actor, Schedule};
pub use source::SourceOptimizer;
