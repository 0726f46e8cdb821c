//! Per-home Economy Mode settings and the activation state machine.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// What flips Economy Mode on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EconomyTrigger {
    /// Toggled by the home administrator only.
    Manual,
    /// Activated when the account balance drops to the budget threshold.
    AutoBudget,
}

/// Minimum off-duration enforcement for compressor appliances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermalRestSettings {
    pub enabled: bool,
    pub duration_minutes: u32,
}

impl Default for ThermalRestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_minutes: 15,
        }
    }
}

/// Grid-vs-solar sourcing preferences for hybrid homes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOptimizationSettings {
    pub enabled: bool,
    /// Prefer solar/battery whenever charge allows.
    pub solar_priority: bool,
    /// Battery percentage at or below which the home falls back to EDG.
    pub edg_min_battery_percent: f32,
}

impl Default for SourceOptimizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            solar_priority: true,
            edg_min_battery_percent: 20.0,
        }
    }
}

/// Night window during which Comfort-tier devices are shed.
///
/// Unlike device schedules, this is a home-wide band and may wrap past
/// midnight (22:00-06:00 is the common case).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NightWindow {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::from_hms_opt(22, 0, 0).expect("valid literal"),
            end: NaiveTime::from_hms_opt(6, 0, 0).expect("valid literal"),
        }
    }
}

impl NightWindow {
    /// True when `time` lies inside the (possibly wrapping) window.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let minute = time.hour() * 60 + time.minute();
        let start = self.start.hour() * 60 + self.start.minute();
        let end = self.end.hour() * 60 + self.end.minute();
        if start <= end {
            minute >= start && minute < end
        } else {
            minute >= start || minute < end
        }
    }
}

/// Per-home Economy Mode configuration.
///
/// Singleton per home, created with these defaults on first access and
/// mutated only by the home administrator (or by the auto-budget trigger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomySettings {
    pub is_active: bool,
    pub trigger: EconomyTrigger,
    pub budget_threshold_gnf: i64,
    pub thermal_rest: ThermalRestSettings,
    pub source_optimization: SourceOptimizationSettings,
    pub night_mode: NightWindow,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            is_active: false,
            trigger: EconomyTrigger::Manual,
            budget_threshold_gnf: 0,
            thermal_rest: ThermalRestSettings::default(),
            source_optimization: SourceOptimizationSettings::default(),
            night_mode: NightWindow::default(),
        }
    }
}

impl EconomySettings {
    /// Whether this tick must transition the home into Economy Mode.
    ///
    /// Only the auto-budget trigger activates here. There is deliberately
    /// no reverse transition: once active, the mode stays active even if
    /// the balance recovers, until the administrator deactivates it
    /// manually. Auto-deactivation would oscillate around the threshold as
    /// the balance is topped up and drained.
    pub fn auto_budget_activates(&self, balance_gnf: i64) -> bool {
        !self.is_active
            && self.trigger == EconomyTrigger::AutoBudget
            && balance_gnf <= self.budget_threshold_gnf
    }
}
