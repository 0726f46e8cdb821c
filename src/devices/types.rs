//! Shared device vocabulary: identifiers, closed enums, and the device view.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub type HomeId = u64;
pub type DeviceId = u64;
pub type MemberId = u64;
pub type ScheduleId = u64;
pub type SuggestionId = u64;

/// Closed set of appliance classes the engine arbitrates over.
///
/// Detection feeds (NILM) and manual registration both normalize to this
/// enum; anything neither source can name arrives as `Other`, which the
/// priority classifier maps to the safe Comfort tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Lighting,
    Refrigeration,
    ClimateControl,
    WaterHeating,
    Electronics,
    Other,
}

impl DeviceType {
    /// Human-readable name for logs and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Lighting => "Lighting",
            Self::Refrigeration => "Refrigeration",
            Self::ClimateControl => "Climate control",
            Self::WaterHeating => "Water heating",
            Self::Electronics => "Electronics",
            Self::Other => "Other",
        }
    }

    /// Config string value (kebab-case).
    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::Lighting => "lighting",
            Self::Refrigeration => "refrigeration",
            Self::ClimateControl => "climate-control",
            Self::WaterHeating => "water-heating",
            Self::Electronics => "electronics",
            Self::Other => "other",
        }
    }

    /// Compressor-based classes are subject to thermal-rest cycling.
    pub fn is_compressor_based(&self) -> bool {
        matches!(self, Self::Refrigeration | Self::ClimateControl)
    }

    /// All supported device classes.
    pub fn all() -> &'static [DeviceType] {
        &[
            Self::Lighting,
            Self::Refrigeration,
            Self::ClimateControl,
            Self::WaterHeating,
            Self::Electronics,
            Self::Other,
        ]
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for DeviceType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.to_config_value() == s.to_lowercase())
            .copied()
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "unknown device type `{s}` (expected one of: {})",
                    Self::all()
                        .iter()
                        .map(|t| t.to_config_value())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Three-tier priority model used for shedding during Economy Mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityLevel {
    Vital,
    Comfort,
    Luxury,
}

impl PriorityLevel {
    /// Shedding rank: lower ranks are shed first.
    ///
    /// Luxury devices are the first candidates, Vital the last (and in
    /// practice never shed by the controller).
    pub fn shed_rank(&self) -> u8 {
        match self {
            Self::Luxury => 0,
            Self::Comfort => 1,
            Self::Vital => 2,
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vital => "VITAL",
            Self::Comfort => "COMFORT",
            Self::Luxury => "LUXURY",
        };
        write!(f, "{name}")
    }
}

/// Power state of a device; also the action a schedule or command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceState {
    On,
    Off,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "ON"),
            Self::Off => write!(f, "OFF"),
        }
    }
}

/// How a device entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceSource {
    /// Declared by a household member.
    Manual,
    /// Materialized from an accepted detection signature.
    Detected,
}

/// Supply source a command is executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerSource {
    Grid,
    SolarBattery,
}

impl fmt::Display for PowerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid => write!(f, "GRID"),
            Self::SolarBattery => write!(f, "SOLAR_BATTERY"),
        }
    }
}

/// Electrical supply configuration of a home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HomeSupply {
    /// Grid-only home (EDG subscription, no local storage).
    EdgOnly,
    /// Grid plus solar/battery installation.
    Hybrid,
}

/// Unified device view consumed by the arbitration engine.
///
/// `current_state` is owned by the home's controller and mutated only by
/// its command-emission step; no two home workers share a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub home_id: HomeId,
    pub name: String,
    pub device_type: DeviceType,
    pub rated_power_watts: f32,
    pub source: DeviceSource,
    /// Manual tier override; takes precedence over the type-derived default.
    pub priority_override: Option<PriorityLevel>,
    pub controllable: bool,
    pub current_state: DeviceState,
    pub last_state_change_at: NaiveDateTime,
}

impl Device {
    pub fn is_on(&self) -> bool {
        self.current_state == DeviceState::On
    }

    /// Rated power expressed in kilowatts.
    pub fn rated_kw(&self) -> f32 {
        self.rated_power_watts / 1000.0
    }
}
