//! Priority classifier: maps a device to its shedding tier.

use crate::devices::types::{Device, DeviceType, PriorityLevel};

/// Default tier for a device class, used when no override is stored.
///
/// Refrigeration and lighting keep food safe and rooms lit and are never
/// shed. Climate control and water heating are the heaviest discretionary
/// loads. Everything else, including the `Other` catch-all, lands on
/// Comfort.
pub fn default_tier(device_type: DeviceType) -> PriorityLevel {
    match device_type {
        DeviceType::Refrigeration | DeviceType::Lighting => PriorityLevel::Vital,
        DeviceType::Electronics | DeviceType::Other => PriorityLevel::Comfort,
        DeviceType::ClimateControl | DeviceType::WaterHeating => PriorityLevel::Luxury,
    }
}

/// Classifies a device, honoring any manual override.
///
/// Pure function of device attributes; a stored override always takes
/// precedence over the type-derived default.
pub fn classify(device: &Device) -> PriorityLevel {
    device
        .priority_override
        .unwrap_or_else(|| default_tier(device.device_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::{DeviceSource, DeviceState};
    use chrono::NaiveDate;

    fn make_device(device_type: DeviceType, overridden: Option<PriorityLevel>) -> Device {
        Device {
            id: 1,
            home_id: 1,
            name: "test".to_string(),
            device_type,
            rated_power_watts: 150.0,
            source: DeviceSource::Manual,
            priority_override: overridden,
            controllable: true,
            current_state: DeviceState::Off,
            last_state_change_at: NaiveDate::from_ymd_opt(2025, 1, 6)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
        }
    }

    #[test]
    fn default_mapping_covers_every_class() {
        assert_eq!(default_tier(DeviceType::Refrigeration), PriorityLevel::Vital);
        assert_eq!(default_tier(DeviceType::Lighting), PriorityLevel::Vital);
        assert_eq!(default_tier(DeviceType::Electronics), PriorityLevel::Comfort);
        assert_eq!(default_tier(DeviceType::Other), PriorityLevel::Comfort);
        assert_eq!(default_tier(DeviceType::ClimateControl), PriorityLevel::Luxury);
        assert_eq!(default_tier(DeviceType::WaterHeating), PriorityLevel::Luxury);
    }

    #[test]
    fn manual_override_takes_precedence() {
        let device = make_device(DeviceType::ClimateControl, Some(PriorityLevel::Vital));
        assert_eq!(classify(&device), PriorityLevel::Vital);
    }

    #[test]
    fn no_override_falls_back_to_type_default() {
        let device = make_device(DeviceType::Refrigeration, None);
        assert_eq!(classify(&device), PriorityLevel::Vital);
    }
}
