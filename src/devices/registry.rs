//! Device registry adapter.
//!
//! Normalizes the two upstream device feeds — manually declared devices and
//! automatically detected signatures — into the single view the controller
//! iterates over. The detection pipeline itself is an external collaborator;
//! this adapter only merges its already-classified output.

use std::collections::BTreeMap;

use super::types::Device;

/// Merges manual and detected device lists into one deduplicated view.
///
/// When both feeds claim the same device id, the manual declaration wins:
/// a household member's explicit entry carries more intent than a detected
/// signature. The result is sorted by id so downstream iteration order is
/// deterministic.
pub fn merged_view(manual: Vec<Device>, detected: Vec<Device>) -> Vec<Device> {
    let mut by_id: BTreeMap<_, Device> = BTreeMap::new();
    for device in detected {
        by_id.insert(device.id, device);
    }
    for device in manual {
        by_id.insert(device.id, device);
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::{DeviceSource, DeviceState, DeviceType};
    use chrono::NaiveDate;

    fn make_device(id: u64, name: &str, source: DeviceSource) -> Device {
        Device {
            id,
            home_id: 1,
            name: name.to_string(),
            device_type: DeviceType::Electronics,
            rated_power_watts: 100.0,
            source,
            priority_override: None,
            controllable: true,
            current_state: DeviceState::Off,
            last_state_change_at: NaiveDate::from_ymd_opt(2025, 1, 6)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
        }
    }

    #[test]
    fn manual_wins_on_id_collision() {
        let manual = vec![make_device(3, "TV (salon)", DeviceSource::Manual)];
        let detected = vec![make_device(3, "signature-3", DeviceSource::Detected)];

        let view = merged_view(manual, detected);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "TV (salon)");
        assert_eq!(view[0].source, DeviceSource::Manual);
    }

    #[test]
    fn merged_view_is_sorted_by_id() {
        let manual = vec![make_device(9, "m9", DeviceSource::Manual)];
        let detected = vec![
            make_device(4, "d4", DeviceSource::Detected),
            make_device(1, "d1", DeviceSource::Detected),
        ];

        let ids: Vec<u64> = merged_view(manual, detected).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 4, 9]);
    }

    #[test]
    fn disjoint_feeds_are_concatenated() {
        let manual = vec![make_device(1, "m1", DeviceSource::Manual)];
        let detected = vec![make_device(2, "d2", DeviceSource::Detected)];
        assert_eq!(merged_view(manual, detected).len(), 2);
    }
}
