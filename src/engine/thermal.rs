//! Thermal-rest governor for compressor-based appliances.
//!
//! A compressor that restarts immediately after stopping short-cycles:
//! it draws locked-rotor current against undissipated head pressure. The
//! governor enforces a minimum off-duration before a turn-ON is honored.
//! It is a pure function of `(last_state_change_at, now, duration)` and is
//! re-evaluated every tick, so there are no timers to persist or restore.

use chrono::{Duration, NaiveDateTime};

use crate::devices::types::{Device, DeviceState};

/// Fraction of its rated power a compressor draws over an average duty
/// cycle. Used to estimate the energy a prevented short-cycle would have
/// burned.
pub const COMPRESSOR_DUTY_FRACTION: f32 = 0.6;

/// Whether a turn-ON command for `device` may be honored at `now`.
///
/// Devices that are not compressor-based are never held. A compressor that
/// was switched OFF within `duration_minutes` of `now` is deferred; at
/// exactly `duration_minutes` after the switch-off the command is allowed
/// again.
pub fn can_turn_on(device: &Device, now: NaiveDateTime, duration_minutes: u32) -> bool {
    if !device.device_type.is_compressor_based() {
        return true;
    }
    if device.current_state == DeviceState::On {
        // The rest window only starts counting from a switch to OFF.
        return true;
    }
    let elapsed = now - device.last_state_change_at;
    elapsed >= Duration::minutes(i64::from(duration_minutes))
}

/// Instant at which a currently deferred device becomes eligible again.
pub fn rest_elapses_at(device: &Device, duration_minutes: u32) -> NaiveDateTime {
    device.last_state_change_at + Duration::minutes(i64::from(duration_minutes))
}

/// Energy (kWh) avoided by holding a turn-ON for the rest of the window.
///
/// Estimated as `rated power x duty fraction x remaining fraction of the
/// rest window`: the closer to the switch-off the restart attempt is, the
/// more of the wasted cycle is avoided.
pub fn avoided_short_cycle_kwh(device: &Device, now: NaiveDateTime, duration_minutes: u32) -> f32 {
    if duration_minutes == 0 {
        return 0.0;
    }
    let elapsed_min = (now - device.last_state_change_at).num_seconds() as f32 / 60.0;
    let remaining_fraction = (1.0 - elapsed_min / duration_minutes as f32).clamp(0.0, 1.0);
    let window_hours = duration_minutes as f32 / 60.0;
    device.rated_kw() * COMPRESSOR_DUTY_FRACTION * window_hours * remaining_fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::{DeviceSource, DeviceType};
    use chrono::NaiveDate;

    fn instant(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .expect("valid date")
            .and_hms_opt(h, m, s)
            .expect("valid time")
    }

    fn compressor_off_at(t: NaiveDateTime, device_type: DeviceType) -> Device {
        Device {
            id: 1,
            home_id: 1,
            name: "clim salon".to_string(),
            device_type,
            rated_power_watts: 1200.0,
            source: DeviceSource::Manual,
            priority_override: None,
            controllable: true,
            current_state: DeviceState::Off,
            last_state_change_at: t,
        }
    }

    #[test]
    fn holds_for_the_entire_rest_window() {
        let device = compressor_off_at(instant(10, 0, 0), DeviceType::Refrigeration);
        assert!(!can_turn_on(&device, instant(10, 0, 0), 15));
        assert!(!can_turn_on(&device, instant(10, 7, 30), 15));
        assert!(!can_turn_on(&device, instant(10, 14, 59), 15));
        assert!(can_turn_on(&device, instant(10, 15, 0), 15));
        assert!(can_turn_on(&device, instant(10, 15, 1), 15));
    }

    // Spec scenario: CLIM turned off 10:00:00, threshold 15 min; ON request
    // at 10:10:00 is deferred, at 10:15:01 it is allowed.
    #[test]
    fn clim_deferral_scenario() {
        let device = compressor_off_at(instant(10, 0, 0), DeviceType::ClimateControl);
        assert!(!can_turn_on(&device, instant(10, 10, 0), 15));
        assert!(can_turn_on(&device, instant(10, 15, 1), 15));
        assert_eq!(rest_elapses_at(&device, 15), instant(10, 15, 0));
    }

    #[test]
    fn non_compressor_devices_are_never_held() {
        let mut device = compressor_off_at(instant(10, 0, 0), DeviceType::WaterHeating);
        device.name = "chauffe-eau".to_string();
        assert!(can_turn_on(&device, instant(10, 0, 1), 15));
    }

    #[test]
    fn running_compressor_is_not_held() {
        let mut device = compressor_off_at(instant(10, 0, 0), DeviceType::Refrigeration);
        device.current_state = DeviceState::On;
        assert!(can_turn_on(&device, instant(10, 1, 0), 15));
    }

    #[test]
    fn avoided_energy_shrinks_as_the_window_elapses() {
        let device = compressor_off_at(instant(10, 0, 0), DeviceType::ClimateControl);
        let early = avoided_short_cycle_kwh(&device, instant(10, 0, 0), 15);
        let late = avoided_short_cycle_kwh(&device, instant(10, 12, 0), 15);
        assert!(early > late);
        assert!(late > 0.0);

        // Full window at 1.2 kW, 60% duty, 15 min: 0.18 kWh.
        assert!((early - 0.18).abs() < 1e-4);

        // Past the window nothing is avoided.
        let past = avoided_short_cycle_kwh(&device, instant(10, 20, 0), 15);
        assert_eq!(past, 0.0);
    }
}
