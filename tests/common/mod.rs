//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use econome::config::EngineConfig;
use econome::devices::types::{DeviceState, DeviceType, HomeSupply};
use econome::engine::economy::EconomySettings;
use econome::ports::{CommandSink, HomeDataSource, SavingsSink};
use econome::runtime::Runtime;
use econome::scenario::{DeviceSpec, HomeSpec, ScenarioBackend, ScenarioSpec, ScheduleSpec};

/// Monday 2025-01-06.
pub fn monday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 6)
        .expect("valid date")
        .and_hms_opt(h, m, 0)
        .expect("valid time")
}

pub fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

/// Scenario with a single grid-only home and the given devices/schedules,
/// anchored at Monday 06:00.
pub fn single_home_spec(
    devices: Vec<DeviceSpec>,
    schedules: Vec<ScheduleSpec>,
    settings: EconomySettings,
) -> ScenarioSpec {
    ScenarioSpec {
        seed: 42,
        start: monday(6, 0),
        homes: vec![HomeSpec {
            id: 1,
            supply: HomeSupply::EdgOnly,
            balance_gnf: 100_000,
            battery_percent: None,
            devices,
            schedules,
            settings,
        }],
    }
}

pub fn device(id: u64, device_type: DeviceType, watts: f32, state: DeviceState) -> DeviceSpec {
    DeviceSpec {
        id,
        name: format!("device-{id}"),
        device_type,
        rated_power_watts: watts,
        controllable: true,
        priority_override: None,
        initial_state: state,
        detected: false,
    }
}

/// Every-day schedule with the given window and action.
pub fn schedule(
    id: u64,
    device_id: u64,
    start: NaiveTime,
    end: NaiveTime,
    action: DeviceState,
) -> ScheduleSpec {
    ScheduleSpec {
        id,
        device_id,
        days_of_week: (1..=7).collect::<BTreeSet<u8>>(),
        start_time: start,
        end_time: end,
        action,
        applies_to_all: true,
        allowed_member_ids: BTreeSet::new(),
        created_by: 1,
        created_offset_minutes: 0,
    }
}

pub fn backend_for(spec: &ScenarioSpec) -> Arc<ScenarioBackend> {
    Arc::new(ScenarioBackend::from_spec(spec))
}

/// Runtime with default engine config over the given backend.
pub fn runtime_over(backend: &Arc<ScenarioBackend>) -> Arc<Runtime> {
    let config = EngineConfig::default();
    Arc::new(Runtime::new(
        &config,
        Arc::clone(backend) as Arc<dyn HomeDataSource>,
        Arc::clone(backend) as Arc<dyn CommandSink>,
        Arc::clone(backend) as Arc<dyn SavingsSink>,
    ))
}
