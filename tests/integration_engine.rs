//! Integration tests for schedule evaluation and the thermal-rest governor,
//! driven through the full runtime against the in-memory backend.

mod common;

use econome::devices::types::{DeviceState, DeviceType};
use econome::engine::economy::EconomySettings;
use econome::ports::HomeDataSource;
use econome::savings::SavingsCategory;

use common::{at, backend_for, device, monday, runtime_over, schedule, single_home_spec};

#[tokio::test]
async fn schedule_window_drives_device_state() {
    let spec = single_home_spec(
        vec![device(5, DeviceType::WaterHeating, 2000.0, DeviceState::Off)],
        vec![schedule(9, 5, at(8, 0), at(10, 0), DeviceState::On)],
        EconomySettings::default(),
    );
    let backend = backend_for(&spec);
    let runtime = runtime_over(&backend);

    // Before the window: nothing happens.
    let summary = runtime.tick_once(monday(7, 59)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 0);
    assert_eq!(backend.device_state(1, 5), Some(DeviceState::Off));

    // Window start is inclusive.
    let summary = runtime.tick_once(monday(8, 0)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 1);
    assert_eq!(backend.device_state(1, 5), Some(DeviceState::On));

    // Mid-window re-evaluation is idempotent over the written-back state.
    let summary = runtime.tick_once(monday(9, 30)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 0);

    // Window end is exclusive; the schedule stops prescribing and the
    // engine leaves the device alone.
    let summary = runtime.tick_once(monday(10, 0)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 0);
    assert_eq!(backend.device_state(1, 5), Some(DeviceState::On));
}

#[tokio::test]
async fn latest_created_schedule_wins_on_overlap() {
    let mut on_all_week = schedule(1, 7, at(8, 0), at(22, 0), DeviceState::On);
    on_all_week.created_offset_minutes = 0;
    let mut off_monday = schedule(2, 7, at(8, 0), at(22, 0), DeviceState::Off);
    off_monday.days_of_week = [1].into_iter().collect();
    off_monday.created_offset_minutes = 5;

    let spec = single_home_spec(
        vec![device(7, DeviceType::Electronics, 120.0, DeviceState::On)],
        vec![on_all_week, off_monday],
        EconomySettings::default(),
    );
    let backend = backend_for(&spec);
    let runtime = runtime_over(&backend);

    let summary = runtime.tick_once(monday(10, 0)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 1);
    assert_eq!(backend.device_state(1, 7), Some(DeviceState::Off));
}

#[tokio::test]
async fn orphaned_schedule_is_deactivated_not_deleted() {
    let spec = single_home_spec(
        vec![device(3, DeviceType::Lighting, 60.0, DeviceState::Off)],
        vec![
            schedule(1, 3, at(8, 0), at(12, 0), DeviceState::On),
            // References a device that does not exist.
            schedule(2, 99, at(8, 0), at(12, 0), DeviceState::On),
        ],
        EconomySettings::default(),
    );
    let backend = backend_for(&spec);
    let runtime = runtime_over(&backend);

    runtime.tick_once(monday(9, 0)).await.expect("tick runs");

    let active = backend.list_active_schedules(1).await.expect("home exists");
    let ids: Vec<u64> = active.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1], "orphan must be deactivated");
    // The healthy schedule still applied.
    assert_eq!(backend.device_state(1, 3), Some(DeviceState::On));
}

#[tokio::test]
async fn compressor_restart_honors_thermal_rest() {
    // Device last changed state at the scenario start (06:00 here is
    // irrelevant; what matters is the change at 08:05 below).
    let spec = single_home_spec(
        vec![device(4, DeviceType::Refrigeration, 150.0, DeviceState::On)],
        vec![
            // Forced off for five minutes, then back on.
            schedule(1, 4, at(8, 5), at(8, 10), DeviceState::Off),
            schedule(2, 4, at(8, 10), at(12, 0), DeviceState::On),
        ],
        EconomySettings::default(),
    );
    let backend = backend_for(&spec);
    let runtime = runtime_over(&backend);

    // 08:05: turned off; the rest clock starts here.
    runtime.tick_once(monday(8, 5)).await.expect("tick runs");
    assert_eq!(backend.device_state(1, 4), Some(DeviceState::Off));

    // 08:10: the ON schedule matches but only 5 of 15 minutes have
    // elapsed. The turn-on is held and a thermal-rest saving is booked.
    let summary = runtime.tick_once(monday(8, 10)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 0);
    assert_eq!(summary.deferrals, 1);
    assert_eq!(backend.device_state(1, 4), Some(DeviceState::Off));
    assert!(
        backend
            .ledger()
            .snapshot()
            .iter()
            .any(|r| r.category == SavingsCategory::ThermalRest)
    );

    // 08:20: rest window elapsed, the restart goes through.
    let summary = runtime.tick_once(monday(8, 20)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 1);
    assert_eq!(summary.deferrals, 0);
    assert_eq!(backend.device_state(1, 4), Some(DeviceState::On));
}

#[tokio::test]
async fn skipped_ticks_are_recovered_by_the_next_one() {
    let spec = single_home_spec(
        vec![device(5, DeviceType::WaterHeating, 2000.0, DeviceState::Off)],
        vec![schedule(9, 5, at(8, 0), at(10, 0), DeviceState::On)],
        EconomySettings::default(),
    );
    let backend = backend_for(&spec);
    let runtime = runtime_over(&backend);

    // No tick ran at 08:00; the 08:23 tick derives the same decision.
    let summary = runtime.tick_once(monday(8, 23)).await.expect("tick runs");
    assert_eq!(summary.commands_sent, 1);
    assert_eq!(backend.device_state(1, 5), Some(DeviceState::On));
}
