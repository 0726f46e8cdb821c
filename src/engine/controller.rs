//! Economy Mode controller: the per-tick decision pass for one home.
//!
//! The controller is stateless across ticks and pure over its inputs: it
//! consumes an immutable [`HomeSnapshot`] taken at tick start and produces a
//! [`TickOutcome`] of commands, deferrals, and savings. Skipping a tick is
//! always safe; the next tick re-derives every decision from scratch.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::devices::types::{
    Device, DeviceId, DeviceState, HomeId, HomeSupply, PowerSource, PriorityLevel, ScheduleId,
};
use crate::error::EngineError;
use crate::savings::{SavingsCategory, SavingsRecord};

use super::economy::EconomySettings;
use super::priority::classify;
use super::schedule::{Actor, Schedule, evaluate};
use super::source::SourceOptimizer;
use super::thermal;

/// Engine-wide parameters shared by every home on a tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Wall-clock instant this tick evaluates at.
    pub now: NaiveDateTime,
    /// Evaluation interval; shed-load energy is accounted per tick.
    pub tick_seconds: u64,
    /// Grid tariff used to price saved energy.
    pub gnf_per_kwh: f32,
}

impl TickContext {
    pub fn tick_hours(&self) -> f32 {
        self.tick_seconds as f32 / 3600.0
    }
}

/// Immutable per-tick view of one home, assembled by the runtime.
///
/// Dashboard writes landing mid-tick are not visible here; they apply from
/// the next snapshot.
#[derive(Debug, Clone)]
pub struct HomeSnapshot {
    pub home_id: HomeId,
    pub supply: HomeSupply,
    pub devices: Vec<Device>,
    pub schedules: Vec<Schedule>,
    pub settings: EconomySettings,
    pub battery_percent: Option<f32>,
    pub balance_gnf: i64,
    /// Source chosen on the previous tick; seeds the hysteresis band.
    pub previous_source: PowerSource,
}

/// Why a command was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandReason {
    Schedule,
    PriorityShedding,
    NightModeShedding,
}

/// One device command bound for the external control collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCommand {
    pub device_id: DeviceId,
    pub action: DeviceState,
    /// Supply source to execute against; hybrid homes only.
    pub source: Option<PowerSource>,
    pub reason: CommandReason,
}

/// A turn-ON held by the thermal-rest governor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deferral {
    pub device_id: DeviceId,
    pub resume_not_before: NaiveDateTime,
}

/// Everything one tick decided for one home.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub home_id: HomeId,
    pub now: NaiveDateTime,
    /// True when the auto-budget trigger fired this tick.
    pub economy_activated: bool,
    /// Mode the decisions below were made under.
    pub economy_active: bool,
    /// Source decision for hybrid homes, carried into the next snapshot.
    pub source: Option<PowerSource>,
    pub commands: Vec<DeviceCommand>,
    pub deferrals: Vec<Deferral>,
    pub savings: Vec<SavingsRecord>,
    /// Active schedules referencing devices that no longer exist.
    pub orphaned_schedule_ids: Vec<ScheduleId>,
}

/// Per-tick orchestrator over the classifier, evaluator, governor, and
/// source optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EconomyController {
    optimizer: SourceOptimizer,
}

impl EconomyController {
    pub fn new(optimizer: SourceOptimizer) -> Self {
        Self { optimizer }
    }

    /// Runs the decision pass for one home.
    ///
    /// Devices are visited in shedding order (Luxury, then Comfort, then
    /// Vital) and each decision is independent: nothing a later device does
    /// can invalidate an earlier command, so a delivery failure downstream
    /// never forces re-evaluation.
    pub fn evaluate_home(&self, ctx: &TickContext, snapshot: &HomeSnapshot) -> TickOutcome {
        let settings = &snapshot.settings;
        let economy_activated = settings.auto_budget_activates(snapshot.balance_gnf);
        let economy_active = settings.is_active || economy_activated;

        let orphaned_schedule_ids = find_orphans(&snapshot.schedules, &snapshot.devices);

        // One source decision per tick, stamped on every command.
        let source = self.optimizer.select(
            snapshot.supply,
            &settings.source_optimization,
            snapshot.battery_percent,
            snapshot.previous_source,
        );

        let mut commands = Vec::new();
        let mut deferrals = Vec::new();
        let mut savings = Vec::new();

        let mut devices: Vec<&Device> =
            snapshot.devices.iter().filter(|d| d.controllable).collect();
        devices.sort_by_key(|d| (classify(d).shed_rank(), d.id));

        let night = settings.night_mode.contains(ctx.now.time());
        let tick_kwh_per_kw = ctx.tick_hours();

        for device in devices {
            let scheduled = match evaluate(device.id, &snapshot.schedules, ctx.now, Actor::System)
            {
                Ok(action) => action.map(|a| a.action),
                // System evaluation has no permission scope to violate.
                Err(_) => None,
            };

            let (desired, reason) = if !economy_active {
                (scheduled, CommandReason::Schedule)
            } else {
                match classify(device) {
                    // Forced OFF unless a schedule explicitly turns it ON.
                    PriorityLevel::Luxury => {
                        if scheduled == Some(DeviceState::On) {
                            (Some(DeviceState::On), CommandReason::Schedule)
                        } else {
                            (Some(DeviceState::Off), CommandReason::PriorityShedding)
                        }
                    }
                    // Shed only inside the night-mode window.
                    PriorityLevel::Comfort => {
                        if night {
                            (Some(DeviceState::Off), CommandReason::NightModeShedding)
                        } else {
                            (scheduled, CommandReason::Schedule)
                        }
                    }
                    // Never shed by this controller, in any mode.
                    PriorityLevel::Vital => (scheduled, CommandReason::Schedule),
                }
            };

            let Some(action) = desired else {
                continue;
            };
            if action == device.current_state {
                // Idempotent: only state changes become commands.
                continue;
            }

            if action == DeviceState::On && settings.thermal_rest.enabled {
                let duration = settings.thermal_rest.duration_minutes;
                if !thermal::can_turn_on(device, ctx.now, duration) {
                    // Held, not dropped: the next tick re-evaluates.
                    deferrals.push(Deferral {
                        device_id: device.id,
                        resume_not_before: thermal::rest_elapses_at(device, duration),
                    });
                    let kwh = thermal::avoided_short_cycle_kwh(device, ctx.now, duration);
                    savings.push(self.record(ctx, snapshot, SavingsCategory::ThermalRest, kwh));
                    continue;
                }
            }

            if action == DeviceState::Off
                && device.is_on()
                && reason != CommandReason::Schedule
            {
                let kwh = device.rated_kw() * tick_kwh_per_kw;
                savings.push(self.record(
                    ctx,
                    snapshot,
                    SavingsCategory::PriorityArbitrage,
                    kwh,
                ));
            }

            commands.push(DeviceCommand {
                device_id: device.id,
                action,
                source,
                reason,
            });
        }

        // A switch back to solar covers this tick's running load for free.
        if source == Some(PowerSource::SolarBattery)
            && snapshot.previous_source == PowerSource::Grid
        {
            let on_load_kw = projected_on_load_kw(&snapshot.devices, &commands);
            if on_load_kw > 0.0 {
                let kwh = on_load_kw * tick_kwh_per_kw;
                savings.push(self.record(
                    ctx,
                    snapshot,
                    SavingsCategory::SourceOptimization,
                    kwh,
                ));
            }
        }

        TickOutcome {
            home_id: snapshot.home_id,
            now: ctx.now,
            economy_activated,
            economy_active,
            source,
            commands,
            deferrals,
            savings,
            orphaned_schedule_ids,
        }
    }

    fn record(
        &self,
        ctx: &TickContext,
        snapshot: &HomeSnapshot,
        category: SavingsCategory,
        energy_kwh: f32,
    ) -> SavingsRecord {
        SavingsRecord {
            home_id: snapshot.home_id,
            timestamp: ctx.now,
            category,
            energy_kwh_saved: energy_kwh,
            cost_gnf_saved: energy_kwh * ctx.gnf_per_kwh,
        }
    }
}

/// Active schedules whose device is gone. The runtime deactivates them
/// (never deletes) and logs the inconsistency for operator review.
fn find_orphans(schedules: &[Schedule], devices: &[Device]) -> Vec<ScheduleId> {
    schedules
        .iter()
        .filter(|s| s.is_active && !devices.iter().any(|d| d.id == s.device_id))
        .map(|s| s.id)
        .collect()
}

/// Total rated load (kW) that will be running once this tick's commands
/// apply.
fn projected_on_load_kw(devices: &[Device], commands: &[DeviceCommand]) -> f32 {
    devices
        .iter()
        .map(|d| {
            let next_state = commands
                .iter()
                .find(|c| c.device_id == d.id)
                .map_or(d.current_state, |c| c.action);
            match next_state {
                DeviceState::On => d.rated_kw(),
                DeviceState::Off => 0.0,
            }
        })
        .sum()
}

/// Convenience for callers that only need the inconsistency errors.
pub fn orphan_errors(outcome: &TickOutcome, schedules: &[Schedule]) -> Vec<EngineError> {
    outcome
        .orphaned_schedule_ids
        .iter()
        .filter_map(|id| {
            schedules
                .iter()
                .find(|s| s.id == *id)
                .map(|s| EngineError::InconsistentState {
                    schedule: s.id,
                    device: s.device_id,
                })
        })
        .collect()
}
