//! Synthetic scenario backend.
//!
//! An in-memory implementation of every collaborator port, driven by a TOML
//! scenario file or a built-in preset. The demo binary and the integration
//! tests run the real runtime against this backend; production deployments
//! replace it with adapters over the platform's stores.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::devices::registry;
use crate::devices::types::{
    Device, DeviceId, DeviceSource, DeviceState, DeviceType, HomeId, HomeSupply, MemberId,
    PriorityLevel, ScheduleId, SuggestionId,
};
use crate::engine::controller::DeviceCommand;
use crate::engine::economy::EconomySettings;
use crate::engine::schedule::Schedule;
use crate::error::{EngineError, EngineResult};
use crate::ports::{CommandSink, HomeDataSource, SavingsSink, SuggestionSink};
use crate::savings::{SavingsLedger, SavingsRecord};
use crate::suggestion::{Suggestion, SuggestionStatus};

/// Scenario description parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    /// Master random seed for battery/balance drift.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Wall-clock instant the scenario starts at.
    #[serde(default = "default_start")]
    pub start: NaiveDateTime,
    pub homes: Vec<HomeSpec>,
}

fn default_seed() -> u64 {
    42
}

/// Monday 06:00, a deterministic anchor for schedule `created_at` offsets.
fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 6)
        .expect("valid literal")
        .and_hms_opt(6, 0, 0)
        .expect("valid literal")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeSpec {
    pub id: HomeId,
    pub supply: HomeSupply,
    pub balance_gnf: i64,
    #[serde(default)]
    pub battery_percent: Option<f32>,
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub schedules: Vec<ScheduleSpec>,
    #[serde(default)]
    pub settings: EconomySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub rated_power_watts: f32,
    #[serde(default = "default_true")]
    pub controllable: bool,
    #[serde(default)]
    pub priority_override: Option<PriorityLevel>,
    #[serde(default = "default_off")]
    pub initial_state: DeviceState,
    /// True for devices that arrive from the detection feed.
    #[serde(default)]
    pub detected: bool,
}

fn default_true() -> bool {
    true
}

fn default_off() -> DeviceState {
    DeviceState::Off
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    pub id: ScheduleId,
    pub device_id: DeviceId,
    pub days_of_week: BTreeSet<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub action: DeviceState,
    #[serde(default = "default_true")]
    pub applies_to_all: bool,
    #[serde(default)]
    pub allowed_member_ids: BTreeSet<MemberId>,
    #[serde(default = "default_member")]
    pub created_by: MemberId,
    /// Minutes after the scenario start this schedule was created.
    #[serde(default)]
    pub created_offset_minutes: i64,
}

fn default_member() -> MemberId {
    1
}

impl ScenarioSpec {
    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or the
    /// TOML is invalid.
    pub fn from_toml_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read \"{}\": {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("invalid scenario \"{}\": {e}", path.display())))
    }

    /// Resolves a preset name, checking `scenarios/<name>.toml` first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an unknown preset.
    pub fn from_preset(name: &str) -> EngineResult<Self> {
        let scenario_path = PathBuf::from("scenarios").join(format!("{name}.toml"));
        if scenario_path.exists() {
            return Self::from_toml_file(&scenario_path);
        }
        match name {
            "demo" => Ok(Self::demo()),
            _ => Err(EngineError::Config(format!(
                "unknown preset `{name}` (expected `demo` or file `{}`)",
                scenario_path.display()
            ))),
        }
    }

    /// Built-in two-home demo: one grid-only home on an auto-budget
    /// trigger, one hybrid home with source optimization enabled.
    pub fn demo() -> Self {
        let spec_str = include_str!("../scenarios/demo.toml");
        toml::from_str(spec_str).expect("built-in demo scenario must parse")
    }
}

/// Mutable per-home state behind the port facade.
#[derive(Debug, Clone)]
struct HomeState {
    supply: HomeSupply,
    balance_gnf: i64,
    battery_percent: Option<f32>,
    devices: Vec<Device>,
    schedules: Vec<Schedule>,
    settings: EconomySettings,
}

/// In-memory collaborator backing the demo and the integration tests.
pub struct ScenarioBackend {
    start: NaiveDateTime,
    homes: Mutex<HashMap<HomeId, HomeState>>,
    suggestions: Mutex<Vec<Suggestion>>,
    sent_commands: Mutex<Vec<DeviceCommand>>,
    ledger: SavingsLedger,
    rng: Mutex<StdRng>,
    next_schedule_id: Mutex<ScheduleId>,
    /// Devices whose command delivery is forced to fail (fault injection).
    unreachable_devices: Mutex<BTreeSet<DeviceId>>,
}

impl ScenarioBackend {
    pub fn from_spec(spec: &ScenarioSpec) -> Self {
        let mut homes = HashMap::new();
        let mut max_schedule_id = 0;

        for home in &spec.homes {
            let (manual, detected): (Vec<_>, Vec<_>) =
                home.devices.iter().partition(|d| !d.detected);
            let build = |specs: Vec<&DeviceSpec>, source: DeviceSource| {
                specs
                    .into_iter()
                    .map(|d| Device {
                        id: d.id,
                        home_id: home.id,
                        name: d.name.clone(),
                        device_type: d.device_type,
                        rated_power_watts: d.rated_power_watts,
                        source,
                        priority_override: d.priority_override,
                        controllable: d.controllable,
                        current_state: d.initial_state,
                        last_state_change_at: spec.start,
                    })
                    .collect::<Vec<_>>()
            };
            let devices = registry::merged_view(
                build(manual, DeviceSource::Manual),
                build(detected, DeviceSource::Detected),
            );

            let schedules: Vec<Schedule> = home
                .schedules
                .iter()
                .map(|s| {
                    max_schedule_id = max_schedule_id.max(s.id);
                    Schedule {
                        id: s.id,
                        device_id: s.device_id,
                        days_of_week: s.days_of_week.clone(),
                        start_time: s.start_time,
                        end_time: s.end_time,
                        action: s.action,
                        is_active: true,
                        applies_to_all: s.applies_to_all,
                        allowed_member_ids: s.allowed_member_ids.clone(),
                        created_by: s.created_by,
                        created_at: spec.start + chrono::Duration::minutes(s.created_offset_minutes),
                        auto_detected: false,
                    }
                })
                .collect();

            homes.insert(
                home.id,
                HomeState {
                    supply: home.supply,
                    balance_gnf: home.balance_gnf,
                    battery_percent: home.battery_percent,
                    devices,
                    schedules,
                    settings: home.settings.clone(),
                },
            );
        }

        Self {
            start: spec.start,
            homes: Mutex::new(homes),
            suggestions: Mutex::new(Vec::new()),
            sent_commands: Mutex::new(Vec::new()),
            ledger: SavingsLedger::new(),
            rng: Mutex::new(StdRng::seed_from_u64(spec.seed)),
            next_schedule_id: Mutex::new(max_schedule_id + 1),
            unreachable_devices: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn ledger(&self) -> &SavingsLedger {
        &self.ledger
    }

    /// Commands delivered so far, in send order.
    pub fn sent_commands(&self) -> Vec<DeviceCommand> {
        self.sent_commands
            .lock()
            .expect("scenario lock poisoned")
            .clone()
    }

    /// Forces delivery failures for a device, to exercise fault isolation.
    pub fn make_device_unreachable(&self, device: DeviceId) {
        self.unreachable_devices
            .lock()
            .expect("scenario lock poisoned")
            .insert(device);
    }

    pub fn restore_device(&self, device: DeviceId) {
        self.unreachable_devices
            .lock()
            .expect("scenario lock poisoned")
            .remove(&device);
    }

    /// Validates and stores a new schedule, assigning it an id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for malformed windows and
    /// [`EngineError::Config`] for an unknown home.
    pub fn create_schedule(
        &self,
        home: HomeId,
        mut schedule: Schedule,
    ) -> EngineResult<Schedule> {
        schedule.validate()?;
        let mut homes = self.homes.lock().expect("scenario lock poisoned");
        let state = homes
            .get_mut(&home)
            .ok_or_else(|| EngineError::Config(format!("unknown home {home}")))?;
        let mut next_id = self.next_schedule_id.lock().expect("scenario lock poisoned");
        schedule.id = *next_id;
        *next_id += 1;
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    pub fn add_suggestion(&self, suggestion: Suggestion) {
        self.suggestions
            .lock()
            .expect("scenario lock poisoned")
            .push(suggestion);
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.suggestions
            .lock()
            .expect("scenario lock poisoned")
            .clone()
    }

    /// Accepts a pending suggestion, materializing its schedule.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an unknown or already-decided
    /// suggestion and [`EngineError::Validation`] for a malformed proposal.
    pub fn accept_suggestion(
        &self,
        id: SuggestionId,
        accepted_by: MemberId,
        at: NaiveDateTime,
    ) -> EngineResult<Schedule> {
        let mut suggestions = self.suggestions.lock().expect("scenario lock poisoned");
        let suggestion = suggestions
            .iter_mut()
            .find(|s| s.id == id && s.status == SuggestionStatus::Pending)
            .ok_or_else(|| EngineError::Config(format!("no pending suggestion {id}")))?;
        let home = suggestion.home_id;
        let schedule = suggestion.accept(0, accepted_by, at)?;
        drop(suggestions);
        self.create_schedule(home, schedule)
    }

    /// Rejects a pending suggestion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an unknown or already-decided
    /// suggestion.
    pub fn reject_suggestion(&self, id: SuggestionId) -> EngineResult<()> {
        let mut suggestions = self.suggestions.lock().expect("scenario lock poisoned");
        let suggestion = suggestions
            .iter_mut()
            .find(|s| s.id == id && s.status == SuggestionStatus::Pending)
            .ok_or_else(|| EngineError::Config(format!("no pending suggestion {id}")))?;
        suggestion.reject();
        Ok(())
    }

    pub fn economy_active(&self, home: HomeId) -> Option<bool> {
        self.homes
            .lock()
            .expect("scenario lock poisoned")
            .get(&home)
            .map(|h| h.settings.is_active)
    }

    pub fn device_state(&self, home: HomeId, device: DeviceId) -> Option<DeviceState> {
        self.homes
            .lock()
            .expect("scenario lock poisoned")
            .get(&home)
            .and_then(|h| h.devices.iter().find(|d| d.id == device))
            .map(|d| d.current_state)
    }

    /// Seeded drift applied between demo ticks: hybrid batteries charge
    /// during daylight and drain at night, and prepaid balances bleed with
    /// consumption. Keeps multi-tick demo runs from being static.
    pub fn advance_tick(&self, now: NaiveDateTime) {
        let mut rng = self.rng.lock().expect("scenario lock poisoned");
        let mut homes = self.homes.lock().expect("scenario lock poisoned");
        let daylight = (8..18).contains(&now.time().hour());
        for state in homes.values_mut() {
            if let Some(battery) = state.battery_percent.as_mut() {
                let delta: f32 = if daylight {
                    rng.random_range(0.5..2.0)
                } else {
                    -rng.random_range(0.2..1.5)
                };
                *battery = (*battery + delta).clamp(0.0, 100.0);
            }
            let spend: i64 = rng.random_range(20..120);
            state.balance_gnf = (state.balance_gnf - spend).max(0);
        }
    }

    fn with_home<T>(
        &self,
        home: HomeId,
        f: impl FnOnce(&HomeState) -> T,
    ) -> EngineResult<T> {
        let homes = self.homes.lock().expect("scenario lock poisoned");
        homes
            .get(&home)
            .map(f)
            .ok_or_else(|| EngineError::Config(format!("unknown home {home}")))
    }
}

#[async_trait]
impl HomeDataSource for ScenarioBackend {
    async fn home_ids(&self) -> EngineResult<Vec<HomeId>> {
        let mut ids: Vec<HomeId> = self
            .homes
            .lock()
            .expect("scenario lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn supply(&self, home: HomeId) -> EngineResult<HomeSupply> {
        self.with_home(home, |h| h.supply)
    }

    async fn list_controllable_devices(&self, home: HomeId) -> EngineResult<Vec<Device>> {
        self.with_home(home, |h| h.devices.clone())
    }

    async fn list_active_schedules(&self, home: HomeId) -> EngineResult<Vec<Schedule>> {
        self.with_home(home, |h| {
            h.schedules.iter().filter(|s| s.is_active).cloned().collect()
        })
    }

    async fn economy_settings(&self, home: HomeId) -> EngineResult<EconomySettings> {
        self.with_home(home, |h| h.settings.clone())
    }

    async fn battery_percent(&self, home: HomeId) -> EngineResult<Option<f32>> {
        self.with_home(home, |h| h.battery_percent)
    }

    async fn account_balance(&self, home: HomeId) -> EngineResult<i64> {
        self.with_home(home, |h| h.balance_gnf)
    }

    async fn set_economy_active(&self, home: HomeId, active: bool) -> EngineResult<()> {
        let mut homes = self.homes.lock().expect("scenario lock poisoned");
        let state = homes
            .get_mut(&home)
            .ok_or_else(|| EngineError::Config(format!("unknown home {home}")))?;
        state.settings.is_active = active;
        Ok(())
    }

    async fn deactivate_schedule(&self, schedule: ScheduleId) -> EngineResult<()> {
        let mut homes = self.homes.lock().expect("scenario lock poisoned");
        for state in homes.values_mut() {
            if let Some(s) = state.schedules.iter_mut().find(|s| s.id == schedule) {
                s.is_active = false;
                return Ok(());
            }
        }
        Err(EngineError::Config(format!("unknown schedule {schedule}")))
    }

    async fn apply_device_state(
        &self,
        device: DeviceId,
        state: DeviceState,
        at: NaiveDateTime,
    ) -> EngineResult<()> {
        let mut homes = self.homes.lock().expect("scenario lock poisoned");
        for home in homes.values_mut() {
            if let Some(d) = home.devices.iter_mut().find(|d| d.id == device) {
                if d.current_state != state {
                    d.current_state = state;
                    d.last_state_change_at = at;
                }
                return Ok(());
            }
        }
        Err(EngineError::Config(format!("unknown device {device}")))
    }
}

#[async_trait]
impl CommandSink for ScenarioBackend {
    async fn send_device_command(&self, command: &DeviceCommand) -> EngineResult<()> {
        let unreachable = self
            .unreachable_devices
            .lock()
            .expect("scenario lock poisoned")
            .contains(&command.device_id);
        if unreachable {
            return Err(EngineError::DeviceUnreachable {
                device: command.device_id,
                reason: "injected delivery failure".to_string(),
            });
        }
        self.sent_commands
            .lock()
            .expect("scenario lock poisoned")
            .push(command.clone());
        Ok(())
    }
}

#[async_trait]
impl SavingsSink for ScenarioBackend {
    async fn append_savings_record(&self, record: SavingsRecord) -> EngineResult<()> {
        self.ledger.append(record);
        Ok(())
    }
}

#[async_trait]
impl SuggestionSink for ScenarioBackend {
    async fn emit_suggestion(&self, suggestion: Suggestion) -> EngineResult<()> {
        self.add_suggestion(suggestion);
        Ok(())
    }
}
