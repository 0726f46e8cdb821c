//! Logical contracts to the external collaborators.
//!
//! Persistence, device control, and suggestion delivery live outside this
//! engine; the runtime reaches them only through these transport-agnostic
//! traits, each call bounded by the runtime's I/O timeout.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::devices::types::{Device, DeviceId, DeviceState, HomeId, HomeSupply, ScheduleId};
use crate::engine::controller::DeviceCommand;
use crate::engine::economy::EconomySettings;
use crate::engine::schedule::Schedule;
use crate::error::EngineResult;
use crate::savings::SavingsRecord;
use crate::suggestion::Suggestion;

/// Inbound read (and engine write-back) surface of the platform's stores.
#[async_trait]
pub trait HomeDataSource: Send + Sync {
    /// Homes the engine is responsible for this tick.
    async fn home_ids(&self) -> EngineResult<Vec<HomeId>>;

    async fn supply(&self, home: HomeId) -> EngineResult<HomeSupply>;

    /// Unified device view (manual + detected, already merged).
    async fn list_controllable_devices(&self, home: HomeId) -> EngineResult<Vec<Device>>;

    async fn list_active_schedules(&self, home: HomeId) -> EngineResult<Vec<Schedule>>;

    /// Settings singleton; created with defaults on first access.
    async fn economy_settings(&self, home: HomeId) -> EngineResult<EconomySettings>;

    /// Battery state of charge; `None` for grid-only homes or a stale feed.
    async fn battery_percent(&self, home: HomeId) -> EngineResult<Option<f32>>;

    /// Prepaid account balance in GNF.
    async fn account_balance(&self, home: HomeId) -> EngineResult<i64>;

    /// Persists an auto-budget activation (or an administrator toggle).
    async fn set_economy_active(&self, home: HomeId, active: bool) -> EngineResult<()>;

    /// Marks an orphaned schedule inactive. Never deletes it.
    async fn deactivate_schedule(&self, schedule: ScheduleId) -> EngineResult<()>;

    /// Records the state an acknowledged command left a device in.
    async fn apply_device_state(
        &self,
        device: DeviceId,
        state: DeviceState,
        at: NaiveDateTime,
    ) -> EngineResult<()>;
}

/// Outbound command delivery to the device-control collaborator.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Delivers one command.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::DeviceUnreachable`] on delivery
    /// failure; the runtime logs it and retries on the next tick.
    async fn send_device_command(&self, command: &DeviceCommand) -> EngineResult<()>;
}

/// Outbound append to the savings ledger store.
#[async_trait]
pub trait SavingsSink: Send + Sync {
    async fn append_savings_record(&self, record: SavingsRecord) -> EngineResult<()>;
}

/// Outbound delivery of AI-originated schedule proposals.
///
/// A human must accept a suggestion before it becomes an active schedule.
#[async_trait]
pub trait SuggestionSink: Send + Sync {
    async fn emit_suggestion(&self, suggestion: Suggestion) -> EngineResult<()>;
}
