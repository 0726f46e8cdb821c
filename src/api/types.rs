//! API request and response types.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::devices::types::{
    Device, DeviceId, DeviceState, HomeId, HomeSupply, MemberId, SuggestionId,
};
use crate::engine::economy::EconomySettings;
use crate::engine::schedule::Schedule;
use crate::savings::SavingsRecord;

/// One row of `GET /homes`.
#[derive(Debug, Serialize)]
pub struct HomeSummary {
    pub id: HomeId,
    pub supply: HomeSupply,
    pub economy_active: bool,
    pub balance_gnf: i64,
    pub battery_percent: Option<f32>,
}

/// Full home view: `GET /homes/{id}/state`.
#[derive(Debug, Serialize)]
pub struct HomeStateResponse {
    pub id: HomeId,
    pub supply: HomeSupply,
    pub settings: EconomySettings,
    pub balance_gnf: i64,
    pub battery_percent: Option<f32>,
    pub devices: Vec<Device>,
    pub schedules: Vec<Schedule>,
}

/// Body of `POST /homes/{id}/economy`.
#[derive(Debug, Deserialize)]
pub struct EconomyToggleRequest {
    pub active: bool,
}

/// Body of `POST /homes/{id}/schedules`.
///
/// The server assigns the id and creation timestamp.
#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub device_id: DeviceId,
    pub days_of_week: BTreeSet<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub action: DeviceState,
    #[serde(default = "default_applies_to_all")]
    pub applies_to_all: bool,
    #[serde(default)]
    pub allowed_member_ids: BTreeSet<MemberId>,
    pub created_by: MemberId,
}

fn default_applies_to_all() -> bool {
    true
}

/// Optional time range for the savings endpoint, both bounds inclusive.
#[derive(Debug, Deserialize)]
pub struct SavingsQuery {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

/// Response of `GET /homes/{id}/savings`.
#[derive(Debug, Serialize)]
pub struct SavingsResponse {
    pub home_id: HomeId,
    pub total_energy_kwh: f32,
    pub total_cost_gnf: f32,
    pub records: Vec<SavingsRecord>,
}

/// Body of `POST /suggestions/{id}/accept`.
#[derive(Debug, Deserialize)]
pub struct AcceptSuggestionRequest {
    pub member_id: MemberId,
}

/// Response of the suggestion decision endpoints.
#[derive(Debug, Serialize)]
pub struct SuggestionDecisionResponse {
    pub suggestion_id: SuggestionId,
    /// Present when the decision materialized a schedule.
    pub schedule: Option<Schedule>,
}

/// Error response body for 4xx/5xx errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
