//! AI-originated schedule proposals.
//!
//! A suggestion carries the same window fields as a schedule plus the
//! model's confidence and estimated saving. Accepting one materializes a
//! real schedule (marked `auto_detected`); rejecting discards it. Either
//! way the decision is a human's, never the engine's.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::devices::types::{DeviceId, DeviceState, HomeId, MemberId, ScheduleId, SuggestionId};
use crate::engine::schedule::Schedule;
use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A proposed schedule awaiting a household decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub home_id: HomeId,
    pub device_id: DeviceId,
    pub days_of_week: BTreeSet<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub action: DeviceState,
    /// Model confidence in the detected usage pattern, 0.0-1.0.
    pub confidence_score: f32,
    /// Estimated saving if the household adopts the proposal.
    pub potential_saving_percent: f32,
    pub status: SuggestionStatus,
}

impl Suggestion {
    /// Materializes the accepted suggestion into an active schedule.
    ///
    /// The proposed window goes through the same validation as a manually
    /// created schedule: a malformed AI proposal is a validation error
    /// surfaced to the caller, not a schedule that slips past the rules.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::Validation`] when the proposed
    /// window or day set is invalid.
    pub fn accept(
        &mut self,
        schedule_id: ScheduleId,
        accepted_by: MemberId,
        at: NaiveDateTime,
    ) -> EngineResult<Schedule> {
        let schedule = Schedule {
            id: schedule_id,
            device_id: self.device_id,
            days_of_week: self.days_of_week.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            action: self.action,
            is_active: true,
            applies_to_all: true,
            allowed_member_ids: BTreeSet::new(),
            created_by: accepted_by,
            created_at: at,
            auto_detected: true,
        };
        schedule.validate()?;
        self.status = SuggestionStatus::Accepted;
        Ok(schedule)
    }

    /// Discards the suggestion.
    pub fn reject(&mut self) {
        self.status = SuggestionStatus::Rejected;
    }
}
