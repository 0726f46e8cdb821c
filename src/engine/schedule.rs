//! Per-device time-window schedules and their evaluation.
//!
//! Validation happens once, at creation time; the evaluator only ever sees
//! well-formed windows. Overlapping claims on the same (day, minute) slot
//! are resolved by most-recently-created wins: newer intent overrides older.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::devices::types::{DeviceId, DeviceState, MemberId, ScheduleId};
use crate::error::{EngineError, EngineResult};

/// Who is asking for an evaluation.
///
/// The tick controller acts as `System` and is always authorized; a
/// household member is subject to the schedule's permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    System,
    Member(MemberId),
}

/// A time-window rule for one device.
///
/// `days_of_week` uses ISO numbering (1 = Monday .. 7 = Sunday). Windows
/// are same-day only: `start_time < end_time` is enforced at creation and
/// overnight spans are rejected outright rather than silently split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub device_id: DeviceId,
    pub days_of_week: BTreeSet<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub action: DeviceState,
    pub is_active: bool,
    pub applies_to_all: bool,
    pub allowed_member_ids: BTreeSet<MemberId>,
    pub created_by: MemberId,
    pub created_at: NaiveDateTime,
    /// True when materialized from an accepted AI suggestion.
    pub auto_detected: bool,
}

impl Schedule {
    /// Validates window and day-set invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty day set, a day
    /// outside 1–7, a zero-length window, or an overnight span
    /// (`end_time < start_time`). Whether an overnight window belongs to
    /// the evening day or the morning day is a product decision, so it is
    /// rejected here instead of being guessed at.
    pub fn validate(&self) -> EngineResult<()> {
        if self.days_of_week.is_empty() {
            return Err(EngineError::Validation(
                "day set must not be empty".to_string(),
            ));
        }
        if let Some(day) = self.days_of_week.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(EngineError::Validation(format!(
                "day {day} is outside the ISO range 1-7"
            )));
        }
        if self.end_time < self.start_time {
            return Err(EngineError::Validation(format!(
                "window {}-{} crosses midnight; overnight spans are not supported",
                self.start_time, self.end_time
            )));
        }
        if self.start_time == self.end_time {
            return Err(EngineError::Validation(format!(
                "window {}-{} is empty",
                self.start_time, self.end_time
            )));
        }
        Ok(())
    }

    /// True when `now` falls inside this schedule's claim.
    ///
    /// The window is half-open: `start_time <= now.time() < end_time`.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        let day = chrono::Datelike::weekday(&now).number_from_monday() as u8;
        if !self.days_of_week.contains(&day) {
            return false;
        }
        let t = now.time();
        // Compare at minute resolution: slots are (day, minute) claims.
        let minute = t.hour() * 60 + t.minute();
        let start = self.start_time.hour() * 60 + self.start_time.minute();
        let end = self.end_time.hour() * 60 + self.end_time.minute();
        minute >= start && minute < end
    }

    /// Permission scope check for the given actor.
    pub fn permits(&self, actor: Actor) -> bool {
        match actor {
            Actor::System => true,
            Actor::Member(id) => self.applies_to_all || self.allowed_member_ids.contains(&id),
        }
    }
}

/// The action a matching schedule prescribes, with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAction {
    pub schedule_id: ScheduleId,
    pub action: DeviceState,
}

/// Evaluates the schedules claiming a device at `now`.
///
/// Selection is deterministic regardless of input order: among matching
/// schedules the one with the latest `created_at` wins, with the id as a
/// final tie-break. Evaluating the same inputs twice yields the same
/// result.
///
/// # Errors
///
/// Returns [`EngineError::Authorization`] when the winning schedule's
/// permission scope excludes a member actor. The caller must surface this
/// instead of silently applying (or suppressing) the action.
pub fn evaluate(
    device_id: DeviceId,
    schedules: &[Schedule],
    now: NaiveDateTime,
    actor: Actor,
) -> EngineResult<Option<ScheduledAction>> {
    let winner = schedules
        .iter()
        .filter(|s| s.device_id == device_id && s.matches(now))
        .max_by_key(|s| (s.created_at, s.id));

    let Some(schedule) = winner else {
        return Ok(None);
    };

    if !schedule.permits(actor) {
        let Actor::Member(member) = actor else {
            unreachable!("system actor is always permitted");
        };
        return Err(EngineError::Authorization {
            member,
            schedule: schedule.id,
        });
    }

    Ok(Some(ScheduledAction {
        schedule_id: schedule.id,
        action: schedule.action,
    }))
}
