use crate::errors::{RetentionError, UnknownResetPolicy};
use crate::habits::habit_by_id;
use crate::ranks::lowest_tier;
use crate::retention::{HabitCounter, RetentionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the reset budget behaves when the last token is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Spend one token; an empty budget stays empty.
    #[default]
    Decrement,
    /// Spend one token; an emptied budget is refilled with the lowest tier's
    /// allowance.
    RegrantOnExhaustion,
}

impl FromStr for ResetPolicy {
    type Err = UnknownResetPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "decrement" => Ok(Self::Decrement),
            "regrant" | "regrant_on_exhaustion" => Ok(Self::RegrantOnExhaustion),
            other => Err(UnknownResetPolicy(other.to_string())),
        }
    }
}

/// Zeroes the active habit's clock at `now` and spends one reset token.
pub fn reset(
    state: &RetentionState,
    now: DateTime<Utc>,
    policy: ResetPolicy,
) -> Result<RetentionState, RetentionError> {
    if state.remaining_resets == 0 {
        return Err(RetentionError::InsufficientResets {
            remaining: state.remaining_resets,
        });
    }

    let tier = lowest_tier();
    let spent = state.remaining_resets - 1;
    let remaining_resets = match policy {
        ResetPolicy::RegrantOnExhaustion if spent == 0 => tier.reset_allowance,
        _ => spent,
    };

    let mut next = state.clone();
    next.last_relapse_at = Some(now);
    next.current_days = 0;
    next.current_rank = tier.id.to_string();
    next.remaining_resets = remaining_resets;
    Ok(next)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetEntry {
    pub user_id: String,
    pub habit_id: String,
    pub prior_days: u32,
    pub prior_rank: String,
    pub reset_at: DateTime<Utc>,
}

impl ResetEntry {
    pub fn new(user_id: &str, prior: &RetentionState, reset_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            habit_id: prior.habit_id.clone(),
            prior_days: prior.current_days,
            prior_rank: prior.current_rank.clone(),
            reset_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub state: RetentionState,
    pub had_previous_progress: bool,
}

/// Makes `new_habit_id` the active habit. The outgoing habit's counter is
/// parked as of `now`; a parked counter for the incoming habit resumes at the
/// day count it was parked with, otherwise a fresh one starts at `now`.
pub fn switch_habit(
    state: &RetentionState,
    new_habit_id: &str,
    now: DateTime<Utc>,
) -> Result<SwitchOutcome, RetentionError> {
    if habit_by_id(new_habit_id).is_none() {
        return Err(RetentionError::UnknownHabit(new_habit_id.to_string()));
    }

    if state.habit_id == new_habit_id {
        return Ok(SwitchOutcome {
            state: state.clone(),
            had_previous_progress: false,
        });
    }

    let mut next = state.clone();
    next.saved_counters
        .insert(state.habit_id.clone(), state.active_counter().park(now));

    let (counter, had_previous_progress) = match next.saved_counters.remove(new_habit_id) {
        Some(saved) => (saved.resume(now), true),
        None => (fresh_counter(now), false),
    };

    next.habit_id = new_habit_id.to_string();
    next.load_counter(counter);

    Ok(SwitchOutcome {
        state: next,
        had_previous_progress,
    })
}

fn fresh_counter(now: DateTime<Utc>) -> HabitCounter {
    let tier = lowest_tier();
    HabitCounter {
        last_relapse_at: Some(now),
        current_days: 0,
        current_rank: tier.id.to_string(),
        remaining_resets: tier.reset_allowance,
        paused_at: None,
    }
}
