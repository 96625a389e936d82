use crate::errors::RetentionError;
use crate::ranks::{lowest_tier, tier_for};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MS_PER_DAY: u64 = 86_400_000;

/// Counter for a habit that is not currently active. A parked counter is
/// frozen: its clock does not advance until the habit is active again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitCounter {
    pub last_relapse_at: Option<DateTime<Utc>>,
    pub current_days: u32,
    pub current_rank: String,
    pub remaining_resets: u32,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
}

impl HabitCounter {
    pub fn park(mut self, now: DateTime<Utc>) -> Self {
        self.paused_at = Some(now);
        self
    }

    /// Moves the relapse date forward by the time spent parked, so the
    /// counter picks up at the day count it was parked with.
    pub fn resume(mut self, now: DateTime<Utc>) -> Self {
        if let (Some(relapse), Some(paused)) = (self.last_relapse_at, self.paused_at) {
            if now > paused {
                self.last_relapse_at = Some(relapse + (now - paused));
            }
        }
        self.paused_at = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionState {
    pub habit_id: String,
    /// `None` means no clock is running and the count is zero.
    pub last_relapse_at: Option<DateTime<Utc>>,
    pub current_days: u32,
    pub current_rank: String,
    pub remaining_resets: u32,
    #[serde(default)]
    pub saved_counters: BTreeMap<String, HabitCounter>,
}

impl RetentionState {
    /// State for a habit whose clock started at `last_relapse_at`, before
    /// reconciliation.
    pub fn new(habit_id: impl Into<String>, last_relapse_at: Option<DateTime<Utc>>) -> Self {
        let tier = lowest_tier();
        Self {
            habit_id: habit_id.into(),
            last_relapse_at,
            current_days: 0,
            current_rank: tier.id.to_string(),
            remaining_resets: tier.reset_allowance,
            saved_counters: BTreeMap::new(),
        }
    }

    pub fn active_counter(&self) -> HabitCounter {
        HabitCounter {
            last_relapse_at: self.last_relapse_at,
            current_days: self.current_days,
            current_rank: self.current_rank.clone(),
            remaining_resets: self.remaining_resets,
            paused_at: None,
        }
    }

    pub(crate) fn load_counter(&mut self, counter: HabitCounter) {
        self.last_relapse_at = counter.last_relapse_at;
        self.current_days = counter.current_days;
        self.current_rank = counter.current_rank;
        self.remaining_resets = counter.remaining_resets;
    }
}

/// Whole days from `from` to `to`, rounded up: any started day counts.
/// Returns `None` when `from` is after `to`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<u32> {
    let elapsed_ms = u64::try_from((to - from).num_milliseconds()).ok()?;
    let days = elapsed_ms.div_ceil(MS_PER_DAY);
    Some(u32::try_from(days).unwrap_or(u32::MAX))
}

/// Recomputes the cached day count and rank from the relapse date alone.
/// Never looks at the previously cached count and never persists anything.
pub fn reconcile(state: &RetentionState, now: DateTime<Utc>) -> Result<RetentionState, RetentionError> {
    let current_days = match state.last_relapse_at {
        None => 0,
        Some(last_relapse_at) => days_between(last_relapse_at, now)
            .ok_or(RetentionError::InvalidRelapseDate { last_relapse_at, now })?,
    };

    let mut next = state.clone();
    next.current_days = current_days;
    next.current_rank = tier_for(current_days).id.to_string();
    Ok(next)
}
