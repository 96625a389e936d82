use crate::habits::habit_by_id;
use crate::ranks::{progress_within_tier, tier_for};
use crate::retention::RetentionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub enlisted_at: DateTime<Utc>,
    pub retention: RetentionState,
    #[serde(default)]
    pub subscription: Subscription,
    #[serde(default)]
    pub episode_progress: BTreeMap<u32, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    pub profiles: BTreeMap<String, ProfileRecord>,
}

/// Partial update of a stored profile. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub retention: Option<RetentionState>,
    pub episode_progress: Option<(u32, f64)>,
    pub clear_block: bool,
}

impl ProfilePatch {
    pub fn retention(state: RetentionState) -> Self {
        Self {
            retention: Some(state),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut ProfileRecord) {
        if let Some(retention) = &self.retention {
            record.retention = retention.clone();
        }
        if let Some((episode_id, progress)) = self.episode_progress {
            record.episode_progress.insert(episode_id, progress);
        }
        if self.clear_block {
            record.subscription.blocked_until = None;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub habit: String,
    pub last_relapse_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchHabitRequest {
    pub habit: String,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeProgressRequest {
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitView {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSummary {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub level: u8,
}

/// Everything the UI needs to draw the rank badge and progress bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankView {
    pub user_id: String,
    pub display_name: String,
    pub habit: HabitView,
    pub current_days: u32,
    pub current_rank: RankSummary,
    pub goal_days: u32,
    pub percentage: f64,
    pub remaining_resets: u32,
}

impl RankView {
    pub fn build(record: &ProfileRecord, state: &RetentionState) -> Self {
        let tier = tier_for(state.current_days);
        let progress = progress_within_tier(state.current_days, tier);
        let habit_label = habit_by_id(&state.habit_id)
            .map(|habit| habit.label.to_string())
            .unwrap_or_else(|| state.habit_id.clone());

        Self {
            user_id: record.user_id.clone(),
            display_name: format!("{} {}", tier.name, record.last_name),
            habit: HabitView {
                id: state.habit_id.clone(),
                label: habit_label,
            },
            current_days: state.current_days,
            current_rank: RankSummary {
                id: tier.id.to_string(),
                name: tier.name.to_string(),
                icon: tier.icon.to_string(),
                level: tier.level,
            },
            goal_days: progress.goal_days,
            percentage: progress.percentage,
            remaining_resets: state.remaining_resets,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchHabitResponse {
    pub had_previous_progress: bool,
    pub profile: RankView,
}
