use crate::access::{AccessDecision, check_access};
use crate::clock::Clock;
use crate::errors::{AppError, RetentionError, StoreError};
use crate::habits::habit_by_id;
use crate::models::{
    OnboardingRequest, ProfilePatch, ProfileRecord, RankView, Subscription, SubscriptionStatus,
    SwitchHabitResponse,
};
use crate::operations::{self, ResetEntry, ResetPolicy};
use crate::ranks::{LadderEntry, ladder, tier_for};
use crate::retention::{RetentionState, reconcile};
use crate::storage::{ProfileStore, ResetHistory};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Retention(#[from] RetentionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("operation already in progress for '{0}'")]
    InProgress(String),

    #[error("{0}")]
    InvalidInput(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Retention(err) => err.into(),
            ServiceError::Store(err) => err.into(),
            ServiceError::InProgress(user_id) => AppError::in_progress(&user_id),
            ServiceError::InvalidInput(message) => AppError::bad_request(message),
        }
    }
}

/// Users with a reset or habit switch currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    users: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn try_acquire(&self, user_id: &str) -> Option<InFlightGuard> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        if !users.insert(user_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            users: Arc::clone(&self.users),
            user_id: user_id.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    users: Arc<Mutex<HashSet<String>>>,
    user_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

/// Runs the retention operations against a store. Every computation is
/// delegated to the pure core; this layer only reads, persists and logs.
pub struct ProfileService<S, H> {
    store: S,
    history: H,
    clock: Arc<dyn Clock>,
    reset_policy: ResetPolicy,
    in_flight: InFlight,
}

impl<S: ProfileStore, H: ResetHistory> ProfileService<S, H> {
    pub fn new(store: S, history: H, clock: Arc<dyn Clock>, reset_policy: ResetPolicy) -> Self {
        Self {
            store,
            history,
            clock,
            reset_policy,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn onboard(&self, request: OnboardingRequest) -> Result<RankView, ServiceError> {
        if request.user_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("user_id must not be empty".into()));
        }
        if habit_by_id(&request.habit).is_none() {
            return Err(RetentionError::UnknownHabit(request.habit).into());
        }

        let now = self.clock.now();
        let seed = RetentionState::new(request.habit, Some(request.last_relapse_at));
        let retention = reconcile(&seed, now)?;

        let record = ProfileRecord {
            user_id: request.user_id,
            first_name: request.first_name,
            last_name: request.last_name,
            enlisted_at: now,
            retention,
            subscription: Subscription {
                status: SubscriptionStatus::Trialing,
                blocked_until: None,
            },
            episode_progress: BTreeMap::new(),
        };
        self.store.create_profile(record.clone()).await?;

        info!(
            user_id = %record.user_id,
            days = record.retention.current_days,
            rank = %record.retention.current_rank,
            "profile created"
        );
        Ok(RankView::build(&record, &record.retention))
    }

    /// Reconciles the stored counter with the clock. The refreshed cache is
    /// written back only when it changed.
    pub async fn load_profile(&self, user_id: &str) -> Result<RankView, ServiceError> {
        let record = self.require(user_id).await?;
        let now = self.clock.now();

        let retention = reconcile(&record.retention, now).inspect_err(|err| {
            warn!(user_id, "cannot reconcile profile: {err}");
        })?;

        if retention != record.retention {
            if let Err(err) = self
                .store
                .write_profile(user_id, ProfilePatch::retention(retention.clone()))
                .await
            {
                warn!(user_id, "failed to cache reconciled counter: {err}");
            }
        }

        Ok(RankView::build(&record, &retention))
    }

    pub async fn reset(&self, user_id: &str) -> Result<RankView, ServiceError> {
        let _guard = self.acquire(user_id)?;
        let record = self.require(user_id).await?;
        let now = self.clock.now();

        let prior = reconcile(&record.retention, now).unwrap_or_else(|_| record.retention.clone());
        let next = operations::reset(&prior, now, self.reset_policy)?;
        let stored = self
            .store
            .write_profile(user_id, ProfilePatch::retention(next.clone()))
            .await?;

        let entry = ResetEntry::new(user_id, &prior, now);
        if let Err(err) = self.history.append(&entry).await {
            warn!(user_id, "failed to record reset history: {err}");
        }

        info!(
            user_id,
            habit = %prior.habit_id,
            prior_days = prior.current_days,
            remaining_resets = next.remaining_resets,
            "retention counter reset"
        );
        Ok(RankView::build(&stored, &next))
    }

    pub async fn switch_habit(
        &self,
        user_id: &str,
        habit_id: &str,
    ) -> Result<SwitchHabitResponse, ServiceError> {
        let _guard = self.acquire(user_id)?;
        let record = self.require(user_id).await?;
        let now = self.clock.now();

        let current = reconcile(&record.retention, now).inspect_err(|err| {
            warn!(user_id, "cannot switch habit: {err}");
        })?;
        let outcome = operations::switch_habit(&current, habit_id, now)?;
        let next = reconcile(&outcome.state, now)?;

        let stored = if next == current {
            record
        } else {
            let stored = self
                .store
                .write_profile(user_id, ProfilePatch::retention(next.clone()))
                .await?;
            info!(
                user_id,
                from = %current.habit_id,
                to = habit_id,
                restored = outcome.had_previous_progress,
                days = next.current_days,
                "habit switched"
            );
            stored
        };

        Ok(SwitchHabitResponse {
            had_previous_progress: outcome.had_previous_progress,
            profile: RankView::build(&stored, &next),
        })
    }

    /// Rank ladder with lock state; each unlocked tier is an accessible chat room.
    pub async fn ladder(&self, user_id: &str) -> Result<Vec<LadderEntry>, ServiceError> {
        let view = self.load_profile(user_id).await?;
        Ok(ladder(tier_for(view.current_days)))
    }

    pub async fn access(&self, user_id: &str) -> Result<AccessDecision, ServiceError> {
        let record = self.require(user_id).await?;
        let decision = check_access(&record.subscription, self.clock.now());

        if decision.block_expired {
            let patch = ProfilePatch {
                clear_block: true,
                ..ProfilePatch::default()
            };
            match self.store.write_profile(user_id, patch).await {
                Ok(_) => info!(user_id, "expired access block cleared"),
                Err(err) => warn!(user_id, "failed to clear expired block: {err}"),
            }
        }

        Ok(decision)
    }

    pub async fn episode_progress(&self, user_id: &str) -> Result<BTreeMap<u32, f64>, ServiceError> {
        Ok(self.require(user_id).await?.episode_progress)
    }

    pub async fn save_episode_progress(
        &self,
        user_id: &str,
        episode_id: u32,
        progress: f64,
    ) -> Result<BTreeMap<u32, f64>, ServiceError> {
        if !progress.is_finite() {
            return Err(ServiceError::InvalidInput("progress must be a finite number".into()));
        }

        let patch = ProfilePatch {
            episode_progress: Some((episode_id, progress.clamp(0.0, 100.0))),
            ..ProfilePatch::default()
        };
        let stored = self.store.write_profile(user_id, patch).await?;
        Ok(stored.episode_progress)
    }

    async fn require(&self, user_id: &str) -> Result<ProfileRecord, ServiceError> {
        self.store
            .read_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()).into())
    }

    fn acquire(&self, user_id: &str) -> Result<InFlightGuard, ServiceError> {
        self.in_flight
            .try_acquire(user_id)
            .ok_or_else(|| ServiceError::InProgress(user_id.to_string()))
    }
}
