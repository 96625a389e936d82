use crate::access::AccessDecision;
use crate::errors::AppError;
use crate::habits::{HABITS, Habit};
use crate::models::{
    EpisodeProgressRequest, OnboardingRequest, RankView, SwitchHabitRequest, SwitchHabitResponse,
};
use crate::ranks::{LadderEntry, RANKS, RankTier};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::BTreeMap;

pub async fn list_ranks() -> Json<&'static [RankTier]> {
    let ranks: &'static [RankTier] = &RANKS;
    Json(ranks)
}

pub async fn list_habits() -> Json<&'static [Habit]> {
    let habits: &'static [Habit] = &HABITS;
    Json(habits)
}

pub async fn create_profile(
    State(state): State<AppState>,
    Json(payload): Json<OnboardingRequest>,
) -> Result<(StatusCode, Json<RankView>), AppError> {
    let view = state.service.onboard(payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RankView>, AppError> {
    Ok(Json(state.service.load_profile(&user_id).await?))
}

pub async fn reset(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RankView>, AppError> {
    Ok(Json(state.service.reset(&user_id).await?))
}

pub async fn switch_habit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<SwitchHabitRequest>,
) -> Result<Json<SwitchHabitResponse>, AppError> {
    let habit = payload.habit.trim();
    if habit.is_empty() {
        return Err(AppError::bad_request("habit must not be empty"));
    }
    Ok(Json(state.service.switch_habit(&user_id, habit).await?))
}

pub async fn get_ladder(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LadderEntry>>, AppError> {
    Ok(Json(state.service.ladder(&user_id).await?))
}

pub async fn get_access(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AccessDecision>, AppError> {
    Ok(Json(state.service.access(&user_id).await?))
}

pub async fn get_episodes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BTreeMap<u32, f64>>, AppError> {
    Ok(Json(state.service.episode_progress(&user_id).await?))
}

pub async fn put_episode(
    State(state): State<AppState>,
    Path((user_id, episode_id)): Path<(String, u32)>,
    Json(payload): Json<EpisodeProgressRequest>,
) -> Result<Json<BTreeMap<u32, f64>>, AppError> {
    let progress = state
        .service
        .save_episode_progress(&user_id, episode_id, payload.progress)
        .await?;
    Ok(Json(progress))
}
