use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post, put}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ranks", get(handlers::list_ranks))
        .route("/api/habits", get(handlers::list_habits))
        .route("/api/profiles", post(handlers::create_profile))
        .route("/api/profiles/:user_id", get(handlers::get_profile))
        .route("/api/profiles/:user_id/reset", post(handlers::reset))
        .route("/api/profiles/:user_id/habit", post(handlers::switch_habit))
        .route("/api/profiles/:user_id/ranks", get(handlers::get_ladder))
        .route("/api/profiles/:user_id/access", get(handlers::get_access))
        .route("/api/profiles/:user_id/episodes", get(handlers::get_episodes))
        .route(
            "/api/profiles/:user_id/episodes/:episode_id",
            put(handlers::put_episode),
        )
        .with_state(state)
}
