use crate::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub chat_id: String,
    pub challenger_id: String,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub actor_id: String,
    pub move_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub actor_id: String,
    pub team_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UiMessageRequest {
    pub actor_id: String,
    pub message_id: String,
}

// Validate user id format: chat platform ids, alphanumeric plus `_`, `-` and `:`
pub fn validate_user_id(user_id: &str) -> bool {
    static USER_ID: OnceLock<Regex> = OnceLock::new();
    USER_ID
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_:\-]{1,64}$").expect("static regex"))
        .is_match(user_id)
}

fn invalid_user(user_id: &str) -> axum::response::Response {
    warn!("Rejected request with invalid user id {:?}", user_id);
    (StatusCode::BAD_REQUEST, "Invalid user id").into_response()
}

pub async fn create_challenge_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChallengeRequest>,
) -> impl IntoResponse {
    for user_id in [&request.challenger_id, &request.target_id] {
        if !validate_user_id(user_id) {
            return invalid_user(user_id);
        }
    }
    let outcome = state
        .battle_manager
        .create_challenge(&request.chat_id, &request.challenger_id, &request.target_id)
        .await;
    Json(outcome).into_response()
}

pub async fn accept_challenge_handler(
    Path(target_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    if !validate_user_id(&target_id) {
        return invalid_user(&target_id);
    }
    Json(state.battle_manager.accept_challenge(&target_id).await).into_response()
}

pub async fn decline_challenge_handler(
    Path(target_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    if !validate_user_id(&target_id) {
        return invalid_user(&target_id);
    }
    Json(state.battle_manager.decline_challenge(&target_id)).into_response()
}

pub async fn move_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<MoveRequest>,
) -> impl IntoResponse {
    Json(
        state
            .battle_manager
            .execute_move(battle_id, request.move_index, &request.actor_id)
            .await,
    )
}

pub async fn switch_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwitchRequest>,
) -> impl IntoResponse {
    Json(
        state
            .battle_manager
            .request_switch(battle_id, request.team_index, &request.actor_id)
            .await,
    )
}

pub async fn open_switch_menu_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    Json(state.battle_manager.open_switch_menu(battle_id, &request.actor_id).await)
}

pub async fn close_switch_menu_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    Json(state.battle_manager.close_switch_menu(battle_id, &request.actor_id).await)
}

pub async fn run_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    Json(state.battle_manager.request_run(battle_id, &request.actor_id).await)
}

pub async fn ui_message_handler(
    Path(battle_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<UiMessageRequest>,
) -> impl IntoResponse {
    Json(
        state
            .battle_manager
            .set_ui_message(battle_id, &request.actor_id, &request.message_id)
            .await,
    )
}

pub async fn player_battle_handler(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.battle_manager.get_active_session(&user_id).await {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, "No active battle").into_response(),
    }
}

pub async fn player_challenge_handler(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.battle_manager.get_pending_challenge(&user_id) {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, "No pending challenge").into_response(),
    }
}

// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "active_battles": state.battle_manager.active_battle_count(),
        "pending_challenges": state.battle_manager.pending_challenge_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("123456789"));
        assert!(validate_user_id("tg:42_alt-2"));
        assert!(!validate_user_id(""));
        assert!(!validate_user_id("bad id"));
        assert!(!validate_user_id(&"x".repeat(65)));
    }
}
