use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use shoebox_types::models::{Board, User};

use crate::AppState;

/// User profile, including onboarding progress for the dashboard.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();

    let user = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<User>> {
        match db.find_user_by_id(&user_id.to_string())? {
            Some(row) => Ok(Some(row.into_user()?)),
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("user lookup failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    user.map(Json).ok_or(StatusCode::NOT_FOUND)
}

pub async fn list_user_boards(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();

    let boards = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Board>> {
        db.boards_for_user(&user_id.to_string())?
            .into_iter()
            .map(|row| row.into_board())
            .collect()
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("board listing failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(boards))
}
