use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use shoebox_types::api::{BoardMessagesQuery, MessageResponse};

use crate::AppState;
use crate::messages::to_response;

/// Shared-board listing, membership-checked: a lexical collision with
/// someone's private tag grants nothing.
pub async fn board_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<BoardMessagesQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let limit = query.limit.min(200);
    let user_id = query.user_id;

    let responses = tokio::task::spawn_blocking(move || -> anyhow::Result<Result<Vec<MessageResponse>, StatusCode>> {
        let Some(board) = db.find_board_by_name(&name)? else {
            return Ok(Err(StatusCode::NOT_FOUND));
        };
        if !db.is_member(&board.id, &user_id.to_string())? {
            return Ok(Err(StatusCode::FORBIDDEN));
        }
        let rows = db.messages_for_board(&board.id, &board.name, limit)?;
        let responses = rows
            .into_iter()
            .map(|row| to_response(&db, row))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Ok(responses))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("board message listing failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    responses.map(Json)
}
