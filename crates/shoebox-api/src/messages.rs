use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use shoebox_db::Database;
use shoebox_db::models::{MessageRow, ts_to_datetime};
use shoebox_types::api::{ListQuery, MessageResponse};

use crate::AppState;

/// Private-tag listing. Always scoped to the user's own messages — a
/// same-named shared board never bleeds in here.
pub async fn list_tag_messages(
    State(state): State<AppState>,
    Path((user_id, tag)): Path<(Uuid, String)>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let limit = query.limit.min(200);

    let responses = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<MessageResponse>> {
        let rows = db.messages_for_tag(&user_id.to_string(), &tag, limit)?;
        rows.into_iter().map(|row| to_response(&db, row)).collect()
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("tag listing failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(responses))
}

pub(crate) fn to_response(db: &Database, row: MessageRow) -> anyhow::Result<MessageResponse> {
    let tags = db.tags_of(&row.id)?;
    Ok(MessageResponse {
        id: row.id.parse()?,
        user_id: row.user_id.parse()?,
        content: row.content,
        tags,
        media_url: row.media_url,
        media_type: row.media_type,
        created_at: ts_to_datetime(row.created_at),
    })
}
