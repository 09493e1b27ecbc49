use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrichQuery {
    pub url: String,
}

/// On-demand Open Graph lookup for the dashboard. Display metadata only —
/// this never feeds tagging or routing.
pub async fn enrich_url(
    State(state): State<AppState>,
    Query(query): Query<EnrichQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    if !query.url.starts_with("http://") && !query.url.starts_with("https://") {
        return Err(StatusCode::BAD_REQUEST);
    }

    let enrichment = state.enricher.enrich(&query.url).await;
    Ok(Json(enrichment))
}
