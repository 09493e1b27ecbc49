use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use shoebox_api::{AppState, AppStateInner, boards, enrich, messages, users, webhook};
use shoebox_gateway::connection;
use shoebox_gateway::fanout::Fanout;
use shoebox_ingest::categorize::{HttpTagSuggester, NoSuggestions, TagSuggester};
use shoebox_ingest::enrich::Enricher;
use shoebox_ingest::normalize::NormalizerConfig;
use shoebox_ingest::pipeline::Ingestor;
use shoebox_ingest::sms::{HttpSmsSender, NoopSmsSender, SmsSender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoebox=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("SHOEBOX_DB_PATH").unwrap_or_else(|_| "shoebox.db".into());
    let host = std::env::var("SHOEBOX_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SHOEBOX_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let service_number = std::env::var("SHOEBOX_SERVICE_NUMBER").ok();

    let normalizer = NormalizerConfig {
        expected_account_sid: std::env::var("SHOEBOX_ACCOUNT_SID").ok(),
        service_number: service_number.clone(),
    };

    // Outbound SMS: HTTP provider when configured, otherwise log-and-drop.
    let sms: Arc<dyn SmsSender> = match std::env::var("SHOEBOX_SMS_API_URL") {
        Ok(api_url) => Arc::new(HttpSmsSender::new(
            api_url,
            std::env::var("SHOEBOX_SMS_API_TOKEN").ok(),
            service_number.unwrap_or_default(),
        )),
        Err(_) => Arc::new(NoopSmsSender),
    };

    let suggester: Arc<dyn TagSuggester> = match std::env::var("SHOEBOX_TAGGER_URL") {
        Ok(url) => Arc::new(HttpTagSuggester::new(url)),
        Err(_) => Arc::new(NoSuggestions),
    };

    // Init database + shared state
    let db = Arc::new(shoebox_db::Database::open(&PathBuf::from(&db_path))?);
    let fanout = Fanout::new();
    let ingestor = Ingestor::new(db.clone(), fanout.clone(), sms, suggester);

    let state: AppState = Arc::new(AppStateInner {
        db,
        ingestor,
        fanout: fanout.clone(),
        normalizer,
        enricher: Enricher::new(),
    });

    // Routes
    let app = Router::new()
        .route("/webhook/inbound", post(webhook::inbound))
        .route("/gateway", get(ws_upgrade))
        .route(
            "/users/{user_id}/tags/{tag}/messages",
            get(messages::list_tag_messages),
        )
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/boards", get(users::list_user_boards))
        .route("/boards/{name}/messages", get(boards::board_messages))
        .route("/enrich", get(enrich::enrich_url))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Shoebox server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let fanout = state.fanout.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, fanout))
}
