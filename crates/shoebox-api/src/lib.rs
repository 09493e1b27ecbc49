pub mod boards;
pub mod enrich;
pub mod messages;
pub mod users;
pub mod webhook;

use std::sync::Arc;

use shoebox_db::Database;
use shoebox_gateway::fanout::Fanout;
use shoebox_ingest::enrich::Enricher;
use shoebox_ingest::normalize::NormalizerConfig;
use shoebox_ingest::pipeline::Ingestor;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub ingestor: Ingestor,
    pub fanout: Fanout,
    pub normalizer: NormalizerConfig,
    pub enricher: Enricher,
}
