//! Pipeline orchestration: one normalized webhook call in, one settled
//! message out, with onboarding, routing, and fan-out along the way.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shoebox_db::Database;
use shoebox_gateway::fanout::Fanout;
use shoebox_types::events::GatewayEvent;
use shoebox_types::models::{Message, OnboardingStep, UNTAGGED};

use crate::categorize::TagSuggester;
use crate::dedup::{self, StoreOutcome};
use crate::error::IngestError;
use crate::normalize::IngestionRequest;
use crate::onboarding::{self, Observation, Transition, WELCOME_TEXT};
use crate::phone;
use crate::router;
use crate::sms::SmsSender;
use crate::tags;

/// Delay before the corrector re-checks an untagged message for a donor
/// that arrived out of order.
const CORRECTION_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    New,
    Merged,
    Duplicate,
}

pub struct IngestOutcome {
    pub message: Message,
    pub kind: OutcomeKind,
    /// Users a NEW_MESSAGE event was addressed to (empty for duplicates).
    pub notified: Vec<Uuid>,
    /// Advisory categorizer output; never applied to routing.
    pub suggested_tag: Option<String>,
}

pub struct Ingestor {
    db: Arc<Database>,
    fanout: Fanout,
    sms: Arc<dyn SmsSender>,
    suggester: Arc<dyn TagSuggester>,
}

/// Everything decided under the blocking persistence section.
struct StoredIngest {
    user_id: Uuid,
    user_created: bool,
    kind: OutcomeKind,
    row: shoebox_db::models::MessageRow,
    resolved_tags: Vec<String>,
    stored_tags: Vec<String>,
    fired: Vec<Transition>,
    targets: Vec<Uuid>,
}

impl Ingestor {
    pub fn new(
        db: Arc<Database>,
        fanout: Fanout,
        sms: Arc<dyn SmsSender>,
        suggester: Arc<dyn TagSuggester>,
    ) -> Self {
        Self {
            db,
            fanout,
            sms,
            suggester,
        }
    }

    /// Ingest one canonical request. Idempotent per provider message id:
    /// a redelivery returns the stored message and notifies nobody.
    pub async fn ingest(&self, req: IngestionRequest) -> Result<IngestOutcome, IngestError> {
        let now_ms = Utc::now().timestamp_millis();

        let db = self.db.clone();
        let blocking_req = req.clone();
        let stored = tokio::task::spawn_blocking(move || store_and_route(&db, &blocking_req, now_ms))
            .await
            .map_err(|e| IngestError::Persistence(anyhow::anyhow!("join error: {e}")))??;

        let reachable = !phone::is_unreachable(&req.sender);

        // Welcome on first sighting, then any onboarding nudges. All best
        // effort: a dead send is the sender's problem to log, not ours to
        // surface.
        if stored.user_created {
            if reachable {
                self.sms.send(&req.sender, WELCOME_TEXT).await;
            } else {
                debug!("skipping welcome text to unreachable {}", req.sender);
            }
        }
        for transition in &stored.fired {
            info!(
                "user {} onboarding -> {}",
                stored.user_id,
                transition.to.as_str()
            );
            if let Some(nudge) = transition.nudge {
                if reachable {
                    self.sms.send(&req.sender, nudge).await;
                } else {
                    debug!("skipping onboarding nudge to unreachable {}", req.sender);
                }
            }
        }

        let mut notified = Vec::new();
        if stored.kind != OutcomeKind::Duplicate {
            self.fanout
                .broadcast_to(&stored.targets, GatewayEvent::NewMessage)
                .await;
            notified = stored.targets.clone();
        }

        let sentinel_only = stored.resolved_tags.iter().all(|t| t == UNTAGGED);
        if stored.kind == OutcomeKind::New && sentinel_only {
            self.schedule_tag_correction(
                stored.row.id.clone(),
                stored.user_id,
                req.sender.clone(),
                stored.row.created_at,
            );
        }

        let suggested_tag = if sentinel_only && stored.kind != OutcomeKind::Duplicate {
            self.suggester
                .suggest_tag(&req.content, &stored.resolved_tags)
                .await
        } else {
            None
        };

        let message = stored
            .row
            .into_message(stored.stored_tags)
            .map_err(IngestError::Persistence)?;

        Ok(IngestOutcome {
            message,
            kind: stored.kind,
            notified,
            suggested_tag,
        })
    }

    /// Fire-and-forget post-processing: an URL-only/untagged message may be
    /// the late half of a split submission whose tagged half arrives just
    /// after it. Re-run inheritance once the dust settles; failure is
    /// logged, never propagated to the originating request.
    fn schedule_tag_correction(
        &self,
        message_id: String,
        user_id: Uuid,
        sender: String,
        created_at_ms: i64,
    ) {
        let db = self.db.clone();
        let fanout = self.fanout.clone();

        tokio::spawn(async move {
            tokio::time::sleep(CORRECTION_DELAY).await;

            let db_block = db.clone();
            let mid = message_id.clone();
            let result = tokio::task::spawn_blocking(move || -> AnyResult<Option<Vec<Uuid>>> {
                let since = created_at_ms - tags::INHERIT_WINDOW_MS;
                let Some(donor) = db_block.find_recent_tagged_message(
                    &sender,
                    &user_id.to_string(),
                    since,
                    UNTAGGED,
                )?
                else {
                    return Ok(None);
                };
                if donor.id == mid {
                    return Ok(None);
                }
                let inherited = db_block.tags_of(&donor.id)?;
                if inherited.is_empty() {
                    return Ok(None);
                }
                // Bail if someone already retagged it.
                let current = db_block.tags_of(&mid)?;
                if current.iter().any(|t| t != UNTAGGED) {
                    return Ok(None);
                }
                db_block.replace_tags(&mid, &inherited)?;
                let targets = router::notification_targets(&db_block, user_id, &inherited)?;
                Ok(Some(targets))
            })
            .await;

            match result {
                Ok(Ok(Some(targets))) => {
                    info!("late tag inheritance applied to message {}", message_id);
                    fanout.broadcast_to(&targets, GatewayEvent::NewMessage).await;
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!("tag correction for {} failed: {:#}", message_id, e),
                Err(e) => warn!("tag correction task for {} panicked: {}", message_id, e),
            }
        });
    }
}

fn store_and_route(
    db: &Database,
    req: &IngestionRequest,
    now_ms: i64,
) -> Result<StoredIngest, IngestError> {
    let inner = || -> AnyResult<StoredIngest> {
        // Find or create the user by canonical phone identity.
        let (user_id, prior_step, user_created) = match db.find_user_by_phone(&req.sender)? {
            Some(row) => {
                let step = OnboardingStep::parse(&row.onboarding_step)
                    .ok_or_else(|| anyhow::anyhow!("unknown onboarding step: {}", row.onboarding_step))?;
                (row.id.parse::<Uuid>()?, step, false)
            }
            None => {
                let id = Uuid::new_v4();
                db.create_user(&id.to_string(), &req.sender, now_ms)?;
                info!("created user {} for {}", id, req.sender);
                (id, OnboardingStep::WelcomeSent, true)
            }
        };

        let resolved_tags = tags::resolve(db, &req.sender, &user_id.to_string(), &req.content, now_ms)?;

        let outcome = dedup::store(db, user_id, req, &resolved_tags, now_ms)?;
        let (kind, row) = match outcome {
            StoreOutcome::New(row) => (OutcomeKind::New, row),
            StoreOutcome::Merged(row) => (OutcomeKind::Merged, row),
            StoreOutcome::Duplicate(row) => {
                // Redelivery: no onboarding observation, no routing.
                let stored_tags = db.tags_of(&row.id)?;
                return Ok(StoredIngest {
                    user_id,
                    user_created,
                    kind: OutcomeKind::Duplicate,
                    row,
                    resolved_tags,
                    stored_tags,
                    fired: vec![],
                    targets: vec![],
                });
            }
        };

        // Onboarding observes every accepted message, in parallel with tag
        // processing conceptually but under the same persistence section.
        let observation = Observation {
            has_real_tags: resolved_tags.iter().any(|t| t != UNTAGGED),
            has_link: tags::contains_link(&req.content),
        };
        let fired = onboarding::advance(prior_step, observation);
        if let Some(last) = fired.last() {
            let onboarded_at = (last.to == OnboardingStep::Completed).then_some(now_ms);
            db.update_onboarding_step(&user_id.to_string(), last.to.as_str(), onboarded_at)?;
        }

        let stored_tags = db.tags_of(&row.id)?;
        let targets = router::notification_targets(db, user_id, &stored_tags)?;

        Ok(StoredIngest {
            user_id,
            user_created,
            kind,
            row,
            resolved_tags,
            stored_tags,
            fired,
            targets,
        })
    };

    inner().map_err(IngestError::Persistence)
}
