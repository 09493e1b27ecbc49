use thiserror::Error;

/// Ingestion failure taxonomy. `Skip` is deliberately not here — a
/// recognized confirmation echo is a no-op outcome, not an error.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Provider identity check failed. Rejected before any side effect.
    #[error("untrusted sender")]
    UntrustedSender,

    /// Neither known provider shape. The caller logs the raw body; no
    /// message is created.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Collaborator I/O failed. Surfaced to the webhook caller as retryable
    /// (SMS providers redeliver on non-2xx).
    #[error("persistence failure")]
    Persistence(#[from] anyhow::Error),
}
