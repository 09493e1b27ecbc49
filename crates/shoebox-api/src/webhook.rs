use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use tracing::{error, info, warn};

use shoebox_ingest::error::IngestError;
use shoebox_ingest::normalize::{self, NormalizerResult};

use crate::AppState;

/// Single ingestion entry point for both upstream providers.
///
/// Non-2xx tells the provider to redeliver, so only persistence failures
/// get a 5xx; everything else is answered definitively.
pub async fn inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(fields) = decode_fields(&headers, &body) else {
        warn!(
            "undecodable webhook body: {}",
            String::from_utf8_lossy(&body)
        );
        return StatusCode::BAD_REQUEST;
    };

    let req = match normalize::parse(&fields, &state.normalizer) {
        Ok(NormalizerResult::Skip) => {
            info!("skipping confirmation echo");
            return StatusCode::OK;
        }
        Ok(NormalizerResult::Request(req)) => req,
        Err(IngestError::UntrustedSender) => {
            warn!("rejected webhook from untrusted account");
            return StatusCode::FORBIDDEN;
        }
        Err(IngestError::MalformedPayload(reason)) => {
            warn!(
                "malformed webhook payload ({}): {}",
                reason,
                String::from_utf8_lossy(&body)
            );
            return StatusCode::BAD_REQUEST;
        }
        Err(IngestError::Persistence(e)) => {
            error!("normalization persistence error: {:#}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match state.ingestor.ingest(req).await {
        Ok(outcome) => {
            info!(
                "ingested message {} ({:?}), notified {} users",
                outcome.message.id,
                outcome.kind,
                outcome.notified.len()
            );
            StatusCode::OK
        }
        Err(IngestError::Persistence(e)) => {
            // Retryable: the provider redelivers on non-2xx.
            error!("ingest failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(IngestError::UntrustedSender) => StatusCode::FORBIDDEN,
        Err(IngestError::MalformedPayload(_)) => StatusCode::BAD_REQUEST,
    }
}

/// Provider A posts form-encoded bodies; provider B posts JSON. Both reduce
/// to a flat string map for the normalizer.
fn decode_fields(headers: &HeaderMap, body: &Bytes) -> Option<HashMap<String, String>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("json") {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let obj = value.as_object()?;
        Some(
            obj.iter()
                .map(|(k, v)| {
                    let v = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect(),
        )
    } else {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .ok()
            .map(|pairs| pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_body_decodes() {
        let headers = HeaderMap::new();
        let body = Bytes::from_static(b"Body=%23movies+great&From=%2B15551234567&MessageSid=SM1");
        let fields = decode_fields(&headers, &body).unwrap();
        assert_eq!(fields["Body"], "#movies great");
        assert_eq!(fields["From"], "+15551234567");
    }

    #[test]
    fn json_body_decodes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = Bytes::from_static(br#"{"message":"hi","from":"+15551234567"}"#);
        let fields = decode_fields(&headers, &body).unwrap();
        assert_eq!(fields["message"], "hi");
        assert_eq!(fields["from"], "+15551234567");
    }

    #[test]
    fn json_non_string_values_stringified() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = Bytes::from_static(br#"{"message":"hi","from":15551234567}"#);
        let fields = decode_fields(&headers, &body).unwrap();
        assert_eq!(fields["from"], "15551234567");
    }
}
