//! Webhook normalizer: two upstream payload shapes in, one canonical
//! ingestion request out.

use std::collections::HashMap;

use tracing::debug;

use crate::error::IngestError;
use crate::phone;

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Provider A account identifier; a mismatched or missing `AccountSid`
    /// is rejected as untrusted when this is set.
    pub expected_account_sid: Option<String>,
    /// The shared number the service sends from. Inbound payloads claiming
    /// to come from it are our own confirmation echoes.
    pub service_number: Option<String>,
}

/// Canonical ingestion request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub content: String,
    /// Canonical sender phone identity.
    pub sender: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub provider_message_id: Option<String>,
    /// Carrier segment-count hint, provider A only. Logged, never acted on.
    pub segment_count: Option<u32>,
}

/// `Skip` is a recognized echo: the caller must no-op without side effects.
#[derive(Debug)]
pub enum NormalizerResult {
    Request(IngestionRequest),
    Skip,
}

/// Parse a flat field map (form-decoded or JSON-flattened) into a canonical
/// request. Field names are matched case-insensitively; provider A is
/// detected by its `MessageSid`/`AccountSid` markers, anything else falls
/// through to the provider B shape.
pub fn parse(
    fields: &HashMap<String, String>,
    config: &NormalizerConfig,
) -> Result<NormalizerResult, IngestError> {
    let fields: HashMap<String, &str> = fields
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
        .collect();

    if fields.contains_key("messagesid") || fields.contains_key("accountsid") {
        return parse_provider_a(&fields, config);
    }
    parse_provider_b(&fields)
}

fn parse_provider_a(
    fields: &HashMap<String, &str>,
    config: &NormalizerConfig,
) -> Result<NormalizerResult, IngestError> {
    if let Some(expected) = &config.expected_account_sid {
        match fields.get("accountsid") {
            Some(sid) if *sid == expected.as_str() => {}
            _ => return Err(IngestError::UntrustedSender),
        }
    }

    // Status callbacks echo our own sends back without a body.
    let body = fields.get("body").copied().filter(|b| !b.is_empty());
    if body.is_none()
        && (fields.contains_key("messagestatus") || fields.contains_key("smsstatus"))
    {
        return Ok(NormalizerResult::Skip);
    }

    let from = fields
        .get("from")
        .copied()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| IngestError::MalformedPayload("missing From".into()))?;
    let sender = phone::canonicalize(from);

    // Our own confirmation text looped back through the provider.
    if let Some(service) = &config.service_number {
        if sender == phone::canonicalize(service) {
            return Ok(NormalizerResult::Skip);
        }
    }

    let num_media: u32 = fields
        .get("nummedia")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    let (media_url, media_type) = if num_media > 0 {
        (
            fields.get("mediaurl0").map(|s| s.to_string()),
            fields.get("mediacontenttype0").map(|s| s.to_string()),
        )
    } else {
        (None, None)
    };

    // A caption-less MMS is a valid save; only a payload with neither text
    // nor media is malformed.
    let content = match body {
        Some(body) => body.to_string(),
        None if media_url.is_some() => String::new(),
        None => return Err(IngestError::MalformedPayload("missing Body".into())),
    };

    let segment_count = fields.get("numsegments").and_then(|n| n.parse().ok());
    if let Some(segments) = segment_count {
        if segments > 1 {
            debug!("inbound message split into {} carrier segments", segments);
        }
    }

    Ok(NormalizerResult::Request(IngestionRequest {
        content,
        sender,
        media_url,
        media_type,
        provider_message_id: fields.get("messagesid").map(|s| s.to_string()),
        segment_count,
    }))
}

fn parse_provider_b(fields: &HashMap<String, &str>) -> Result<NormalizerResult, IngestError> {
    let content = ["message", "sms", "body"]
        .iter()
        .find_map(|k| fields.get(*k).copied().filter(|v| !v.is_empty()));
    let from = ["from", "originalsenderid"]
        .iter()
        .find_map(|k| fields.get(*k).copied().filter(|v| !v.is_empty()));

    match (content, from) {
        (Some(content), Some(from)) => Ok(NormalizerResult::Request(IngestionRequest {
            content: content.to_string(),
            sender: phone::canonicalize(from),
            media_url: None,
            media_type: None,
            provider_message_id: None,
            segment_count: None,
        })),
        _ => Err(IngestError::MalformedPayload(
            "payload matches neither provider shape".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config() -> NormalizerConfig {
        NormalizerConfig {
            expected_account_sid: Some("AC123".into()),
            service_number: Some("+15559990000".into()),
        }
    }

    #[test]
    fn provider_a_happy_path() {
        let fields = map(&[
            ("Body", "#movies great film"),
            ("From", "+1 (555) 123-4567"),
            ("To", "+15559990000"),
            ("MessageSid", "SM1"),
            ("AccountSid", "AC123"),
            ("NumSegments", "1"),
        ]);

        let result = parse(&fields, &config()).unwrap();
        let NormalizerResult::Request(req) = result else {
            panic!("expected a request");
        };
        assert_eq!(req.content, "#movies great film");
        assert_eq!(req.sender, "+15551234567");
        assert_eq!(req.provider_message_id.as_deref(), Some("SM1"));
        assert_eq!(req.segment_count, Some(1));
    }

    #[test]
    fn provider_a_account_mismatch_is_untrusted() {
        let fields = map(&[
            ("Body", "hi"),
            ("From", "+15551234567"),
            ("MessageSid", "SM1"),
            ("AccountSid", "AC999"),
        ]);
        assert!(matches!(
            parse(&fields, &config()),
            Err(IngestError::UntrustedSender)
        ));

        // Missing AccountSid is equally untrusted when one is expected.
        let fields = map(&[("Body", "hi"), ("From", "+15551234567"), ("MessageSid", "SM1")]);
        assert!(matches!(
            parse(&fields, &config()),
            Err(IngestError::UntrustedSender)
        ));
    }

    #[test]
    fn provider_a_status_callback_is_skip() {
        let fields = map(&[
            ("MessageSid", "SM1"),
            ("AccountSid", "AC123"),
            ("MessageStatus", "delivered"),
        ]);
        assert!(matches!(
            parse(&fields, &config()).unwrap(),
            NormalizerResult::Skip
        ));
    }

    #[test]
    fn own_confirmation_echo_is_skip() {
        let fields = map(&[
            ("Body", "Saved to #movies"),
            ("From", "+15559990000"),
            ("MessageSid", "SM2"),
            ("AccountSid", "AC123"),
        ]);
        assert!(matches!(
            parse(&fields, &config()).unwrap(),
            NormalizerResult::Skip
        ));
    }

    #[test]
    fn provider_a_media_fields() {
        let fields = map(&[
            ("Body", "look"),
            ("From", "+15551234567"),
            ("MessageSid", "SM3"),
            ("AccountSid", "AC123"),
            ("NumMedia", "1"),
            ("MediaUrl0", "https://media.example/abc"),
            ("MediaContentType0", "image/jpeg"),
        ]);
        let NormalizerResult::Request(req) = parse(&fields, &config()).unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(req.media_url.as_deref(), Some("https://media.example/abc"));
        assert_eq!(req.media_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn media_only_mms_is_accepted() {
        let fields = map(&[
            ("From", "+15551234567"),
            ("MessageSid", "SM5"),
            ("AccountSid", "AC123"),
            ("NumMedia", "1"),
            ("MediaUrl0", "https://media.example/photo"),
            ("MediaContentType0", "image/jpeg"),
        ]);
        let NormalizerResult::Request(req) = parse(&fields, &config()).unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(req.content, "");
        assert_eq!(req.media_url.as_deref(), Some("https://media.example/photo"));

        // No body and no media is still malformed.
        let fields = map(&[
            ("From", "+15551234567"),
            ("MessageSid", "SM6"),
            ("AccountSid", "AC123"),
        ]);
        assert!(matches!(
            parse(&fields, &config()),
            Err(IngestError::MalformedPayload(_))
        ));
    }

    #[test]
    fn provider_b_field_aliases() {
        for (content_key, from_key) in [("message", "from"), ("sms", "originalsenderid"), ("body", "from")] {
            let fields = map(&[(content_key, "#news thing"), (from_key, "5551234567")]);
            let NormalizerResult::Request(req) = parse(&fields, &config()).unwrap() else {
                panic!("expected a request");
            };
            assert_eq!(req.content, "#news thing");
            assert_eq!(req.sender, "+15551234567");
            assert!(req.provider_message_id.is_none());
        }
    }

    #[test]
    fn unknown_shape_is_malformed() {
        let fields = map(&[("foo", "bar")]);
        assert!(matches!(
            parse(&fields, &config()),
            Err(IngestError::MalformedPayload(_))
        ));
    }

    #[test]
    fn no_expected_sid_means_no_account_check() {
        let fields = map(&[
            ("Body", "hi"),
            ("From", "+15551234567"),
            ("MessageSid", "SM1"),
            ("AccountSid", "ACanything"),
        ]);
        let config = NormalizerConfig {
            expected_account_sid: None,
            service_number: None,
        };
        assert!(matches!(
            parse(&fields, &config).unwrap(),
            NormalizerResult::Request(_)
        ));
    }
}
