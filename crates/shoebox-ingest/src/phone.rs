//! Phone identity canonicalization and reachability heuristics.
//!
//! Raw provider strings may carry or omit country code and punctuation;
//! every lookup key goes through `canonicalize` first.

/// Reduce a raw provider phone string to one canonical form: `+` plus
/// digits only, with `+1` assumed for bare 10-digit North American numbers.
pub fn canonicalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if raw.trim_start().starts_with('+') {
        return format!("+{digits}");
    }
    if digits.len() == 10 {
        return format!("+1{digits}");
    }
    if digits.len() == 11 && digits.starts_with('1') {
        return format!("+{digits}");
    }
    format!("+{digits}")
}

/// Numbers we never attempt to deliver to: provider test ranges, toll-free
/// and premium prefixes, short codes. Classification only gates outbound
/// sends — ingestion and onboarding transitions proceed regardless.
pub fn is_unreachable(canonical: &str) -> bool {
    let digits = canonical.trim_start_matches('+');

    // Short codes and garbage identities
    if digits.len() < 8 {
        return true;
    }

    // Provider magic test numbers (+1 500 555 xxxx)
    if digits.starts_with("1500555") {
        return true;
    }

    // US toll-free and premium service prefixes
    if digits.len() == 11 && digits.starts_with('1') {
        let prefix = &digits[1..4];
        if matches!(prefix, "800" | "833" | "844" | "855" | "866" | "877" | "888" | "900") {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_punctuation() {
        assert_eq!(canonicalize("+1 (555) 123-4567"), "+15551234567");
        assert_eq!(canonicalize("+15551234567"), "+15551234567");
    }

    #[test]
    fn canonicalize_adds_country_code() {
        assert_eq!(canonicalize("5551234567"), "+15551234567");
        assert_eq!(canonicalize("555-123-4567"), "+15551234567");
        assert_eq!(canonicalize("15551234567"), "+15551234567");
    }

    #[test]
    fn canonicalize_preserves_international() {
        assert_eq!(canonicalize("+447911123456"), "+447911123456");
    }

    #[test]
    fn same_number_many_shapes_one_identity() {
        let forms = ["+15551234567", "5551234567", "(555) 123-4567", "1-555-123-4567"];
        let canonical: Vec<String> = forms.iter().map(|f| canonicalize(f)).collect();
        assert!(canonical.iter().all(|c| c == "+15551234567"));
    }

    #[test]
    fn unreachable_classification() {
        assert!(is_unreachable("+15005550006")); // test range
        assert!(is_unreachable("+18005551234")); // toll-free
        assert!(is_unreachable("+18885551234"));
        assert!(is_unreachable("+19005551234")); // premium
        assert!(is_unreachable("+12345")); // short code

        assert!(!is_unreachable("+15551234567"));
        assert!(!is_unreachable("+447911123456"));
    }
}
