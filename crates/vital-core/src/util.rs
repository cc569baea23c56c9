//! Small helpers shared across the engine.

/// Longest error-body excerpt carried into log output and outcome messages
const ERROR_EXCERPT_MAX_CHARS: usize = 180;

/// Collapse optional provider metadata to `None` when blank.
///
/// Device fields arrive from platform providers as empty or padded strings
/// about as often as missing ones; records store trimmed text or nothing.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Whether a configured endpoint uses a scheme the transport can speak
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Cap an API error body to a loggable excerpt; ingestion servers echo
/// rejected payloads back and those do not belong in logs wholesale
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_EXCERPT_MAX_CHARS).collect()
}

/// Seconds since the Unix epoch, for cursor bookkeeping columns
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_device_metadata_collapses_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(String::new())), None);
        assert_eq!(normalize_text_option(Some("  \t ".to_string())), None);
    }

    #[test]
    fn padded_device_metadata_is_trimmed() {
        assert_eq!(
            normalize_text_option(Some("  Pixel 8  ".to_string())),
            Some("Pixel 8".to_string())
        );
    }

    #[test]
    fn only_http_schemes_are_accepted() {
        assert!(is_http_url("https://api.vital.dev"));
        assert!(is_http_url("http://localhost:8080"));
        assert!(!is_http_url("wss://api.vital.dev"));
        assert!(!is_http_url("api.vital.dev"));
    }

    #[test]
    fn long_error_bodies_are_capped() {
        let body = "rejected: ".repeat(100);
        assert_eq!(
            compact_text(&body).chars().count(),
            ERROR_EXCERPT_MAX_CHARS
        );
        assert_eq!(compact_text("  payload too large  "), "payload too large");
    }
}
