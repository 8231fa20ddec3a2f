//! Transport-error bucketing
//!
//! reqwest flattens very different failures into one opaque error type;
//! the histogram needs them apart. Timeouts are detected structurally,
//! everything else by pattern match over the rendered source chain.

use std::error::Error as StdError;

use surge_core::reasons;

/// Bucket a transport-level failure into a reason key.
pub fn classify_transport(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        return reasons::TIMEOUT;
    }
    classify_transport_text(&error_chain_text(err))
}

/// Pattern-match the lowercased error chain text into a reason key.
pub(crate) fn classify_transport_text(text: &str) -> &'static str {
    if text.contains("timed out") || text.contains("timeout") {
        reasons::TIMEOUT
    } else if text.contains("dns") || text.contains("failed to lookup") {
        reasons::DNS_FAILURE
    } else if text.contains("certificate")
        || text.contains("tls")
        || text.contains("ssl")
        || text.contains("handshake")
    {
        reasons::TLS_FAILURE
    } else if text.contains("refused") {
        reasons::CONNECTION_REFUSED
    } else if text.contains("reset") || text.contains("broken pipe") || text.contains("aborted") {
        reasons::CONNECTION_RESET
    } else if text.contains("too many open files") || text.contains("resource") {
        reasons::RESOURCE_EXHAUSTED
    } else {
        reasons::NETWORK_ERROR
    }
}

/// Render an error and its whole source chain to one lowercase string.
fn error_chain_text(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_pattern() {
        assert_eq!(
            classify_transport_text("error sending request: dns error: failed to lookup address"),
            reasons::DNS_FAILURE
        );
    }

    #[test]
    fn test_tls_pattern() {
        assert_eq!(
            classify_transport_text("invalid peer certificate: expired"),
            reasons::TLS_FAILURE
        );
        assert_eq!(
            classify_transport_text("tls handshake eof"),
            reasons::TLS_FAILURE
        );
    }

    #[test]
    fn test_connection_patterns() {
        assert_eq!(
            classify_transport_text("tcp connect error: connection refused (os error 111)"),
            reasons::CONNECTION_REFUSED
        );
        assert_eq!(
            classify_transport_text("connection reset by peer (os error 104)"),
            reasons::CONNECTION_RESET
        );
        assert_eq!(
            classify_transport_text("too many open files (os error 24)"),
            reasons::RESOURCE_EXHAUSTED
        );
    }

    #[test]
    fn test_unknown_falls_back_to_network_error() {
        assert_eq!(
            classify_transport_text("some novel failure"),
            reasons::NETWORK_ERROR
        );
    }
}
