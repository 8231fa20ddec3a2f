//! Canonical outcome-reason taxonomy
//!
//! Every failed request is counted under exactly one of these reason keys.
//! The keys are stable wire values: they appear in batch responses and in
//! the final report's histograms, and tests assert on them.

/// Target returned 429.
pub const RATE_LIMITED: &str = "rate_limited";
/// Target returned 502.
pub const BAD_GATEWAY: &str = "bad_gateway";
/// Target returned 503.
pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
/// Target returned 504.
pub const GATEWAY_TIMEOUT: &str = "gateway_timeout";
/// Any other 4xx status.
pub const HTTP_4XX: &str = "http_4xx";
/// Any other 5xx status.
pub const HTTP_5XX: &str = "http_5xx";

/// Request exceeded its per-request timeout.
pub const TIMEOUT: &str = "timeout";
pub const CONNECTION_REFUSED: &str = "connection_refused";
pub const CONNECTION_RESET: &str = "connection_reset";
pub const DNS_FAILURE: &str = "dns_failure";
pub const TLS_FAILURE: &str = "tls_failure";
/// Local socket/file-descriptor exhaustion.
pub const RESOURCE_EXHAUSTED: &str = "resource_exhausted";
/// Transport failure that matched no more specific bucket.
pub const NETWORK_ERROR: &str = "network_error";

/// An entire regional split failed to execute; its whole allocation is
/// booked under this key so the loss stays visible.
pub const REGION_EXECUTION_ERROR: &str = "region_execution_error";

/// Bucket a response status code into a reason key.
///
/// Returns `None` for statuses counted as success (2xx and 3xx; the
/// probe client does not follow load-test redirects, so reaching one
/// means the target answered).
pub fn classify_status(status: u16) -> Option<&'static str> {
    match status {
        200..=399 => None,
        429 => Some(RATE_LIMITED),
        502 => Some(BAD_GATEWAY),
        503 => Some(SERVICE_UNAVAILABLE),
        504 => Some(GATEWAY_TIMEOUT),
        400..=499 => Some(HTTP_4XX),
        _ => Some(HTTP_5XX),
    }
}
