//! Probe client implementation

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::classify::classify_transport;
use crate::errors::HttpError;
use surge_config::HttpConfig;
use surge_core::reasons;

/// Browser-like agents the probe rotates through so fingerprint-based
/// throttling does not collapse the whole pool into one client identity.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "de-DE,de;q=0.9,en;q=0.7",
    "fr-FR,fr;q=0.9,en;q=0.6",
    "es-ES,es;q=0.9,en;q=0.7",
];

/// Outcome of one probe. Never an error: every failure mode is counted
/// under a reason key.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub latency_ms: u64,
    pub reason: Option<&'static str>,
}

/// Result of issuance-time target resolution
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Final URL after following redirects; tokens are bound to this
    pub final_url: String,
    pub status: u16,
    /// Whether any redirect hop was followed
    pub redirected: bool,
}

/// HTTP probe client
///
/// Holds two reqwest clients: the probe client never follows redirects
/// (a 3xx answer is a served response), while the resolver follows a
/// bounded number so issuance can pin the final URL.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    probe: Client,
    resolver: Client,
    config: HttpConfig,
}

impl ProbeClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(timeout_ms = config.timeout.as_millis() as u64, "creating probe client");

        let probe = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_tls)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let resolver = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_tls)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .build()?;

        Ok(Self { probe, resolver, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Execute one load-test request and classify its outcome.
    ///
    /// The response body is drained so latency covers the full transfer,
    /// not just the status line.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let target = match cache_busted(url) {
            Ok(target) => target,
            Err(_) => {
                // A malformed URL should have been caught at issuance;
                // count it rather than crash the pool.
                return ProbeOutcome {
                    ok: false,
                    latency_ms: 0,
                    reason: Some(reasons::NETWORK_ERROR),
                };
            }
        };

        let started = Instant::now();
        let response = self
            .probe
            .get(target)
            .headers(randomized_headers())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                // Drain the body; a mid-stream failure is a transport error
                // even though the status line already arrived.
                if let Err(e) = resp.bytes().await {
                    return ProbeOutcome {
                        ok: false,
                        latency_ms: started.elapsed().as_millis() as u64,
                        reason: Some(classify_transport(&e)),
                    };
                }
                let latency_ms = started.elapsed().as_millis() as u64;
                match reasons::classify_status(status.as_u16()) {
                    None => ProbeOutcome {
                        ok: true,
                        latency_ms,
                        reason: None,
                    },
                    Some(reason) => ProbeOutcome {
                        ok: false,
                        latency_ms,
                        reason: Some(reason),
                    },
                }
            }
            Err(e) => ProbeOutcome {
                ok: false,
                latency_ms: started.elapsed().as_millis() as u64,
                reason: Some(classify_transport(&e)),
            },
        }
    }

    /// Resolve a run target at issuance time: follow redirects to the
    /// final URL and report the status the target answered with.
    pub async fn resolve_target(&self, url: &str) -> Result<ResolvedTarget, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let response = self
            .resolver
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| HttpError::Unreachable(classify_transport(&e).to_string()))?;

        let final_url = response.url().to_string();
        Ok(ResolvedTarget {
            redirected: final_url != parsed.to_string(),
            status: response.status().as_u16(),
            final_url,
        })
    }
}

/// Append a cache-busting parameter so CDN caches and replay detection
/// cannot serve the pool from memory and mask real target behavior.
fn cache_busted(url: &str) -> Result<Url, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    let nonce: String = std::iter::repeat_with(fastrand::alphanumeric).take(12).collect();
    parsed.query_pairs_mut().append_pair("__surge", &nonce);
    Ok(parsed)
}

/// Randomize client-identifying headers per request.
fn randomized_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGES[fastrand::usize(..ACCEPT_LANGUAGES.len())]),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// True when a status means the resolver reached a serving endpoint.
pub fn status_reachable(status: u16) -> bool {
    StatusCode::from_u16(status)
        .map(|s| !s.is_server_error())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_buster_appends_param() {
        let url = cache_busted("https://example.com/path").unwrap();
        assert!(url.query().unwrap().starts_with("__surge="));
    }

    #[test]
    fn test_cache_buster_preserves_existing_query() {
        let url = cache_busted("https://example.com/path?a=1").unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("a=1"));
        assert!(query.contains("__surge="));
    }

    #[test]
    fn test_cache_buster_values_differ() {
        let one = cache_busted("https://example.com/").unwrap();
        let two = cache_busted("https://example.com/").unwrap();
        assert_ne!(one.query(), two.query());
    }

    #[test]
    fn test_randomized_headers_complete() {
        let headers = randomized_headers();
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
    }

    #[test]
    fn test_status_reachable() {
        assert!(status_reachable(200));
        assert!(status_reachable(404)); // target answered; class is fine
        assert!(!status_reachable(503));
    }
}
