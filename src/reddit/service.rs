// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! HTTPS connector for the Reddit API.
//!
//! Service structures in this module provide a low-level way to interact
//! with the Reddit API over HTTPS, essentially a specialized HTTPS client
//! specifically for Reddit. The service owns everything transport-related:
//! OAuth tokens, rate limits, and retrying requests that failed for
//! transient reasons. Callers only ever see the final outcome.

use crate::conf::Credentials;
use crate::http::{self, HTTPError, HTTPResult};
use log::{debug, trace, warn};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Endpoint that issues OAuth access tokens.
const ACCESS_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Base URL for authenticated API requests.
const API_BASE_URL: &str = "https://oauth.reddit.com";

/// Tokens are refreshed this long before Reddit says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Longest the service will ever wait before retrying a request.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// A service for retrieving raw data from the Reddit API.
///
/// Using this trait, clients can implement different ways of connecting
/// to the Reddit API, such as an actual connector for production code,
/// and a mocked connector for testing purposes.
pub trait Service {
    /// Performs a GET request for the API resource at `path` with the given
    /// query parameters and returns the raw JSON response body.
    fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> impl Future<Output = HTTPResult<String>> + Send;
}

/// A service that contacts the Reddit API directly to retrieve information.
///
/// Requests are authenticated with an application-only OAuth token, which
/// is fetched on first use and refreshed shortly before it expires (or
/// immediately if Reddit rejects it).
#[derive(Debug)]
pub struct RedditService {
    client: Client,
    credentials: Credentials,
    token: Mutex<Option<Token>>,
    max_retries: u32,
}

#[derive(Clone, Debug)]
struct Token {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl RedditService {
    /// Creates a new Reddit service authenticating with `credentials`.
    pub fn new(credentials: Credentials) -> HTTPResult<Self> {
        let client = http::client(credentials.user_agent())?;
        Ok(Self {
            client,
            credentials,
            token: Mutex::new(None),
            max_retries: 3,
        })
    }

    fn uri(&self, path: &str) -> String {
        format!("{API_BASE_URL}{path}")
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .as_ref()
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.access_token.clone())
    }

    fn store_token(&self, token: Option<Token>) {
        let mut guard = self.token.lock().unwrap_or_else(|err| err.into_inner());
        *guard = token;
    }

    async fn access_token(&self) -> HTTPResult<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        debug!("requesting a new access token");
        let resp = self
            .client
            .post(ACCESS_TOKEN_URL)
            .basic_auth(
                self.credentials.client_id(),
                Some(self.credentials.client_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(token_error(status));
        }

        let body = resp.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|_| HTTPError::Token("token endpoint returned an unexpected body".into()))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        self.store_token(Some(Token {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        }));
        Ok(token.access_token)
    }

    async fn read_body(resp: reqwest::Response) -> HTTPResult<String> {
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .ok_or(HTTPError::MissingContentType)?
            .to_str()?;
        if !content_type.starts_with("application/json") {
            Err(HTTPError::UnexpectedContentType(content_type.to_string()))
        } else {
            Ok(resp.text().await?)
        }
    }
}

impl Service for RedditService {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> HTTPResult<String> {
        let uri = self.uri(path);
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            let token = match self.access_token().await {
                Ok(token) => token,
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let wait = backoff(attempt);
                    warn!("{err}; retrying token request in {}s", wait.as_secs());
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };
            trace!("GET {uri} {query:?}");
            let result = self
                .client
                .get(&uri)
                .bearer_auth(token)
                .query(query)
                .query(&[("raw_json", "1")])
                .send()
                .await;

            let resp = match result {
                Ok(resp) => resp,
                Err(err) => {
                    let err = HTTPError::from(err);
                    if err.is_transient() && attempt < self.max_retries {
                        let wait = backoff(attempt);
                        warn!("{err}; retrying {path} in {}s", wait.as_secs());
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                debug!("access token rejected; refreshing");
                self.store_token(None);
                refreshed = true;
                continue;
            }

            let err = HTTPError::Http(status);
            if err.is_transient() && attempt < self.max_retries {
                let wait = retry_after(resp.headers()).unwrap_or_else(|| backoff(attempt));
                warn!("{err}; retrying {path} in {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                debug!("GET {path} failed with HTTP {status}");
                return Err(err);
            }

            if let Some(wait) = rate_limit_pause(resp.headers()) {
                warn!("rate limit exhausted; pausing for {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
            }

            return Self::read_body(resp).await;
        }
    }
}

/// Error for a token request that failed with `status`.
///
/// Rate limiting and server errors keep their status and are transient;
/// anything else means the credentials were refused.
fn token_error(status: StatusCode) -> HTTPError {
    let err = HTTPError::Http(status);
    if err.is_transient() {
        err
    } else {
        HTTPError::Token(format!("token endpoint returned HTTP {status}"))
    }
}

/// Exponential backoff for the given retry attempt: 1s, 2s, 4s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(5)).min(MAX_RETRY_WAIT)
}

/// How long Reddit asked us to wait before retrying, if it said.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_secs(headers, header::RETRY_AFTER.as_str())
        .or_else(|| header_secs(headers, "x-ratelimit-reset"))
        .map(|wait| wait.min(MAX_RETRY_WAIT))
}

/// How long to pause before the next request if the rate-limit budget for
/// the current window is spent.
fn rate_limit_pause(headers: &HeaderMap) -> Option<Duration> {
    let remaining = headers
        .get("x-ratelimit-remaining")?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    if remaining >= 1.0 {
        return None;
    }
    header_secs(headers, "x-ratelimit-reset").map(|wait| wait.min(MAX_RETRY_WAIT))
}

fn header_secs(headers: &HeaderMap, name: &str) -> Option<Duration> {
    let secs = headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn service() -> RedditService {
        RedditService::new(Credentials::new("id", "secret", "redscout-test")).unwrap()
    }

    #[test]
    fn it_returns_a_uri_for_a_path() {
        let uri = service().uri("/r/learnpython/top");
        assert_eq!(uri, "https://oauth.reddit.com/r/learnpython/top");
    }

    #[test]
    fn it_has_no_token_before_authenticating() {
        assert_eq!(service().cached_token(), None);
    }

    #[test]
    fn it_discards_expired_tokens() {
        let service = service();
        service.store_token(Some(Token {
            access_token: "old".to_string(),
            expires_at: Instant::now() - Duration::from_secs(1),
        }));
        assert_eq!(service.cached_token(), None);
    }

    #[test]
    fn it_reuses_valid_tokens() {
        let service = service();
        service.store_token(Some(Token {
            access_token: "fresh".to_string(),
            expires_at: Instant::now() + Duration::from_secs(600),
        }));
        assert_eq!(service.cached_token().as_deref(), Some("fresh"));
    }

    #[test]
    fn it_keeps_transient_token_failures_retryable() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            let err = token_error(status);
            assert_eq!(err.status(), Some(status));
            assert!(err.is_transient(), "{status} should be retried");
        }
    }

    #[test]
    fn it_treats_refused_tokens_as_credential_failures() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::NOT_FOUND] {
            let err = token_error(status);
            assert!(matches!(err, HTTPError::Token(_)), "{status} should refuse the token");
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn it_backs_off_exponentially() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(2), Duration::from_secs(4));
        assert_eq!(backoff(30), Duration::from_secs(32));
    }

    #[test]
    fn it_honors_retry_after() {
        let map = headers(&[("retry-after", "7")]);
        assert_eq!(retry_after(&map), Some(Duration::from_secs(7)));
    }

    #[test]
    fn it_falls_back_to_the_rate_limit_reset() {
        let map = headers(&[("x-ratelimit-reset", "12")]);
        assert_eq!(retry_after(&map), Some(Duration::from_secs(12)));
    }

    #[test]
    fn it_caps_retry_waits() {
        let map = headers(&[("retry-after", "3600")]);
        assert_eq!(retry_after(&map), Some(MAX_RETRY_WAIT));
    }

    #[test]
    fn it_pauses_when_the_rate_limit_is_spent() {
        let map = headers(&[("x-ratelimit-remaining", "0.0"), ("x-ratelimit-reset", "5")]);
        assert_eq!(rate_limit_pause(&map), Some(Duration::from_secs(5)));
    }

    #[test]
    fn it_does_not_pause_with_budget_remaining() {
        let map = headers(&[("x-ratelimit-remaining", "42.0"), ("x-ratelimit-reset", "5")]);
        assert_eq!(rate_limit_pause(&map), None);
    }

    #[test]
    fn it_ignores_garbage_headers() {
        let map = headers(&[("retry-after", "soon")]);
        assert_eq!(retry_after(&map), None);
    }
}
