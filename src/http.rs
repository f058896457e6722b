// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Low-level HTTP plumbing shared by the Reddit service.

use reqwest::{Client, ClientBuilder, StatusCode, header, redirect};
use std::time::Duration;
use thiserror::Error;

/// How long a single HTTP request may take before it is abandoned.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An appropriate user agent to use when making HTTP requests.
///
/// # Examples
///
/// ```
/// let user_agent = redscout::http::user_agent();
/// assert!(user_agent.starts_with("redscout v"));
/// ```
pub fn user_agent() -> String {
    format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Creates an HTTP client that identifies itself as `user_agent`.
///
/// Redirects are never followed: Reddit answers requests for missing
/// subreddits with a redirect to its search page, and callers need to see
/// that redirect to report the subreddit as unavailable.
pub fn client(user_agent: &str) -> HTTPResult<Client> {
    let client = ClientBuilder::new()
        .user_agent(user_agent)
        .redirect(redirect::Policy::none())
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// The result of an HTTP request.
pub type HTTPResult<T> = Result<T, HTTPError>;

/// Indicates an error has occurred when making an HTTP call.
#[derive(Debug, Error)]
pub enum HTTPError {
    /// An error that occurred while making an HTTP request or reading its body.
    #[error("Error while making HTTP request: {0}")]
    Request(#[from] reqwest::Error),

    /// An unsuccessful HTTP status code in an HTTP response.
    #[error("Request returned HTTP {0}")]
    Http(StatusCode),

    /// A missing Content-Type header in a response.
    #[error("Missing Content-Type header")]
    MissingContentType,

    /// An invalid Content-Type header.
    #[error("Invalid Content-Type header value: {0}")]
    InvalidContentType(#[from] header::ToStrError),

    /// A Content-Type that is not understood by the service.
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// The OAuth token endpoint refused to issue a token.
    #[error("Could not obtain an access token: {0}")]
    Token(String),
}

impl HTTPError {
    /// The HTTP status code that caused this error, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HTTPError::Http(status) => Some(*status),
            HTTPError::Request(err) => err.status(),
            _ => None,
        }
    }

    /// True if retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HTTPError::Http(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            HTTPError::Request(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn it_returns_user_agent_with_version_number() {
        let user_agent = user_agent();
        let version_re = Regex::new(r"^[a-z]+ v\d+\.\d+\.\d+(-(alpha|beta)\.\d+)?$").unwrap();
        assert!(
            version_re.is_match(&user_agent),
            "{} does not match {}",
            user_agent,
            version_re,
        );
    }

    #[test]
    fn it_treats_rate_limiting_as_transient() {
        assert!(HTTPError::Http(StatusCode::TOO_MANY_REQUESTS).is_transient());
    }

    #[test]
    fn it_treats_server_errors_as_transient() {
        assert!(HTTPError::Http(StatusCode::BAD_GATEWAY).is_transient());
        assert!(HTTPError::Http(StatusCode::SERVICE_UNAVAILABLE).is_transient());
    }

    #[test]
    fn it_does_not_treat_missing_resources_as_transient() {
        assert!(!HTTPError::Http(StatusCode::NOT_FOUND).is_transient());
        assert!(!HTTPError::Http(StatusCode::FORBIDDEN).is_transient());
        assert!(!HTTPError::MissingContentType.is_transient());
    }

    #[test]
    fn it_returns_the_status_of_an_http_error() {
        let err = HTTPError::Http(StatusCode::NOT_FOUND);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(HTTPError::MissingContentType.status(), None);
    }

    #[test]
    fn it_builds_a_client() {
        assert!(client(&user_agent()).is_ok());
    }
}
