// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Environment and configuration utilities.

use crate::http;
use std::env;
use thiserror::Error;

/// Environment variable holding the Reddit API client identifier.
pub const CLIENT_ID_VAR: &str = "REDDIT_CLIENT_ID";

/// Environment variable holding the Reddit API client secret.
pub const CLIENT_SECRET_VAR: &str = "REDDIT_CLIENT_SECRET";

/// Environment variable that optionally overrides the user agent.
pub const USER_AGENT_VAR: &str = "REDDIT_USER_AGENT";

/// Credentials for Reddit's application-only OAuth flow.
///
/// Reddit requires every API client to be registered as an "app"; the
/// registration yields a client identifier and a secret, which are used
/// to request short-lived access tokens.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    user_agent: String,
}

impl Credentials {
    /// Creates a new set of credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Reads credentials from `$REDDIT_CLIENT_ID`, `$REDDIT_CLIENT_SECRET`,
    /// and `$REDDIT_USER_AGENT`.
    ///
    /// The client ID and secret are required; an empty value counts as
    /// missing. The user agent falls back to [`http::user_agent()`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = required_var(CLIENT_ID_VAR)?;
        let client_secret = required_var(CLIENT_SECRET_VAR)?;
        let user_agent = match env::var(USER_AGENT_VAR) {
            Ok(agent) if !agent.trim().is_empty() => agent,
            _ => http::user_agent(),
        };
        Ok(Self::new(client_id, client_secret, user_agent))
    }

    /// The registered application's client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The registered application's secret.
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// User agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) | Err(env::VarError::NotPresent) => Err(ConfigError::Missing(name)),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
    }
}

/// Indicates that the program is not configured correctly.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("Missing required environment variable ${0}; please set $REDDIT_CLIENT_ID and $REDDIT_CLIENT_SECRET")]
    Missing(&'static str),

    /// An environment variable contains invalid Unicode.
    #[error("Environment variable ${0} is not valid Unicode")]
    NotUnicode(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use temp_env::{with_var, with_var_unset, with_vars};

    #[test]
    fn it_reads_credentials_from_the_environment() {
        with_vars(
            [
                (CLIENT_ID_VAR, Some("my-id")),
                (CLIENT_SECRET_VAR, Some("my-secret")),
                (USER_AGENT_VAR, Some("my agent 1.0")),
            ],
            || {
                let creds = Credentials::from_env().unwrap();
                assert_eq!(creds.client_id(), "my-id");
                assert_eq!(creds.client_secret(), "my-secret");
                assert_eq!(creds.user_agent(), "my agent 1.0");
            },
        )
    }

    #[test]
    fn it_defaults_the_user_agent() {
        with_vars(
            [
                (CLIENT_ID_VAR, Some("my-id")),
                (CLIENT_SECRET_VAR, Some("my-secret")),
                (USER_AGENT_VAR, None),
            ],
            || {
                let creds = Credentials::from_env().unwrap();
                assert_eq!(creds.user_agent(), http::user_agent());
            },
        )
    }

    #[test]
    fn it_returns_an_error_if_the_client_id_is_missing() {
        with_vars(
            [
                (CLIENT_ID_VAR, None),
                (CLIENT_SECRET_VAR, Some("my-secret")),
            ],
            || {
                let err = Credentials::from_env().unwrap_err();
                assert_eq!(err, ConfigError::Missing(CLIENT_ID_VAR));
            },
        )
    }

    #[test]
    fn it_returns_an_error_if_the_secret_is_empty() {
        with_vars(
            [
                (CLIENT_ID_VAR, Some("my-id")),
                (CLIENT_SECRET_VAR, Some("  ")),
            ],
            || {
                let err = Credentials::from_env().unwrap_err();
                assert_eq!(err, ConfigError::Missing(CLIENT_SECRET_VAR));
            },
        )
    }

    #[test]
    fn it_returns_an_error_if_a_variable_is_not_unicode() {
        let bytes = vec![0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff];
        let value = unsafe { OsString::from_encoded_bytes_unchecked(bytes) };
        with_var(CLIENT_ID_VAR, Some(value), || {
            let err = Credentials::from_env().unwrap_err();
            assert_eq!(err, ConfigError::NotUnicode(CLIENT_ID_VAR));
        })
    }

    #[test]
    fn it_does_not_leak_the_secret_when_debugging() {
        with_var_unset(USER_AGENT_VAR, || {
            let creds = Credentials::new("id", "hunter2", "agent");
            let debug = format!("{creds:?}");
            assert!(!debug.contains("hunter2"));
        })
    }
}
