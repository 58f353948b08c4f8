//! Site Sign-In
//!
//! Exchanges a username and password for the auth token the charting
//! socket expects in `set_auth_token`.
//!
//! # Flow
//!
//! 1. `POST <site>/accounts/signin/` with `{"username", "password", "remember": "on"}`
//! 2. Read `user.auth_token` from the JSON reply
//!
//! Sign-in never fails the caller. Missing credentials, network errors,
//! non-2xx replies and malformed bodies all yield the anonymous token,
//! which only narrows upstream data entitlements.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ORIGIN;
use serde::{Deserialize, Serialize};

use crate::domain::session::ANONYMOUS_TOKEN;
use crate::infrastructure::config::Credentials;
use crate::infrastructure::metrics::{self, AuthOutcome};

/// Sign-in request timeout.
pub const SIGNIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SignInRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
    user: SignInUser,
}

#[derive(Deserialize)]
struct SignInUser {
    auth_token: String,
}

/// Reasons a sign-in fell back to the anonymous token.
#[derive(Debug, thiserror::Error)]
enum SignInError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("reply carried an empty token")]
    EmptyToken,
}

/// Obtains an auth token from the charting site.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    client: Client,
    signin_url: String,
    origin: String,
}

impl SessionAuthenticator {
    /// Create an authenticator sharing `client`.
    #[must_use]
    pub fn new(client: Client, signin_url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            client,
            signin_url: signin_url.into(),
            origin: origin.into(),
        }
    }

    /// Sign in and return a token, or the anonymous token on any failure.
    pub async fn authenticate(&self, credentials: &Credentials) -> String {
        if credentials.is_empty() {
            tracing::info!("No credentials configured, using anonymous session");
            metrics::record_auth(AuthOutcome::Anonymous);
            return ANONYMOUS_TOKEN.to_string();
        }

        match self.sign_in(credentials).await {
            Ok(token) => {
                tracing::info!(username = %credentials.username(), "Signed in");
                metrics::record_auth(AuthOutcome::SignedIn);
                token
            }
            Err(e) => {
                tracing::warn!(
                    username = %credentials.username(),
                    error = %e,
                    "Sign-in failed, falling back to anonymous session"
                );
                metrics::record_auth(AuthOutcome::Failed);
                ANONYMOUS_TOKEN.to_string()
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<String, SignInError> {
        let response = self
            .client
            .post(&self.signin_url)
            .header(ORIGIN, &self.origin)
            .timeout(SIGNIN_TIMEOUT)
            .json(&SignInRequest {
                username: credentials.username(),
                password: credentials.password(),
                remember: "on",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignInError::Status(status));
        }

        let body: SignInResponse = response.json().await?;
        if body.user.auth_token.is_empty() {
            return Err(SignInError::EmptyToken);
        }
        Ok(body.user.auth_token)
    }
}
