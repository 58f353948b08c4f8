//! Client Session Identity
//!
//! Every client instance carries an auth token and two opaque session
//! handles (quote and chart) that correlate its requests server-side.

use rand::Rng;

/// Token sent when sign-in is skipped or fails.
pub const ANONYMOUS_TOKEN: &str = "unauthorized_user_token";

/// Number of random characters in a session handle.
const SESSION_ID_LEN: usize = 12;

/// Random session handles for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    quote_session: String,
    chart_session: String,
}

impl SessionIdentity {
    /// Generate handles from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_rng(&mut rand::rng())
    }

    /// Generate handles from a caller-supplied random source.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let quote_session = format!("qs_{}", random_lowercase(rng, SESSION_ID_LEN));
        let chart_session = format!("cs_{}", random_lowercase(rng, SESSION_ID_LEN));
        Self {
            quote_session,
            chart_session,
        }
    }

    /// Quote session handle.
    #[must_use]
    pub fn quote_session(&self) -> &str {
        &self.quote_session
    }

    /// Chart session handle.
    #[must_use]
    pub fn chart_session(&self) -> &str {
        &self.chart_session
    }
}

fn random_lowercase<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Identity and credentials of one client instance.
///
/// Created once when the client is built and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSession {
    auth_token: String,
    identity: SessionIdentity,
}

impl ClientSession {
    /// Create a session with the given token and fresh handles.
    #[must_use]
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self::with_identity(auth_token, SessionIdentity::generate())
    }

    /// Create an anonymous session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_TOKEN)
    }

    /// Create a session from explicit parts.
    #[must_use]
    pub fn with_identity(auth_token: impl Into<String>, identity: SessionIdentity) -> Self {
        Self {
            auth_token: auth_token.into(),
            identity,
        }
    }

    /// Bearer token (possibly [`ANONYMOUS_TOKEN`]).
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Whether the session runs without a signed-in user.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.auth_token == ANONYMOUS_TOKEN
    }

    /// Quote session handle.
    #[must_use]
    pub fn quote_session(&self) -> &str {
        self.identity.quote_session()
    }

    /// Chart session handle.
    #[must_use]
    pub fn chart_session(&self) -> &str {
        self.identity.chart_session()
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("auth_token", &"[REDACTED]")
            .field("anonymous", &self.is_anonymous())
            .field("quote_session", &self.quote_session())
            .field("chart_session", &self.chart_session())
            .finish()
    }
}
