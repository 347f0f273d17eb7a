//! Ambient session credentials.
//!
//! Every REST call and the WebSocket handshake carry the portal's session
//! cookie. The cookie and the identity it belongs to come from a
//! [`CredentialProvider`] passed in at construction time, so tests and
//! multiple sessions never share hidden global state.

use std::sync::Arc;

use autoserv_id::Username;

/// A logged-in portal identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Portal username; also the dashboard channel key.
    pub username: Username,

    /// Raw `Cookie` header value, e.g. `SESSION=abc123`.
    pub cookie: String,
}

/// Supplies the current session, if any.
pub trait CredentialProvider: Send + Sync + 'static {
    fn session(&self) -> Option<SessionCredentials>;
}

/// Fixed credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Option<SessionCredentials>);

impl StaticCredentials {
    pub fn new(username: Username, cookie: impl Into<String>) -> Self {
        Self(Some(SessionCredentials {
            username,
            cookie: cookie.into(),
        }))
    }

    /// No session at all.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredentials {
    fn session(&self) -> Option<SessionCredentials> {
        self.0.clone()
    }
}

impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    fn session(&self) -> Option<SessionCredentials> {
        (**self).session()
    }
}
