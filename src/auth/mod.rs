//! Sign-in through OAuth providers and server-side sessions

mod providers;
mod session;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use providers::{OAuth, Provider, ProviderEndpoints, STATE_TTL};
pub use session::{session_token, Session, SessionStore, SESSION_COOKIE};

/// A signed-in user as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    /// Provider account handle (GitHub login)
    #[serde(default)]
    pub login: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown sign-in provider '{0}'")]
    UnknownProvider(String),

    #[error("sign-in with {0} is not configured")]
    ProviderDisabled(&'static str),

    #[error("sign-in request expired or was already used")]
    InvalidState,

    #[error("{provider} rejected the authorization code: {reason}")]
    TokenExchange {
        provider: &'static str,
        reason: String,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}
