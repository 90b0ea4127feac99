//! In-memory sessions keyed by random tokens

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use super::User;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "gitpress_session";

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Live sessions. Nothing is persisted; a restart signs everyone out.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_days: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::days(ttl_days.max(0)),
        }
    }

    /// Start a session and return its token
    pub fn create(&self, user: User) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.ttl;
        tracing::info!("Signed in {} until {}", user.name, expires_at);
        self.sessions
            .insert(token.clone(), Session { user, expires_at });
        token
    }

    /// The live session for a token; expired sessions are dropped on sight
    pub fn get(&self, token: &str) -> Option<Session> {
        let session = self.sessions.get(token)?.clone();
        if session.is_expired_at(Utc::now()) {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    /// Drop every expired session, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// `Set-Cookie` value for a new session
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.ttl.num_seconds()
        )
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clear_cookie() -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
    }

    /// The session of the request, if it carries a live one
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        session_token(headers).and_then(|token| self.get(&token))
    }
}

/// Session token from the request's `Cookie` headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
