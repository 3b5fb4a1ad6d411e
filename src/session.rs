//! Server-side login sessions.
//!
//! Tokens never leave the server. The browser holds a cookie of the form
//! `<session id>.<hex HMAC-SHA256 of the id>`, signed with `SECRET_KEY`.

use crate::spotify::TokenInfo;
use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "spotify-login-session";
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

struct Session {
    token: TokenInfo,
    touched: Instant,
}

pub struct SessionStore {
    mac: HmacSha256,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new(secret: &str) -> Result<Self, String> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| format!("Invalid session secret: {}", e))?;
        Ok(Self {
            mac,
            sessions: DashMap::new(),
        })
    }

    fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Session id from a cookie value, if the signature checks out.
    fn verify<'a>(&self, cookie: &'a str) -> Option<&'a str> {
        let (id, signature) = cookie.split_once('.')?;
        if constant_time_eq(signature.as_bytes(), self.sign(id).as_bytes()) {
            Some(id)
        } else {
            warn!("Rejected session cookie with bad signature");
            None
        }
    }

    /// Stores `token` under a fresh session and returns the cookie value.
    pub fn create(&self, token: TokenInfo) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let id = hex::encode(bytes);
        let cookie = format!("{}.{}", id, self.sign(&id));
        self.sessions.insert(
            id,
            Session {
                token,
                touched: Instant::now(),
            },
        );
        debug!("Created session");
        cookie
    }

    pub fn get(&self, cookie: &str) -> Option<TokenInfo> {
        let id = self.verify(cookie)?;
        let mut session = self.sessions.get_mut(id)?;
        session.touched = Instant::now();
        Some(session.token.clone())
    }

    /// Replaces the tokens of an existing session. Returns false when the
    /// session is gone.
    pub fn update(&self, cookie: &str, token: TokenInfo) -> bool {
        let Some(id) = self.verify(cookie) else {
            return false;
        };
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.token = token;
                session.touched = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, cookie: &str) {
        if let Some(id) = self.verify(cookie) {
            self.sessions.remove(id);
        }
    }

    /// Drops sessions unused for longer than `max_idle`; returns how many.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions
            .retain(|_, session| now.duration_since(session.touched) < max_idle);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// The login cookie value from a request's `Cookie` headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}

pub fn set_cookie(value: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME, value
    )
}

pub fn clear_cookie() -> String {
    format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
