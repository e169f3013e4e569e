use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "betty_session";
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;
const SIGNATURE_HEX_LEN: usize = 32;

/// What we remember about one visitor between two messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    message_count: u64,
}

impl SessionState {
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Counts one more message and returns the new total.
    pub fn record_message(&mut self) -> u64 {
        self.message_count = self.message_count.saturating_add(1);
        self.message_count
    }
}

/// In-memory session table. Entries idle for longer than the TTL are
/// forgotten the next time the table is touched, and once `max_entries`
/// is reached the least recently seen entry makes room for a new one.
pub struct SessionStore {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, StoredSession>,
}

struct StoredSession {
    state: SessionState,
    last_seen: Instant,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
        }
    }

    /// Current state for `id`; a fresh state if the session is unknown or expired.
    pub fn load(&mut self, id: &str, now: Instant) -> SessionState {
        self.prune(now);
        self.entries
            .get(id)
            .map(|stored| stored.state)
            .unwrap_or_default()
    }

    pub fn store(&mut self, id: &str, state: SessionState, now: Instant) {
        if !self.entries.contains_key(id) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            id.to_string(),
            StoredSession {
                state,
                last_seen: now,
            },
        );
    }

    pub fn reset(&mut self, id: &str, now: Instant) {
        self.prune(now);
        self.store(id, SessionState::default(), now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, stored)| stored.last_seen)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
        }
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, stored| now.duration_since(stored.last_seen) <= ttl);
    }
}

/// Issues and checks the signed session cookie.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Arc<String>,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::new(secret.to_string()),
        }
    }

    pub fn issue(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub fn cookie_value(&self, id: &str) -> String {
        format!("{id}.{}", self.signature(id))
    }

    /// Session id carried by a cookie value, if its signature checks out.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        let expected = self.signature(id);
        if id.is_empty() || !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return None;
        }
        Some(id.to_string())
    }

    /// Session id from the request cookies, if present and genuine.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| self.verify(value))
    }

    /// Adds the `Set-Cookie` header for `id` to a response.
    pub fn attach(&self, headers: &mut HeaderMap, id: &str) {
        let cookie = format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_value(id)
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(SET_COOKIE, value);
        }
    }

    fn signature(&self, id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(SIGNATURE_HEX_LEN);
        for byte in digest.iter().take(SIGNATURE_HEX_LEN / 2) {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

// Runs over every byte so the comparison time does not depend on where
// the first mismatch is.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_only_moves_forward() {
        let mut state = SessionState::default();
        assert_eq!(state.message_count(), 0);
        assert_eq!(state.record_message(), 1);
        assert_eq!(state.record_message(), 2);
        assert_eq!(state.message_count(), 2);
    }

    #[test]
    fn store_round_trips_and_resets() {
        let mut store = SessionStore::new(Duration::from_secs(60));
        let now = Instant::now();

        let mut state = store.load("visitor", now);
        state.record_message();
        state.record_message();
        store.store("visitor", state, now);
        assert_eq!(store.load("visitor", now).message_count(), 2);

        store.reset("visitor", now);
        assert_eq!(store.load("visitor", now).message_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn idle_sessions_expire() {
        let mut store = SessionStore::new(Duration::from_secs(5));
        let start = Instant::now();
        let mut state = SessionState::default();
        state.record_message();
        store.store("visitor", state, start);

        let later = start + Duration::from_secs(6);
        assert_eq!(store.load("visitor", later).message_count(), 0);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn full_store_evicts_least_recently_seen() {
        let mut store = SessionStore::with_capacity(Duration::from_secs(3600), 2);
        let start = Instant::now();
        store.store("first", SessionState::default(), start);
        store.store("second", SessionState::default(), start + Duration::from_secs(1));

        let mut state = store.load("first", start + Duration::from_secs(2));
        state.record_message();
        store.store("first", state, start + Duration::from_secs(2));
        assert_eq!(store.len(), 2);

        store.store("third", SessionState::default(), start + Duration::from_secs(3));
        assert_eq!(store.len(), 2);
        let later = start + Duration::from_secs(4);
        assert_eq!(store.load("first", later).message_count(), 1);
        assert_eq!(store.load("second", later), SessionState::default());
        assert!(store.entries.contains_key("third"));
        assert!(!store.entries.contains_key("second"));
    }

    #[test]
    fn constant_time_eq_compares_whole_input() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"xbcd", b"abcd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn signer_rejects_tampered_cookies() {
        let signer = SessionSigner::new("secret");
        let id = signer.issue();
        let cookie = signer.cookie_value(&id);
        assert_eq!(signer.verify(&cookie), Some(id.clone()));

        let forged = format!("{id}.{}", "0".repeat(SIGNATURE_HEX_LEN));
        assert_eq!(signer.verify(&forged), None);
        assert_eq!(signer.verify(&id), None);
        assert_eq!(SessionSigner::new("other").verify(&cookie), None);
    }

    #[test]
    fn signer_reads_cookie_header() {
        let signer = SessionSigner::new("secret");
        let cookie = signer.cookie_value("abc");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={cookie}")).unwrap(),
        );
        assert_eq!(signer.session_from_headers(&headers).as_deref(), Some("abc"));

        let mut response = HeaderMap::new();
        signer.attach(&mut response, "abc");
        let set = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set.starts_with(&format!("{SESSION_COOKIE}={cookie}")));
        assert!(set.contains("HttpOnly"));
    }
}
