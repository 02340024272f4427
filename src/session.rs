use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::model::Session;

const DEFAULT_TTL_SECS: u64 = 60 * 60 * 8;

struct SessionEntry {
    session: Session,
    expires_at: Instant,
}

/// Server-side session table. Each login issues a random token that is
/// handed to the browser as `token.signature`; the signature binds the token
/// to the configured secret so a tampered cookie never reaches the table.
pub struct SessionManager {
    secret: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(secret: &str) -> Self {
        SessionManager {
            secret: secret.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        SessionManager {
            secret: secret.to_string(),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn sign(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Establishes a session and returns the cookie value for it.
    pub fn issue(&self, session: Session) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let entry = SessionEntry {
            session,
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.write().expect("session table poisoned");
        // Sessions abandoned after expiry are never re-presented, so this
        // is the only place they can be swept.
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(token.clone(), entry);
        drop(entries);
        let sig = self.sign(&token);
        format!("{}.{}", token, sig)
    }

    fn verify_cookie<'a>(&self, cookie_value: &'a str) -> Option<&'a str> {
        let (token, sig) = cookie_value.split_once('.')?;
        let expected = self.sign(token);
        // Constant-time: the comparison must not leak how much of the
        // signature matched.
        if !bool::from(expected.as_bytes().ct_eq(sig.as_bytes())) {
            return None;
        }
        Some(token)
    }

    #[cfg(test)]
    fn active_sessions(&self) -> usize {
        self.entries.read().expect("session table poisoned").len()
    }

    /// Resolves a cookie value into the session it names. Forged, unknown
    /// and expired cookies all resolve to None.
    pub fn resolve(&self, cookie_value: &str) -> Option<Session> {
        let token = self.verify_cookie(cookie_value)?;
        let now = Instant::now();

        {
            let entries = self.entries.read().expect("session table poisoned");
            match entries.get(token) {
                Some(entry) if entry.expires_at > now => return Some(entry.session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired entry, drop it.
        self.entries
            .write()
            .expect("session table poisoned")
            .remove(token);
        None
    }

    /// Destroys the session, if any. Idempotent.
    pub fn destroy(&self, cookie_value: &str) {
        if let Some(token) = self.verify_cookie(cookie_value) {
            self.entries
                .write()
                .expect("session table poisoned")
                .remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn session() -> Session {
        Session {
            username: "ama".to_string(),
            role: Role::Editor,
        }
    }

    #[test]
    fn issued_cookie_resolves_to_the_session() {
        let sm = SessionManager::new("secret");
        let cookie = sm.issue(session());
        let resolved = sm.resolve(&cookie).unwrap();
        assert_eq!(resolved.username, "ama");
        assert_eq!(resolved.role, Role::Editor);
    }

    #[test]
    fn forged_and_malformed_cookies_resolve_to_none() {
        let sm = SessionManager::new("secret");
        let cookie = sm.issue(session());
        let (token, _) = cookie.split_once('.').unwrap();

        assert!(sm.resolve(token).is_none());
        assert!(sm.resolve(&format!("{}.{}", token, "0".repeat(64))).is_none());
        assert!(sm.resolve("").is_none());
    }

    #[test]
    fn cookie_signed_with_a_different_secret_is_rejected() {
        let a = SessionManager::new("secret-a");
        let b = SessionManager::new("secret-b");
        let cookie = a.issue(session());
        assert!(b.resolve(&cookie).is_none());
    }

    #[test]
    fn destroy_is_idempotent() {
        let sm = SessionManager::new("secret");
        let cookie = sm.issue(session());
        sm.destroy(&cookie);
        assert!(sm.resolve(&cookie).is_none());
        sm.destroy(&cookie);
        sm.destroy("not-even-a-cookie");
    }

    #[test]
    fn expired_sessions_resolve_to_none() {
        let sm = SessionManager::with_ttl("secret", Duration::from_secs(0));
        let cookie = sm.issue(session());
        assert!(sm.resolve(&cookie).is_none());
    }

    #[test]
    fn issue_sweeps_abandoned_expired_sessions() {
        let sm = SessionManager::with_ttl("secret", Duration::from_secs(0));
        sm.issue(session());
        sm.issue(session());
        // The first entry expired without being re-presented; the second
        // issue swept it.
        assert_eq!(sm.active_sessions(), 1);
    }

    #[test]
    fn signature_differing_in_one_character_is_rejected() {
        let sm = SessionManager::new("secret");
        let cookie = sm.issue(session());
        let mut chars: Vec<char> = cookie.chars().collect();
        let last = chars.last_mut().unwrap();
        *last = if *last == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(sm.resolve(&tampered).is_none());
        assert!(sm.resolve(&cookie).is_some());
    }
}
