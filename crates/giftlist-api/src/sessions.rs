use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use giftlist_crypto::CookieCodec;
use giftlist_db::{Database, Result, Session, StoreError, User};
use giftlist_types::SessionId;

/// A session that was active when the request came in, with its user.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session: Session,
    pub user: User,
}

/// Issues, resolves and revokes bearer tokens. Blocking: call from
/// `spawn_blocking`.
pub struct SessionManager {
    db: Arc<Database>,
    codec: CookieCodec,
    session_length: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, codec: CookieCodec, session_length: Duration) -> Self {
        Self {
            db,
            codec,
            session_length,
        }
    }

    /// Start a new session for `user`, ending any session they already had.
    pub fn create_session(&self, user: &User, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let expiry = now
            .checked_add_signed(self.session_length)
            .ok_or_else(|| StoreError::Internal("session expiry out of range".into()))?;
        let session = self.db.create_session(user.id, now, expiry)?;
        Ok((self.codec.encode(session.id), session.expiry))
    }

    pub fn session_id_from_token(&self, token: &str) -> Option<SessionId> {
        self.codec.decode(token)
    }

    /// `Ok(None)` when the session is gone or expired at `now`.
    pub fn lookup_active_session(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>> {
        let Some((session, user)) = self.db.lookup_session_with_user(id)? else {
            return Ok(None);
        };
        if !session.is_active_at(now) {
            debug!("Session {} expired at {}", id, session.expiry);
            return Ok(None);
        }
        Ok(Some(ActiveSession { session, user }))
    }

    /// Revoke the session behind `token`. Tokens that don't decode are
    /// ignored.
    pub fn deactivate_session(&self, token: &str) -> Result<()> {
        match self.session_id_from_token(token) {
            Some(id) => self.db.delete_session(id),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giftlist_db::NewUser;

    fn epoch(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn setup() -> (SessionManager, User, User) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut users = ["alice", "bob"].into_iter().map(|name| {
            db.create_user(
                &NewUser {
                    username: name.into(),
                    fullname: name.into(),
                    admin: false,
                },
                "digest",
            )
            .unwrap()
        });
        let (alice, bob) = (users.next().unwrap(), users.next().unwrap());
        let manager = SessionManager::new(
            db.clone(),
            CookieCodec::new("test-secret").unwrap(),
            Duration::seconds(100),
        );
        (manager, alice, bob)
    }

    fn resolve(m: &SessionManager, token: &str, now: i64) -> Option<ActiveSession> {
        let id = m.session_id_from_token(token)?;
        m.lookup_active_session(id, epoch(now)).unwrap()
    }

    #[test]
    fn token_resolves_to_user() {
        let (m, alice, _) = setup();
        let (token, expiry) = m.create_session(&alice, epoch(1000)).unwrap();
        assert_eq!(expiry, epoch(1100));

        let active = resolve(&m, &token, 1000).unwrap();
        assert_eq!(active.user, alice);
        assert_eq!(active.session.created, epoch(1000));
        assert_eq!(active.session.expiry, expiry);
    }

    #[test]
    fn expiry_is_exclusive() {
        let (m, alice, _) = setup();
        let (token, _) = m.create_session(&alice, epoch(1000)).unwrap();
        assert!(resolve(&m, &token, 1099).is_some());
        assert!(resolve(&m, &token, 1100).is_none());
        assert!(resolve(&m, &token, 5000).is_none());
    }

    #[test]
    fn one_session_per_user() {
        let (m, alice, bob) = setup();
        let (first, _) = m.create_session(&alice, epoch(1000)).unwrap();
        let (bobs, _) = m.create_session(&bob, epoch(1000)).unwrap();
        let (second, _) = m.create_session(&alice, epoch(1001)).unwrap();

        assert!(resolve(&m, &first, 1002).is_none());
        assert_eq!(resolve(&m, &second, 1002).unwrap().user, alice);
        assert_eq!(resolve(&m, &bobs, 1002).unwrap().user, bob);
    }

    #[test]
    fn deactivate() {
        let (m, alice, _) = setup();
        let (token, _) = m.create_session(&alice, epoch(1000)).unwrap();

        m.deactivate_session(&token).unwrap();
        assert!(resolve(&m, &token, 1001).is_none());
        // Repeats and garbage are both fine.
        m.deactivate_session(&token).unwrap();
        m.deactivate_session("not a token").unwrap();
        m.deactivate_session("").unwrap();
    }

    #[test]
    fn forged_tokens_do_not_decode() {
        let (m, alice, _) = setup();
        let (token, _) = m.create_session(&alice, epoch(1000)).unwrap();
        let (id, _) = token.split_once(':').unwrap();

        let other = CookieCodec::new("other-secret").unwrap();
        let forged = other.encode(id.parse().unwrap());
        assert_eq!(m.session_id_from_token(&forged), None);
        assert_eq!(m.session_id_from_token(&format!("{}:", id)), None);
    }
}
