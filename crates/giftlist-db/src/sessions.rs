use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::debug;

use giftlist_types::{SessionId, UserId};

use crate::Database;
use crate::error::Result;
use crate::models::{Session, User, secs_at, to_secs, user_from_row};

impl Database {
    /// Replace whatever session `user_id` has with a new one. The delete and
    /// the insert share a transaction, so no reader ever sees two sessions for
    /// the same user.
    pub fn create_session(
        &self,
        user_id: UserId,
        created: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<Session> {
        self.with_tx(|tx| {
            let superseded = tx.execute("DELETE FROM sessions WHERE user = ?1", [user_id])?;
            tx.execute(
                "INSERT INTO sessions (user, created, expiry) VALUES (?1, ?2, ?3)",
                (user_id, to_secs(created), to_secs(expiry)),
            )?;
            let id = tx.last_insert_rowid();

            debug!(
                "Session {} created for user {} (superseded {})",
                id, user_id, superseded
            );
            Ok(Session {
                id,
                user_id,
                created,
                expiry,
            })
        })
    }

    /// The session joined with its owning user, in one read.
    pub fn lookup_session_with_user(&self, id: SessionId) -> Result<Option<(Session, User)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT s.id, s.user, s.created, s.expiry,
                            u.id, u.username, u.fullname, u.admin
                     FROM sessions s
                     JOIN users u ON u.id = s.user
                     WHERE s.id = ?1",
                    [id],
                    |row| {
                        let session = Session {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            created: secs_at(row, 2)?,
                            expiry: secs_at(row, 3)?,
                        };
                        Ok((session, user_from_row(row, 4)?))
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Deleting a session that does not exist is not an error.
    pub fn delete_session(&self, id: SessionId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Returns the number of sessions removed.
    pub fn delete_all_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM sessions", [])?))
    }
}

#[cfg(test)]
mod tests {
    use giftlist_types::SessionId;

    use crate::Database;
    use crate::models::Session;
    use crate::testutil::{self, epoch};

    fn session(db: &Database, id: SessionId) -> Option<Session> {
        db.lookup_session_with_user(id).unwrap().map(|(s, _)| s)
    }

    #[test]
    fn create_and_lookup() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");

        let session = db.create_session(a.id, epoch(10), epoch(20)).unwrap();
        assert!(session.id > 0);
        let (joined, user) = db.lookup_session_with_user(session.id).unwrap().unwrap();
        assert_eq!(joined, session);
        assert_eq!(user, a);
    }

    #[test]
    fn new_session_supersedes_old_one() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let b = testutil::user(&db, "b");

        let first = db.create_session(a.id, epoch(10), epoch(20)).unwrap();
        let other = db.create_session(b.id, epoch(10), epoch(20)).unwrap();
        let second = db.create_session(a.id, epoch(11), epoch(21)).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(session(&db, first.id), None);
        assert_eq!(session(&db, second.id), Some(second));
        // Other users are untouched.
        assert_eq!(session(&db, other.id), Some(other));
    }

    #[test]
    fn session_ids_are_not_reused() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");

        let first = db.create_session(a.id, epoch(10), epoch(20)).unwrap();
        db.delete_session(first.id).unwrap();
        let second = db.create_session(a.id, epoch(11), epoch(21)).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn delete_is_idempotent() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let session = db.create_session(a.id, epoch(10), epoch(20)).unwrap();

        db.delete_session(session.id).unwrap();
        db.delete_session(session.id).unwrap();
        assert_eq!(db.lookup_session_with_user(session.id).unwrap(), None);
    }

    #[test]
    fn delete_all() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let b = testutil::user(&db, "b");
        db.create_session(a.id, epoch(10), epoch(20)).unwrap();
        db.create_session(b.id, epoch(10), epoch(20)).unwrap();

        assert_eq!(db.delete_all_sessions().unwrap(), 2);
        assert_eq!(db.delete_all_sessions().unwrap(), 0);
    }
}
