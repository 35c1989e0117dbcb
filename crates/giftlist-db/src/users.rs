use rusqlite::{Connection, OptionalExtension};

use giftlist_types::UserId;

use crate::Database;
use crate::error::{Result, StoreError, require_nonblank};
use crate::models::{NewUser, USER_COLUMNS, User, user_from_row};

impl Database {
    pub fn create_user(&self, user: &NewUser, password_digest: &str) -> Result<User> {
        require_nonblank("username", &user.username)?;

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, fullname, password, admin) VALUES (?1, ?2, ?3, ?4)",
                (&user.username, &user.fullname, password_digest, user.admin),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::InvalidArgument(format!(
                        "username {} is taken",
                        user.username
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            Ok(User {
                id: conn.last_insert_rowid(),
                username: user.username.clone(),
                fullname: user.fullname.clone(),
                admin: user.admin,
            })
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    /// The user plus their stored password digest, for login.
    pub fn get_user_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {}, password FROM users WHERE username = ?1", USER_COLUMNS);
            let row = conn
                .query_row(&sql, [username], |row| {
                    Ok((user_from_row(row, 0)?, row.get(4)?))
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([], |row| user_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

fn query_user(conn: &Connection, filter: &str, param: impl rusqlite::ToSql) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter);
    let user = conn
        .query_row(&sql, [param], |row| user_from_row(row, 0))
        .optional()?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use giftlist_types::api::ErrorCode;

    #[test]
    fn create_and_lookup() {
        let db = testutil::db();
        let a = db
            .create_user(
                &NewUser {
                    username: "alice".into(),
                    fullname: "Alice A".into(),
                    admin: true,
                },
                "digest-a",
            )
            .unwrap();
        assert!(a.id > 0);
        assert!(a.admin);

        assert_eq!(db.get_user(a.id).unwrap(), Some(a.clone()));
        assert_eq!(db.get_user_by_username("alice").unwrap(), Some(a.clone()));
        assert_eq!(db.get_user_by_username("nobody").unwrap(), None);
        assert_eq!(db.get_user(a.id + 100).unwrap(), None);

        let (user, digest) = db.get_user_credentials("alice").unwrap().unwrap();
        assert_eq!(user, a);
        assert_eq!(digest, "digest-a");
    }

    #[test]
    fn usernames_are_unique() {
        let db = testutil::db();
        testutil::user(&db, "a");
        let err = db
            .create_user(
                &NewUser {
                    username: "a".into(),
                    fullname: "Again".into(),
                    admin: false,
                },
                "d",
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn blank_username_is_rejected() {
        let db = testutil::db();
        let err = db
            .create_user(
                &NewUser {
                    username: " ".into(),
                    fullname: "x".into(),
                    admin: false,
                },
                "d",
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn list_users_sorted_by_id() {
        let db = testutil::db();
        let b = testutil::user(&db, "b");
        let a = testutil::user(&db, "a");
        let users = db.list_users().unwrap();
        assert_eq!(users, vec![b, a]);
    }
}
