use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Timestamps are integer epoch seconds. Session ids are never reused.
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                fullname    TEXT NOT NULL,
                password    TEXT NOT NULL,
                admin       INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE sessions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user        INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                created     INTEGER NOT NULL,
                expiry      INTEGER NOT NULL
            );

            CREATE TABLE lists (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                version     INTEGER NOT NULL,
                owner       INTEGER NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                beneficiary TEXT NOT NULL,
                event_date  INTEGER NOT NULL,
                active      INTEGER NOT NULL,
                created     INTEGER NOT NULL,
                updated     INTEGER NOT NULL
            );

            CREATE TABLE items (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                version      INTEGER NOT NULL,
                list_id      INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                name         TEXT NOT NULL,
                description  TEXT NOT NULL,
                url          TEXT NOT NULL,
                claimed_by   INTEGER REFERENCES users(id),
                claimed_when INTEGER,
                created      INTEGER NOT NULL,
                updated      INTEGER NOT NULL,
                CHECK ((claimed_by IS NULL) = (claimed_when IS NULL))
            );

            CREATE INDEX idx_items_list ON items(list_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn claim_columns_are_set_together() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (username, fullname, password) VALUES ('a', 'A', 'x');
             INSERT INTO lists (version, owner, name, beneficiary, event_date, active, created, updated)
                 VALUES (1, 1, 'l', 'b', 0, 1, 0, 0);",
        )
        .unwrap();

        let torn = conn.execute(
            "INSERT INTO items (version, list_id, name, description, url, claimed_by, created, updated)
                 VALUES (1, 1, 'i', '', '', 1, 0, 0)",
            [],
        );
        assert!(torn.is_err());
    }
}
