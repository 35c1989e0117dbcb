use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use giftlist_types::api::ListDataPatch;
use giftlist_types::{ListId, UserId};

use crate::Database;
use crate::error::{Result, require_nonblank};
use crate::models::{List, ListData, secs_at, to_secs};
use crate::versioned::{Update, Versioned};

/// Which lists an enumeration returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    ActiveOnly,
    /// Just the list with this id, active or not.
    Id(ListId),
}

impl ListFilter {
    pub fn include_inactive(include: bool) -> Self {
        if include {
            ListFilter::All
        } else {
            ListFilter::ActiveOnly
        }
    }
}

/// Owner-only changes to a list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPatch {
    Data(ListDataPatch),
    Active(bool),
}

const LIST_COLUMNS: &str =
    "id, version, owner, name, beneficiary, event_date, active, created, updated";

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: row.get(0)?,
        version: row.get(1)?,
        owner_id: row.get(2)?,
        data: ListData {
            name: row.get(3)?,
            beneficiary: row.get(4)?,
            event_date: secs_at(row, 5)?,
            active: row.get(6)?,
        },
        created: secs_at(row, 7)?,
        updated: secs_at(row, 8)?,
    })
}

fn validate(data: &ListData) -> Result<()> {
    require_nonblank("name", &data.name)?;
    require_nonblank("beneficiary", &data.beneficiary)
}

impl Database {
    /// New lists start at version 1.
    pub fn create_list(&self, owner: UserId, data: &ListData, now: DateTime<Utc>) -> Result<List> {
        validate(data)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO lists (version, owner, name, beneficiary, event_date, active, created, updated)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                (
                    owner,
                    &data.name,
                    &data.beneficiary,
                    to_secs(data.event_date),
                    data.active,
                    to_secs(now),
                ),
            )?;
            let id = conn.last_insert_rowid();
            debug!("List {} created by user {}", id, owner);

            Ok(List {
                id,
                version: 1,
                owner_id: owner,
                data: data.clone(),
                created: now,
                updated: now,
            })
        })
    }

    pub fn list_lists(&self, filter: ListFilter) -> Result<Vec<List>> {
        self.with_conn(|conn| {
            let (clause, id) = match filter {
                ListFilter::All => ("", None),
                ListFilter::ActiveOnly => ("WHERE active = 1", None),
                ListFilter::Id(id) => ("WHERE id = ?1", Some(id)),
            };
            let sql = format!("SELECT {} FROM lists {} ORDER BY id ASC", LIST_COLUMNS, clause);

            let mut stmt = conn.prepare(&sql)?;
            let rows = match id {
                Some(id) => stmt.query_map([id], list_from_row)?,
                None => stmt.query_map([], list_from_row)?,
            };
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    pub fn get_list(&self, id: ListId) -> Result<Option<List>> {
        self.with_conn(|conn| load_list(conn, id))
    }

    pub fn update_list(&self, id: ListId, update: Update<ListPatch>) -> Result<List> {
        self.update_versioned(id, update)
    }
}

pub(crate) fn load_list(conn: &Connection, id: ListId) -> Result<Option<List>> {
    let sql = format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS);
    Ok(conn.query_row(&sql, [id], list_from_row).optional()?)
}

impl Versioned for List {
    type Key = ListId;
    type Patch = ListPatch;
    const KIND: &'static str = "list";

    fn load(conn: &Connection, key: ListId) -> Result<Option<Self>> {
        load_list(conn, key)
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn owner(&self) -> UserId {
        self.owner_id
    }

    fn requires_owner(_patch: &ListPatch) -> bool {
        true
    }

    fn apply(&mut self, patch: &ListPatch, _actor: UserId, _now: DateTime<Utc>) -> Result<()> {
        match patch {
            ListPatch::Data(patch) => {
                if let Some(name) = &patch.name {
                    self.data.name = name.clone();
                }
                if let Some(beneficiary) = &patch.beneficiary {
                    self.data.beneficiary = beneficiary.clone();
                }
                if let Some(event_date) = patch.event_date {
                    self.data.event_date = event_date;
                }
                validate(&self.data)
            }
            ListPatch::Active(active) => {
                self.data.active = *active;
                Ok(())
            }
        }
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated = now;
    }

    fn store(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE lists
                SET name = ?1, beneficiary = ?2, event_date = ?3, active = ?4,
                    version = ?5, updated = ?6
              WHERE id = ?7",
            (
                &self.data.name,
                &self.data.beneficiary,
                to_secs(self.data.event_date),
                self.data.active,
                self.version,
                to_secs(self.updated),
                self.id,
            ),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::StoreError;
    use crate::testutil::{self, epoch, list_data};
    use giftlist_types::api::ErrorCode;

    fn rename(version: i64, actor: UserId, now: i64, name: &str) -> Update<ListPatch> {
        Update {
            expected_version: version,
            actor,
            now: epoch(now),
            patch: ListPatch::Data(ListDataPatch {
                name: Some(name.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn create_starts_at_version_one() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(5)).unwrap();

        assert_eq!(list.version, 1);
        assert_eq!(list.owner_id, a.id);
        assert_eq!(list.created, epoch(5));
        assert_eq!(list.updated, epoch(5));
        assert_eq!(db.get_list(list.id).unwrap(), Some(list));
    }

    #[test]
    fn create_requires_name_and_beneficiary() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");

        let mut data = list_data("");
        assert_eq!(
            db.create_list(a.id, &data, epoch(5)).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );

        data.name = "n".into();
        data.beneficiary = "".into();
        assert_eq!(
            db.create_list(a.id, &data, epoch(5)).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
        assert!(db.list_lists(ListFilter::All).unwrap().is_empty());
    }

    #[test]
    fn filters() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let active = db.create_list(a.id, &list_data("active"), epoch(1)).unwrap();
        let mut data = list_data("inactive");
        data.active = false;
        let inactive = db.create_list(a.id, &data, epoch(2)).unwrap();

        assert_eq!(
            db.list_lists(ListFilter::All).unwrap(),
            vec![active.clone(), inactive.clone()]
        );
        assert_eq!(db.list_lists(ListFilter::ActiveOnly).unwrap(), vec![active.clone()]);
        assert_eq!(
            db.list_lists(ListFilter::Id(inactive.id)).unwrap(),
            vec![inactive.clone()]
        );
        assert_eq!(db.list_lists(ListFilter::Id(active.id)).unwrap(), vec![active]);
        assert!(db.list_lists(ListFilter::Id(999)).unwrap().is_empty());
        assert_eq!(db.get_list(inactive.id).unwrap(), Some(inactive));

        assert_eq!(ListFilter::include_inactive(true), ListFilter::All);
        assert_eq!(ListFilter::include_inactive(false), ListFilter::ActiveOnly);
    }

    #[test]
    fn version_increases_by_one_per_update() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("l"), epoch(1)).unwrap();

        let mut version = list.version;
        for i in 0..10 {
            let updated = db
                .update_list(list.id, rename(version, a.id, 100 + i, &format!("l{}", i)))
                .unwrap();
            assert_eq!(updated.version, version + 1);
            assert_eq!(updated.updated, epoch(100 + i));
            assert_eq!(updated.created, epoch(1));
            version = updated.version;
        }
        assert_eq!(db.get_list(list.id).unwrap().unwrap().version, 11);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        let updated = db.update_list(list.id, rename(1, a.id, 2, "Updated")).unwrap();
        assert_eq!(updated.data.name, "Updated");
        assert_eq!(updated.data.beneficiary, list.data.beneficiary);
        assert_eq!(updated.data.event_date, list.data.event_date);
        assert_eq!(db.get_list(list.id).unwrap(), Some(updated));
    }

    #[test]
    fn stale_version_fails() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        db.update_list(list.id, rename(1, a.id, 2, "Updated")).unwrap();
        let err = db.update_list(list.id, rename(1, a.id, 3, "Again")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        assert_eq!(db.get_list(list.id).unwrap().unwrap().data.name, "Updated");
    }

    #[test]
    fn only_owner_may_update() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let b = testutil::user(&db, "b");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        let err = db.update_list(list.id, rename(1, b.id, 2, "Mine")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);

        let err = db
            .update_list(
                list.id,
                Update {
                    expected_version: 1,
                    actor: b.id,
                    now: epoch(2),
                    patch: ListPatch::Active(false),
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
        assert_eq!(db.get_list(list.id).unwrap(), Some(list));
    }

    #[test]
    fn blank_name_is_rejected_without_bumping() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        let err = db.update_list(list.id, rename(1, a.id, 2, "")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(ref m) if m == "name required"));
        assert_eq!(db.get_list(list.id).unwrap().unwrap().version, 1);
    }

    #[test]
    fn change_active_state() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        let updated = db
            .update_list(
                list.id,
                Update {
                    expected_version: 1,
                    actor: a.id,
                    now: epoch(2),
                    patch: ListPatch::Active(false),
                },
            )
            .unwrap();
        assert!(!updated.data.active);
        assert_eq!(updated.version, 2);
        assert!(db.list_lists(ListFilter::ActiveOnly).unwrap().is_empty());
    }

    #[test]
    fn missing_list_is_not_found() {
        let db = testutil::db();
        let a = testutil::user(&db, "a");
        let err = db.update_list(42, rename(1, a.id, 2, "x")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn concurrent_updates_with_same_version_conflict() {
        let db = Arc::new(testutil::db());
        let a = testutil::user(&db, "a");
        let list = db.create_list(a.id, &list_data("Wishlist"), epoch(1)).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|name| {
                let db = db.clone();
                let barrier = barrier.clone();
                let (list_id, owner) = (list.id, a.id);
                std::thread::spawn(move || {
                    barrier.wait();
                    db.update_list(list_id, rename(1, owner, 2, name))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        assert_eq!(winners[0].version, 2);
        assert_eq!(losers[0].code(), ErrorCode::FailedPrecondition);

        let stored = db.get_list(list.id).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.data.name, winners[0].data.name);
    }
}
