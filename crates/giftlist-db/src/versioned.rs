use std::fmt::Display;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use giftlist_types::UserId;

use crate::Database;
use crate::error::{Result, StoreError};

/// A versioned mutation request: who is asking, which version they last saw,
/// when it happens, and what to change.
#[derive(Debug, Clone)]
pub struct Update<P> {
    pub expected_version: i64,
    pub actor: UserId,
    pub now: DateTime<Utc>,
    pub patch: P,
}

/// A record that can be mutated through [`Database::update_versioned`].
///
/// Implementors only describe how to load, patch and store themselves; the
/// version check, ownership check, version bump and transaction handling are
/// shared.
pub trait Versioned: Sized {
    type Key: Copy + Display;
    type Patch;

    /// Human-readable record kind used in error messages.
    const KIND: &'static str;

    fn load(conn: &Connection, key: Self::Key) -> Result<Option<Self>>;

    fn version(&self) -> i64;

    /// User allowed to make owner-only changes.
    fn owner(&self) -> UserId;

    fn requires_owner(patch: &Self::Patch) -> bool;

    /// Apply the patch to this copy of the record. Validation failures are
    /// returned as-is and abort the update.
    fn apply(&mut self, patch: &Self::Patch, actor: UserId, now: DateTime<Utc>) -> Result<()>;

    /// Increment the version by one and stamp `updated`.
    fn bump(&mut self, now: DateTime<Utc>);

    fn store(&self, conn: &Connection) -> Result<()>;
}

impl Database {
    /// Read, check, patch and write one record in a single transaction.
    ///
    /// Fails with `NotFound` if the record is absent, `FailedPrecondition` if
    /// `expected_version` is stale, `PermissionDenied` if the patch needs
    /// ownership the actor lacks, or whatever the patch itself rejects. Any
    /// failure leaves the record untouched. Conflicts are never retried here.
    pub fn update_versioned<R: Versioned>(&self, key: R::Key, update: Update<R::Patch>) -> Result<R> {
        let Update {
            expected_version,
            actor,
            now,
            patch,
        } = update;

        if expected_version <= 0 {
            return Err(StoreError::InvalidArgument(format!(
                "invalid {} version {}",
                R::KIND,
                expected_version
            )));
        }

        self.with_tx(|tx| {
            let mut record = R::load(tx, key)?
                .ok_or_else(|| StoreError::NotFound(format!("no {} {}", R::KIND, key)))?;

            if record.version() != expected_version {
                return Err(StoreError::VersionConflict {
                    kind: R::KIND,
                    got: expected_version,
                    want: record.version(),
                });
            }

            if R::requires_owner(&patch) && record.owner() != actor {
                return Err(StoreError::PermissionDenied(format!(
                    "user {} may not edit {} {} (owner {})",
                    actor,
                    R::KIND,
                    key,
                    record.owner()
                )));
            }

            record.apply(&patch, actor, now)?;
            record.bump(now);
            record.store(tx)?;

            debug!("{} {} updated to version {}", R::KIND, key, record.version());
            Ok(record)
        })
    }
}
