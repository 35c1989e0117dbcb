//! Store row types. Distinct from the `giftlist-types` wire types so the store
//! stays independent of the HTTP surface.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use giftlist_types::{ItemId, ListId, SessionId, UserId};

use crate::claim::ClaimState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub fullname: String,
    pub admin: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub fullname: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// Sessions are valid on `[created, expiry)`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListData {
    pub name: String,
    pub beneficiary: String,
    pub event_date: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub id: ListId,
    pub version: i64,
    pub owner_id: UserId,
    pub data: ListData,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItemData {
    pub name: String,
    pub desc: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: ItemId,
    pub version: i64,
    pub list_id: ListId,
    pub data: ListItemData,
    pub claim: ClaimState,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

// -- Column helpers --

pub(crate) fn to_secs(t: DateTime<Utc>) -> i64 {
    t.timestamp()
}

pub(crate) fn secs_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    from_secs(idx, secs)
}

pub(crate) fn opt_secs_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|secs| from_secs(idx, secs))
        .transpose()
}

fn from_secs(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

#[derive(Debug, thiserror::Error)]
#[error("claimant and claim time must be set together")]
struct TornClaim;

/// Build a claim state from the `claimed_by` / `claimed_when` column pair.
pub(crate) fn claim_at(row: &Row<'_>, by_idx: usize, when_idx: usize) -> rusqlite::Result<ClaimState> {
    let by: Option<UserId> = row.get(by_idx)?;
    let when = opt_secs_at(row, when_idx)?;
    match (by, when) {
        (Some(by), Some(when)) => Ok(ClaimState::Claimed { by, when }),
        (None, None) => Ok(ClaimState::Unclaimed),
        _ => Err(rusqlite::Error::FromSqlConversionFailure(
            by_idx,
            Type::Null,
            Box::new(TornClaim),
        )),
    }
}

pub(crate) const USER_COLUMNS: &str = "id, username, fullname, admin";

pub(crate) fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        fullname: row.get(offset + 2)?,
        admin: row.get(offset + 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::epoch;

    #[test]
    fn session_expiry_is_exclusive() {
        let session = Session {
            id: 1,
            user_id: 1,
            created: epoch(0),
            expiry: epoch(100),
        };
        assert!(session.is_active_at(epoch(0)));
        assert!(session.is_active_at(epoch(99)));
        assert!(!session.is_active_at(epoch(100)));
        assert!(!session.is_active_at(epoch(101)));
    }
}
