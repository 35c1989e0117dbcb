use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use giftlist_types::api::ListItemDataPatch;
use giftlist_types::{ItemId, ListId, UserId};

use crate::Database;
use crate::claim::ClaimChange;
use crate::error::{Result, StoreError, require_nonblank};
use crate::lists::load_list;
use crate::models::{ListItem, ListItemData, claim_at, secs_at, to_secs};
use crate::versioned::{Update, Versioned};

/// Items are always addressed through their list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemKey {
    pub list_id: ListId,
    pub item_id: ItemId,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in list {}", self.item_id, self.list_id)
    }
}

/// A change to one item. Data edits are reserved for the list owner; claim
/// changes are open to everyone and gated by the claim state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub data: Option<ListItemDataPatch>,
    pub claim: Option<ClaimChange>,
}

const ITEM_COLUMNS: &str = "i.id, i.version, i.list_id, i.name, i.description, i.url,
                            i.claimed_by, i.claimed_when, i.created, i.updated";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ListItem> {
    Ok(ListItem {
        id: row.get(0)?,
        version: row.get(1)?,
        list_id: row.get(2)?,
        data: ListItemData {
            name: row.get(3)?,
            desc: row.get(4)?,
            url: row.get(5)?,
        },
        claim: claim_at(row, 6, 7)?,
        created: secs_at(row, 8)?,
        updated: secs_at(row, 9)?,
    })
}

/// Load the list and fail unless it exists and `actor` owns it.
fn require_list_owner(conn: &Connection, list_id: ListId, actor: UserId) -> Result<()> {
    let list = load_list(conn, list_id)?
        .ok_or_else(|| StoreError::NotFound(format!("no list {}", list_id)))?;
    if list.owner_id != actor {
        return Err(StoreError::PermissionDenied(format!(
            "user {} does not own list {} (owner {})",
            actor, list_id, list.owner_id
        )));
    }
    Ok(())
}

impl Database {
    /// Only the list's owner may add items. New items start unclaimed at
    /// version 1.
    pub fn create_list_item(
        &self,
        list_id: ListId,
        actor: UserId,
        data: &ListItemData,
        now: DateTime<Utc>,
    ) -> Result<ListItem> {
        require_nonblank("name", &data.name)?;

        self.with_tx(|tx| {
            require_list_owner(tx, list_id, actor)?;

            tx.execute(
                "INSERT INTO items (version, list_id, name, description, url, created, updated)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?5)",
                (list_id, &data.name, &data.desc, &data.url, to_secs(now)),
            )?;
            let id = tx.last_insert_rowid();
            debug!("Item {} created in list {}", id, list_id);

            Ok(ListItem {
                id,
                version: 1,
                list_id,
                data: data.clone(),
                claim: Default::default(),
                created: now,
                updated: now,
            })
        })
    }

    /// All items of a list in id order. `NotFound` if the list does not exist.
    pub fn list_list_items(&self, list_id: ListId) -> Result<Vec<ListItem>> {
        self.with_conn(|conn| {
            if load_list(conn, list_id)?.is_none() {
                return Err(StoreError::NotFound(format!("no list {}", list_id)));
            }

            let sql = format!(
                "SELECT {} FROM items i WHERE i.list_id = ?1 ORDER BY i.id ASC",
                ITEM_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map([list_id], item_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    pub fn get_list_item(&self, list_id: ListId, item_id: ItemId) -> Result<Option<ListItem>> {
        self.with_conn(|conn| {
            Ok(ItemRecord::load(conn, ItemKey { list_id, item_id })?.map(|r| r.item))
        })
    }

    /// Only the list's owner may delete items.
    pub fn delete_list_item(&self, list_id: ListId, item_id: ItemId, actor: UserId) -> Result<()> {
        self.with_tx(|tx| {
            require_list_owner(tx, list_id, actor)?;

            let deleted = tx.execute(
                "DELETE FROM items WHERE id = ?1 AND list_id = ?2",
                [item_id, list_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!(
                    "no item {}",
                    ItemKey { list_id, item_id }
                )));
            }
            debug!("Item {} deleted from list {}", item_id, list_id);
            Ok(())
        })
    }

    pub fn update_list_item(
        &self,
        list_id: ListId,
        item_id: ItemId,
        update: Update<ItemPatch>,
    ) -> Result<ListItem> {
        if update.patch.data.is_none() && update.patch.claim.is_none() {
            return Err(StoreError::InvalidArgument("nothing to update".into()));
        }
        let record: ItemRecord = self.update_versioned(ItemKey { list_id, item_id }, update)?;
        Ok(record.item)
    }
}

/// An item together with the owner of its list, which is what data edits are
/// checked against.
struct ItemRecord {
    item: ListItem,
    list_owner: UserId,
}

impl Versioned for ItemRecord {
    type Key = ItemKey;
    type Patch = ItemPatch;
    const KIND: &'static str = "item";

    fn load(conn: &Connection, key: ItemKey) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {}, l.owner
             FROM items i
             JOIN lists l ON l.id = i.list_id
             WHERE i.id = ?1 AND i.list_id = ?2",
            ITEM_COLUMNS
        );
        let record = conn
            .query_row(&sql, [key.item_id, key.list_id], |row| {
                Ok(ItemRecord {
                    item: item_from_row(row)?,
                    list_owner: row.get(10)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    fn version(&self) -> i64 {
        self.item.version
    }

    fn owner(&self) -> UserId {
        self.list_owner
    }

    fn requires_owner(patch: &ItemPatch) -> bool {
        patch.data.is_some()
    }

    fn apply(&mut self, patch: &ItemPatch, actor: UserId, now: DateTime<Utc>) -> Result<()> {
        if let Some(data) = &patch.data {
            let fields = &mut self.item.data;
            if let Some(name) = &data.name {
                fields.name = name.clone();
            }
            if let Some(desc) = &data.desc {
                fields.desc = desc.clone();
            }
            if let Some(url) = &data.url {
                fields.url = url.clone();
            }
            require_nonblank("name", &fields.name)?;
        }

        if let Some(change) = patch.claim {
            self.item.claim = self.item.claim.transition(change, actor, now)?;
        }
        Ok(())
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.item.version += 1;
        self.item.updated = now;
    }

    fn store(&self, conn: &Connection) -> Result<()> {
        let item = &self.item;
        conn.execute(
            "UPDATE items
                SET version = ?1, name = ?2, description = ?3, url = ?4, updated = ?5,
                    claimed_by = ?6, claimed_when = ?7
              WHERE id = ?8 AND list_id = ?9",
            (
                item.version,
                &item.data.name,
                &item.data.desc,
                &item.data.url,
                to_secs(item.updated),
                item.claim.claimant(),
                item.claim.claimed_when().map(to_secs),
                item.id,
                item.list_id,
            ),
        )?;
        Ok(())
    }
}
