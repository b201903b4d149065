//! Group Tracker Module
//!
//! Keeps, for every group, one store record listing the store keys that
//! belong to it. The record is shared by every writer in every process, and
//! the store has no locks or transactions, so each mutation is a
//! read / modify / compare-and-swap loop that starts over whenever another
//! writer got in first.
//!
//! Retries are unbounded. Each writer only appends its own key, so
//! contention is short lived in practice, but a group hammered by many
//! writers can starve an individual call.
//!
//! The record only shrinks on clear. Entries that were removed or expired
//! stay listed, and every put rewrites the whole record, so a group of
//! roughly 13k distinct keys outgrows memcached's 1 MiB item limit. Past
//! that point puts to the group fail after the entry itself was stored.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::StoreClient;
use crate::error::Result;
use crate::store::{AddOutcome, CasOutcome};

/// Store keys currently belonging to a group.
pub type MembershipSet = BTreeSet<String>;

/// Conflict streak length after which a warning is logged (and every multiple of it).
const CONFLICT_WARN_INTERVAL: u64 = 100;

// == Group Tracker ==
#[derive(Debug, Clone)]
pub struct GroupTracker {
    client: Arc<StoreClient>,
}

impl GroupTracker {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    // == Members ==
    /// Current membership of the group stored at `group_key`, if the record exists.
    pub async fn members(&self, group_key: &str) -> Result<Option<MembershipSet>> {
        Ok(self
            .client
            .get_with_cas::<MembershipSet>(group_key)
            .await?
            .map(|(members, _)| members))
    }

    // == Add Member ==
    /// Records `member` in the group stored at `group_key`.
    ///
    /// An absent record is created with `add`, so two writers racing to
    /// create it cannot both win; the loser retries against the record the
    /// winner made. A present record is rewritten with `cas` even when it
    /// already lists `member`, which refreshes the record's TTL.
    pub async fn add_member(&self, group_key: &str, member: &str) -> Result<()> {
        let mut conflicts = 0u64;

        loop {
            match self.client.get_with_cas::<MembershipSet>(group_key).await? {
                None => {
                    let members = MembershipSet::from([member.to_string()]);
                    match self.client.add_if_absent(group_key, &members).await? {
                        AddOutcome::Created => {
                            debug!(group_key, member, "Created group record");
                            return Ok(());
                        }
                        AddOutcome::AlreadyExists => {}
                    }
                }
                Some((mut members, token)) => {
                    members.insert(member.to_string());
                    match self.client.cas(group_key, token, &members).await? {
                        CasOutcome::Applied => {
                            debug!(group_key, member, size = members.len(), "Updated group record");
                            return Ok(());
                        }
                        CasOutcome::Conflict | CasOutcome::NotFound => {}
                    }
                }
            }

            conflicts += 1;
            note_conflict(group_key, conflicts);
        }
    }

    // == Clear Group ==
    /// Deletes every member of the group stored at `group_key` and empties the record.
    ///
    /// Each pass deletes the members of the snapshot it read and then
    /// compare-and-swaps the empty set against that snapshot's token. If a
    /// writer added a member in between, the swap fails and the next pass
    /// reads the newer membership, so the record is only emptied once
    /// everything it listed has been deleted. An absent or already empty
    /// record returns without writing anything.
    ///
    /// Returns every member key deleted along the way.
    pub async fn clear_group(&self, group_key: &str) -> Result<MembershipSet> {
        let mut cleared = MembershipSet::new();
        let mut conflicts = 0u64;

        loop {
            let (members, token) = match self.client.get_with_cas::<MembershipSet>(group_key).await? {
                Some(snapshot) => snapshot,
                None => {
                    debug!(group_key, "No group record, nothing to flush");
                    return Ok(cleared);
                }
            };

            if members.is_empty() {
                debug!(group_key, "Group record already empty");
                return Ok(cleared);
            }

            debug!(group_key, keys = ?members, "Flushing group members");
            for key in &members {
                self.client.delete(key).await?;
            }
            cleared.extend(members);

            match self.client.cas(group_key, token, &MembershipSet::new()).await? {
                CasOutcome::Applied => {
                    debug!(group_key, flushed = cleared.len(), "Flushed group");
                    return Ok(cleared);
                }
                CasOutcome::Conflict | CasOutcome::NotFound => {
                    conflicts += 1;
                    note_conflict(group_key, conflicts);
                }
            }
        }
    }
}

fn note_conflict(group_key: &str, conflicts: u64) {
    if conflicts % CONFLICT_WARN_INTERVAL == 0 {
        warn!(group_key, conflicts, "Group record still contended, retrying");
    } else {
        debug!(group_key, conflicts, "Group record changed concurrently, retrying");
    }
}
