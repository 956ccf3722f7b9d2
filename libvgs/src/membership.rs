//! Ownership linkage between member snapshots and their group snapshot.
//!
//! The relation is an [`OwnerReference`] record on the member plus a reverse
//! index keyed by `<namespace>^<group>`.  Neither side holds a live pointer to
//! the other, so either can be deleted independently and the relation stays
//! inspectable.

use std::collections::BTreeSet;

use dashmap::DashMap;
use tracing::debug;

use crate::consts::{
    GROUP_SNAPSHOT_KIND, VOLUME_SNAPSHOT_PARENT_GROUP_INDEX, group_snapshot_api_version,
};
use crate::types::{OwnerReference, VolumeGroupSnapshot, VolumeSnapshot};

fn is_group_owner(owner: &OwnerReference, api_version: &str) -> bool {
    owner.kind == GROUP_SNAPSHOT_KIND && owner.api_version == api_version
}

/// Name of the group snapshot owning `snapshot`, if any.
pub fn parent_name(snapshot: &VolumeSnapshot) -> Option<&str> {
    let api_version = group_snapshot_api_version();
    snapshot
        .metadata
        .owner_references
        .iter()
        .find(|owner| is_group_owner(owner, &api_version))
        .map(|owner| owner.name.as_str())
}

pub fn is_member(snapshot: &VolumeSnapshot) -> bool {
    parent_name(snapshot).is_some()
}

/// Index key for a group snapshot identified by namespace and name.
pub fn index_key(namespace: &str, name: &str) -> String {
    format!("{namespace}^{name}")
}

/// Index key of the group owning `snapshot`, or `None` for non-members.
pub fn parent_index_key(snapshot: &VolumeSnapshot) -> Option<String> {
    parent_name(snapshot).map(|parent| index_key(&snapshot.metadata.namespace, parent))
}

/// `true` if the snapshot's status names a group but no owner reference to a
/// group snapshot is attached yet.
pub fn needs_ownership(snapshot: &VolumeSnapshot) -> bool {
    let declared = snapshot
        .status
        .as_ref()
        .and_then(|s| s.volume_group_snapshot_name.as_deref())
        .is_some_and(|name| !name.is_empty());
    declared && !is_member(snapshot)
}

/// Owner reference declaring an object a child of `parent`.
pub fn create_owner_reference(parent: &VolumeGroupSnapshot) -> OwnerReference {
    OwnerReference {
        api_version: group_snapshot_api_version(),
        kind: GROUP_SNAPSHOT_KIND.to_owned(),
        name: parent.metadata.name.clone(),
        uid: parent.metadata.uid.clone(),
    }
}

/// Reverse index: group snapshot key to the names of its member snapshots.
///
/// Written by the watch machinery as snapshots come and go; the controller
/// only reads it.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    members: DashMap<String, BTreeSet<String>>,
}

impl MembershipIndex {
    /// Name the index is registered under with the informer cache.
    pub const NAME: &'static str = VOLUME_SNAPSHOT_PARENT_GROUP_INDEX;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` under its parent group.  Non-members are ignored.
    pub fn observe(&self, snapshot: &VolumeSnapshot) {
        let Some(key) = parent_index_key(snapshot) else {
            return;
        };
        debug!(
            index = Self::NAME,
            %key,
            snapshot = %snapshot.metadata.name,
            "indexing group member"
        );
        self.members
            .entry(key)
            .or_default()
            .insert(snapshot.metadata.name.clone());
    }

    /// Drop `snapshot` from the index, e.g. after it was deleted.
    pub fn forget(&self, snapshot: &VolumeSnapshot) {
        let Some(key) = parent_index_key(snapshot) else {
            return;
        };
        let now_empty = match self.members.get_mut(&key) {
            Some(mut names) => {
                names.remove(&snapshot.metadata.name);
                names.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.members.remove_if(&key, |_, names| names.is_empty());
        }
    }

    /// Member snapshot names of the group `namespace/name`, sorted.
    pub fn members_of(&self, namespace: &str, name: &str) -> Vec<String> {
        self.members
            .get(&index_key(namespace, name))
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }
}
