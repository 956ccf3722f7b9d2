//! Object model for group snapshots and the objects they reference.
//!
//! These mirror the declarative schemas the control plane stores.  They are
//! all [`Serialize`]/[`Deserialize`] with camelCase field names so they read
//! the same as the objects users write.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selector::LabelSelector;

// ---------------------------------------------------------------------------
// Object metadata
// ---------------------------------------------------------------------------

/// Metadata common to every stored object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    /// Empty for cluster-scoped objects.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    /// Version used for optimistic concurrency; assigned by the store.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a namespaced object.
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            ..Default::default()
        }
    }

    /// Metadata for a cluster-scoped object.
    pub fn cluster(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add `finalizer` unless present.  Returns `true` if it was added.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_owned());
        true
    }

    /// Remove every copy of `finalizer`.  Returns `true` if any was removed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }

    /// Set an annotation.  Returns `true` if the stored value changed.
    pub fn set_annotation(&mut self, key: &str, value: &str) -> bool {
        if self.annotations.get(key).map(String::as_str) == Some(value) {
            return false;
        }
        self.annotations.insert(key.to_owned(), value.to_owned());
        true
    }
}

/// Immutable record declaring an object as a child of another.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// Reference from a content object back to the request that caused it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// Empty until the reference has been bound.
    #[serde(default)]
    pub uid: String,
}

/// Error recorded in an object's status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl VolumeSnapshotError {
    /// An error stamped with the current time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            time: Some(Utc::now()),
        }
    }
}

/// What happens to content when its group snapshot is deleted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Remove the content together with the request.
    #[default]
    Delete,
    /// Keep the content as a standalone record.
    Retain,
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => f.write_str("Delete"),
            Self::Retain => f.write_str("Retain"),
        }
    }
}

// ---------------------------------------------------------------------------
// Group snapshot request
// ---------------------------------------------------------------------------

/// User intent: snapshot the selected volumes together.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshot {
    pub metadata: ObjectMeta,
    pub spec: VolumeGroupSnapshotSpec,
    #[serde(default)]
    pub status: Option<VolumeGroupSnapshotStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotSpec {
    pub source: VolumeGroupSnapshotSource,
    #[serde(default)]
    pub volume_group_snapshot_class_name: Option<String>,
}

/// Either a selector (dynamic provisioning) or pre-provisioned content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotSource {
    #[serde(default)]
    pub selector: Option<LabelSelector>,
    #[serde(default)]
    pub volume_group_snapshot_content_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotStatus {
    /// Never changes once set.
    #[serde(default)]
    pub bound_volume_group_snapshot_content_name: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    /// `None` means unknown.
    #[serde(default)]
    pub ready_to_use: Option<bool>,
    #[serde(default)]
    pub error: Option<VolumeSnapshotError>,
}

impl VolumeGroupSnapshot {
    /// `<namespace>/<name>`, the form used in operator messages.
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn bound_content_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.bound_volume_group_snapshot_content_name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// Name of pre-provisioned content requested in the spec.
    pub fn requested_content_name(&self) -> Option<&str> {
        self.spec
            .source
            .volume_group_snapshot_content_name
            .as_deref()
            .filter(|n| !n.is_empty())
    }

    /// `true` once the bound content has been reported ready or cut.
    ///
    /// Such a group must never be re-provisioned from its claims.
    pub fn has_been_cut(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.ready_to_use == Some(true) || s.creation_time.is_some())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Status, initialized as "not ready" if absent.
    pub fn status_mut(&mut self) -> &mut VolumeGroupSnapshotStatus {
        self.status.get_or_insert_with(|| VolumeGroupSnapshotStatus {
            ready_to_use: Some(false),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Group snapshot content
// ---------------------------------------------------------------------------

/// Backing record of the driver-side group snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContent {
    pub metadata: ObjectMeta,
    pub spec: VolumeGroupSnapshotContentSpec,
    #[serde(default)]
    pub status: Option<VolumeGroupSnapshotContentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContentSpec {
    pub volume_group_snapshot_ref: ObjectReference,
    pub deletion_policy: DeletionPolicy,
    pub driver: String,
    #[serde(default)]
    pub volume_group_snapshot_class_name: Option<String>,
    pub source: VolumeGroupSnapshotContentSource,
}

/// Volume handles to snapshot (dynamic) or existing snapshot handles (static).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContentSource {
    #[serde(default)]
    pub volume_handles: Vec<String>,
    #[serde(default)]
    pub group_snapshot_handles: Option<GroupSnapshotHandles>,
}

/// Driver handles of a pre-provisioned group snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshotHandles {
    pub volume_group_snapshot_handle: String,
    #[serde(default)]
    pub volume_snapshot_handles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotContentStatus {
    #[serde(default)]
    pub volume_group_snapshot_handle: Option<String>,
    #[serde(default)]
    pub volume_snapshot_handle_pair_list: Vec<VolumeSnapshotHandlePair>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ready_to_use: Option<bool>,
    #[serde(default)]
    pub error: Option<VolumeSnapshotError>,
}

/// Driver-assigned snapshot handle for one member volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotHandlePair {
    pub volume_handle: String,
    pub snapshot_handle: String,
}

impl VolumeGroupSnapshotContent {
    /// `true` if the back-reference is compatible with `group`.
    ///
    /// An empty back-reference UID is accepted for pre-provisioned content as
    /// long as namespace and name point at the group.
    pub fn is_bound_to(&self, group: &VolumeGroupSnapshot) -> bool {
        let r = &self.spec.volume_group_snapshot_ref;
        if !r.uid.is_empty() {
            return r.uid == group.metadata.uid;
        }
        r.namespace == group.metadata.namespace && r.name == group.metadata.name
    }

    pub fn ready_to_use(&self) -> Option<bool> {
        self.status.as_ref().and_then(|s| s.ready_to_use)
    }
}

// ---------------------------------------------------------------------------
// Group snapshot class
// ---------------------------------------------------------------------------

/// Named policy bundle: driver, parameters and retention policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSnapshotClass {
    pub metadata: ObjectMeta,
    pub driver: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub deletion_policy: DeletionPolicy,
}

// ---------------------------------------------------------------------------
// Claims and volumes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimPhase {
    #[default]
    Pending,
    Bound,
    Lost,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    pub spec: PersistentVolumeClaimSpec,
    #[serde(default)]
    pub status: PersistentVolumeClaimStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    #[serde(default)]
    pub volume_name: Option<String>,
    #[serde(default)]
    pub storage_class_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimStatus {
    pub phase: ClaimPhase,
}

impl PersistentVolumeClaim {
    /// The volume this claim is bound to, if binding has completed.
    pub fn bound_volume_name(&self) -> Option<&str> {
        if self.status.phase != ClaimPhase::Bound {
            return None;
        }
        self.spec.volume_name.as_deref().filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolume {
    pub metadata: ObjectMeta,
    pub spec: PersistentVolumeSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    /// Present when a CSI driver provisioned the volume.
    #[serde(default)]
    pub csi: Option<CsiVolumeSource>,
    /// Node-local backing path, for volumes without CSI provenance.
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub claim_ref: Option<ObjectReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CsiVolumeSource {
    pub driver: String,
    pub volume_handle: String,
}

// ---------------------------------------------------------------------------
// Member snapshots
// ---------------------------------------------------------------------------

/// Per-volume snapshot that may belong to a group snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshot {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<VolumeSnapshotStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotStatus {
    #[serde(default)]
    pub bound_volume_snapshot_content_name: Option<String>,
    #[serde(default)]
    pub ready_to_use: Option<bool>,
    /// Group snapshot this snapshot was taken as part of.
    #[serde(default)]
    pub volume_group_snapshot_name: Option<String>,
}
