//! Well-known names shared with other tooling.

/// API group of the group snapshot resources.
pub const GROUP_SNAPSHOT_API_GROUP: &str = "groupsnapshot.storage.k8s.io";

/// API version of the group snapshot resources.
pub const GROUP_SNAPSHOT_API_VERSION: &str = "v1beta1";

/// Kind recorded in member snapshot owner references.
pub const GROUP_SNAPSHOT_KIND: &str = "VolumeGroupSnapshot";

/// Name of the cache index relating member snapshots to their group.
pub const VOLUME_SNAPSHOT_PARENT_GROUP_INDEX: &str = "ByVolumeGroupSnapshotMembership";

/// Annotation marking a class as the cluster default (value `"true"`).
pub const ANN_IS_DEFAULT_GROUP_SNAPSHOT_CLASS: &str =
    "groupsnapshot.storage.kubernetes.io/is-default-class";

/// Annotation set on retained content once its group snapshot is deleted.
pub const ANN_VOLUME_GROUP_SNAPSHOT_BEING_DELETED: &str =
    "groupsnapshot.storage.kubernetes.io/volumegroupsnapshot-being-deleted";

/// Finalizer guarding a bound group snapshot.
pub const VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER: &str =
    "groupsnapshot.storage.kubernetes.io/volumegroupsnapshot-bound-protection";

/// Prefix of dynamically created content names; the request UID follows verbatim.
pub const GROUP_SNAPSHOT_CONTENT_PREFIX: &str = "groupsnapcontent-";

/// `<group>/<version>` string recorded in owner references.
pub fn group_snapshot_api_version() -> String {
    format!("{GROUP_SNAPSHOT_API_GROUP}/{GROUP_SNAPSHOT_API_VERSION}")
}

/// Deterministic content name for a group snapshot UID.
pub fn content_name_for(group_uid: &str) -> String {
    format!("{GROUP_SNAPSHOT_CONTENT_PREFIX}{group_uid}")
}
