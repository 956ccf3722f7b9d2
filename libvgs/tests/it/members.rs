//! Linking member snapshots to the group snapshot they were taken for.

use std::sync::Arc;

use libvgs::backend::memory::MemoryStore;
use libvgs::membership::{index_key, parent_name};
use libvgs::*;

use crate::common::*;

fn member(name: &str, parent: Option<&str>) -> VolumeSnapshot {
    VolumeSnapshot {
        metadata: ObjectMeta::namespaced(NAMESPACE, name),
        status: Some(VolumeSnapshotStatus {
            bound_volume_snapshot_content_name: Some(format!("snapcontent-{name}")),
            ready_to_use: Some(true),
            volume_group_snapshot_name: parent.map(str::to_owned),
        }),
    }
}

fn controller_with(
    groups: &[VolumeGroupSnapshot],
    snapshots: &[VolumeSnapshot],
) -> GroupSnapshotController<MemoryStore> {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    for group in groups {
        store.seed(group).unwrap();
    }
    for snapshot in snapshots {
        store.seed(snapshot).unwrap();
    }
    GroupSnapshotController::new(store, ControllerConfig::default())
}

#[tokio::test]
async fn member_gets_owner_reference() {
    let controller = controller_with(
        &[group_snapshot("snap-1-1", "snapuid1-1")],
        &[member("member-1", Some("snap-1-1"))],
    );

    controller
        .sync_member_snapshot(NAMESPACE, "member-1")
        .await
        .unwrap();

    let snapshot: VolumeSnapshot = controller
        .store()
        .get(NAMESPACE, "member-1")
        .await
        .unwrap();
    assert_eq!(snapshot.metadata.owner_references.len(), 1);
    let owner = &snapshot.metadata.owner_references[0];
    assert_eq!(owner.kind, "VolumeGroupSnapshot");
    assert_eq!(owner.api_version, "groupsnapshot.storage.k8s.io/v1beta1");
    assert_eq!(owner.name, "snap-1-1");
    assert_eq!(owner.uid, "snapuid1-1");
    assert_eq!(parent_name(&snapshot), Some("snap-1-1"));

    // Replaying is a no-op.
    let writes = controller.store().writes();
    controller
        .sync_member_snapshot(NAMESPACE, "member-1")
        .await
        .unwrap();
    assert_eq!(controller.store().writes(), writes);
}

#[tokio::test]
async fn standalone_snapshot_is_left_alone() {
    let controller = controller_with(
        &[group_snapshot("snap-1-1", "snapuid1-1")],
        &[member("standalone", None)],
    );

    controller
        .sync_member_snapshot(NAMESPACE, "standalone")
        .await
        .unwrap();
    controller
        .sync_member_snapshot(NAMESPACE, "missing")
        .await
        .unwrap();
    assert_eq!(controller.store().writes(), 0);
}

#[tokio::test]
async fn missing_parent_is_retried() {
    let controller = controller_with(&[], &[member("member-1", Some("snap-1-1"))]);

    let err = controller
        .sync_member_snapshot(NAMESPACE, "member-1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_transient());
    assert_eq!(controller.store().writes(), 0);
}

#[tokio::test]
async fn membership_index_tracks_linked_members() {
    let controller = controller_with(
        &[group_snapshot("snap-1-1", "snapuid1-1")],
        &[
            member("member-1", Some("snap-1-1")),
            member("member-2", Some("snap-1-1")),
            member("standalone", None),
        ],
    );
    for name in ["member-1", "member-2", "standalone"] {
        controller.sync_member_snapshot(NAMESPACE, name).await.unwrap();
    }

    let index = MembershipIndex::new();
    let snapshots: Vec<VolumeSnapshot> = controller.store().objects().unwrap();
    for snapshot in &snapshots {
        index.observe(snapshot);
    }

    assert_eq!(index_key(NAMESPACE, "snap-1-1"), "default^snap-1-1");
    assert_eq!(
        index.members_of(NAMESPACE, "snap-1-1"),
        vec!["member-1", "member-2"]
    );

    let member_1 = snapshots
        .iter()
        .find(|s| s.metadata.name == "member-1")
        .unwrap();
    index.forget(member_1);
    assert_eq!(index.members_of(NAMESPACE, "snap-1-1"), vec!["member-2"]);
}
