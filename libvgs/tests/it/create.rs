//! Dynamic provisioning: group snapshots selecting claims by label.

use libvgs::backend::memory::{InjectedError, Verb};
use libvgs::*;

use crate::common::*;

const GROUP: &str = "snap-1-1";
const GROUP_UID: &str = "snapuid1-1";
const CONTENT: &str = "groupsnapcontent-snapuid1-1";

fn new_group() -> VolumeGroupSnapshot {
    group_snapshot(GROUP, GROUP_UID)
}

fn new_content() -> VolumeGroupSnapshotContent {
    content(CONTENT, GROUP_UID, GROUP)
}

fn input_error(inner: &str) -> String {
    format!("failed to get input parameters to create group snapshot {GROUP}: {inner}")
}

#[tokio::test]
async fn create_group_snapshot_content() {
    run_sync_tests(vec![
        ControllerTest {
            name: "1-1 - successful dynamic provisioning with an explicit class",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![
                new_group()
                    .class(CLASS_GOLD)
                    .bound_to(CONTENT)
                    .ready(false)
                    .finalized(),
            ],
            expected_contents: vec![new_content().without_status()],
            ..Default::default()
        },
        ControllerTest {
            name: "1-2 - the single default class is used when none is named",
            initial_group_snapshots: vec![new_group()],
            expected_group_snapshots: vec![
                new_group().bound_to(CONTENT).ready(false).finalized(),
            ],
            expected_contents: vec![
                new_content()
                    .class(CLASS_SILVER)
                    .policy(DeletionPolicy::Retain)
                    .without_status(),
            ],
            classes: vec![
                class(CLASS_GOLD, DeletionPolicy::Delete),
                default_class(CLASS_SILVER, DeletionPolicy::Retain),
            ],
            ..Default::default()
        },
        ControllerTest {
            name: "1-3 - claims in other namespaces and without the label are not members",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![
                new_group()
                    .class(CLASS_GOLD)
                    .bound_to(CONTENT)
                    .ready(false)
                    .finalized(),
            ],
            expected_contents: vec![new_content().without_status()],
            initial_claims: {
                let mut claims = claim_couple("claim1-1", "volume6-1");
                let mut foreign = claim("3-claim1-1", Some("3-volume6-1"), ClaimPhase::Bound);
                foreign.metadata.namespace = "other".to_owned();
                let mut unlabeled = claim("4-claim1-1", Some("4-volume6-1"), ClaimPhase::Bound);
                unlabeled.metadata.labels.clear();
                claims.extend([foreign, unlabeled]);
                claims
            },
            ..Default::default()
        },
    ])
    .await;
}

#[tokio::test]
async fn create_group_snapshot_content_errors() {
    run_sync_tests(vec![
        ControllerTest {
            name: "3-1 - class does not exist",
            initial_group_snapshots: vec![new_group().class(CLASS_NON_EXISTING)],
            expected_group_snapshots: vec![
                new_group().class(CLASS_NON_EXISTING).ready(false).error(&input_error(
                    r#""volumegroupsnapshotclass.groupsnapshot.storage.k8s.io \"non-existing\" not found""#,
                )),
            ],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-2 - no class named and no default class",
            initial_group_snapshots: vec![new_group()],
            expected_group_snapshots: vec![new_group().ready(false).error(&input_error(
                r#""failed to take group snapshot snap-1-1 without a group snapshot class""#,
            ))],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-3 - more than one default class",
            initial_group_snapshots: vec![new_group()],
            expected_group_snapshots: vec![new_group().ready(false).error(&input_error(
                r#""2 default group snapshot classes were found for group snapshot snap-1-1""#,
            ))],
            classes: vec![
                default_class(CLASS_GOLD, DeletionPolicy::Delete),
                default_class(CLASS_SILVER, DeletionPolicy::Retain),
            ],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-4 - selector matches no claim",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![new_group().class(CLASS_GOLD).ready(false).error(
                &input_error(
                    r#""label selector app.kubernetes.io/name=postgresql for group snapshot not applied to any PVC""#,
                ),
            )],
            initial_claims: vec![],
            initial_volumes: vec![],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-5 - member claim is not bound",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![new_group().class(CLASS_GOLD).ready(false).error(
                &input_error(
                    r#""the PVC claim1-1 is not yet bound to a PV, will not attempt to take a group snapshot""#,
                ),
            )],
            initial_claims: vec![claim("claim1-1", None, ClaimPhase::Pending)],
            initial_volumes: vec![],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-6 - member volume is not a CSI volume",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![new_group().class(CLASS_GOLD).ready(false).error(
                &input_error(
                    r#""cannot snapshot a non-CSI volume for group snapshot default/snap-1-1: volume6-1""#,
                ),
            )],
            initial_claims: vec![claim("claim1-1", Some("volume6-1"), ClaimPhase::Bound)],
            initial_volumes: vec![with_local_path(
                volume("volume6-1", "pv-handle6-1", "claim1-1"),
                "/test",
            )],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-7 - member volume belongs to another driver",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![new_group().class(CLASS_GOLD).ready(false).error(
                &input_error(
                    r#""Volume CSI driver (test.csi.driver.name) mismatch with VolumeGroupSnapshotClass (csi-mock-plugin) default/snap-1-1: volume6-1""#,
                ),
            )],
            initial_claims: vec![claim("claim1-1", Some("volume6-1"), ClaimPhase::Bound)],
            initial_volumes: vec![with_driver(
                volume("volume6-1", "pv-handle6-1", "claim1-1"),
                "test.csi.driver.name",
            )],
            expect_success: false,
            ..Default::default()
        },
        ControllerTest {
            name: "3-8 - content creation fails",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![
                new_group()
                    .class(CLASS_GOLD)
                    .ready(false)
                    .error("internal error: mock creation error"),
            ],
            errors: vec![InjectedError {
                verb: Verb::Create,
                kind: VolumeGroupSnapshotContent::KIND,
                error: VgsError::internal("mock creation error"),
            }],
            expect_success: false,
            ..Default::default()
        },
    ])
    .await;
}

#[tokio::test]
async fn create_races() {
    run_sync_tests(vec![
        ControllerTest {
            name: "content created concurrently is reused",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![
                new_group()
                    .class(CLASS_GOLD)
                    .bound_to(CONTENT)
                    .ready(false)
                    .finalized(),
            ],
            initial_contents: vec![new_content()],
            expected_contents: vec![new_content()],
            // The lookup misses, so creation runs into the existing object.
            errors: vec![InjectedError {
                verb: Verb::Get,
                kind: VolumeGroupSnapshotContent::KIND,
                error: VgsError::NotFound {
                    resource: VolumeGroupSnapshotContent::RESOURCE,
                    name: CONTENT.to_owned(),
                },
            }],
            ..Default::default()
        },
        ControllerTest {
            name: "binding survives a stale group snapshot read",
            initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
            expected_group_snapshots: vec![
                new_group()
                    .class(CLASS_GOLD)
                    .bound_to(CONTENT)
                    .ready(false)
                    .finalized(),
            ],
            expected_contents: vec![new_content().without_status()],
            errors: vec![InjectedError {
                verb: Verb::Update,
                kind: VolumeGroupSnapshot::KIND,
                error: VgsError::Conflict {
                    resource: VolumeGroupSnapshot::RESOURCE,
                    name: GROUP.to_owned(),
                },
            }],
            ..Default::default()
        },
    ])
    .await;
}

fn group_conflicts(count: usize) -> Vec<InjectedError> {
    (0..count)
        .map(|_| InjectedError {
            verb: Verb::Update,
            kind: VolumeGroupSnapshot::KIND,
            error: VgsError::Conflict {
                resource: VolumeGroupSnapshot::RESOURCE,
                name: GROUP.to_owned(),
            },
        })
        .collect()
}

#[tokio::test]
async fn exhausted_conflicts_stay_out_of_status() {
    let retries = ControllerConfig::default().conflict_retries as usize;
    let controller = run_sync_test(ControllerTest {
        name: "conflicts beyond the retry budget",
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        expected_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        expected_contents: vec![new_content().without_status()],
        errors: group_conflicts(retries + 1),
        expect_success: false,
        ..Default::default()
    })
    .await;

    // Redelivery finds the content and binds it.
    controller.sync_group_snapshot("default", GROUP).await.unwrap();
    let group: VolumeGroupSnapshot = controller.store().get("default", GROUP).await.unwrap();
    assert_eq!(group.bound_content_name(), Some(CONTENT));
    assert!(group.status.unwrap().error.is_none());
    let contents: Vec<VolumeGroupSnapshotContent> = controller.store().objects().unwrap();
    assert_eq!(contents.len(), 1);
}

#[tokio::test]
async fn exhausted_conflicts_are_transient() {
    let retries = ControllerConfig::default().conflict_retries as usize;
    let test = ControllerTest {
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        errors: group_conflicts(retries + 1),
        ..Default::default()
    };
    let controller = setup(&test);
    let err = controller
        .sync_group_snapshot("default", GROUP)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(err.is_transient());

    let group: VolumeGroupSnapshot = controller.store().get("default", GROUP).await.unwrap();
    assert!(group.status.is_none());
}

#[tokio::test]
async fn replayed_sync_writes_nothing() {
    let test = ControllerTest {
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        ..Default::default()
    };
    let controller = setup(&test);

    controller.sync_group_snapshot("default", GROUP).await.unwrap();
    let writes = controller.store().writes();
    // One create, one bind.
    assert_eq!(writes, 2);

    for _ in 0..3 {
        controller.sync_group_snapshot("default", GROUP).await.unwrap();
    }
    assert_eq!(controller.store().writes(), writes);

    let contents: Vec<VolumeGroupSnapshotContent> = controller.store().objects().unwrap();
    assert_eq!(contents.len(), 1);
}

#[tokio::test]
async fn group_becomes_ready_with_its_content() {
    let test = ControllerTest {
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        ..Default::default()
    };
    let controller = setup(&test);
    controller.sync_group_snapshot("default", GROUP).await.unwrap();

    let store = controller.store();
    let mut content: VolumeGroupSnapshotContent = store.get("", CONTENT).await.unwrap();
    content = content.ready(true);
    store.update(&content).await.unwrap();

    controller.sync_group_snapshot("default", GROUP).await.unwrap();
    let group: VolumeGroupSnapshot = store.get("default", GROUP).await.unwrap();
    let status = group.status.unwrap();
    assert_eq!(status.ready_to_use, Some(true));
    assert_eq!(
        status.bound_volume_group_snapshot_content_name.as_deref(),
        Some(CONTENT)
    );
    assert!(status.error.is_none());
}

#[tokio::test]
async fn failures_are_classified() {
    let test = ControllerTest {
        initial_group_snapshots: vec![new_group()],
        ..Default::default()
    };
    let controller = setup(&test);
    let err = controller
        .sync_group_snapshot("default", GROUP)
        .await
        .unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Terminal);

    let test = ControllerTest {
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        initial_volumes: vec![],
        ..Default::default()
    };
    let controller = setup(&test);
    let err = controller
        .sync_group_snapshot("default", GROUP)
        .await
        .unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Transient);
}

#[tokio::test]
async fn disabled_controller_is_inert() {
    let test = ControllerTest {
        initial_group_snapshots: vec![new_group().class(CLASS_GOLD)],
        ..Default::default()
    };
    let enabled = setup(&test);
    let controller = GroupSnapshotController::new(
        enabled.store().clone(),
        ControllerConfig {
            enable_group_snapshots: false,
            ..Default::default()
        },
    );

    controller.sync_group_snapshot("default", GROUP).await.unwrap();
    assert_eq!(controller.store().writes(), 0);
}

#[tokio::test]
async fn vanished_group_snapshot_is_ignored() {
    let controller = setup(&ControllerTest::default());
    controller.sync_group_snapshot("default", "gone").await.unwrap();
    assert_eq!(controller.store().writes(), 0);
}
