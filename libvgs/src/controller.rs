//! Group snapshot binding engine.
//!
//! One sync pass takes a group snapshot key, loads the current state from the
//! store and moves the request at most one step along
//!
//! ```text
//! Unbound -> Bound (not ready) -> Bound (ready) -> Terminating -> removed
//! ```
//!
//! Passes are idempotent: replaying a pass against unchanged state writes
//! nothing.  The delivery machinery guarantees that two passes for the same
//! key never run concurrently; passes for different keys may.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::class::resolve_class;
use crate::config::ControllerConfig;
use crate::consts::{VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER, content_name_for};
use crate::eligibility::select_members;
use crate::error::VgsError;
use crate::membership::{create_owner_reference, needs_ownership};
use crate::status::record_group_error;
use crate::store::{ObjectStore, update_with_retry};
use crate::types::*;

/// Reconciles group snapshots against their content objects.
pub struct GroupSnapshotController<S> {
    pub(crate) store: Arc<S>,
    pub(crate) config: ControllerConfig,
}

impl<S: ObjectStore> GroupSnapshotController<S> {
    pub fn new(store: Arc<S>, config: ControllerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run one sync pass for the group snapshot `namespace/name`.
    ///
    /// Every error returned here has already been recorded in the group's
    /// `status.error`, except for terminating groups and update conflicts; its
    /// [`classification`](VgsError::classification) tells the caller whether
    /// redelivery is likely to help.
    #[instrument(skip(self))]
    pub async fn sync_group_snapshot(&self, namespace: &str, name: &str) -> Result<(), VgsError> {
        if !self.config.enable_group_snapshots {
            debug!("group snapshots disabled, skipping sync");
            return Ok(());
        }

        let group: VolumeGroupSnapshot = match self.store.get(namespace, name).await {
            Ok(group) => group,
            Err(e) if e.is_not_found() => {
                debug!("group snapshot is gone, nothing to sync");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if group.is_being_deleted() {
            return self.process_deletion(&group).await;
        }

        // A bound name wins over the requested one: the binding never changes.
        let Some(content_name) = group
            .bound_content_name()
            .or(group.requested_content_name())
        else {
            return self.sync_unbound(&group).await;
        };

        match self.get_content(content_name).await {
            Ok(content) => self.sync_bound(&group, &content).await,
            Err(e) if e.is_not_found() && group.requested_content_name().is_none() => {
                // Cut data cannot be taken again; only an unfinished group is re-provisioned.
                if group.has_been_cut() {
                    let err = VgsError::ContentMissing(content_name.to_owned());
                    return Err(self.report(&group, err).await);
                }
                debug!(content = %content_name, "bound content missing, provisioning it again");
                self.sync_unbound(&group).await
            }
            Err(e) => Err(self.report(&group, e).await),
        }
    }

    /// Attach the owner reference a member snapshot is missing.
    ///
    /// Snapshots that already carry one, or that do not declare a parent
    /// group, are left alone.
    #[instrument(skip(self))]
    pub async fn sync_member_snapshot(&self, namespace: &str, name: &str) -> Result<(), VgsError> {
        if !self.config.enable_group_snapshots {
            return Ok(());
        }

        let snapshot: VolumeSnapshot = match self.store.get(namespace, name).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if !needs_ownership(&snapshot) {
            return Ok(());
        }

        let parent_name = snapshot
            .status
            .as_ref()
            .and_then(|s| s.volume_group_snapshot_name.clone())
            .unwrap_or_default();
        let parent: VolumeGroupSnapshot = self.store.get(namespace, &parent_name).await?;
        let owner = create_owner_reference(&parent);

        update_with_retry(
            self.store.as_ref(),
            namespace,
            name,
            self.config.conflict_retries,
            |s: &mut VolumeSnapshot| {
                if !needs_ownership(s) {
                    return false;
                }
                s.metadata.owner_references.push(owner.clone());
                true
            },
        )
        .await?;

        info!(group = %parent_name, "member snapshot linked to its group snapshot");
        Ok(())
    }

    /// Provision content for a group snapshot that has none yet.
    async fn sync_unbound(&self, group: &VolumeGroupSnapshot) -> Result<(), VgsError> {
        let content_name = group
            .bound_content_name()
            .map(str::to_owned)
            .unwrap_or_else(|| content_name_for(&group.metadata.uid));

        // Look up before creating so redelivery never yields a second content.
        let content = match self.get_content(&content_name).await {
            Ok(existing) => {
                debug!(content = %content_name, "content already provisioned");
                existing
            }
            Err(e) if e.is_not_found() => match self.create_content(group, &content_name).await {
                Ok(created) => created,
                Err(e) => return Err(self.report(group, e).await),
            },
            Err(e) => return Err(self.report(group, e).await),
        };

        self.sync_bound(group, &content).await
    }

    async fn create_content(
        &self,
        group: &VolumeGroupSnapshot,
        content_name: &str,
    ) -> Result<VolumeGroupSnapshotContent, VgsError> {
        let content = self
            .new_content(group, content_name)
            .await
            .map_err(|e| VgsError::input_parameters(&group.metadata.name, e))?;

        match self.store.create(&content).await {
            Ok(created) => {
                info!(
                    group = %group.key(),
                    content = %content_name,
                    members = created.spec.source.volume_handles.len(),
                    "group snapshot content created"
                );
                Ok(created)
            }
            Err(VgsError::AlreadyExists { .. }) => {
                debug!(content = %content_name, "content created concurrently, reusing it");
                self.get_content(content_name).await
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve the class and members and build the content to create.
    async fn new_content(
        &self,
        group: &VolumeGroupSnapshot,
        content_name: &str,
    ) -> Result<VolumeGroupSnapshotContent, VgsError> {
        let classes: Vec<VolumeGroupSnapshotClass> = self.store.list(None).await?;
        let class = resolve_class(group, &classes)?;

        let claims: Vec<PersistentVolumeClaim> =
            self.store.list(Some(group.metadata.namespace.as_str())).await?;
        let volumes: Vec<PersistentVolume> = self.store.list(None).await?;
        let members = select_members(group, class, &claims, &volumes)?;
        debug!(
            group = %group.key(),
            class = %class.metadata.name,
            policy = %class.deletion_policy,
            members = members.len(),
            "group snapshot inputs resolved"
        );

        Ok(VolumeGroupSnapshotContent {
            metadata: ObjectMeta::cluster(content_name),
            spec: VolumeGroupSnapshotContentSpec {
                volume_group_snapshot_ref: ObjectReference {
                    namespace: group.metadata.namespace.clone(),
                    name: group.metadata.name.clone(),
                    uid: group.metadata.uid.clone(),
                },
                deletion_policy: class.deletion_policy,
                driver: class.driver.clone(),
                volume_group_snapshot_class_name: Some(class.metadata.name.clone()),
                source: VolumeGroupSnapshotContentSource {
                    volume_handles: members.volume_handles(),
                    group_snapshot_handles: None,
                },
            },
            status: None,
        })
    }

    /// Validate the back-reference, then bind and mirror content status.
    ///
    /// The bound name and the finalizer are written in the same update, so the
    /// finalizer never exists without the binding.
    async fn sync_bound(
        &self,
        group: &VolumeGroupSnapshot,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<(), VgsError> {
        let content_name = content.metadata.name.as_str();
        if !content.is_bound_to(group) {
            let err = VgsError::BindingConflict(content_name.to_owned());
            return Err(self.report(group, err).await);
        }

        let content_ready = content.ready_to_use();
        let content_status = content.status.clone().unwrap_or_default();
        let result = update_with_retry(
            self.store.as_ref(),
            &group.metadata.namespace,
            &group.metadata.name,
            self.config.conflict_retries,
            |g: &mut VolumeGroupSnapshot| {
                let before = g.clone();
                let status = g.status_mut();
                if status.bound_volume_group_snapshot_content_name.is_none() {
                    status.bound_volume_group_snapshot_content_name = Some(content_name.to_owned());
                }
                if let Some(ready) = content_ready {
                    status.ready_to_use = Some(ready);
                }
                if let Some(created) = content_status.creation_time {
                    status.creation_time = Some(created);
                }
                status.error = content_status.error.clone();
                g.metadata.add_finalizer(VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER);
                *g != before
            },
        )
        .await;

        match result {
            Ok(updated) => {
                debug!(
                    group = %group.key(),
                    content = %content_name,
                    ready = ?updated.status.as_ref().and_then(|s| s.ready_to_use),
                    "group snapshot bound"
                );
                Ok(())
            }
            Err(e) => Err(self.report(group, e).await),
        }
    }

    pub(crate) async fn get_content(
        &self,
        name: &str,
    ) -> Result<VolumeGroupSnapshotContent, VgsError> {
        self.store.get("", name).await
    }

    /// Record `err` in the group's status and hand it back for the caller.
    ///
    /// Conflicts that outlived the retry budget are only handed back; the next
    /// delivery recomputes from fresh state.
    async fn report(&self, group: &VolumeGroupSnapshot, err: VgsError) -> VgsError {
        if err.is_conflict() {
            debug!(
                group = %group.key(),
                error = %err,
                "update still conflicting, leaving status alone"
            );
            return err;
        }
        if let Err(write_err) =
            record_group_error(self.store.as_ref(), self.config.conflict_retries, group, &err).await
        {
            warn!(group = %group.key(), error = %write_err, "failed to record group snapshot error");
        }
        err
    }
}
