//! Deletion of group snapshots and the retention of their content.
//!
//! When a group snapshot is terminating, its content is either deleted
//! (`Delete`) or kept and marked (`Retain`).  The bound finalizer comes off
//! the group only once no content remains that still needs handling.

use tracing::{debug, info, instrument, warn};

use crate::consts::{ANN_VOLUME_GROUP_SNAPSHOT_BEING_DELETED, VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER};
use crate::controller::GroupSnapshotController;
use crate::error::VgsError;
use crate::store::{ObjectStore, update_with_retry};
use crate::types::{DeletionPolicy, VolumeGroupSnapshot, VolumeGroupSnapshotContent};

impl<S: ObjectStore> GroupSnapshotController<S> {
    /// Handle a group snapshot carrying a deletion timestamp.
    ///
    /// Replaying this for an already cleaned-up pair is a no-op.
    #[instrument(skip_all, fields(group = %group.key()))]
    pub(crate) async fn process_deletion(&self, group: &VolumeGroupSnapshot) -> Result<(), VgsError> {
        let content_name = group
            .bound_content_name()
            .or(group.requested_content_name());

        let content = match content_name {
            Some(name) => match self.get_content(name).await {
                Ok(content) => Some(content),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let Some(content) = content else {
            debug!("no content left, releasing group snapshot");
            return self.remove_bound_finalizer(group).await;
        };

        if !content.is_bound_to(group) {
            warn!(
                content = %content.metadata.name,
                "content belongs to a different group snapshot, leaving it alone"
            );
            return self.remove_bound_finalizer(group).await;
        }

        match content.spec.deletion_policy {
            DeletionPolicy::Retain => {
                self.mark_content_being_deleted(&content).await?;
                self.remove_bound_finalizer(group).await
            }
            DeletionPolicy::Delete => {
                // The finalizer comes off on the pass that observes the content gone.
                match self
                    .store
                    .delete::<VolumeGroupSnapshotContent>("", &content.metadata.name)
                    .await
                {
                    Ok(()) => {
                        info!(content = %content.metadata.name, "group snapshot content deleted");
                        Ok(())
                    }
                    Err(e) if e.is_not_found() => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn mark_content_being_deleted(
        &self,
        content: &VolumeGroupSnapshotContent,
    ) -> Result<(), VgsError> {
        update_with_retry(
            self.store.as_ref(),
            "",
            &content.metadata.name,
            self.config.conflict_retries,
            |c: &mut VolumeGroupSnapshotContent| {
                c.metadata
                    .set_annotation(ANN_VOLUME_GROUP_SNAPSHOT_BEING_DELETED, "yes")
            },
        )
        .await?;
        info!(content = %content.metadata.name, "retained content marked as being deleted");
        Ok(())
    }

    async fn remove_bound_finalizer(&self, group: &VolumeGroupSnapshot) -> Result<(), VgsError> {
        if !group.metadata.has_finalizer(VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER) {
            return Ok(());
        }
        let result = update_with_retry(
            self.store.as_ref(),
            &group.metadata.namespace,
            &group.metadata.name,
            self.config.conflict_retries,
            |g: &mut VolumeGroupSnapshot| {
                g.metadata
                    .remove_finalizer(VOLUME_GROUP_SNAPSHOT_BOUND_FINALIZER)
            },
        )
        .await;
        match result {
            Ok(_) => {
                info!("bound finalizer removed");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
