//! Recording failures in a group snapshot's status.
//!
//! This is the only place the controller writes `status.error`.  It touches
//! nothing but the status error (and initializes an absent status as not
//! ready), so a failed step never leaves a half-applied binding behind.
//! Errors that [invalidate readiness](VgsError::invalidates_readiness) also
//! reset `readyToUse` to `false`.

use tracing::{debug, warn};

use crate::error::VgsError;
use crate::store::{ObjectStore, update_with_retry};
use crate::types::{VolumeGroupSnapshot, VolumeSnapshotError};

/// Write `err` into the status of `group`, stamped with the current time.
pub(crate) async fn record_group_error<S: ObjectStore>(
    store: &S,
    retries: u32,
    group: &VolumeGroupSnapshot,
    err: &VgsError,
) -> Result<(), VgsError> {
    let message = err.to_string();
    warn!(
        group = %group.key(),
        class = ?err.classification(),
        error = %message,
        "group snapshot sync failed"
    );

    let result = update_with_retry(
        store,
        &group.metadata.namespace,
        &group.metadata.name,
        retries,
        |g: &mut VolumeGroupSnapshot| {
            let status = g.status_mut();
            status.error = Some(VolumeSnapshotError::now(message.clone()));
            if err.invalidates_readiness() {
                status.ready_to_use = Some(false);
            }
            true
        },
    )
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(group = %group.key(), "group snapshot vanished before its error was recorded");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
