//! Member claim and volume validation.
//!
//! Given the listings maintained by the watch machinery, work out which
//! volumes a group snapshot covers and check that the class's driver can
//! snapshot every one of them.

use tracing::debug;

use crate::error::VgsError;
use crate::snapshot_info::{SnapshotInfo, SnapshotInfoList};
use crate::types::{
    PersistentVolume, PersistentVolumeClaim, VolumeGroupSnapshot, VolumeGroupSnapshotClass,
};

/// Validate the members of `group` and return them in ascending claim-name
/// order.
///
/// `claims` may span namespaces; only claims in the group's namespace are
/// considered.  `volumes` is the cluster-wide volume listing.
pub fn select_members(
    group: &VolumeGroupSnapshot,
    class: &VolumeGroupSnapshotClass,
    claims: &[PersistentVolumeClaim],
    volumes: &[PersistentVolume],
) -> Result<SnapshotInfoList, VgsError> {
    let selector = group.spec.source.selector.clone().unwrap_or_default();

    let mut selected: Vec<&PersistentVolumeClaim> = claims
        .iter()
        .filter(|c| c.metadata.namespace == group.metadata.namespace)
        .filter(|c| selector.matches(&c.metadata.labels))
        .collect();
    if selected.is_empty() {
        return Err(VgsError::NoMatchingVolumes(selector.to_string()));
    }
    selected.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    let mut members = Vec::with_capacity(selected.len());
    for claim in selected {
        let volume_name = claim
            .bound_volume_name()
            .ok_or_else(|| VgsError::ClaimNotBound(claim.metadata.name.clone()))?;

        let volume = volumes
            .iter()
            .find(|v| v.metadata.name == volume_name)
            .ok_or_else(|| VgsError::VolumeLookup {
                volume: volume_name.to_owned(),
                source: Box::new(VgsError::VolumeNotFound(volume_name.to_owned())),
            })?;

        let csi = volume.spec.csi.as_ref().ok_or_else(|| VgsError::NonCsiVolume {
            group: group.key(),
            volume: volume_name.to_owned(),
        })?;

        if csi.driver != class.driver {
            return Err(VgsError::DriverMismatch {
                class_driver: class.driver.clone(),
                volume_driver: csi.driver.clone(),
                group: group.key(),
                volume: volume_name.to_owned(),
            });
        }

        members.push(SnapshotInfo {
            volume_handle: csi.volume_handle.clone(),
            pv_name: volume_name.to_owned(),
            pvc_name: claim.metadata.name.clone(),
        });
    }

    let members = SnapshotInfoList::from(members);
    debug!(group = %group.key(), count = members.len(), "group snapshot members validated");
    Ok(members)
}
