//! Group snapshot class resolution.

use tracing::debug;

use crate::consts::ANN_IS_DEFAULT_GROUP_SNAPSHOT_CLASS;
use crate::error::VgsError;
use crate::types::{VolumeGroupSnapshot, VolumeGroupSnapshotClass};

/// `true` if the class carries the default marker with value `"true"`.
pub fn is_default_class(class: &VolumeGroupSnapshotClass) -> bool {
    class
        .metadata
        .annotations
        .get(ANN_IS_DEFAULT_GROUP_SNAPSHOT_CLASS)
        .is_some_and(|v| v == "true")
}

/// Find the class that applies to `group`.
///
/// An explicit class name must match exactly.  Without one, exactly one class
/// may carry the default marker; none or several are errors, the resolver
/// never guesses.
pub fn resolve_class<'a>(
    group: &VolumeGroupSnapshot,
    classes: &'a [VolumeGroupSnapshotClass],
) -> Result<&'a VolumeGroupSnapshotClass, VgsError> {
    let requested = group
        .spec
        .volume_group_snapshot_class_name
        .as_deref()
        .filter(|n| !n.is_empty());

    if let Some(name) = requested {
        return classes
            .iter()
            .find(|c| c.metadata.name == name)
            .ok_or_else(|| VgsError::ClassNotFound(name.to_owned()));
    }

    let defaults: Vec<&VolumeGroupSnapshotClass> =
        classes.iter().filter(|c| is_default_class(c)).collect();
    match defaults.as_slice() {
        [] => Err(VgsError::NoClassSpecified(group.metadata.name.clone())),
        [class] => {
            debug!(group = %group.key(), class = %class.metadata.name, "using default group snapshot class");
            Ok(class)
        }
        many => Err(VgsError::AmbiguousDefaultClass {
            group: group.metadata.name.clone(),
            count: many.len(),
        }),
    }
}
