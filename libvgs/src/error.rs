//! Group snapshot error types.
//!
//! Every failure the reconciliation core can observe is a [`VgsError`].  The
//! `Display` text of each variant is the operator-facing message written into
//! `status.error`, so the wording (and the identifiers it embeds) is part of
//! the external contract.

use thiserror::Error;

/// Unified error type for group snapshot reconciliation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VgsError {
    /// The explicitly requested group snapshot class does not exist.
    #[error("volumegroupsnapshotclass.groupsnapshot.storage.k8s.io {0:?} not found")]
    ClassNotFound(String),

    /// No class was named and no default class exists.
    #[error("failed to take group snapshot {0} without a group snapshot class")]
    NoClassSpecified(String),

    /// No class was named and more than one class claims to be the default.
    #[error("{count} default group snapshot classes were found for group snapshot {group}")]
    AmbiguousDefaultClass {
        /// Name of the group snapshot being provisioned.
        group: String,
        /// Number of classes carrying the default marker.
        count: usize,
    },

    /// The label selector matched no claim in the namespace.
    #[error("label selector {0} for group snapshot not applied to any PVC")]
    NoMatchingVolumes(String),

    /// A selected claim is not bound to a volume yet.
    #[error("the PVC {0} is not yet bound to a PV, will not attempt to take a group snapshot")]
    ClaimNotBound(String),

    /// A selected volume was not provisioned by a CSI driver.
    #[error("cannot snapshot a non-CSI volume for group snapshot {group}: {volume}")]
    NonCsiVolume {
        /// `<namespace>/<name>` of the group snapshot.
        group: String,
        /// Offending volume name.
        volume: String,
    },

    /// A selected volume belongs to a different driver than the class.
    #[error(
        "Volume CSI driver ({volume_driver}) mismatch with VolumeGroupSnapshotClass ({class_driver}) {group}: {volume}"
    )]
    DriverMismatch {
        /// Driver named by the resolved class.
        class_driver: String,
        /// Driver that provisioned the volume.
        volume_driver: String,
        /// `<namespace>/<name>` of the group snapshot.
        group: String,
        /// Offending volume name.
        volume: String,
    },

    /// The content's back-reference points at another group snapshot.
    #[error("VolumeGroupSnapshotContent [{0}] is bound to a different group snapshot")]
    BindingConflict(String),

    /// Validation of the dynamic provisioning inputs failed.
    #[error("failed to get input parameters to create group snapshot {group}: {:?}", .source.to_string())]
    InputParameters {
        /// Name of the group snapshot being provisioned.
        group: String,
        /// Underlying cause.
        source: Box<VgsError>,
    },

    /// The content a ready group snapshot is bound to has disappeared.
    #[error("VolumeGroupSnapshotContent [{0}] bound to a ready group snapshot is missing")]
    ContentMissing(String),

    /// A bound claim references a volume absent from the volume listing.
    #[error("cannot find volume {0}")]
    VolumeNotFound(String),

    /// A bound claim references a volume that could not be read.
    #[error("failed to retrieve PV {volume} from the API server: {:?}", .source.to_string())]
    VolumeLookup {
        /// Volume name referenced by the claim.
        volume: String,
        /// Underlying cause.
        source: Box<VgsError>,
    },

    /// The object does not exist in the store.
    #[error("{resource} {name:?} not found")]
    NotFound {
        /// Qualified resource name, e.g. `persistentvolume`.
        resource: &'static str,
        /// Object name.
        name: String,
    },

    /// An object with the same name already exists.
    #[error("{resource} {name:?} already exists")]
    AlreadyExists {
        /// Qualified resource name.
        resource: &'static str,
        /// Object name.
        name: String,
    },

    /// An update was built from a stale read.
    #[error(
        "operation cannot be fulfilled on {resource} {name:?}: the object has been modified; please apply your changes to the latest version and try again"
    )]
    Conflict {
        /// Qualified resource name.
        resource: &'static str,
        /// Object name.
        name: String,
    },

    /// An object or manifest could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Whether redelivering the same key can be expected to make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The condition may clear on its own (eventual consistency, races).
    Transient,
    /// The condition needs a user or operator to change something.
    Terminal,
}

impl VgsError {
    /// Create a [`VgsError::Serialization`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    /// Create a [`VgsError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Wrap a provisioning input failure for the named group snapshot.
    pub fn input_parameters(group: &str, source: VgsError) -> Self {
        Self::InputParameters {
            group: group.to_owned(),
            source: Box::new(source),
        }
    }

    /// Classify the error for the external retry policy.
    ///
    /// Wrapping variants take the class of their cause.
    pub fn classification(&self) -> ErrorClass {
        match self {
            Self::InputParameters { source, .. } | Self::VolumeLookup { source, .. } => {
                source.classification()
            }
            Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::Conflict { .. }
            | Self::ContentMissing(_)
            | Self::VolumeNotFound(_) => ErrorClass::Transient,
            _ => ErrorClass::Terminal,
        }
    }

    /// Shorthand for `classification() == ErrorClass::Transient`.
    pub fn is_transient(&self) -> bool {
        self.classification() == ErrorClass::Transient
    }

    /// `true` if the group's readiness can no longer be trusted.
    pub fn invalidates_readiness(&self) -> bool {
        matches!(self, Self::ContentMissing(_))
    }

    /// `true` for an optimistic concurrency conflict.  Conflicts are only
    /// handed back for redelivery, never recorded in status.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// `true` if this is a store-level [`VgsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
