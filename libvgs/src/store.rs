//! Object store collaborator.
//!
//! The controller never caches or locks objects itself.  Every read is a
//! snapshot of the store, and every write is conditional on the
//! `resourceVersion` it was computed from.  [`update_with_retry`] is the
//! read-modify-write loop built on top of that contract.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::VgsError;
use crate::types::*;

/// A storable object kind.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name, e.g. `VolumeGroupSnapshot`.
    const KIND: &'static str;
    /// Qualified resource name used in store error messages.
    const RESOURCE: &'static str;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

macro_rules! impl_resource {
    ($ty:ty, $kind:literal, $resource:literal) => {
        impl Resource for $ty {
            const KIND: &'static str = $kind;
            const RESOURCE: &'static str = $resource;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

impl_resource!(
    VolumeGroupSnapshot,
    "VolumeGroupSnapshot",
    "volumegroupsnapshot.groupsnapshot.storage.k8s.io"
);
impl_resource!(
    VolumeGroupSnapshotContent,
    "VolumeGroupSnapshotContent",
    "volumegroupsnapshotcontent.groupsnapshot.storage.k8s.io"
);
impl_resource!(
    VolumeGroupSnapshotClass,
    "VolumeGroupSnapshotClass",
    "volumegroupsnapshotclass.groupsnapshot.storage.k8s.io"
);
impl_resource!(
    PersistentVolumeClaim,
    "PersistentVolumeClaim",
    "persistentvolumeclaim"
);
impl_resource!(PersistentVolume, "PersistentVolume", "persistentvolume");
impl_resource!(
    VolumeSnapshot,
    "VolumeSnapshot",
    "volumesnapshot.snapshot.storage.k8s.io"
);

/// Backing store of control-plane objects.
///
/// Cluster-scoped kinds use an empty namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object, or [`VgsError::NotFound`].
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> Result<R, VgsError>;

    /// List objects of a kind, restricted to `namespace` when given.
    async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, VgsError>;

    /// Create an object.  Fails with [`VgsError::AlreadyExists`] if the name
    /// is taken.
    async fn create<R: Resource>(&self, obj: &R) -> Result<R, VgsError>;

    /// Replace an object.  Fails with [`VgsError::Conflict`] if `obj` was not
    /// read at the stored `resourceVersion`.
    async fn update<R: Resource>(&self, obj: &R) -> Result<R, VgsError>;

    /// Delete an object, or [`VgsError::NotFound`].
    async fn delete<R: Resource>(&self, namespace: &str, name: &str) -> Result<(), VgsError>;
}

/// Read, mutate and conditionally write one object, reloading on conflict.
///
/// `mutate` returns whether it changed the object; nothing is written when it
/// returns `false`, and the freshly read object is returned instead.  A
/// conflict is retried up to `retries` times before it is returned.
pub async fn update_with_retry<S, R, F>(
    store: &S,
    namespace: &str,
    name: &str,
    retries: u32,
    mut mutate: F,
) -> Result<R, VgsError>
where
    S: ObjectStore,
    R: Resource,
    F: FnMut(&mut R) -> bool + Send,
{
    let mut attempt = 0;
    loop {
        let mut obj: R = store.get(namespace, name).await?;
        if !mutate(&mut obj) {
            return Ok(obj);
        }
        match store.update(&obj).await {
            Err(VgsError::Conflict { .. }) if attempt < retries => {
                attempt += 1;
                debug!(kind = R::KIND, %namespace, %name, attempt, "update conflict, reloading");
            }
            result => return result,
        }
    }
}
