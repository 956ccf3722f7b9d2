//! In-memory object store.
//!
//! [`MemoryStore`] implements [`ObjectStore`] on top of a concurrent map of
//! JSON documents.  It enforces the same contract as the real control plane
//! (unique names, conditional updates on `resourceVersion`, store-assigned
//! UIDs) and can be primed with failures to exercise error paths.
//!
//! # Layout
//!
//! ```text
//! (kind, namespace, name) -> JSON document
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::VgsError;
use crate::store::{ObjectStore, Resource};

/// Store operation, used to target injected errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
}

/// A failure returned instead of performing the next matching operation.
#[derive(Debug, Clone)]
pub struct InjectedError {
    pub verb: Verb,
    /// Kind name as in [`Resource::KIND`].
    pub kind: &'static str,
    pub error: VgsError,
}

type ObjectKey = (&'static str, String, String);

/// Concurrent in-memory [`ObjectStore`].
///
/// # Thread safety
///
/// Objects live in a [`DashMap`]; each conditional update holds the entry
/// lock between the version check and the write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectKey, serde_json::Value>,
    /// Pending injected failures, consumed in order.
    injected: Mutex<Vec<InjectedError>>,
    /// Successful create, update and delete calls.
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `obj` as-is, bypassing name and version checks.
    ///
    /// Meant for priming the store; a zero `resourceVersion` becomes `1`.
    pub fn seed<R: Resource>(&self, obj: &R) -> Result<(), VgsError> {
        let mut obj = obj.clone();
        if obj.metadata().resource_version == 0 {
            obj.metadata_mut().resource_version = 1;
        }
        let value = serde_json::to_value(&obj).map_err(VgsError::serialization)?;
        self.objects.insert(Self::key_of(&obj), value);
        Ok(())
    }

    /// Queue a failure for the next `verb` on `kind`.
    pub fn inject_error(&self, verb: Verb, kind: &'static str, error: VgsError) {
        self.lock_injected().push(InjectedError { verb, kind, error });
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All stored objects of a kind, sorted by namespace and name.
    pub fn objects<R: Resource>(&self) -> Result<Vec<R>, VgsError> {
        let mut found: Vec<R> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == R::KIND)
            .map(|entry| serde_json::from_value(entry.value().clone()))
            .collect::<Result<_, _>>()
            .map_err(VgsError::serialization)?;
        found.sort_by(|a, b| {
            (&a.metadata().namespace, &a.metadata().name)
                .cmp(&(&b.metadata().namespace, &b.metadata().name))
        });
        Ok(found)
    }

    fn key_of<R: Resource>(obj: &R) -> ObjectKey {
        let meta = obj.metadata();
        (R::KIND, meta.namespace.clone(), meta.name.clone())
    }

    fn lock_injected(&self) -> std::sync::MutexGuard<'_, Vec<InjectedError>> {
        self.injected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_injected(&self, verb: Verb, kind: &'static str) -> Result<(), VgsError> {
        let mut injected = self.lock_injected();
        match injected.iter().position(|e| e.verb == verb && e.kind == kind) {
            Some(idx) => {
                let failure = injected.remove(idx);
                debug!(?verb, %kind, error = %failure.error, "returning injected error");
                Err(failure.error)
            }
            None => Ok(()),
        }
    }

    fn decode<R: Resource>(value: &serde_json::Value) -> Result<R, VgsError> {
        serde_json::from_value(value.clone()).map_err(VgsError::serialization)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> Result<R, VgsError> {
        self.take_injected(Verb::Get, R::KIND)?;
        let key = (R::KIND, namespace.to_owned(), name.to_owned());
        match self.objects.get(&key) {
            Some(value) => Self::decode(value.value()),
            None => Err(VgsError::NotFound {
                resource: R::RESOURCE,
                name: name.to_owned(),
            }),
        }
    }

    async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, VgsError> {
        self.take_injected(Verb::List, R::KIND)?;
        let all = self.objects::<R>()?;
        Ok(match namespace {
            Some(ns) => all
                .into_iter()
                .filter(|obj| obj.metadata().namespace == ns)
                .collect(),
            None => all,
        })
    }

    #[instrument(skip_all, fields(kind = R::KIND, name = %obj.metadata().name))]
    async fn create<R: Resource>(&self, obj: &R) -> Result<R, VgsError> {
        self.take_injected(Verb::Create, R::KIND)?;
        let mut created = obj.clone();
        let meta = created.metadata_mut();
        if meta.uid.is_empty() {
            meta.uid = uuid::Uuid::new_v4().to_string();
        }
        meta.resource_version = 1;
        meta.creation_timestamp.get_or_insert_with(Utc::now);

        let value = serde_json::to_value(&created).map_err(VgsError::serialization)?;
        match self.objects.entry(Self::key_of(&created)) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(VgsError::AlreadyExists {
                    resource: R::RESOURCE,
                    name: created.metadata().name.clone(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
        self.record_write();
        debug!("object created");
        Ok(created)
    }

    #[instrument(skip_all, fields(kind = R::KIND, name = %obj.metadata().name))]
    async fn update<R: Resource>(&self, obj: &R) -> Result<R, VgsError> {
        self.take_injected(Verb::Update, R::KIND)?;
        let key = Self::key_of(obj);
        let not_found = || VgsError::NotFound {
            resource: R::RESOURCE,
            name: obj.metadata().name.clone(),
        };
        let mut slot = self.objects.get_mut(&key).ok_or_else(not_found)?;

        let stored: R = Self::decode(slot.value())?;
        if stored.metadata().resource_version != obj.metadata().resource_version {
            return Err(VgsError::Conflict {
                resource: R::RESOURCE,
                name: obj.metadata().name.clone(),
            });
        }

        let mut updated = obj.clone();
        updated.metadata_mut().resource_version += 1;
        *slot.value_mut() = serde_json::to_value(&updated).map_err(VgsError::serialization)?;
        drop(slot);

        self.record_write();
        debug!(
            resource_version = updated.metadata().resource_version,
            "object updated"
        );
        Ok(updated)
    }

    #[instrument(skip(self), fields(kind = R::KIND))]
    async fn delete<R: Resource>(&self, namespace: &str, name: &str) -> Result<(), VgsError> {
        self.take_injected(Verb::Delete, R::KIND)?;
        let key = (R::KIND, namespace.to_owned(), name.to_owned());
        if self.objects.remove(&key).is_none() {
            return Err(VgsError::NotFound {
                resource: R::RESOURCE,
                name: name.to_owned(),
            });
        }
        self.record_write();
        debug!("object deleted");
        Ok(())
    }
}
