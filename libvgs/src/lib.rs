//! # libvgs — Volume group snapshot reconciliation for RK8s
//!
//! `libvgs` is the reconciliation core of the group snapshot controller.  It
//! keeps a [`VolumeGroupSnapshot`] request and its backing
//! [`VolumeGroupSnapshotContent`] mutually consistent while users, the
//! controller itself and an external CSI driver mutate them independently.
//! Like the rest of RK8s it is built on `tracing` for observability and
//! `thiserror` for structured errors; the object store it talks to is an
//! `async-trait` seam so the watch/queue machinery stays outside the crate.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Object model: group snapshots, contents, classes, claims, volumes. |
//! | [`error`] | [`VgsError`] taxonomy and retry classification. |
//! | [`config`] | [`ControllerConfig`] read from the environment. |
//! | [`consts`] | Annotations, finalizer and naming shared with other tooling. |
//! | [`selector`] | Label selectors over volume claims. |
//! | [`snapshot_info`] | [`SnapshotInfoList`] member manifest and its JSON form. |
//! | [`membership`] | Owner-reference linkage between member snapshots and groups. |
//! | [`class`] | Group snapshot class resolution. |
//! | [`eligibility`] | Member claim/volume validation. |
//! | [`store`] | [`ObjectStore`] trait and the read-modify-write loop. |
//! | [`controller`] | [`GroupSnapshotController`] binding engine and deletion handling. |
//! | [`backend`] | In-memory [`ObjectStore`] implementation. |

pub mod backend;
pub mod class;
pub mod config;
pub mod consts;
pub mod controller;
mod deletion;
pub mod eligibility;
pub mod error;
pub mod membership;
pub mod selector;
pub mod snapshot_info;
mod status;
pub mod store;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use config::ControllerConfig;
pub use controller::GroupSnapshotController;
pub use error::{ErrorClass, VgsError};
pub use membership::MembershipIndex;
pub use snapshot_info::{SnapshotInfo, SnapshotInfoList};
pub use store::{ObjectStore, Resource};
pub use types::*;
