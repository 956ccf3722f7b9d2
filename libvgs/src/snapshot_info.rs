//! Manifest of which claim/volume pair each driver volume handle belongs to.
//!
//! The list keeps insertion order and does not enforce unique handles;
//! lookups return the first match, or an empty [`SnapshotInfo`] when nothing
//! matches.

use serde::{Deserialize, Serialize};

use crate::error::VgsError;

/// Basic information about one volume being snapshotted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub volume_handle: String,
    pub pv_name: String,
    pub pvc_name: String,
}

/// Ordered set of [`SnapshotInfo`] records, serialized as a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SnapshotInfoList(pub Vec<SnapshotInfo>);

impl SnapshotInfoList {
    pub fn to_json(&self) -> Result<String, VgsError> {
        serde_json::to_string(&self.0).map_err(|e| {
            VgsError::Serialization(format!("while serializing SnapshotInfoList: {e}"))
        })
    }

    /// Parse a list produced by [`Self::to_json`].  `null` reads as empty.
    pub fn from_json(content: &str) -> Result<Self, VgsError> {
        let entries: Option<Vec<SnapshotInfo>> =
            serde_json::from_str(content).map_err(|e| {
                VgsError::Serialization(format!("while de-serializing SnapshotInfoList: {e}"))
            })?;
        Ok(Self(entries.unwrap_or_default()))
    }

    pub fn get_from_volume_handle(&self, volume_handle: &str) -> SnapshotInfo {
        self.find(|info| info.volume_handle == volume_handle)
    }

    pub fn get_from_pv_name(&self, pv_name: &str) -> SnapshotInfo {
        self.find(|info| info.pv_name == pv_name)
    }

    /// Volume handles in list order.
    pub fn volume_handles(&self) -> Vec<String> {
        self.0.iter().map(|info| info.volume_handle.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn find(&self, pred: impl Fn(&SnapshotInfo) -> bool) -> SnapshotInfo {
        self.0.iter().find(|info| pred(info)).cloned().unwrap_or_default()
    }
}

impl From<Vec<SnapshotInfo>> for SnapshotInfoList {
    fn from(entries: Vec<SnapshotInfo>) -> Self {
        Self(entries)
    }
}
