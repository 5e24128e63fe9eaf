//! Response bodies returned by storage nodes

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Extra headers stored with an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternHeaders {
    /// Present on folder markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floder: Option<Vec<String>>,
}

/// Object metadata from `/objects/metadetail`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub kind: i32,
    /// Modification time in unix seconds
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
    #[serde(rename = "extern-headers", default)]
    pub extern_headers: ExternHeaders,
}

impl MetaInfo {
    /// Folder markers are flagged through their extern headers
    pub(crate) fn normalize(mut self) -> Self {
        if self.extern_headers.floder.is_some() {
            self.is_dir = true;
        }
        self
    }

    pub fn modified(&self) -> Option<Timestamp> {
        Timestamp::from_second(self.time).ok()
    }
}

/// One entry of an object listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
}

impl ObjectEntry {
    pub fn modified(&self) -> Option<Timestamp> {
        Timestamp::from_second(self.time).ok()
    }
}

/// Page of objects returned for a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPage {
    #[serde(rename = "Data", default)]
    pub data: Vec<ObjectEntry>,
    #[serde(rename = "Len", default)]
    pub len: u64,
}

/// Bucket summary from `/objects/listbucket`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "SizeLimit", default)]
    pub size_limit: i64,
    #[serde(rename = "Time", default)]
    pub time: i64,
}

impl BucketInfo {
    pub fn created(&self) -> Option<Timestamp> {
        Timestamp::from_second(self.time).ok()
    }
}

/// Object record from `/objects/listobject/{bucket}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketObject {
    #[serde(default)]
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub time: i64,
}
