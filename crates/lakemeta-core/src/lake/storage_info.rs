use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Location and credentials of the object store backing a lake table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageInfo {
    /// Root URI of the backend service, e.g. `s3://bucket/service/`.
    pub object_uri: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key_secret: String,
}

impl ObjectStorageInfo {
    pub fn new(object_uri: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            object_uri: object_uri.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Backend configuration attached to a lake table.
///
/// The catalog treats this as an opaque block: it is encoded by
/// [`to_bytes`](Self::to_bytes) and embedded length-prefixed in the table
/// stream. `properties` carries backend-specific extension fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStorageInfo {
    pub object_storage_info: ObjectStorageInfo,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ShardStorageInfo {
    pub fn new(object_storage_info: ObjectStorageInfo) -> Self {
        Self {
            object_storage_info,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn object_uri(&self) -> &str {
        &self.object_storage_info.object_uri
    }

    pub fn endpoint(&self) -> &str {
        &self.object_storage_info.endpoint
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        serde_json::to_vec(self).map_err(EncodingError::StorageInfo)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        serde_json::from_slice(bytes).map_err(EncodingError::StorageInfo)
    }
}
