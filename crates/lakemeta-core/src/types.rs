//! Core types: catalog identifiers, meta versions, storage enums.

use serde::{Deserialize, Serialize};

/// Database identifier.
pub type DbId = u64;

/// Table identifier, unique across the catalog.
pub type TableId = u64;

/// Partition identifier.
pub type PartitionId = u64;

/// Materialized index identifier.
pub type IndexId = u64;

/// Tablet identifier, unique across the catalog.
pub type TabletId = u64;

/// Identifier of a shard in the external shard-management service.
///
/// A lake tablet's id and its shard id are the same value.
pub type ShardId = u64;

/// Replica identifier.
pub type ReplicaId = u64;

/// Backend (storage node) identifier.
pub type BackendId = u64;

/// First meta version: base format.
pub const META_VERSION_1: u32 = 1;

/// Adds `MaterializedIndex::row_count` and partition visible/next versions.
pub const META_VERSION_2: u32 = 2;

/// Adds column `comment` and `allow_null`.
pub const META_VERSION_3: u32 = 3;

/// Oldest meta version this crate can still read.
pub const META_VERSION_MIN: u32 = META_VERSION_1;

/// Meta version written by default.
pub const META_VERSION_CURRENT: u32 = META_VERSION_3;

/// Replication factor applied to single-partition tables when none is set.
pub const DEFAULT_REPLICATION_NUM: i16 = 3;

/// Storage medium of a partition's tablets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageMedium {
    #[default]
    Hdd,
    Ssd,
}

impl StorageMedium {
    pub fn as_u8(self) -> u8 {
        match self {
            StorageMedium::Hdd => 0,
            StorageMedium::Ssd => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageMedium::Hdd),
            1 => Some(StorageMedium::Ssd),
            _ => None,
        }
    }
}

/// Physical layout of an index's data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageType {
    Row,
    #[default]
    Column,
}

impl StorageType {
    pub fn as_u8(self) -> u8 {
        match self {
            StorageType::Row => 0,
            StorageType::Column => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageType::Row),
            1 => Some(StorageType::Column),
            _ => None,
        }
    }
}
