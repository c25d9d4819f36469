//! Error types for all catalog operations.

use std::io;
use thiserror::Error;

use crate::types::{DbId, IndexId, PartitionId, ReplicaId, ShardId, TableId, TabletId};

/// Top-level error type for catalog operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Shard(#[from] ShardError),
}

/// Coarse classification of an [`Error`].
///
/// Callers use this to decide on a fallback without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad DDL input (missing aggregate type, invalid replication factor, ...).
    Definition,
    /// An entity with the same identifier (or name) already exists.
    Duplicate,
    /// A referenced entity or per-partition property does not exist.
    NotFound,
    /// A persisted stream is malformed. The whole read must be discarded.
    Corruption,
    /// File I/O failed while saving or loading a catalog image.
    Io,
    /// The shard-management service failed.
    Shard,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Schema(e) => e.kind(),
            Error::Encoding(_) => ErrorKind::Corruption,
            Error::Storage(_) => ErrorKind::Io,
            Error::Shard(_) => ErrorKind::Shard,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("schema must contain at least one column")]
    EmptySchema,

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("non-key column '{0}' requires an aggregate type in an aggregate-keys table")]
    MissingAggregateType(String),

    #[error("column '{0}' must not have an aggregate type")]
    UnexpectedAggregateType(String),

    #[error("bucket number must be positive (got {0})")]
    InvalidBucketNum(u32),

    #[error("hash distribution requires at least one column")]
    EmptyDistributionColumns,

    #[error("distribution column '{0}' does not exist in the schema")]
    UnknownDistributionColumn(String),

    #[error("distribution column '{0}' is not a key column")]
    DistributionColumnNotKey(String),

    #[error("invalid replication number {replication_num} for partition {partition_id}")]
    InvalidReplicationNum {
        partition_id: PartitionId,
        replication_num: i16,
    },

    #[error("invalid partition range: {0}")]
    InvalidRange(String),

    #[error("range of partition {partition_id} overlaps partition {existing}")]
    RangeOverlap {
        partition_id: PartitionId,
        existing: PartitionId,
    },

    #[error("partition base index {actual} does not match table base index {expected}")]
    BaseIndexMismatch { expected: IndexId, actual: IndexId },

    #[error("tablet {tablet_id} meta references index {actual}, expected index {expected}")]
    TabletMetaMismatch {
        tablet_id: TabletId,
        expected: IndexId,
        actual: IndexId,
    },

    #[error("tablet {tablet_id} meta disagrees with its position in the catalog on {field}")]
    TabletMetaConflict {
        tablet_id: TabletId,
        field: &'static str,
    },

    #[error("tablet meta references index {actual}, expected index {expected}")]
    IndexMetaMismatch { expected: IndexId, actual: IndexId },

    #[error("visible version cannot move backwards: current {current}, requested {requested}")]
    VersionRegression { current: i64, requested: i64 },

    #[error("table {0} is not a lake table")]
    NotLakeTable(TableId),

    #[error("lake table {0} has no shard storage info")]
    MissingShardStorageInfo(TableId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database already exists: {0}")]
    DuplicateDatabase(DbId),

    #[error("database name already exists: {0}")]
    DuplicateDatabaseName(String),

    #[error("table already exists: {0}")]
    DuplicateTable(TableId),

    #[error("table name already exists: {0}")]
    DuplicateTableName(String),

    #[error("partition already exists: {0}")]
    DuplicatePartition(PartitionId),

    #[error("partition name already exists: {0}")]
    DuplicatePartitionName(String),

    #[error("index already exists: {0}")]
    DuplicateIndex(IndexId),

    #[error("index name already exists: {0}")]
    DuplicateIndexName(String),

    #[error("tablet already exists: {0}")]
    DuplicateTablet(TabletId),

    #[error("replica already exists: {0}")]
    DuplicateReplica(ReplicaId),

    #[error("database not found: {0}")]
    DatabaseNotFound(DbId),

    #[error("table not found: {0}")]
    TableNotFound(TableId),

    #[error("partition not found: {0}")]
    PartitionNotFound(PartitionId),

    #[error("index not found: {0}")]
    IndexNotFound(IndexId),

    #[error("index meta not found: {0}")]
    IndexMetaNotFound(IndexId),

    #[error("tablet not found: {0}")]
    TabletNotFound(TabletId),

    #[error("replica not found: {0}")]
    ReplicaNotFound(ReplicaId),

    #[error("replication number not set for partition {0}")]
    ReplicationNumNotFound(PartitionId),
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        use SchemaError::*;
        match self {
            DuplicateColumn(_)
            | DuplicateDatabase(_)
            | DuplicateDatabaseName(_)
            | DuplicateTable(_)
            | DuplicateTableName(_)
            | DuplicatePartition(_)
            | DuplicatePartitionName(_)
            | DuplicateIndex(_)
            | DuplicateIndexName(_)
            | DuplicateTablet(_)
            | DuplicateReplica(_) => ErrorKind::Duplicate,
            DatabaseNotFound(_)
            | TableNotFound(_)
            | PartitionNotFound(_)
            | IndexNotFound(_)
            | IndexMetaNotFound(_)
            | TabletNotFound(_)
            | ReplicaNotFound(_)
            | ReplicationNumNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Definition,
        }
    }
}

/// Corruption of a persisted catalog stream.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("stream truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown {family} variant tag: {tag}")]
    UnknownVariant { family: &'static str, tag: u8 },

    #[error("{family} body length mismatch: declared {declared}, consumed {consumed}")]
    LengthMismatch {
        family: &'static str,
        declared: usize,
        consumed: usize,
    },

    #[error("{0} trailing bytes after end of stream")]
    TrailingBytes(usize),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: u64 },

    #[error("unsupported meta version: {0}")]
    UnsupportedMetaVersion(u32),

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("image checksum mismatch: stored={stored:#018x}, computed={computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("malformed shard storage info: {0}")]
    StorageInfo(#[source] serde_json::Error),

    #[error("inconsistent catalog graph: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures reported by a [`ShardManager`](crate::lake::ShardManager).
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("shard service unavailable: {0}")]
    Unavailable(String),

    #[error("shard not found: {0}")]
    ShardNotFound(ShardId),
}

pub type Result<T> = std::result::Result<T, Error>;
