//! # lakemeta
//!
//! Catalog metadata for an analytic database whose tables may keep their
//! data in an object store.
//!
//! The catalog is a strict ownership tree: a [`Table`](table::Table) owns
//! its partitions, a [`Partition`](partition::Partition) owns one base and
//! any number of rollup [`MaterializedIndex`](index::MaterializedIndex)es,
//! and an index owns its [`Tablet`](tablet::Tablet)s. Lake tables and lake
//! tablets are variants of the same entities, persisted through a versioned
//! binary format that tags every polymorphic value so it is read back as
//! the same variant.
//!
//! ## Quick Start
//!
//! ```
//! use lakemeta_core::config::MetaContext;
//! use lakemeta_core::distribution::DistributionInfo;
//! use lakemeta_core::index::{IndexState, MaterializedIndex, MaterializedIndexMeta};
//! use lakemeta_core::lake::{
//!     create_lake_tablets, InMemoryShardManager, ObjectStorageInfo, ShardStorageInfo,
//! };
//! use lakemeta_core::partition::{Partition, PartitionInfo};
//! use lakemeta_core::schema::{AggregateType, Column, ColumnType, KeysType};
//! use lakemeta_core::table::{LakeTable, OlapTable, Table};
//! use lakemeta_core::tablet::TabletMeta;
//! use lakemeta_core::types::{StorageMedium, StorageType};
//!
//! let k1 = Column::key("k1", ColumnType::Int).unwrap();
//! let v = Column::new("v", ColumnType::BigInt, false, Some(AggregateType::Sum), None, "")
//!     .unwrap();
//! let columns = vec![k1.clone(), v];
//!
//! let mut olap = OlapTable::new(
//!     2,
//!     "t1",
//!     columns.clone(),
//!     KeysType::AggKeys,
//!     PartitionInfo::single(),
//!     DistributionInfo::hash(2, vec![k1.clone()]).unwrap(),
//! )
//! .unwrap();
//! olap.set_base_index_id(4).unwrap();
//! olap.set_index_meta(MaterializedIndexMeta {
//!     index_id: 4,
//!     name: "t1".to_string(),
//!     schema: columns,
//!     schema_version: 0,
//!     schema_hash: 0,
//!     short_key_column_count: 1,
//!     storage_type: StorageType::Column,
//!     keys_type: KeysType::AggKeys,
//! })
//! .unwrap();
//!
//! let mut table = LakeTable::new(olap);
//! table.set_shard_storage_info(ShardStorageInfo::new(ObjectStorageInfo::new(
//!     "s3://bucket/service/",
//!     "region.host.com",
//! )));
//!
//! // One lake tablet per allocated shard.
//! let shards = InMemoryShardManager::new(10);
//! let meta = TabletMeta::new(1, 2, 3, 4, 0, StorageMedium::Hdd);
//! let mut index = MaterializedIndex::new(4, IndexState::Normal);
//! create_lake_tablets(&shards, &table, &mut index, &meta, 2).unwrap();
//!
//! let dist = DistributionInfo::hash(2, vec![k1]).unwrap();
//! table
//!     .olap_mut()
//!     .add_partition(Partition::new(3, "p1", index, dist))
//!     .unwrap();
//!
//! let bytes = Table::from(table).write(MetaContext::current()).unwrap();
//! let read = Table::read(&bytes).unwrap();
//! assert!(read.is_lake_table());
//! assert_eq!(
//!     read.as_lake().unwrap().storage_group().as_deref(),
//!     Some("s3://bucket/service/2/")
//! );
//! ```

pub mod catalog;
pub mod config;
pub mod distribution;
pub mod error;
pub mod index;
pub mod inverted;
pub mod lake;
pub mod partition;
pub mod persist;
pub mod schema;
pub mod table;
pub mod tablet;
pub mod types;

pub use catalog::{Catalog, Database, SharedCatalog};
pub use config::{CatalogConfig, MetaContext};
pub use error::{Error, ErrorKind, Result};
pub use table::{LakeTable, OlapTable, Table};
