//! Tables: the root of the catalog ownership chain.
//!
//! [`Table`] is a tagged union over the concrete table kinds. A table stream
//! is `[meta_version u32][tag u8][body_len u32][body]`; the tag selects the
//! reader through the table registry, so a lake table comes back as a lake
//! table without inspecting its tablets.

mod lake;
mod olap;

pub use lake::LakeTable;
pub use olap::OlapTable;

use crate::config::MetaContext;
use crate::error::EncodingError;
use crate::persist::{self, MetaReader, MetaWriter, Persist, Registry, Variant};
use crate::types::TableId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
    Olap(OlapTable),
    Lake(LakeTable),
}

const TAG_OLAP_TABLE: u8 = 1;
const TAG_LAKE_TABLE: u8 = 2;

static TABLE_VARIANTS: Registry<Table> = Registry::new(
    "table",
    &[
        Variant {
            tag: TAG_OLAP_TABLE,
            name: "olap",
            read: read_olap_table,
        },
        Variant {
            tag: TAG_LAKE_TABLE,
            name: "lake",
            read: read_lake_table,
        },
    ],
);

fn read_olap_table(r: &mut MetaReader<'_>) -> Result<Table, EncodingError> {
    Ok(Table::Olap(OlapTable::read_from(r)?))
}

fn read_lake_table(r: &mut MetaReader<'_>) -> Result<Table, EncodingError> {
    Ok(Table::Lake(LakeTable::read_from(r)?))
}

impl Table {
    pub fn id(&self) -> TableId {
        self.olap().id()
    }

    pub fn name(&self) -> &str {
        self.olap().name()
    }

    pub fn is_lake_table(&self) -> bool {
        matches!(self, Table::Lake(_))
    }

    /// The OLAP part shared by every table kind.
    pub fn olap(&self) -> &OlapTable {
        match self {
            Table::Olap(t) => t,
            Table::Lake(t) => t.olap(),
        }
    }

    pub fn olap_mut(&mut self) -> &mut OlapTable {
        match self {
            Table::Olap(t) => t,
            Table::Lake(t) => t.olap_mut(),
        }
    }

    pub fn as_lake(&self) -> Option<&LakeTable> {
        match self {
            Table::Lake(t) => Some(t),
            Table::Olap(_) => None,
        }
    }

    pub fn as_lake_mut(&mut self) -> Option<&mut LakeTable> {
        match self {
            Table::Lake(t) => Some(t),
            Table::Olap(_) => None,
        }
    }

    /// Serialize into a self-describing stream at `ctx`'s meta version.
    pub fn write(&self, ctx: MetaContext) -> Result<Vec<u8>, EncodingError> {
        persist::encode(self, ctx)
    }

    /// Rebuild a table from a stream produced by [`write`](Self::write).
    pub fn read(data: &[u8]) -> Result<Table, EncodingError> {
        persist::decode(data)
    }

    fn tag(&self) -> u8 {
        match self {
            Table::Olap(_) => TAG_OLAP_TABLE,
            Table::Lake(_) => TAG_LAKE_TABLE,
        }
    }
}

impl From<OlapTable> for Table {
    fn from(table: OlapTable) -> Self {
        Table::Olap(table)
    }
}

impl From<LakeTable> for Table {
    fn from(table: LakeTable) -> Self {
        Table::Lake(table)
    }
}

impl Persist for Table {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_variant(self.tag(), |w| match self {
            Table::Olap(t) => t.write_to(w),
            Table::Lake(t) => t.write_to(w),
        })
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        r.get_variant(&TABLE_VARIANTS)
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use crate::distribution::DistributionInfo;
    use crate::index::MaterializedIndexMeta;
    use crate::lake::{ObjectStorageInfo, ShardStorageInfo};
    use crate::partition::PartitionInfo;
    use crate::schema::{AggregateType, Column, ColumnType, KeysType};
    use crate::types::StorageType;

    /// `k1 INT`, `k2 BIGINT` keys and `v BIGINT SUM DEFAULT "0"`.
    pub(crate) fn sample_columns() -> Vec<Column> {
        vec![
            Column::key("k1", ColumnType::Int).unwrap(),
            Column::key("k2", ColumnType::BigInt).unwrap(),
            Column::new(
                "v",
                ColumnType::BigInt,
                false,
                Some(AggregateType::Sum),
                Some("0".to_string()),
                "",
            )
            .unwrap(),
        ]
    }

    pub(crate) fn base_index_meta() -> MaterializedIndexMeta {
        MaterializedIndexMeta {
            index_id: 4,
            name: "t1".to_string(),
            schema: sample_columns(),
            schema_version: 0,
            schema_hash: 77,
            short_key_column_count: 2,
            storage_type: StorageType::Column,
            keys_type: KeysType::AggKeys,
        }
    }

    /// Table 2 "t1", single partitioned, base index 4 registered.
    pub(crate) fn sample_table() -> OlapTable {
        let k1 = Column::key("k1", ColumnType::Int).unwrap();
        let mut table = OlapTable::new(
            2,
            "t1",
            sample_columns(),
            KeysType::AggKeys,
            PartitionInfo::single(),
            DistributionInfo::hash(10, vec![k1]).unwrap(),
        )
        .unwrap();
        table.set_base_index_id(4).unwrap();
        table.set_index_meta(base_index_meta()).unwrap();
        table
    }

    pub(crate) fn storage_info() -> ShardStorageInfo {
        ShardStorageInfo::new(ObjectStorageInfo::new(
            "s3://bucket/service/",
            "region.host.com",
        ))
    }

    pub(crate) fn lake_table() -> LakeTable {
        let mut table = LakeTable::new(sample_table());
        table.set_shard_storage_info(storage_info());
        table
    }
}
