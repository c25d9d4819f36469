//! Partitions and the table-level partitioning strategy.

mod info;

pub use info::{
    PartitionInfo, PartitionKey, PartitionKind, PartitionRange, PartitionValue, RangePartitionInfo,
};

use crate::distribution::DistributionInfo;
use crate::error::{EncodingError, SchemaError};
use crate::index::MaterializedIndex;
use crate::persist::{MetaReader, MetaWriter, Persist, read_seq, write_seq};
use crate::types::{IndexId, META_VERSION_2, PartitionId, TabletId};

/// Version a freshly created partition is visible at.
pub const PARTITION_INIT_VERSION: i64 = 1;

/// A named slice of table data holding a base index and its rollups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    id: PartitionId,
    name: String,
    base_index: MaterializedIndex,
    rollups: Vec<MaterializedIndex>,
    distribution_info: DistributionInfo,
    visible_version: i64,
    next_version: i64,
}

impl Partition {
    pub fn new(
        id: PartitionId,
        name: impl Into<String>,
        base_index: MaterializedIndex,
        distribution_info: DistributionInfo,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            base_index,
            rollups: Vec::new(),
            distribution_info,
            visible_version: PARTITION_INIT_VERSION,
            next_version: PARTITION_INIT_VERSION + 1,
        }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_index(&self) -> &MaterializedIndex {
        &self.base_index
    }

    pub fn base_index_mut(&mut self) -> &mut MaterializedIndex {
        &mut self.base_index
    }

    pub fn distribution_info(&self) -> &DistributionInfo {
        &self.distribution_info
    }

    pub fn add_rollup_index(&mut self, index: MaterializedIndex) -> Result<(), SchemaError> {
        if self.index(index.id()).is_some() {
            return Err(SchemaError::DuplicateIndex(index.id()));
        }
        self.rollups.push(index);
        Ok(())
    }

    /// Remove a rollup. The base index cannot be removed.
    pub fn drop_rollup_index(&mut self, id: IndexId) -> Result<MaterializedIndex, SchemaError> {
        let pos = self
            .rollups
            .iter()
            .position(|idx| idx.id() == id)
            .ok_or(SchemaError::IndexNotFound(id))?;
        Ok(self.rollups.remove(pos))
    }

    pub fn index(&self, id: IndexId) -> Option<&MaterializedIndex> {
        if self.base_index.id() == id {
            return Some(&self.base_index);
        }
        self.rollups.iter().find(|idx| idx.id() == id)
    }

    pub fn index_mut(&mut self, id: IndexId) -> Option<&mut MaterializedIndex> {
        if self.base_index.id() == id {
            return Some(&mut self.base_index);
        }
        self.rollups.iter_mut().find(|idx| idx.id() == id)
    }

    /// The base index followed by rollups in insertion order.
    pub fn materialized_indexes(&self) -> impl Iterator<Item = &MaterializedIndex> + '_ {
        std::iter::once(&self.base_index).chain(self.rollups.iter())
    }

    /// Every tablet id under this partition, for cascade cleanup.
    pub fn tablet_ids(&self) -> Vec<TabletId> {
        self.materialized_indexes()
            .flat_map(MaterializedIndex::tablet_ids)
            .collect()
    }

    pub fn visible_version(&self) -> i64 {
        self.visible_version
    }

    pub fn next_version(&self) -> i64 {
        self.next_version
    }

    pub fn update_visible_version(&mut self, version: i64) -> Result<(), SchemaError> {
        if version < self.visible_version {
            return Err(SchemaError::VersionRegression {
                current: self.visible_version,
                requested: version,
            });
        }
        self.visible_version = version;
        self.next_version = self.next_version.max(version.saturating_add(1));
        Ok(())
    }
}

impl Persist for Partition {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_u64(self.id);
        w.put_str(&self.name)?;
        self.distribution_info.write_to(w)?;
        self.base_index.write_to(w)?;
        write_seq(w, self.rollups.iter())?;
        if w.context().has(META_VERSION_2) {
            w.put_i64(self.visible_version);
            w.put_i64(self.next_version);
        }
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let id = r.get_u64()?;
        let name = r.get_str("partition name")?;
        let distribution_info = DistributionInfo::read_from(r)?;
        let base_index = MaterializedIndex::read_from(r)?;
        let mut partition = Partition::new(id, name, base_index, distribution_info);
        for rollup in read_seq::<MaterializedIndex>(r)? {
            partition
                .add_rollup_index(rollup)
                .map_err(|e| EncodingError::Inconsistent(format!("partition {id}: {e}")))?;
        }
        if r.context().has(META_VERSION_2) {
            let visible_version = r.get_i64()?;
            let next_version = r.get_i64()?;
            if next_version <= visible_version {
                return Err(EncodingError::Inconsistent(format!(
                    "partition {id}: next version {next_version} not after visible version {visible_version}"
                )));
            }
            partition.visible_version = visible_version;
            partition.next_version = next_version;
        }
        Ok(partition)
    }
}
