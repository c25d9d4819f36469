use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::distribution::DistributionInfo;
use crate::error::{EncodingError, SchemaError};
use crate::index::MaterializedIndexMeta;
use crate::partition::{Partition, PartitionInfo, PartitionKind};
use crate::persist::{MetaReader, MetaWriter, Persist, read_seq, write_seq};
use crate::schema::{Column, KeysType, find_column, validate_schema};
use crate::tablet::{Tablet, TabletMeta};
use crate::types::{
    DEFAULT_REPLICATION_NUM, DbId, IndexId, PartitionId, StorageMedium, TableId, TabletId,
};

/// A table whose tablets are stored by the analytic engine itself.
///
/// Owns its partitions; each partition owns its indexes and tablets.
/// Index schemas live here, keyed by index id, and must be registered with
/// [`set_index_meta`](Self::set_index_meta) before a partition using the
/// index is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlapTable {
    id: TableId,
    name: String,
    columns: Vec<Column>,
    keys_type: KeysType,
    partition_info: PartitionInfo,
    distribution_info: DistributionInfo,
    base_index_id: IndexId,
    index_metas: BTreeMap<IndexId, MaterializedIndexMeta>,
    partitions: BTreeMap<PartitionId, Partition>,
}

impl OlapTable {
    /// Create a table with no partitions.
    ///
    /// The base index id starts out equal to the table id.
    pub fn new(
        id: TableId,
        name: impl Into<String>,
        columns: Vec<Column>,
        keys_type: KeysType,
        partition_info: PartitionInfo,
        distribution_info: DistributionInfo,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName("table"));
        }
        validate_schema(&columns, keys_type)?;
        distribution_info.validate_against(&columns)?;
        if let Some(range) = partition_info.range_info() {
            for col in range.columns() {
                if find_column(&columns, col.name()).is_none() {
                    return Err(SchemaError::InvalidRange(format!(
                        "partition column '{}' is not in the schema",
                        col.name()
                    )));
                }
            }
        }
        Ok(Self {
            id,
            name,
            columns,
            keys_type,
            partition_info,
            distribution_info,
            base_index_id: id,
            index_metas: BTreeMap::new(),
            partitions: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base schema, in column order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        find_column(&self.columns, name)
    }

    pub fn keys_type(&self) -> KeysType {
        self.keys_type
    }

    pub fn partition_info(&self) -> &PartitionInfo {
        &self.partition_info
    }

    pub fn partition_info_mut(&mut self) -> &mut PartitionInfo {
        &mut self.partition_info
    }

    pub fn distribution_info(&self) -> &DistributionInfo {
        &self.distribution_info
    }

    pub fn base_index_id(&self) -> IndexId {
        self.base_index_id
    }

    /// Change the base index id. Fails if an attached partition has a
    /// different base index.
    pub fn set_base_index_id(&mut self, index_id: IndexId) -> Result<(), SchemaError> {
        if let Some(partition) = self
            .partitions
            .values()
            .find(|p| p.base_index().id() != index_id)
        {
            return Err(SchemaError::BaseIndexMismatch {
                expected: index_id,
                actual: partition.base_index().id(),
            });
        }
        self.base_index_id = index_id;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Index metadata
    // ---------------------------------------------------------------------

    /// Register or overwrite the schema of an index.
    pub fn set_index_meta(&mut self, meta: MaterializedIndexMeta) -> Result<(), SchemaError> {
        if meta.name.is_empty() {
            return Err(SchemaError::EmptyName("index"));
        }
        validate_schema(&meta.schema, meta.keys_type)?;
        if self
            .index_metas
            .values()
            .any(|m| m.index_id != meta.index_id && m.name == meta.name)
        {
            return Err(SchemaError::DuplicateIndexName(meta.name));
        }
        debug!(
            table_id = self.id,
            index_id = meta.index_id,
            name = %meta.name,
            schema_version = meta.schema_version,
            "set index meta"
        );
        self.index_metas.insert(meta.index_id, meta);
        Ok(())
    }

    pub fn index_meta(&self, index_id: IndexId) -> Option<&MaterializedIndexMeta> {
        self.index_metas.get(&index_id)
    }

    pub fn index_metas(&self) -> impl Iterator<Item = &MaterializedIndexMeta> + '_ {
        self.index_metas.values()
    }

    pub fn index_id_by_name(&self, name: &str) -> Option<IndexId> {
        self.index_metas
            .values()
            .find(|m| m.name == name)
            .map(|m| m.index_id)
    }

    // ---------------------------------------------------------------------
    // Partitions
    // ---------------------------------------------------------------------

    /// Attach a partition.
    ///
    /// A single-partition table without a replication entry for the
    /// partition gets [`DEFAULT_REPLICATION_NUM`]. Nothing is changed when
    /// an error is returned.
    pub fn add_partition(&mut self, partition: Partition) -> Result<(), SchemaError> {
        self.attach_partition(partition, Some(DEFAULT_REPLICATION_NUM), None)
    }

    /// [`add_partition`](Self::add_partition) with a caller-chosen default
    /// replication number for single-partition tables.
    pub fn add_partition_with_default(
        &mut self,
        partition: Partition,
        default_replication_num: i16,
    ) -> Result<(), SchemaError> {
        self.attach_partition(partition, Some(default_replication_num), None)
    }

    /// Attach with catalog defaults. A partition without a storage medium
    /// entry is recorded with `default_medium`.
    pub(crate) fn add_partition_with_defaults(
        &mut self,
        partition: Partition,
        default_replication_num: i16,
        default_medium: StorageMedium,
    ) -> Result<(), SchemaError> {
        self.attach_partition(
            partition,
            Some(default_replication_num),
            Some(default_medium),
        )
    }

    /// Storage medium a partition's tablets carry once it is attached.
    pub(crate) fn effective_medium(
        &self,
        partition_id: PartitionId,
        default_medium: Option<StorageMedium>,
    ) -> StorageMedium {
        match default_medium {
            Some(medium) if !self.partition_info.has_storage_medium(partition_id) => medium,
            _ => self.partition_info.storage_medium(partition_id),
        }
    }

    fn attach_partition(
        &mut self,
        partition: Partition,
        default_replication_num: Option<i16>,
        default_medium: Option<StorageMedium>,
    ) -> Result<(), SchemaError> {
        let pid = partition.id();
        if self.partitions.contains_key(&pid) {
            return Err(SchemaError::DuplicatePartition(pid));
        }
        self.check_partition_shape(&partition)?;
        if self.partition_by_name(partition.name()).is_some() {
            return Err(SchemaError::DuplicatePartitionName(
                partition.name().to_string(),
            ));
        }
        let medium = self.effective_medium(pid, default_medium);
        self.check_recorded_metas(&partition, medium)?;

        let existing: HashSet<TabletId> = self
            .partitions
            .values()
            .flat_map(Partition::tablet_ids)
            .collect();
        let mut incoming = HashSet::new();
        for tablet_id in partition.tablet_ids() {
            if existing.contains(&tablet_id) || !incoming.insert(tablet_id) {
                return Err(SchemaError::DuplicateTablet(tablet_id));
            }
        }

        if !self.partition_info.has_replication_num(pid) {
            let single = matches!(self.partition_info.kind(), PartitionKind::Single);
            match default_replication_num {
                Some(num) if single => self.partition_info.set_replication_num(pid, num)?,
                _ => return Err(SchemaError::ReplicationNumNotFound(pid)),
            }
        }
        if default_medium.is_some() && !self.partition_info.has_storage_medium(pid) {
            self.partition_info.set_storage_medium(pid, medium);
        }

        debug!(
            table_id = self.id,
            partition_id = pid,
            name = %partition.name(),
            tablets = incoming.len(),
            "add partition"
        );
        self.partitions.insert(pid, partition);
        Ok(())
    }

    pub fn partition(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions.get(&id)
    }

    pub fn partition_by_name(&self, name: &str) -> Option<&Partition> {
        self.partitions
            .values()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Partitions in id order.
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> + '_ {
        self.partitions.values()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Detach a partition together with its indexes and tablets.
    pub fn drop_partition(&mut self, id: PartitionId) -> Result<Partition, SchemaError> {
        let partition = self
            .partitions
            .remove(&id)
            .ok_or(SchemaError::PartitionNotFound(id))?;
        self.partition_info.drop_partition(id);
        debug!(table_id = self.id, partition_id = id, "drop partition");
        Ok(partition)
    }

    pub fn update_visible_version(
        &mut self,
        partition_id: PartitionId,
        version: i64,
    ) -> Result<(), SchemaError> {
        self.partitions
            .get_mut(&partition_id)
            .ok_or(SchemaError::PartitionNotFound(partition_id))?
            .update_visible_version(version)
    }

    /// Add a tablet to an index of an attached partition.
    ///
    /// `meta` must match the position the tablet takes in this table and
    /// the tablet id must be new to the table.
    pub fn add_tablet(
        &mut self,
        partition_id: PartitionId,
        index_id: IndexId,
        tablet: Tablet,
        meta: &TabletMeta,
    ) -> Result<(), SchemaError> {
        let expected = self.derived_tablet_meta(meta.db_id, partition_id, index_id)?;
        if let Some(field) = meta.conflicting_field(&expected) {
            return Err(SchemaError::TabletMetaConflict {
                tablet_id: tablet.id(),
                field,
            });
        }
        let tablet_id = tablet.id();
        if self
            .partitions
            .values()
            .any(|p| p.materialized_indexes().any(|idx| idx.contains_tablet(tablet_id)))
        {
            return Err(SchemaError::DuplicateTablet(tablet_id));
        }
        self.partitions
            .get_mut(&partition_id)
            .and_then(|p| p.index_mut(index_id))
            .ok_or(SchemaError::IndexNotFound(index_id))?
            .add_tablet(tablet, meta)?;
        debug!(
            table_id = self.id,
            partition_id,
            index_id,
            tablet_id,
            "add tablet"
        );
        Ok(())
    }

    /// Check the invariants every attached partition satisfies: base
    /// index, index metas, distribution, unique names and tablet ids, and
    /// a replication number per partition.
    pub fn check_consistency(&self) -> Result<(), SchemaError> {
        let mut names = HashSet::new();
        let mut tablets = HashSet::new();
        for partition in self.partitions.values() {
            self.check_partition_shape(partition)?;
            if !names.insert(partition.name().to_ascii_lowercase()) {
                return Err(SchemaError::DuplicatePartitionName(
                    partition.name().to_string(),
                ));
            }
            if let Some(dup) = partition.tablet_ids().into_iter().find(|&t| !tablets.insert(t)) {
                return Err(SchemaError::DuplicateTablet(dup));
            }
            if !self.partition_info.has_replication_num(partition.id()) {
                return Err(SchemaError::ReplicationNumNotFound(partition.id()));
            }
        }
        Ok(())
    }

    fn check_partition_shape(&self, partition: &Partition) -> Result<(), SchemaError> {
        if partition.name().is_empty() {
            return Err(SchemaError::EmptyName("partition"));
        }
        let base_id = partition.base_index().id();
        if base_id != self.base_index_id {
            return Err(SchemaError::BaseIndexMismatch {
                expected: self.base_index_id,
                actual: base_id,
            });
        }
        if let Some(index) = partition
            .materialized_indexes()
            .find(|idx| !self.index_metas.contains_key(&idx.id()))
        {
            return Err(SchemaError::IndexMetaNotFound(index.id()));
        }
        partition.distribution_info().validate_against(&self.columns)
    }

    /// Compare the metas tablets were added with against what the
    /// hierarchy derives for them. The db id is not known at this level.
    fn check_recorded_metas(
        &self,
        partition: &Partition,
        medium: StorageMedium,
    ) -> Result<(), SchemaError> {
        for index in partition.materialized_indexes() {
            let schema_hash = self.index_metas.get(&index.id()).map_or(0, |m| m.schema_hash);
            for (tablet_id, recorded) in index.recorded_metas() {
                let expected = TabletMeta::new(
                    recorded.db_id,
                    self.id,
                    partition.id(),
                    index.id(),
                    schema_hash,
                    medium,
                );
                if let Some(field) = recorded.conflicting_field(&expected) {
                    return Err(SchemaError::TabletMetaConflict { tablet_id, field });
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Tablet metadata
    // ---------------------------------------------------------------------

    /// Derive the [`TabletMeta`] of every tablet of `partition` as if it
    /// belonged to this table.
    pub fn partition_tablet_metas(
        &self,
        db_id: DbId,
        partition: &Partition,
    ) -> Vec<(TabletId, TabletMeta)> {
        let medium = self.partition_info.storage_medium(partition.id());
        let mut metas = Vec::new();
        for index in partition.materialized_indexes() {
            let schema_hash = self
                .index_metas
                .get(&index.id())
                .map_or(0, |m| m.schema_hash);
            let meta = TabletMeta::new(
                db_id,
                self.id,
                partition.id(),
                index.id(),
                schema_hash,
                medium,
            );
            metas.extend(index.tablet_ids().map(|tablet_id| (tablet_id, meta)));
        }
        metas
    }

    /// Derive the meta a tablet of `index_id` in attached partition
    /// `partition_id` carries.
    pub fn derived_tablet_meta(
        &self,
        db_id: DbId,
        partition_id: PartitionId,
        index_id: IndexId,
    ) -> Result<TabletMeta, SchemaError> {
        let partition = self
            .partitions
            .get(&partition_id)
            .ok_or(SchemaError::PartitionNotFound(partition_id))?;
        if partition.index(index_id).is_none() {
            return Err(SchemaError::IndexNotFound(index_id));
        }
        let schema_hash = self
            .index_metas
            .get(&index_id)
            .ok_or(SchemaError::IndexMetaNotFound(index_id))?
            .schema_hash;
        Ok(TabletMeta::new(
            db_id,
            self.id,
            partition_id,
            index_id,
            schema_hash,
            self.partition_info.storage_medium(partition_id),
        ))
    }

    /// Derive the [`TabletMeta`] of every tablet of the table.
    pub fn tablet_metas(&self, db_id: DbId) -> Vec<(TabletId, TabletMeta)> {
        self.partitions
            .values()
            .flat_map(|p| self.partition_tablet_metas(db_id, p))
            .collect()
    }

    pub fn tablet_ids(&self) -> Vec<TabletId> {
        self.partitions
            .values()
            .flat_map(Partition::tablet_ids)
            .collect()
    }
}

impl Persist for OlapTable {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        self.check_consistency()
            .map_err(|e| EncodingError::Inconsistent(format!("table {}: {e}", self.id)))?;
        w.put_u64(self.id);
        w.put_str(&self.name)?;
        w.put_u8(self.keys_type.as_u8());
        write_seq(w, self.columns.iter())?;
        w.put_u64(self.base_index_id);
        self.partition_info.write_to(w)?;
        self.distribution_info.write_to(w)?;
        write_seq(w, self.index_metas.values())?;
        write_seq(w, self.partitions.values())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let id = r.get_u64()?;
        let name = r.get_str("table name")?;
        let keys_type = KeysType::from_u8(r.get_u8()?)?;
        let columns = read_seq::<Column>(r)?;
        let base_index_id = r.get_u64()?;
        let partition_info = PartitionInfo::read_from(r)?;
        let distribution_info = DistributionInfo::read_from(r)?;

        let inconsistent = |e: SchemaError| EncodingError::Inconsistent(format!("table {id}: {e}"));
        let mut table = OlapTable::new(
            id,
            name,
            columns,
            keys_type,
            partition_info,
            distribution_info,
        )
        .map_err(inconsistent)?;
        table.set_base_index_id(base_index_id).map_err(inconsistent)?;
        for meta in read_seq::<MaterializedIndexMeta>(r)? {
            if table.index_metas.contains_key(&meta.index_id) {
                return Err(inconsistent(SchemaError::DuplicateIndex(meta.index_id)));
            }
            table.set_index_meta(meta).map_err(inconsistent)?;
        }
        for partition in read_seq::<Partition>(r)? {
            table
                .attach_partition(partition, None, None)
                .map_err(inconsistent)?;
        }
        Ok(table)
    }
}
