//! Databases, the catalog container, and catalog image checkpoints.
//!
//! The catalog owns every database, each database owns its tables. The
//! tablet inverted index is kept beside the hierarchy and updated by the
//! catalog's own mutation methods; it is rebuilt and checked on load.

mod image;

pub use image::{IMAGE_HEADER_LEN, IMAGE_MAGIC};

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{CatalogConfig, MetaContext};
use crate::error::{EncodingError, Result, SchemaError, StorageError};
use crate::inverted::TabletInvertedIndex;
use crate::partition::Partition;
use crate::persist::{MetaReader, MetaWriter, Persist, read_seq, write_seq};
use crate::table::{OlapTable, Table};
use crate::tablet::{Tablet, TabletMeta};
use crate::types::{DbId, IndexId, PartitionId, TableId, TabletId};

/// A catalog shared between threads. Image writers hold the read lock.
pub type SharedCatalog = Arc<RwLock<Catalog>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    id: DbId,
    name: String,
    tables: BTreeMap<TableId, Table>,
}

impl Database {
    pub fn new(id: DbId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName("database").into());
        }
        Ok(Self {
            id,
            name,
            tables: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> DbId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(&id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.values().find(|t| t.name() == name)
    }

    /// Tables in id order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn insert_table(&mut self, table: Table) -> std::result::Result<(), SchemaError> {
        if self.tables.contains_key(&table.id()) {
            return Err(SchemaError::DuplicateTable(table.id()));
        }
        if self.table_by_name(table.name()).is_some() {
            return Err(SchemaError::DuplicateTableName(table.name().to_string()));
        }
        self.tables.insert(table.id(), table);
        Ok(())
    }
}

impl Persist for Database {
    fn write_to(&self, w: &mut MetaWriter) -> std::result::Result<(), EncodingError> {
        w.put_u64(self.id);
        w.put_str(&self.name)?;
        write_seq(w, self.tables.values())
    }

    fn read_from(r: &mut MetaReader<'_>) -> std::result::Result<Self, EncodingError> {
        let id = r.get_u64()?;
        let name = r.get_str("database name")?;
        if name.is_empty() {
            return Err(EncodingError::Inconsistent(format!(
                "database {id} has an empty name"
            )));
        }
        let mut db = Database {
            id,
            name,
            tables: BTreeMap::new(),
        };
        for table in read_seq::<Table>(r)? {
            db.insert_table(table)
                .map_err(|e| EncodingError::Inconsistent(format!("database {id}: {e}")))?;
        }
        Ok(db)
    }
}

/// In-memory catalog: databases, their tables, and the tablet index.
#[derive(Debug)]
pub struct Catalog {
    config: CatalogConfig,
    databases: BTreeMap<DbId, Database>,
    inverted: TabletInvertedIndex,
}

impl Catalog {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            databases: BTreeMap::new(),
            inverted: TabletInvertedIndex::new(),
        })
    }

    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn inverted_index(&self) -> &TabletInvertedIndex {
        &self.inverted
    }

    // ---------------------------------------------------------------------
    // Databases
    // ---------------------------------------------------------------------

    pub fn create_database(&mut self, id: DbId, name: impl Into<String>) -> Result<()> {
        let db = Database::new(id, name)?;
        if self.databases.contains_key(&id) {
            return Err(SchemaError::DuplicateDatabase(id).into());
        }
        if self.database_by_name(db.name()).is_some() {
            return Err(SchemaError::DuplicateDatabaseName(db.name).into());
        }
        info!(db_id = id, name = %db.name, "create database");
        self.databases.insert(id, db);
        Ok(())
    }

    /// Drop a database with every table, partition and tablet under it.
    pub fn drop_database(&mut self, id: DbId) -> Result<Database> {
        let db = self
            .databases
            .remove(&id)
            .ok_or(SchemaError::DatabaseNotFound(id))?;
        for table in db.tables() {
            self.inverted.unregister(table.olap().tablet_ids());
        }
        info!(db_id = id, tables = db.table_count(), "drop database");
        Ok(db)
    }

    pub fn database(&self, id: DbId) -> Option<&Database> {
        self.databases.get(&id)
    }

    pub fn database_by_name(&self, name: &str) -> Option<&Database> {
        self.databases.values().find(|db| db.name == name)
    }

    pub fn databases(&self) -> impl Iterator<Item = &Database> + '_ {
        self.databases.values()
    }

    // ---------------------------------------------------------------------
    // Tables
    // ---------------------------------------------------------------------

    /// Add `table` to database `db_id` and index all of its tablets.
    ///
    /// Table ids are unique across the catalog, names within a database.
    pub fn create_table(&mut self, db_id: DbId, table: Table) -> Result<()> {
        if !self.databases.contains_key(&db_id) {
            return Err(SchemaError::DatabaseNotFound(db_id).into());
        }
        if self.databases.values().any(|db| db.tables.contains_key(&table.id())) {
            return Err(SchemaError::DuplicateTable(table.id()).into());
        }
        let db = self
            .databases
            .get_mut(&db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?;
        if db.table_by_name(table.name()).is_some() {
            return Err(SchemaError::DuplicateTableName(table.name().to_string()).into());
        }
        self.inverted.register_table(db_id, &table)?;
        info!(
            db_id,
            table_id = table.id(),
            name = %table.name(),
            lake = table.is_lake_table(),
            "create table"
        );
        db.tables.insert(table.id(), table);
        Ok(())
    }

    pub fn drop_table(&mut self, db_id: DbId, table_id: TableId) -> Result<Table> {
        let db = self
            .databases
            .get_mut(&db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?;
        let table = db
            .tables
            .remove(&table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?;
        self.inverted.unregister(table.olap().tablet_ids());
        info!(db_id, table_id, "drop table");
        Ok(table)
    }

    pub fn table(&self, db_id: DbId, table_id: TableId) -> Option<&Table> {
        self.databases.get(&db_id)?.table(table_id)
    }

    /// Mutable access for edits that do not add or remove tablets.
    ///
    /// Use [`add_partition`](Self::add_partition),
    /// [`drop_partition`](Self::drop_partition) and
    /// [`add_tablet`](Self::add_tablet) for those, so that the tablet index
    /// follows.
    pub fn table_mut(&mut self, db_id: DbId, table_id: TableId) -> Option<&mut Table> {
        self.databases.get_mut(&db_id)?.tables.get_mut(&table_id)
    }

    fn olap_mut(&mut self, db_id: DbId, table_id: TableId) -> Result<&mut OlapTable> {
        Ok(self
            .databases
            .get_mut(&db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?
            .tables
            .get_mut(&table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?
            .olap_mut())
    }

    /// Object-store prefix of a lake table's shards.
    pub fn storage_group(&self, db_id: DbId, table_id: TableId) -> Result<String> {
        let table = self
            .database(db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?
            .table(table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?;
        let lake = table
            .as_lake()
            .ok_or(SchemaError::NotLakeTable(table_id))?;
        Ok(lake
            .storage_group()
            .ok_or(SchemaError::MissingShardStorageInfo(table_id))?)
    }

    // ---------------------------------------------------------------------
    // Partitions
    // ---------------------------------------------------------------------

    /// Attach `partition` to a table and index its tablets.
    ///
    /// Partitions without an explicit replication number or storage medium
    /// get the catalog defaults. Every tablet meta recorded in the
    /// partition's indexes must match the meta derived for its position.
    pub fn add_partition(
        &mut self,
        db_id: DbId,
        table_id: TableId,
        partition: Partition,
    ) -> Result<()> {
        let default_medium = self.config.default_storage_medium;
        let default_replication = self.config.default_replication_num;
        let table = self
            .databases
            .get_mut(&db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?
            .tables
            .get_mut(&table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?
            .olap_mut();

        let pid = partition.id();
        let medium = table.effective_medium(pid, Some(default_medium));
        let metas: Vec<(TabletId, TabletMeta)> = table
            .partition_tablet_metas(db_id, &partition)
            .into_iter()
            .map(|(id, meta)| (id, TabletMeta { storage_medium: medium, ..meta }))
            .collect();
        for (tablet_id, derived) in &metas {
            let recorded = partition
                .materialized_indexes()
                .find_map(|index| index.recorded_meta(*tablet_id));
            if let Some(field) = recorded.and_then(|meta| meta.conflicting_field(derived)) {
                return Err(SchemaError::TabletMetaConflict {
                    tablet_id: *tablet_id,
                    field,
                }
                .into());
            }
        }

        self.inverted.register(&metas)?;
        if let Err(e) =
            table.add_partition_with_defaults(partition, default_replication, default_medium)
        {
            self.inverted.unregister(metas.iter().map(|(id, _)| *id));
            return Err(e.into());
        }
        debug!(db_id, table_id, partition_id = pid, tablets = metas.len(), "partition indexed");
        Ok(())
    }

    pub fn drop_partition(
        &mut self,
        db_id: DbId,
        table_id: TableId,
        partition_id: PartitionId,
    ) -> Result<Partition> {
        let table = self
            .table_mut(db_id, table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?;
        let partition = table.olap_mut().drop_partition(partition_id)?;
        self.inverted.unregister(partition.tablet_ids());
        Ok(partition)
    }

    pub fn update_visible_version(
        &mut self,
        db_id: DbId,
        table_id: TableId,
        partition_id: PartitionId,
        version: i64,
    ) -> Result<()> {
        self.olap_mut(db_id, table_id)?
            .update_visible_version(partition_id, version)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Tablets
    // ---------------------------------------------------------------------

    /// Add a tablet to an index of an attached partition and index it.
    ///
    /// Tablet ids are unique across the catalog.
    pub fn add_tablet(
        &mut self,
        db_id: DbId,
        table_id: TableId,
        partition_id: PartitionId,
        index_id: IndexId,
        tablet: Tablet,
        meta: &TabletMeta,
    ) -> Result<()> {
        let table = self
            .databases
            .get_mut(&db_id)
            .ok_or(SchemaError::DatabaseNotFound(db_id))?
            .tables
            .get_mut(&table_id)
            .ok_or(SchemaError::TableNotFound(table_id))?
            .olap_mut();
        let tablet_id = tablet.id();
        let derived = table.derived_tablet_meta(db_id, partition_id, index_id)?;
        if let Some(field) = meta.conflicting_field(&derived) {
            return Err(SchemaError::TabletMetaConflict { tablet_id, field }.into());
        }
        self.inverted.add_tablet(tablet_id, derived)?;
        if let Err(e) = table.add_tablet(partition_id, index_id, tablet, meta) {
            self.inverted.remove_tablet(tablet_id);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn tablet_meta(&self, tablet_id: TabletId) -> Option<&TabletMeta> {
        self.inverted.tablet_meta(tablet_id)
    }

    // ---------------------------------------------------------------------
    // Images
    // ---------------------------------------------------------------------

    /// Serialize every database into a checksummed image.
    pub fn write_image(&self, ctx: MetaContext) -> Result<Vec<u8>> {
        crate::persist::check_meta_version(ctx.meta_version())?;
        let mut w = MetaWriter::new(ctx);
        write_seq(&mut w, self.databases.values())?;
        Ok(image::seal(ctx.meta_version(), &w.into_bytes()))
    }

    /// Rebuild a catalog with the default configuration.
    pub fn read_image(data: &[u8]) -> Result<Catalog> {
        Self::read_image_with_config(data, CatalogConfig::default())
    }

    /// Rebuild a catalog from an image, re-deriving the tablet index from
    /// the hierarchy and checking it against every table.
    pub fn read_image_with_config(data: &[u8], config: CatalogConfig) -> Result<Catalog> {
        let (meta_version, payload) = image::unseal(data)?;
        let mut r = MetaReader::new(payload, MetaContext::new(meta_version));
        let databases = read_seq::<Database>(&mut r)?;
        r.finish()?;

        let mut catalog = Catalog::new(config)?;
        for db in databases {
            let inconsistent = |e: crate::error::Error| {
                EncodingError::Inconsistent(format!("database {}: {e}", db.id))
            };
            catalog
                .create_database(db.id, db.name.clone())
                .map_err(inconsistent)?;
            for table in db.tables.values() {
                catalog
                    .create_table(db.id, table.clone())
                    .map_err(inconsistent)?;
            }
        }
        for db in catalog.databases.values() {
            for table in db.tables() {
                catalog.inverted.validate_table(db.id, table)?;
            }
        }
        debug!(
            meta_version,
            databases = catalog.databases.len(),
            tablets = catalog.inverted.len(),
            "catalog image read"
        );
        Ok(catalog)
    }

    /// Write an image to `path`, replacing it atomically.
    pub fn save_image(&self, path: &Path, ctx: MetaContext) -> Result<()> {
        let image = self.write_image(ctx)?;
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(StorageError::from)?;
        file.write_all(&image).map_err(StorageError::from)?;
        file.sync_all().map_err(StorageError::from)?;
        fs::rename(&tmp, path).map_err(StorageError::from)?;
        info!(
            path = %path.display(),
            bytes = image.len(),
            meta_version = ctx.meta_version(),
            "catalog image saved"
        );
        Ok(())
    }

    /// [`save_image`](Self::save_image) at the configured meta version.
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        self.save_image(path, self.config.meta_context())
    }

    pub fn load_image(path: &Path, config: CatalogConfig) -> Result<Catalog> {
        let data = fs::read(path).map_err(StorageError::from)?;
        let catalog = Self::read_image_with_config(&data, config)?;
        info!(
            path = %path.display(),
            bytes = data.len(),
            databases = catalog.databases.len(),
            "catalog image loaded"
        );
        Ok(catalog)
    }
}

/// Save an image of a shared catalog while holding its read lock.
pub fn save_shared_image(catalog: &SharedCatalog, path: &Path, ctx: MetaContext) -> Result<()> {
    let guard = catalog.read();
    guard.save_image(path, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionInfo;
    use crate::error::{Error, ErrorKind};
    use crate::index::{IndexState, MaterializedIndex};
    use crate::partition::PartitionInfo;
    use crate::schema::KeysType;
    use crate::table::OlapTable;
    use crate::table::test_fixtures::{base_index_meta, lake_table, sample_columns, sample_table};
    use crate::tablet::Tablet;
    use crate::types::{META_VERSION_1, StorageMedium};
    use tempfile::tempdir;

    fn partition(id: PartitionId, name: &str, tablets: &[TabletId]) -> Partition {
        partition_of(TabletMeta::new(1, 2, id, 4, 77, StorageMedium::Hdd), name, tablets)
    }

    /// A partition whose tablets were added with `meta`.
    fn partition_of(meta: TabletMeta, name: &str, tablets: &[TabletId]) -> Partition {
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        for &t in tablets {
            index.add_tablet(Tablet::new_lake(t), &meta).unwrap();
        }
        Partition::new(
            meta.partition_id,
            name,
            index,
            DistributionInfo::random(1).unwrap(),
        )
    }

    fn catalog_with_lake_table() -> Catalog {
        let mut catalog = Catalog::new(CatalogConfig::default()).unwrap();
        catalog.create_database(1, "db1").unwrap();
        catalog.create_table(1, Table::from(lake_table())).unwrap();
        catalog.add_partition(1, 2, partition(3, "p1", &[10, 11])).unwrap();
        catalog
    }

    #[test]
    fn test_create_database_duplicates() {
        let mut catalog = Catalog::new(CatalogConfig::default()).unwrap();
        catalog.create_database(1, "db1").unwrap();
        match catalog.create_database(1, "other") {
            Err(Error::Schema(SchemaError::DuplicateDatabase(1))) => {}
            other => panic!("expected DuplicateDatabase, got {other:?}"),
        }
        assert!(matches!(
            catalog.create_database(2, "db1"),
            Err(Error::Schema(SchemaError::DuplicateDatabaseName(_)))
        ));
        assert_eq!(catalog.databases().count(), 1);
    }

    #[test]
    fn test_create_table_checks() {
        let mut catalog = Catalog::new(CatalogConfig::default()).unwrap();
        catalog.create_database(1, "db1").unwrap();
        catalog.create_database(5, "db5").unwrap();
        let err = catalog.create_table(9, sample_table().into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        catalog.create_table(1, sample_table().into()).unwrap();
        // Table ids are unique across databases.
        let err = catalog.create_table(5, sample_table().into()).unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::DuplicateTable(2))));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(catalog.table(1, 2).is_some());
    }

    #[test]
    fn test_add_partition_indexes_tablets() {
        let catalog = catalog_with_lake_table();
        let meta = catalog.tablet_meta(11).unwrap();
        assert_eq!(*meta, TabletMeta::new(1, 2, 3, 4, 77, StorageMedium::Hdd));

        let table = catalog.table(1, 2).unwrap().olap();
        assert_eq!(table.partition_info().replication_num(3).unwrap(), 3);
        assert!(table.partition_info().has_storage_medium(3));
    }

    #[test]
    fn test_add_partition_uses_config_defaults() {
        let config = CatalogConfig {
            default_replication_num: 1,
            default_storage_medium: StorageMedium::Ssd,
            ..Default::default()
        };
        let mut catalog = Catalog::new(config).unwrap();
        catalog.create_database(1, "db1").unwrap();
        catalog.create_table(1, sample_table().into()).unwrap();
        let hdd = partition(3, "p1", &[10]);
        assert!(matches!(
            catalog.add_partition(1, 2, hdd),
            Err(Error::Schema(SchemaError::TabletMetaConflict {
                tablet_id: 10,
                field: "storage medium"
            }))
        ));
        let ssd = TabletMeta::new(1, 2, 3, 4, 77, StorageMedium::Ssd);
        catalog.add_partition(1, 2, partition_of(ssd, "p1", &[10])).unwrap();

        let table = catalog.table(1, 2).unwrap().olap();
        assert_eq!(table.partition_info().replication_num(3).unwrap(), 1);
        assert_eq!(table.partition_info().storage_medium(3), StorageMedium::Ssd);
        assert_eq!(catalog.tablet_meta(10).unwrap().storage_medium, StorageMedium::Ssd);
    }

    #[test]
    fn test_failed_add_partition_leaves_index_unchanged() {
        let mut catalog = catalog_with_lake_table();
        let before = catalog.inverted_index().clone();

        // Tablet 10 is already indexed.
        let err = catalog
            .add_partition(1, 2, partition(6, "p2", &[10, 12]))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::DuplicateTablet(10))));

        // Rejected by the table after the tablets were registered.
        let err = catalog
            .add_partition(1, 2, partition(6, "p1", &[12]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::DuplicatePartitionName(_))
        ));
        assert_eq!(catalog.inverted_index(), &before);
    }

    #[test]
    fn test_drop_cascades_to_inverted_index() {
        let mut catalog = catalog_with_lake_table();
        catalog.add_partition(1, 2, partition(6, "p2", &[12])).unwrap();

        let dropped = catalog.drop_partition(1, 2, 3).unwrap();
        assert_eq!(dropped.tablet_ids(), vec![10, 11]);
        assert!(catalog.tablet_meta(10).is_none());
        assert!(catalog.tablet_meta(12).is_some());

        catalog.drop_table(1, 2).unwrap();
        assert!(catalog.tablet_meta(12).is_none());
        assert!(catalog.table(1, 2).is_none());

        catalog.create_table(1, sample_table().into()).unwrap();
        catalog.add_partition(1, 2, partition(3, "p1", &[20])).unwrap();
        let db = catalog.drop_database(1).unwrap();
        assert_eq!(db.table_count(), 1);
        assert!(catalog.inverted_index().is_empty());
        assert!(matches!(
            catalog.drop_database(1),
            Err(Error::Schema(SchemaError::DatabaseNotFound(1)))
        ));
    }

    #[test]
    fn test_image_roundtrip() {
        let catalog = catalog_with_lake_table();
        let image = catalog.write_image(MetaContext::current()).unwrap();
        assert_eq!(&image[0..4], IMAGE_MAGIC);

        let loaded = Catalog::read_image(&image).unwrap();
        assert_eq!(loaded.database(1), catalog.database(1));
        assert_eq!(loaded.inverted_index(), catalog.inverted_index());
        let table = loaded.table(1, 2).unwrap();
        assert_eq!(
            table.as_lake().unwrap().storage_group().as_deref(),
            Some("s3://bucket/service/2/")
        );
    }

    #[test]
    fn test_image_at_oldest_version() {
        let catalog = catalog_with_lake_table();
        let image = catalog.write_image(MetaContext::new(META_VERSION_1)).unwrap();
        let loaded = Catalog::read_image(&image).unwrap();
        assert_eq!(loaded.tablet_meta(10), catalog.tablet_meta(10));
    }

    #[test]
    fn test_image_rejects_duplicate_tablets_across_tables() {
        // Two databases each holding a table with tablet 10 cannot come
        // from one catalog, so build the payload by hand.
        let mut db1 = Database::new(1, "db1").unwrap();
        let mut db5 = Database::new(5, "db5").unwrap();
        let mut t1 = sample_table();
        t1.add_partition(partition(3, "p1", &[10])).unwrap();
        let mut t2 = OlapTable::new(
            7,
            "t7",
            sample_columns(),
            KeysType::AggKeys,
            PartitionInfo::single(),
            DistributionInfo::random(1).unwrap(),
        )
        .unwrap();
        t2.set_base_index_id(4).unwrap();
        t2.set_index_meta(base_index_meta()).unwrap();
        let meta = TabletMeta::new(1, 7, 3, 4, 77, StorageMedium::Hdd);
        t2.add_partition(partition_of(meta, "p1", &[10])).unwrap();
        db1.insert_table(t1.into()).unwrap();
        db5.insert_table(t2.into()).unwrap();

        let mut w = MetaWriter::new(MetaContext::current());
        write_seq(&mut w, [db1, db5].iter()).unwrap();
        let image = image::seal(MetaContext::current().meta_version(), &w.into_bytes());
        let err = Catalog::read_image(&image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_add_partition_rejects_foreign_tablet_meta() {
        let mut catalog = catalog_with_lake_table();
        let before = catalog.inverted_index().clone();

        let other_db = TabletMeta::new(42, 2, 6, 4, 77, StorageMedium::Hdd);
        match catalog.add_partition(1, 2, partition_of(other_db, "p2", &[12])) {
            Err(Error::Schema(SchemaError::TabletMetaConflict {
                tablet_id: 12,
                field: "db id",
            })) => {}
            other => panic!("expected TabletMetaConflict, got {other:?}"),
        }
        let foreign = TabletMeta::new(42, 77, 99, 4, 5, StorageMedium::Ssd);
        let err = catalog
            .add_partition(1, 2, partition_of(foreign, "p2", &[12]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Definition);
        assert_eq!(catalog.inverted_index(), &before);
        assert!(catalog.table(1, 2).unwrap().olap().partition(99).is_none());
    }

    #[test]
    fn test_add_tablet_keeps_index_in_step() {
        let mut catalog = catalog_with_lake_table();
        catalog.add_partition(1, 2, partition(6, "p2", &[12])).unwrap();

        let meta = TabletMeta::new(1, 2, 6, 4, 77, StorageMedium::Hdd);
        match catalog.add_tablet(1, 2, 6, 4, Tablet::new_lake(10), &meta) {
            Err(Error::Schema(SchemaError::DuplicateTablet(10))) => {}
            other => panic!("expected DuplicateTablet, got {other:?}"),
        }
        let wrong_db = TabletMeta::new(5, 2, 6, 4, 77, StorageMedium::Hdd);
        assert!(matches!(
            catalog.add_tablet(1, 2, 6, 4, Tablet::new_lake(13), &wrong_db),
            Err(Error::Schema(SchemaError::TabletMetaConflict {
                field: "db id",
                ..
            }))
        ));
        assert!(catalog.tablet_meta(13).is_none());

        catalog
            .add_tablet(1, 2, 6, 4, Tablet::new_lake(13), &meta)
            .unwrap();
        assert_eq!(catalog.tablet_meta(13), Some(&meta));
        let image = catalog.write_image(MetaContext::current()).unwrap();
        let loaded = Catalog::read_image(&image).unwrap();
        assert_eq!(loaded.inverted_index(), catalog.inverted_index());
    }

    #[test]
    fn test_update_visible_version() {
        let mut catalog = catalog_with_lake_table();
        catalog.update_visible_version(1, 2, 3, 7).unwrap();
        let p = catalog.table(1, 2).unwrap().olap().partition(3).unwrap();
        assert_eq!(p.visible_version(), 7);
        assert!(matches!(
            catalog.update_visible_version(1, 9, 3, 8),
            Err(Error::Schema(SchemaError::TableNotFound(9)))
        ));
    }

    #[test]
    fn test_storage_group() {
        let mut catalog = catalog_with_lake_table();
        assert_eq!(catalog.storage_group(1, 2).unwrap(), "s3://bucket/service/2/");

        let mut t7 = OlapTable::new(
            7,
            "t7",
            sample_columns(),
            KeysType::AggKeys,
            PartitionInfo::single(),
            DistributionInfo::random(1).unwrap(),
        )
        .unwrap();
        t7.set_index_meta(base_index_meta()).unwrap();
        catalog.create_table(1, t7.into()).unwrap();
        match catalog.storage_group(1, 7) {
            Err(Error::Schema(SchemaError::NotLakeTable(7))) => {}
            other => panic!("expected NotLakeTable, got {other:?}"),
        }
        assert!(matches!(
            catalog.storage_group(1, 8),
            Err(Error::Schema(SchemaError::TableNotFound(8)))
        ));
    }

    #[test]
    fn test_save_refuses_inconsistent_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.image");
        let mut catalog = catalog_with_lake_table();
        catalog
            .table_mut(1, 2)
            .unwrap()
            .olap_mut()
            .partition_info_mut()
            .drop_partition(3);

        let err = catalog.save_image(&path, MetaContext::current()).unwrap_err();
        assert!(matches!(err, Error::Encoding(EncodingError::Inconsistent(_))));
        assert!(!path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_checkpoint_uses_configured_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.image");
        let config = CatalogConfig {
            meta_version: META_VERSION_1,
            ..Default::default()
        };
        let mut catalog = Catalog::new(config.clone()).unwrap();
        catalog.create_database(1, "db1").unwrap();
        catalog.create_table(1, Table::from(lake_table())).unwrap();
        catalog.add_partition(1, 2, partition(3, "p1", &[10])).unwrap();
        catalog.update_visible_version(1, 2, 3, 5).unwrap();
        catalog.save_checkpoint(&path).unwrap();

        let data = fs::read(&path).unwrap();
        let (meta_version, _) = image::unseal(&data).unwrap();
        assert_eq!(meta_version, META_VERSION_1);
        let loaded = Catalog::load_image(&path, config).unwrap();
        // Visible versions are not part of the oldest format.
        let p = loaded.table(1, 2).unwrap().olap().partition(3).unwrap();
        assert_eq!(p.visible_version(), 1);
    }

    #[test]
    fn test_save_and_load_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.image");
        let shared = catalog_with_lake_table().into_shared();
        save_shared_image(&shared, &path, MetaContext::current()).unwrap();

        let loaded = Catalog::load_image(&path, CatalogConfig::default()).unwrap();
        assert!(loaded.table(1, 2).unwrap().is_lake_table());
        assert_eq!(loaded.inverted_index().len(), 2);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_image() {
        let dir = tempdir().unwrap();
        let err = Catalog::load_image(&dir.path().join("nope"), CatalogConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_corrupted_image_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.image");
        catalog_with_lake_table()
            .save_image(&path, MetaContext::current())
            .unwrap();
        let mut data = fs::read(&path).unwrap();
        let mid = IMAGE_HEADER_LEN + (data.len() - IMAGE_HEADER_LEN) / 2;
        data[mid] ^= 0x01;
        fs::write(&path, &data).unwrap();
        let err = Catalog::load_image(&path, CatalogConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Encoding(EncodingError::ChecksumMismatch { .. })
        ));
    }
}
