//! Materialized indexes: the base table layout and its rollups.

use std::collections::HashMap;

use crate::error::{EncodingError, SchemaError};
use crate::persist::{MetaReader, MetaWriter, Persist, read_seq, write_seq};
use crate::schema::{Column, KeysType};
use crate::tablet::{Tablet, TabletMeta};
use crate::types::{IndexId, META_VERSION_2, StorageType, TabletId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexState {
    #[default]
    Normal,
    /// Being built by a rollup job.
    Rollup,
    /// Shadow index of an in-flight schema change.
    Shadow,
}

impl IndexState {
    fn as_u8(self) -> u8 {
        match self {
            IndexState::Normal => 0,
            IndexState::Rollup => 1,
            IndexState::Shadow => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self, EncodingError> {
        match value {
            0 => Ok(IndexState::Normal),
            1 => Ok(IndexState::Rollup),
            2 => Ok(IndexState::Shadow),
            other => Err(EncodingError::InvalidValue {
                field: "index state",
                value: other as u64,
            }),
        }
    }
}

/// A set of tablets sharing one physical schema layout.
///
/// Tablets are kept in insertion order with a side table for lookup by id.
/// The meta passed to [`add_tablet`](Self::add_tablet) is recorded and
/// checked against the hierarchy when the owning partition is attached. It
/// is not persisted and does not take part in equality.
#[derive(Debug, Clone)]
pub struct MaterializedIndex {
    id: IndexId,
    state: IndexState,
    row_count: u64,
    tablets: Vec<Tablet>,
    positions: HashMap<TabletId, usize>,
    recorded: HashMap<TabletId, TabletMeta>,
}

impl PartialEq for MaterializedIndex {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.state == other.state
            && self.row_count == other.row_count
            && self.tablets == other.tablets
    }
}

impl Eq for MaterializedIndex {}

impl MaterializedIndex {
    pub fn new(id: IndexId, state: IndexState) -> Self {
        Self {
            id,
            state,
            row_count: 0,
            tablets: Vec::new(),
            positions: HashMap::new(),
            recorded: HashMap::new(),
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn set_state(&mut self, state: IndexState) {
        self.state = state;
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn set_row_count(&mut self, row_count: u64) {
        self.row_count = row_count;
    }

    /// Add a tablet described by `meta`.
    ///
    /// Fails without mutating if the tablet id is already present or if
    /// `meta` points at a different index.
    pub fn add_tablet(&mut self, tablet: Tablet, meta: &TabletMeta) -> Result<(), SchemaError> {
        if meta.index_id != self.id {
            return Err(SchemaError::TabletMetaMismatch {
                tablet_id: tablet.id(),
                expected: self.id,
                actual: meta.index_id,
            });
        }
        let id = tablet.id();
        self.insert_tablet(tablet)?;
        self.recorded.insert(id, *meta);
        Ok(())
    }

    /// The meta a tablet was added with, if it was added through
    /// [`add_tablet`](Self::add_tablet).
    pub fn recorded_meta(&self, id: TabletId) -> Option<&TabletMeta> {
        self.recorded.get(&id)
    }

    /// Recorded metas in tablet order.
    pub fn recorded_metas(&self) -> impl Iterator<Item = (TabletId, &TabletMeta)> + '_ {
        self.tablets
            .iter()
            .filter_map(|t| self.recorded.get(&t.id()).map(|meta| (t.id(), meta)))
    }

    pub(crate) fn insert_tablet(&mut self, tablet: Tablet) -> Result<(), SchemaError> {
        let id = tablet.id();
        if self.positions.contains_key(&id) {
            return Err(SchemaError::DuplicateTablet(id));
        }
        self.positions.insert(id, self.tablets.len());
        self.tablets.push(tablet);
        Ok(())
    }

    pub fn remove_tablet(&mut self, id: TabletId) -> Result<Tablet, SchemaError> {
        let pos = self
            .positions
            .remove(&id)
            .ok_or(SchemaError::TabletNotFound(id))?;
        let tablet = self.tablets.remove(pos);
        self.recorded.remove(&id);
        for slot in self.positions.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Ok(tablet)
    }

    pub fn tablet(&self, id: TabletId) -> Option<&Tablet> {
        self.positions.get(&id).map(|&pos| &self.tablets[pos])
    }

    pub fn tablet_mut(&mut self, id: TabletId) -> Option<&mut Tablet> {
        let pos = *self.positions.get(&id)?;
        self.tablets.get_mut(pos)
    }

    /// Tablets in insertion order. Call again to restart.
    pub fn tablets(&self) -> std::slice::Iter<'_, Tablet> {
        self.tablets.iter()
    }

    pub fn tablet_ids(&self) -> impl Iterator<Item = TabletId> + '_ {
        self.tablets.iter().map(Tablet::id)
    }

    pub fn tablet_count(&self) -> usize {
        self.tablets.len()
    }

    pub fn contains_tablet(&self, id: TabletId) -> bool {
        self.positions.contains_key(&id)
    }
}

impl Persist for MaterializedIndex {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_u64(self.id);
        w.put_u8(self.state.as_u8());
        if w.context().has(META_VERSION_2) {
            w.put_u64(self.row_count);
        }
        write_seq(w, self.tablets.iter())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let id = r.get_u64()?;
        let state = IndexState::from_u8(r.get_u8()?)?;
        let mut index = MaterializedIndex::new(id, state);
        if r.context().has(META_VERSION_2) {
            index.row_count = r.get_u64()?;
        }
        for tablet in read_seq::<Tablet>(r)? {
            index
                .insert_tablet(tablet)
                .map_err(|e| EncodingError::Inconsistent(format!("index {id}: {e}")))?;
        }
        Ok(index)
    }
}

/// Schema metadata of one materialized index, held by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedIndexMeta {
    pub index_id: IndexId,
    pub name: String,
    pub schema: Vec<Column>,
    pub schema_version: i32,
    pub schema_hash: i32,
    pub short_key_column_count: i16,
    pub storage_type: StorageType,
    pub keys_type: KeysType,
}

impl Persist for MaterializedIndexMeta {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_u64(self.index_id);
        w.put_str(&self.name)?;
        write_seq(w, self.schema.iter())?;
        w.put_i32(self.schema_version);
        w.put_i32(self.schema_hash);
        w.put_i16(self.short_key_column_count);
        w.put_u8(self.storage_type.as_u8());
        w.put_u8(self.keys_type.as_u8());
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let index_id = r.get_u64()?;
        let name = r.get_str("index name")?;
        let schema = read_seq::<Column>(r)?;
        let schema_version = r.get_i32()?;
        let schema_hash = r.get_i32()?;
        let short_key_column_count = r.get_i16()?;
        let raw_storage = r.get_u8()?;
        let storage_type = StorageType::from_u8(raw_storage).ok_or(EncodingError::InvalidValue {
            field: "storage type",
            value: raw_storage as u64,
        })?;
        let keys_type = KeysType::from_u8(r.get_u8()?)?;
        Ok(Self {
            index_id,
            name,
            schema,
            schema_version,
            schema_hash,
            short_key_column_count,
            storage_type,
            keys_type,
        })
    }
}
