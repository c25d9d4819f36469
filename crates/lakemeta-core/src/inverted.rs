//! Lookup from tablet id to its position in the catalog hierarchy.
//!
//! The index never owns tablets. Everything in it is derived from the
//! table graph, and a loaded catalog checks that the two agree.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{EncodingError, SchemaError};
use crate::table::Table;
use crate::tablet::TabletMeta;
use crate::types::{DbId, TableId, TabletId};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TabletInvertedIndex {
    metas: HashMap<TabletId, TabletMeta>,
}

impl TabletInvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn add_tablet(&mut self, tablet_id: TabletId, meta: TabletMeta) -> Result<(), SchemaError> {
        if self.metas.contains_key(&tablet_id) {
            return Err(SchemaError::DuplicateTablet(tablet_id));
        }
        self.metas.insert(tablet_id, meta);
        Ok(())
    }

    pub fn tablet_meta(&self, tablet_id: TabletId) -> Option<&TabletMeta> {
        self.metas.get(&tablet_id)
    }

    pub fn remove_tablet(&mut self, tablet_id: TabletId) -> Option<TabletMeta> {
        self.metas.remove(&tablet_id)
    }

    /// Tablet ids of `table_id`, sorted.
    pub fn tablet_ids_for_table(&self, table_id: TableId) -> Vec<TabletId> {
        let mut ids: Vec<_> = self
            .metas
            .iter()
            .filter(|(_, meta)| meta.table_id == table_id)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Register `entries` as a unit: on a duplicate nothing is added.
    pub(crate) fn register(
        &mut self,
        entries: &[(TabletId, TabletMeta)],
    ) -> Result<(), SchemaError> {
        let mut seen = HashSet::with_capacity(entries.len());
        if let Some(&(dup, _)) = entries
            .iter()
            .find(|(id, _)| self.metas.contains_key(id) || !seen.insert(*id))
        {
            return Err(SchemaError::DuplicateTablet(dup));
        }
        self.metas.extend(entries.iter().copied());
        Ok(())
    }

    /// Register every tablet of `table`.
    pub fn register_table(&mut self, db_id: DbId, table: &Table) -> Result<(), SchemaError> {
        self.register(&table.olap().tablet_metas(db_id))
    }

    pub fn unregister(&mut self, tablet_ids: impl IntoIterator<Item = TabletId>) {
        for id in tablet_ids {
            self.metas.remove(&id);
        }
    }

    /// Check that the entries of `table` match what its hierarchy implies.
    pub fn validate_table(&self, db_id: DbId, table: &Table) -> Result<(), EncodingError> {
        let expected = table.olap().tablet_metas(db_id);
        for (tablet_id, meta) in &expected {
            match self.metas.get(tablet_id) {
                Some(found) if found == meta => {}
                Some(found) => {
                    warn!(
                        tablet_id,
                        ?found,
                        expected = ?meta,
                        "tablet meta diverges from hierarchy"
                    );
                    return Err(EncodingError::Inconsistent(format!(
                        "tablet {tablet_id}: indexed under table {} partition {} index {}, \
                         hierarchy says table {} partition {} index {}",
                        found.table_id,
                        found.partition_id,
                        found.index_id,
                        meta.table_id,
                        meta.partition_id,
                        meta.index_id
                    )));
                }
                None => {
                    warn!(tablet_id, table_id = table.id(), "tablet missing from inverted index");
                    return Err(EncodingError::Inconsistent(format!(
                        "tablet {tablet_id} of table {} is not indexed",
                        table.id()
                    )));
                }
            }
        }
        let indexed = self.tablet_ids_for_table(table.id()).len();
        if indexed != expected.len() {
            warn!(
                table_id = table.id(),
                indexed,
                expected = expected.len(),
                "stale tablet entries"
            );
            return Err(EncodingError::Inconsistent(format!(
                "table {} has {indexed} indexed tablets, hierarchy holds {}",
                table.id(),
                expected.len()
            )));
        }
        Ok(())
    }
}
