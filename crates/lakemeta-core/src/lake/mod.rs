//! Lake storage backend: object-store configuration and the shard service.
//!
//! A lake tablet does not own replicas. Its data lives in an object store
//! under the table's storage group, in a shard whose id is the tablet id.

mod shard;
mod storage_info;

pub use shard::{InMemoryShardManager, ShardLocation, ShardManager};
pub use storage_info::{ObjectStorageInfo, ShardStorageInfo};

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{Result, SchemaError};
use crate::index::MaterializedIndex;
use crate::table::LakeTable;
use crate::tablet::{Tablet, TabletMeta};
use crate::types::{ShardId, TabletId};

/// Allocate `count` shards for `table` and add a lake tablet per shard to
/// `index`, which must not yet be attached to the table.
///
/// Returns the new tablet ids in allocation order. On failure the index is
/// left unchanged and the shards allocated so far are handed back through
/// [`ShardManager::release_shard`].
pub fn create_lake_tablets<M>(
    manager: &M,
    table: &LakeTable,
    index: &mut MaterializedIndex,
    meta: &TabletMeta,
    count: usize,
) -> Result<Vec<TabletId>>
where
    M: ShardManager + ?Sized,
{
    let table_id = table.olap().id();
    let storage_info = table
        .shard_storage_info()
        .ok_or(SchemaError::MissingShardStorageInfo(table_id))?;
    let storage_group = table
        .storage_group()
        .ok_or(SchemaError::MissingShardStorageInfo(table_id))?;
    if meta.index_id != index.id() {
        return Err(SchemaError::IndexMetaMismatch {
            expected: index.id(),
            actual: meta.index_id,
        }
        .into());
    }

    let mut shard_ids = Vec::with_capacity(count);
    for _ in 0..count {
        match manager.allocate_shard(storage_info, &storage_group) {
            Ok(shard_id) => shard_ids.push(shard_id),
            Err(e) => {
                release_shards(manager, index, &shard_ids);
                return Err(e.into());
            }
        }
    }
    let mut seen = HashSet::with_capacity(shard_ids.len());
    if let Some(&dup) = shard_ids
        .iter()
        .find(|&&id| index.contains_tablet(id) || !seen.insert(id))
    {
        release_shards(manager, index, &shard_ids);
        return Err(SchemaError::DuplicateTablet(dup).into());
    }
    for &shard_id in &shard_ids {
        index.add_tablet(Tablet::new_lake(shard_id), meta)?;
    }
    info!(
        table_id,
        index_id = index.id(),
        count,
        storage_group = %storage_group,
        "created lake tablets"
    );
    Ok(shard_ids)
}

/// Release each allocated shard once. Ids already backing a tablet of
/// `index` are skipped.
fn release_shards<M>(manager: &M, index: &MaterializedIndex, shard_ids: &[ShardId])
where
    M: ShardManager + ?Sized,
{
    let mut released = HashSet::new();
    for &shard_id in shard_ids {
        if index.contains_tablet(shard_id) || !released.insert(shard_id) {
            continue;
        }
        if let Err(e) = manager.release_shard(shard_id) {
            warn!(shard_id, error = %e, "failed to release shard");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind, ShardError};
    use crate::index::IndexState;
    use crate::table::test_fixtures::{lake_table, sample_table};
    use crate::types::StorageMedium;
    use parking_lot::Mutex;

    fn meta(index_id: u64) -> TabletMeta {
        TabletMeta::new(1, 2, 3, index_id, 0, StorageMedium::Hdd)
    }

    #[test]
    fn test_create_lake_tablets() {
        let table = lake_table();
        let manager = InMemoryShardManager::new(10);
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        let ids = create_lake_tablets(&manager, &table, &mut index, &meta(4), 2).unwrap();
        assert_eq!(ids, vec![10, 11]);
        for tablet in index.tablets() {
            let lake = tablet.as_lake().unwrap();
            assert_eq!(lake.shard_id(), lake.id());
        }
        assert_eq!(
            manager.resolve_shard(10).unwrap().path,
            "s3://bucket/service/2/10"
        );
    }

    #[test]
    fn test_create_requires_storage_info() {
        let table = LakeTable::new(sample_table());
        let manager = InMemoryShardManager::new(10);
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        let err = create_lake_tablets(&manager, &table, &mut index, &meta(4), 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::MissingShardStorageInfo(2))
        ));
        assert_eq!(manager.shard_count(), 0);
    }

    #[test]
    fn test_create_rejects_foreign_meta() {
        let table = lake_table();
        let manager = InMemoryShardManager::new(10);
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        assert!(create_lake_tablets(&manager, &table, &mut index, &meta(5), 1).is_err());
        assert_eq!(manager.shard_count(), 0);
    }

    struct DownShardManager;

    impl ShardManager for DownShardManager {
        fn allocate_shard(
            &self,
            _: &ShardStorageInfo,
            _: &str,
        ) -> std::result::Result<ShardId, ShardError> {
            Err(ShardError::Unavailable("connection refused".to_string()))
        }

        fn resolve_shard(
            &self,
            shard_id: ShardId,
        ) -> std::result::Result<ShardLocation, ShardError> {
            Err(ShardError::ShardNotFound(shard_id))
        }
    }

    #[test]
    fn test_shard_service_failure_leaves_index_empty() {
        let table = lake_table();
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        let err = create_lake_tablets(&DownShardManager, &table, &mut index, &meta(4), 3)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shard);
        assert_eq!(index.tablet_count(), 0);
    }

    /// Hands out the same shard id every time.
    #[derive(Default)]
    struct FixedShardManager {
        released: Mutex<Vec<ShardId>>,
    }

    impl ShardManager for FixedShardManager {
        fn allocate_shard(
            &self,
            _: &ShardStorageInfo,
            _: &str,
        ) -> std::result::Result<ShardId, ShardError> {
            Ok(7)
        }

        fn resolve_shard(
            &self,
            shard_id: ShardId,
        ) -> std::result::Result<ShardLocation, ShardError> {
            Err(ShardError::ShardNotFound(shard_id))
        }

        fn release_shard(&self, shard_id: ShardId) -> std::result::Result<(), ShardError> {
            self.released.lock().push(shard_id);
            Ok(())
        }
    }

    #[test]
    fn test_repeated_shard_id_leaves_index_empty() {
        let table = lake_table();
        let manager = FixedShardManager::default();
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        match create_lake_tablets(&manager, &table, &mut index, &meta(4), 2) {
            Err(Error::Schema(SchemaError::DuplicateTablet(7))) => {}
            other => panic!("expected DuplicateTablet, got {other:?}"),
        }
        assert_eq!(index.tablet_count(), 0);
        assert_eq!(*manager.released.lock(), vec![7]);
    }

    #[test]
    fn test_shard_clashing_with_index_is_not_released() {
        let table = lake_table();
        let manager = FixedShardManager::default();
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        index.add_tablet(Tablet::new_lake(7), &meta(4)).unwrap();
        assert!(create_lake_tablets(&manager, &table, &mut index, &meta(4), 1).is_err());
        assert_eq!(index.tablet_count(), 1);
        assert!(manager.released.lock().is_empty());
    }

    /// Allocates from memory until `budget` runs out, then reports the
    /// service as down.
    struct FlakyShardManager {
        inner: InMemoryShardManager,
        budget: Mutex<usize>,
    }

    impl ShardManager for FlakyShardManager {
        fn allocate_shard(
            &self,
            storage_info: &ShardStorageInfo,
            storage_group: &str,
        ) -> std::result::Result<ShardId, ShardError> {
            let mut budget = self.budget.lock();
            if *budget == 0 {
                return Err(ShardError::Unavailable("timed out".to_string()));
            }
            *budget -= 1;
            self.inner.allocate_shard(storage_info, storage_group)
        }

        fn resolve_shard(
            &self,
            shard_id: ShardId,
        ) -> std::result::Result<ShardLocation, ShardError> {
            self.inner.resolve_shard(shard_id)
        }

        fn release_shard(&self, shard_id: ShardId) -> std::result::Result<(), ShardError> {
            self.inner.release_shard(shard_id)
        }
    }

    #[test]
    fn test_partial_allocation_releases_shards() {
        let table = lake_table();
        let manager = FlakyShardManager {
            inner: InMemoryShardManager::new(10),
            budget: Mutex::new(2),
        };
        let mut index = MaterializedIndex::new(4, IndexState::Normal);
        let err = create_lake_tablets(&manager, &table, &mut index, &meta(4), 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shard);
        assert_eq!(index.tablet_count(), 0);
        assert_eq!(manager.inner.shard_count(), 0);
    }
}
