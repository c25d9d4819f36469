use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ShardError;
use crate::lake::ShardStorageInfo;
use crate::types::ShardId;

/// Physical placement of one shard, as reported by the shard service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLocation {
    pub shard_id: ShardId,
    /// Full object-store path of the shard's data.
    pub path: String,
    pub endpoint: String,
}

/// Client side of the external shard-management service.
///
/// Only consulted while creating lake tablets, never by the codec.
pub trait ShardManager {
    /// Allocate a new shard under `storage_group`.
    fn allocate_shard(
        &self,
        storage_info: &ShardStorageInfo,
        storage_group: &str,
    ) -> Result<ShardId, ShardError>;

    fn resolve_shard(&self, shard_id: ShardId) -> Result<ShardLocation, ShardError>;

    /// Give back a shard that was allocated but never used.
    ///
    /// Managers that cannot reclaim shards keep the default, which leaves
    /// the shard orphaned.
    fn release_shard(&self, shard_id: ShardId) -> Result<(), ShardError> {
        let _ = shard_id;
        Ok(())
    }
}

struct ShardTable {
    next_id: ShardId,
    shards: HashMap<ShardId, ShardLocation>,
}

/// Shard manager that hands out sequential ids from memory.
pub struct InMemoryShardManager {
    inner: Mutex<ShardTable>,
}

impl InMemoryShardManager {
    /// Create a manager whose first allocated shard id is `first_id`.
    pub fn new(first_id: ShardId) -> Self {
        Self {
            inner: Mutex::new(ShardTable {
                next_id: first_id,
                shards: HashMap::new(),
            }),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.inner.lock().shards.len()
    }
}

impl ShardManager for InMemoryShardManager {
    fn allocate_shard(
        &self,
        storage_info: &ShardStorageInfo,
        storage_group: &str,
    ) -> Result<ShardId, ShardError> {
        let mut inner = self.inner.lock();
        let shard_id = inner.next_id;
        inner.next_id = shard_id
            .checked_add(1)
            .ok_or_else(|| ShardError::Unavailable("shard id space exhausted".to_string()))?;
        let location = ShardLocation {
            shard_id,
            path: format!("{storage_group}{shard_id}"),
            endpoint: storage_info.endpoint().to_string(),
        };
        debug!(shard_id, path = %location.path, "allocated shard");
        inner.shards.insert(shard_id, location);
        Ok(shard_id)
    }

    fn resolve_shard(&self, shard_id: ShardId) -> Result<ShardLocation, ShardError> {
        self.inner
            .lock()
            .shards
            .get(&shard_id)
            .cloned()
            .ok_or(ShardError::ShardNotFound(shard_id))
    }

    fn release_shard(&self, shard_id: ShardId) -> Result<(), ShardError> {
        self.inner
            .lock()
            .shards
            .remove(&shard_id)
            .ok_or(ShardError::ShardNotFound(shard_id))?;
        debug!(shard_id, "released shard");
        Ok(())
    }
}
