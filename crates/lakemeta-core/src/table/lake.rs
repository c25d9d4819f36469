use tracing::debug;

use crate::error::EncodingError;
use crate::lake::ShardStorageInfo;
use crate::persist::{MetaReader, MetaWriter, Persist};
use crate::table::OlapTable;

/// A table whose data lives in an object store managed by the shard
/// service.
///
/// Carries everything an [`OlapTable`] does plus the backend configuration.
/// The storage group is derived from that configuration on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakeTable {
    olap: OlapTable,
    shard_storage_info: Option<ShardStorageInfo>,
}

impl LakeTable {
    pub fn new(olap: OlapTable) -> Self {
        Self {
            olap,
            shard_storage_info: None,
        }
    }

    pub fn olap(&self) -> &OlapTable {
        &self.olap
    }

    pub fn olap_mut(&mut self) -> &mut OlapTable {
        &mut self.olap
    }

    pub fn into_olap(self) -> OlapTable {
        self.olap
    }

    /// Attach backend configuration, replacing any previous value.
    pub fn set_shard_storage_info(&mut self, info: ShardStorageInfo) {
        debug!(
            table_id = self.olap.id(),
            object_uri = %info.object_uri(),
            endpoint = %info.endpoint(),
            "set shard storage info"
        );
        self.shard_storage_info = Some(info);
    }

    pub fn shard_storage_info(&self) -> Option<&ShardStorageInfo> {
        self.shard_storage_info.as_ref()
    }

    /// `<object_uri><table_id>/`, or `None` without backend configuration.
    pub fn storage_group(&self) -> Option<String> {
        self.shard_storage_info
            .as_ref()
            .map(|info| format!("{}{}/", info.object_uri(), self.olap.id()))
    }
}

// Body: the OLAP table, then `[len u32][storage info]` with len 0 for none.
impl Persist for LakeTable {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        self.olap.write_to(w)?;
        match &self.shard_storage_info {
            Some(info) => w.put_bytes(&info.to_bytes()?),
            None => w.put_len(0),
        }
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let olap = OlapTable::read_from(r)?;
        let block = r.get_bytes()?;
        let shard_storage_info = if block.is_empty() {
            None
        } else {
            Some(ShardStorageInfo::from_bytes(block)?)
        };
        Ok(Self {
            olap,
            shard_storage_info,
        })
    }
}
