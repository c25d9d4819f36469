//! Tablets: the smallest unit of physically placed table data.

use crate::error::{EncodingError, SchemaError};
use crate::persist::{MetaReader, MetaWriter, Persist, Registry, Variant, read_seq, write_seq};
use crate::types::{
    BackendId, DbId, IndexId, PartitionId, ReplicaId, ShardId, StorageMedium, TableId, TabletId,
};

/// State of a single replica of a locally stored tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaState {
    #[default]
    Normal,
    Clone,
    Decommission,
}

impl ReplicaState {
    fn as_u8(self) -> u8 {
        match self {
            ReplicaState::Normal => 0,
            ReplicaState::Clone => 1,
            ReplicaState::Decommission => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self, EncodingError> {
        match value {
            0 => Ok(ReplicaState::Normal),
            1 => Ok(ReplicaState::Clone),
            2 => Ok(ReplicaState::Decommission),
            other => Err(EncodingError::InvalidValue {
                field: "replica state",
                value: other as u64,
            }),
        }
    }
}

/// One physical copy of a local tablet on a backend node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub id: ReplicaId,
    pub backend_id: BackendId,
    pub version: i64,
    pub state: ReplicaState,
}

impl Replica {
    pub fn new(id: ReplicaId, backend_id: BackendId, version: i64) -> Self {
        Self {
            id,
            backend_id,
            version,
            state: ReplicaState::Normal,
        }
    }
}

impl Persist for Replica {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_u64(self.id);
        w.put_u64(self.backend_id);
        w.put_i64(self.version);
        w.put_u8(self.state.as_u8());
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        Ok(Self {
            id: r.get_u64()?,
            backend_id: r.get_u64()?,
            version: r.get_i64()?,
            state: ReplicaState::from_u8(r.get_u8()?)?,
        })
    }
}

/// A conventionally replicated tablet stored on backend disks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTablet {
    id: TabletId,
    replicas: Vec<Replica>,
}

impl LocalTablet {
    pub fn new(id: TabletId) -> Self {
        Self {
            id,
            replicas: Vec::new(),
        }
    }

    pub fn id(&self) -> TabletId {
        self.id
    }

    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    pub fn replica(&self, id: ReplicaId) -> Option<&Replica> {
        self.replicas.iter().find(|r| r.id == id)
    }

    pub fn add_replica(&mut self, replica: Replica) -> Result<(), SchemaError> {
        if self.replica(replica.id).is_some() {
            return Err(SchemaError::DuplicateReplica(replica.id));
        }
        self.replicas.push(replica);
        Ok(())
    }

    pub fn remove_replica(&mut self, id: ReplicaId) -> Result<Replica, SchemaError> {
        let pos = self
            .replicas
            .iter()
            .position(|r| r.id == id)
            .ok_or(SchemaError::ReplicaNotFound(id))?;
        Ok(self.replicas.remove(pos))
    }
}

/// A tablet whose data lives in an object store behind the shard service.
///
/// The tablet id *is* the shard id; the mapping is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LakeTablet {
    id: TabletId,
}

impl LakeTablet {
    pub fn new(id: TabletId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TabletId {
        self.id
    }

    pub fn shard_id(&self) -> ShardId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tablet {
    Local(LocalTablet),
    Lake(LakeTablet),
}

const TAG_LOCAL_TABLET: u8 = 1;
const TAG_LAKE_TABLET: u8 = 2;

static TABLET_VARIANTS: Registry<Tablet> = Registry::new(
    "tablet",
    &[
        Variant {
            tag: TAG_LOCAL_TABLET,
            name: "local",
            read: read_local_tablet,
        },
        Variant {
            tag: TAG_LAKE_TABLET,
            name: "lake",
            read: read_lake_tablet,
        },
    ],
);

impl Tablet {
    pub fn new_local(id: TabletId) -> Self {
        Tablet::Local(LocalTablet::new(id))
    }

    pub fn new_lake(id: TabletId) -> Self {
        Tablet::Lake(LakeTablet::new(id))
    }

    pub fn id(&self) -> TabletId {
        match self {
            Tablet::Local(t) => t.id(),
            Tablet::Lake(t) => t.id(),
        }
    }

    pub fn is_lake(&self) -> bool {
        matches!(self, Tablet::Lake(_))
    }

    pub fn as_lake(&self) -> Option<&LakeTablet> {
        match self {
            Tablet::Lake(t) => Some(t),
            Tablet::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&LocalTablet> {
        match self {
            Tablet::Local(t) => Some(t),
            Tablet::Lake(_) => None,
        }
    }

    pub fn as_local_mut(&mut self) -> Option<&mut LocalTablet> {
        match self {
            Tablet::Local(t) => Some(t),
            Tablet::Lake(_) => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Tablet::Local(_) => TAG_LOCAL_TABLET,
            Tablet::Lake(_) => TAG_LAKE_TABLET,
        }
    }
}

impl From<LakeTablet> for Tablet {
    fn from(tablet: LakeTablet) -> Self {
        Tablet::Lake(tablet)
    }
}

impl From<LocalTablet> for Tablet {
    fn from(tablet: LocalTablet) -> Self {
        Tablet::Local(tablet)
    }
}

fn read_local_tablet(r: &mut MetaReader<'_>) -> Result<Tablet, EncodingError> {
    let mut tablet = LocalTablet::new(r.get_u64()?);
    for replica in read_seq::<Replica>(r)? {
        tablet
            .add_replica(replica)
            .map_err(|e| EncodingError::Inconsistent(e.to_string()))?;
    }
    Ok(Tablet::Local(tablet))
}

// The shard id is not stored separately: it is re-derived from the id.
fn read_lake_tablet(r: &mut MetaReader<'_>) -> Result<Tablet, EncodingError> {
    Ok(Tablet::Lake(LakeTablet::new(r.get_u64()?)))
}

impl Persist for Tablet {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_variant(self.tag(), |w| {
            w.put_u64(self.id());
            if let Tablet::Local(local) = self {
                write_seq(w, local.replicas.iter())?;
            }
            Ok(())
        })
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        r.get_variant(&TABLET_VARIANTS)
    }
}

/// Denormalized back-reference from a tablet to its position in the
/// catalog hierarchy.
///
/// Never owns anything; always derivable from the hierarchy (see
/// [`OlapTable::tablet_metas`](crate::table::OlapTable::tablet_metas)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabletMeta {
    pub db_id: DbId,
    pub table_id: TableId,
    pub partition_id: PartitionId,
    pub index_id: IndexId,
    pub schema_hash: i32,
    pub storage_medium: StorageMedium,
}

impl TabletMeta {
    pub fn new(
        db_id: DbId,
        table_id: TableId,
        partition_id: PartitionId,
        index_id: IndexId,
        schema_hash: i32,
        storage_medium: StorageMedium,
    ) -> Self {
        Self {
            db_id,
            table_id,
            partition_id,
            index_id,
            schema_hash,
            storage_medium,
        }
    }

    /// Name of the first field on which `self` and `other` disagree.
    pub fn conflicting_field(&self, other: &TabletMeta) -> Option<&'static str> {
        if self.db_id != other.db_id {
            Some("db id")
        } else if self.table_id != other.table_id {
            Some("table id")
        } else if self.partition_id != other.partition_id {
            Some("partition id")
        } else if self.index_id != other.index_id {
            Some("index id")
        } else if self.schema_hash != other.schema_hash {
            Some("schema hash")
        } else if self.storage_medium != other.storage_medium {
            Some("storage medium")
        } else {
            None
        }
    }
}
