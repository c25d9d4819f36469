use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{EncodingError, SchemaError};
use crate::persist::{MetaReader, MetaWriter, Persist, Registry, Variant, read_seq, write_seq};
use crate::schema::Column;
use crate::types::{PartitionId, StorageMedium};

/// One component of a range partition bound.
///
/// `Max` sorts above every concrete value and stands for an open upper bound.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartitionValue {
    Int(i64),
    Str(String),
    Max,
}

const VALUE_INT: u8 = 0;
const VALUE_STR: u8 = 1;
const VALUE_MAX: u8 = 2;

impl Persist for PartitionValue {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        match self {
            PartitionValue::Int(v) => {
                w.put_u8(VALUE_INT);
                w.put_i64(*v);
            }
            PartitionValue::Str(s) => {
                w.put_u8(VALUE_STR);
                w.put_str(s)?;
            }
            PartitionValue::Max => w.put_u8(VALUE_MAX),
        }
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        match r.get_u8()? {
            VALUE_INT => Ok(PartitionValue::Int(r.get_i64()?)),
            VALUE_STR => Ok(PartitionValue::Str(r.get_str("partition value")?)),
            VALUE_MAX => Ok(PartitionValue::Max),
            other => Err(EncodingError::InvalidValue {
                field: "partition value",
                value: other as u64,
            }),
        }
    }
}

/// Tuple of values, one per partition column, compared lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionKey(Vec<PartitionValue>);

impl PartitionKey {
    pub fn new(values: Vec<PartitionValue>) -> Self {
        Self(values)
    }

    /// A key above every other key of `arity` columns.
    pub fn max(arity: usize) -> Self {
        Self(vec![PartitionValue::Max; arity])
    }

    pub fn values(&self) -> &[PartitionValue] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }
}

impl From<i64> for PartitionKey {
    fn from(v: i64) -> Self {
        Self(vec![PartitionValue::Int(v)])
    }
}

impl Persist for PartitionKey {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        write_seq(w, self.0.iter())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        Ok(Self(read_seq(r)?))
    }
}

/// Half-open key range `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRange {
    pub lower: PartitionKey,
    pub upper: PartitionKey,
}

impl PartitionRange {
    pub fn contains(&self, key: &PartitionKey) -> bool {
        self.lower <= *key && *key < self.upper
    }

    fn overlaps(&self, other: &PartitionRange) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePartitionInfo {
    columns: Vec<Column>,
    ranges: BTreeMap<PartitionId, PartitionRange>,
}

impl RangePartitionInfo {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn range(&self, partition_id: PartitionId) -> Option<&PartitionRange> {
        self.ranges.get(&partition_id)
    }

    pub fn ranges(&self) -> impl Iterator<Item = (PartitionId, &PartitionRange)> + '_ {
        self.ranges.iter().map(|(&id, range)| (id, range))
    }

    fn add_range(
        &mut self,
        partition_id: PartitionId,
        range: PartitionRange,
    ) -> Result<(), SchemaError> {
        let arity = self.columns.len();
        if range.lower.arity() != arity || range.upper.arity() != arity {
            return Err(SchemaError::InvalidRange(format!(
                "bounds must have {arity} values"
            )));
        }
        if range.lower.cmp(&range.upper) != Ordering::Less {
            return Err(SchemaError::InvalidRange(format!(
                "lower bound {:?} is not below upper bound {:?}",
                range.lower, range.upper
            )));
        }
        if self.ranges.contains_key(&partition_id) {
            return Err(SchemaError::DuplicatePartition(partition_id));
        }
        if let Some((&existing, _)) = self.ranges.iter().find(|(_, r)| r.overlaps(&range)) {
            return Err(SchemaError::RangeOverlap {
                partition_id,
                existing,
            });
        }
        self.ranges.insert(partition_id, range);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionKind {
    /// The whole table is one partition.
    Single,
    Range(RangePartitionInfo),
}

/// Partitioning strategy of a table plus per-partition properties.
///
/// Every partition attached to a table has a replication number here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    kind: PartitionKind,
    replication_num: BTreeMap<PartitionId, i16>,
    storage_medium: BTreeMap<PartitionId, StorageMedium>,
    in_memory: BTreeMap<PartitionId, bool>,
}

const TAG_SINGLE: u8 = 1;
const TAG_RANGE: u8 = 2;

static PARTITION_INFO_VARIANTS: Registry<PartitionInfo> = Registry::new(
    "partition info",
    &[
        Variant {
            tag: TAG_SINGLE,
            name: "single",
            read: read_single,
        },
        Variant {
            tag: TAG_RANGE,
            name: "range",
            read: read_range,
        },
    ],
);

impl PartitionInfo {
    fn with_kind(kind: PartitionKind) -> Self {
        Self {
            kind,
            replication_num: BTreeMap::new(),
            storage_medium: BTreeMap::new(),
            in_memory: BTreeMap::new(),
        }
    }

    pub fn single() -> Self {
        Self::with_kind(PartitionKind::Single)
    }

    pub fn range(columns: Vec<Column>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::InvalidRange(
                "range partitioning needs at least one column".to_string(),
            ));
        }
        Ok(Self::with_kind(PartitionKind::Range(RangePartitionInfo {
            columns,
            ranges: BTreeMap::new(),
        })))
    }

    pub fn kind(&self) -> &PartitionKind {
        &self.kind
    }

    pub fn is_range(&self) -> bool {
        matches!(self.kind, PartitionKind::Range(_))
    }

    pub fn range_info(&self) -> Option<&RangePartitionInfo> {
        match &self.kind {
            PartitionKind::Range(info) => Some(info),
            PartitionKind::Single => None,
        }
    }

    pub fn set_replication_num(
        &mut self,
        partition_id: PartitionId,
        replication_num: i16,
    ) -> Result<(), SchemaError> {
        if replication_num < 1 {
            return Err(SchemaError::InvalidReplicationNum {
                partition_id,
                replication_num,
            });
        }
        debug!(partition_id, replication_num, "set replication number");
        self.replication_num.insert(partition_id, replication_num);
        Ok(())
    }

    pub fn replication_num(&self, partition_id: PartitionId) -> Result<i16, SchemaError> {
        self.replication_num
            .get(&partition_id)
            .copied()
            .ok_or(SchemaError::ReplicationNumNotFound(partition_id))
    }

    pub fn has_replication_num(&self, partition_id: PartitionId) -> bool {
        self.replication_num.contains_key(&partition_id)
    }

    pub fn set_storage_medium(&mut self, partition_id: PartitionId, medium: StorageMedium) {
        self.storage_medium.insert(partition_id, medium);
    }

    /// Storage medium of a partition, HDD when never set.
    pub fn storage_medium(&self, partition_id: PartitionId) -> StorageMedium {
        self.storage_medium
            .get(&partition_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn has_storage_medium(&self, partition_id: PartitionId) -> bool {
        self.storage_medium.contains_key(&partition_id)
    }

    pub fn set_in_memory(&mut self, partition_id: PartitionId, in_memory: bool) {
        self.in_memory.insert(partition_id, in_memory);
    }

    pub fn is_in_memory(&self, partition_id: PartitionId) -> bool {
        self.in_memory.get(&partition_id).copied().unwrap_or(false)
    }

    /// Assign `[lower, upper)` to a partition of a range-partitioned table.
    pub fn add_range(
        &mut self,
        partition_id: PartitionId,
        lower: PartitionKey,
        upper: PartitionKey,
    ) -> Result<(), SchemaError> {
        match &mut self.kind {
            PartitionKind::Range(info) => {
                info.add_range(partition_id, PartitionRange { lower, upper })
            }
            PartitionKind::Single => Err(SchemaError::InvalidRange(
                "table is not range partitioned".to_string(),
            )),
        }
    }

    /// The partition whose range contains `key`.
    pub fn partition_for_key(&self, key: &PartitionKey) -> Option<PartitionId> {
        self.range_info()?
            .ranges()
            .find(|(_, range)| range.contains(key))
            .map(|(id, _)| id)
    }

    /// Forget every per-partition entry of `partition_id`.
    pub(crate) fn drop_partition(&mut self, partition_id: PartitionId) {
        self.replication_num.remove(&partition_id);
        self.storage_medium.remove(&partition_id);
        self.in_memory.remove(&partition_id);
        if let PartitionKind::Range(info) = &mut self.kind {
            info.ranges.remove(&partition_id);
        }
    }

    fn tag(&self) -> u8 {
        match self.kind {
            PartitionKind::Single => TAG_SINGLE,
            PartitionKind::Range(_) => TAG_RANGE,
        }
    }

    fn write_properties(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_len(self.replication_num.len())?;
        for (&id, &num) in &self.replication_num {
            w.put_u64(id);
            w.put_i16(num);
        }
        w.put_len(self.storage_medium.len())?;
        for (&id, &medium) in &self.storage_medium {
            w.put_u64(id);
            w.put_u8(medium.as_u8());
        }
        w.put_len(self.in_memory.len())?;
        for (&id, &in_memory) in &self.in_memory {
            w.put_u64(id);
            w.put_bool(in_memory);
        }
        Ok(())
    }

    fn read_properties(&mut self, r: &mut MetaReader<'_>) -> Result<(), EncodingError> {
        let repeated = |what: &str, id: PartitionId| {
            EncodingError::Inconsistent(format!("{what} of partition {id} appears twice"))
        };
        for _ in 0..r.get_count()? {
            let id = r.get_u64()?;
            let num = r.get_i16()?;
            if self.replication_num.contains_key(&id) {
                return Err(repeated("replication number", id));
            }
            self.set_replication_num(id, num)
                .map_err(|e| EncodingError::Inconsistent(e.to_string()))?;
        }
        for _ in 0..r.get_count()? {
            let id = r.get_u64()?;
            let raw = r.get_u8()?;
            let medium = StorageMedium::from_u8(raw).ok_or(EncodingError::InvalidValue {
                field: "storage medium",
                value: raw as u64,
            })?;
            if self.storage_medium.insert(id, medium).is_some() {
                return Err(repeated("storage medium", id));
            }
        }
        for _ in 0..r.get_count()? {
            let id = r.get_u64()?;
            let in_memory = r.get_bool()?;
            if self.in_memory.insert(id, in_memory).is_some() {
                return Err(repeated("in-memory flag", id));
            }
        }
        Ok(())
    }
}

fn read_single(r: &mut MetaReader<'_>) -> Result<PartitionInfo, EncodingError> {
    let mut info = PartitionInfo::single();
    info.read_properties(r)?;
    Ok(info)
}

fn read_range(r: &mut MetaReader<'_>) -> Result<PartitionInfo, EncodingError> {
    let columns = read_seq::<Column>(r)?;
    let mut info =
        PartitionInfo::range(columns).map_err(|e| EncodingError::Inconsistent(e.to_string()))?;
    for _ in 0..r.get_count()? {
        let id = r.get_u64()?;
        let lower = PartitionKey::read_from(r)?;
        let upper = PartitionKey::read_from(r)?;
        info.add_range(id, lower, upper)
            .map_err(|e| EncodingError::Inconsistent(e.to_string()))?;
    }
    info.read_properties(r)?;
    Ok(info)
}

impl Persist for PartitionInfo {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_variant(self.tag(), |w| {
            if let PartitionKind::Range(info) = &self.kind {
                write_seq(w, info.columns.iter())?;
                w.put_len(info.ranges.len())?;
                for (&id, range) in &info.ranges {
                    w.put_u64(id);
                    range.lower.write_to(w)?;
                    range.upper.write_to(w)?;
                }
            }
            self.write_properties(w)
        })
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        r.get_variant(&PARTITION_INFO_VARIANTS)
    }
}
