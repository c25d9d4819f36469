//! How rows are bucketed across the tablets of an index.

use crate::error::{EncodingError, SchemaError};
use crate::persist::{MetaReader, MetaWriter, Persist, Registry, Variant, read_seq, write_seq};
use crate::schema::{Column, find_column};

/// Hash bucketing over an ordered set of key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDistributionInfo {
    bucket_num: u32,
    columns: Vec<Column>,
}

impl HashDistributionInfo {
    pub fn bucket_num(&self) -> u32 {
        self.bucket_num
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionInfo {
    Hash(HashDistributionInfo),
    /// Rows are spread over buckets without a key.
    Random { bucket_num: u32 },
}

const TAG_HASH: u8 = 1;
const TAG_RANDOM: u8 = 2;

static DISTRIBUTION_VARIANTS: Registry<DistributionInfo> = Registry::new(
    "distribution info",
    &[
        Variant {
            tag: TAG_HASH,
            name: "hash",
            read: read_hash,
        },
        Variant {
            tag: TAG_RANDOM,
            name: "random",
            read: read_random,
        },
    ],
);

impl DistributionInfo {
    pub fn hash(bucket_num: u32, columns: Vec<Column>) -> Result<Self, SchemaError> {
        if bucket_num == 0 {
            return Err(SchemaError::InvalidBucketNum(bucket_num));
        }
        if columns.is_empty() {
            return Err(SchemaError::EmptyDistributionColumns);
        }
        Ok(DistributionInfo::Hash(HashDistributionInfo {
            bucket_num,
            columns,
        }))
    }

    pub fn random(bucket_num: u32) -> Result<Self, SchemaError> {
        if bucket_num == 0 {
            return Err(SchemaError::InvalidBucketNum(bucket_num));
        }
        Ok(DistributionInfo::Random { bucket_num })
    }

    pub fn bucket_num(&self) -> u32 {
        match self {
            DistributionInfo::Hash(info) => info.bucket_num,
            DistributionInfo::Random { bucket_num } => *bucket_num,
        }
    }

    /// Distribution columns; empty for random distribution.
    pub fn columns(&self) -> &[Column] {
        match self {
            DistributionInfo::Hash(info) => &info.columns,
            DistributionInfo::Random { .. } => &[],
        }
    }

    /// Check that every distribution column is a key column of `schema`.
    pub fn validate_against(&self, schema: &[Column]) -> Result<(), SchemaError> {
        for col in self.columns() {
            let found = find_column(schema, col.name())
                .ok_or_else(|| SchemaError::UnknownDistributionColumn(col.name().to_string()))?;
            if !found.is_key() {
                return Err(SchemaError::DistributionColumnNotKey(col.name().to_string()));
            }
        }
        Ok(())
    }

    fn tag(&self) -> u8 {
        match self {
            DistributionInfo::Hash(_) => TAG_HASH,
            DistributionInfo::Random { .. } => TAG_RANDOM,
        }
    }
}

fn read_hash(r: &mut MetaReader<'_>) -> Result<DistributionInfo, EncodingError> {
    let bucket_num = r.get_u32()?;
    let columns = read_seq::<Column>(r)?;
    DistributionInfo::hash(bucket_num, columns)
        .map_err(|e| EncodingError::Inconsistent(e.to_string()))
}

fn read_random(r: &mut MetaReader<'_>) -> Result<DistributionInfo, EncodingError> {
    let bucket_num = r.get_u32()?;
    DistributionInfo::random(bucket_num).map_err(|e| EncodingError::Inconsistent(e.to_string()))
}

impl Persist for DistributionInfo {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_variant(self.tag(), |w| {
            w.put_u32(self.bucket_num());
            if let DistributionInfo::Hash(info) = self {
                write_seq(w, info.columns.iter())?;
            }
            Ok(())
        })
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        r.get_variant(&DISTRIBUTION_VARIANTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaContext;
    use crate::persist::{decode, encode};
    use crate::schema::{AggregateType, ColumnType};

    fn schema() -> Vec<Column> {
        vec![
            Column::key("k1", ColumnType::Int).unwrap(),
            Column::new("v", ColumnType::BigInt, false, Some(AggregateType::Sum), None, "")
                .unwrap(),
        ]
    }

    #[test]
    fn test_hash_distribution() {
        let k1 = Column::key("k1", ColumnType::Int).unwrap();
        let info = DistributionInfo::hash(10, vec![k1]).unwrap();
        assert_eq!(info.bucket_num(), 10);
        assert_eq!(info.columns().len(), 1);
        assert!(info.validate_against(&schema()).is_ok());
    }

    #[test]
    fn test_zero_buckets_rejected() {
        assert!(matches!(
            DistributionInfo::random(0),
            Err(SchemaError::InvalidBucketNum(0))
        ));
        let k1 = Column::key("k1", ColumnType::Int).unwrap();
        assert!(DistributionInfo::hash(0, vec![k1]).is_err());
    }

    #[test]
    fn test_hash_requires_columns() {
        assert!(matches!(
            DistributionInfo::hash(4, vec![]),
            Err(SchemaError::EmptyDistributionColumns)
        ));
    }

    #[test]
    fn test_distribution_column_must_be_key() {
        let v = schema().remove(1);
        let info = DistributionInfo::hash(4, vec![v]).unwrap();
        assert!(matches!(
            info.validate_against(&schema()),
            Err(SchemaError::DistributionColumnNotKey(_))
        ));
    }

    #[test]
    fn test_distribution_column_must_exist() {
        let k9 = Column::key("k9", ColumnType::Int).unwrap();
        let info = DistributionInfo::hash(4, vec![k9]).unwrap();
        assert!(matches!(
            info.validate_against(&schema()),
            Err(SchemaError::UnknownDistributionColumn(_))
        ));
    }

    #[test]
    fn test_random_has_no_columns() {
        let info = DistributionInfo::random(3).unwrap();
        assert!(info.columns().is_empty());
        assert!(info.validate_against(&schema()).is_ok());
    }

    #[test]
    fn test_persist_variants() {
        let k1 = Column::key("k1", ColumnType::Int).unwrap();
        for info in [
            DistributionInfo::hash(16, vec![k1]).unwrap(),
            DistributionInfo::random(8).unwrap(),
        ] {
            let bytes = encode(&info, MetaContext::current()).unwrap();
            assert_eq!(decode::<DistributionInfo>(&bytes).unwrap(), info);
        }
    }

    #[test]
    fn test_persist_rejects_zero_buckets() {
        let mut w = MetaWriter::new(MetaContext::current());
        w.put_u32(MetaContext::current().meta_version());
        w.put_variant(TAG_RANDOM, |w| {
            w.put_u32(0);
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            decode::<DistributionInfo>(&w.into_bytes()),
            Err(EncodingError::Inconsistent(_))
        ));
    }
}
