use std::fmt;

use crate::error::{EncodingError, SchemaError};
use crate::persist::{MetaReader, MetaWriter, Persist};
use crate::types::META_VERSION_3;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    LargeInt,
    Float,
    Double,
    Date,
    Datetime,
    Char(u32),
    Varchar(u32),
    Decimal { precision: u8, scale: u8 },
}

const TYPE_BOOLEAN: u8 = 1;
const TYPE_TINYINT: u8 = 2;
const TYPE_SMALLINT: u8 = 3;
const TYPE_INT: u8 = 4;
const TYPE_BIGINT: u8 = 5;
const TYPE_LARGEINT: u8 = 6;
const TYPE_FLOAT: u8 = 7;
const TYPE_DOUBLE: u8 = 8;
const TYPE_DATE: u8 = 9;
const TYPE_DATETIME: u8 = 10;
const TYPE_CHAR: u8 = 11;
const TYPE_VARCHAR: u8 = 12;
const TYPE_DECIMAL: u8 = 13;

impl ColumnType {
    fn tag(&self) -> u8 {
        match self {
            ColumnType::Boolean => TYPE_BOOLEAN,
            ColumnType::TinyInt => TYPE_TINYINT,
            ColumnType::SmallInt => TYPE_SMALLINT,
            ColumnType::Int => TYPE_INT,
            ColumnType::BigInt => TYPE_BIGINT,
            ColumnType::LargeInt => TYPE_LARGEINT,
            ColumnType::Float => TYPE_FLOAT,
            ColumnType::Double => TYPE_DOUBLE,
            ColumnType::Date => TYPE_DATE,
            ColumnType::Datetime => TYPE_DATETIME,
            ColumnType::Char(_) => TYPE_CHAR,
            ColumnType::Varchar(_) => TYPE_VARCHAR,
            ColumnType::Decimal { .. } => TYPE_DECIMAL,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::TinyInt => write!(f, "TINYINT"),
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::Int => write!(f, "INT"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::LargeInt => write!(f, "LARGEINT"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Double => write!(f, "DOUBLE"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Datetime => write!(f, "DATETIME"),
            ColumnType::Char(len) => write!(f, "CHAR({len})"),
            ColumnType::Varchar(len) => write!(f, "VARCHAR({len})"),
            ColumnType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
        }
    }
}

impl Persist for ColumnType {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_u8(self.tag());
        match self {
            ColumnType::Char(len) | ColumnType::Varchar(len) => w.put_u32(*len),
            ColumnType::Decimal { precision, scale } => {
                w.put_u8(*precision);
                w.put_u8(*scale);
            }
            _ => {}
        }
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let tag = r.get_u8()?;
        Ok(match tag {
            TYPE_BOOLEAN => ColumnType::Boolean,
            TYPE_TINYINT => ColumnType::TinyInt,
            TYPE_SMALLINT => ColumnType::SmallInt,
            TYPE_INT => ColumnType::Int,
            TYPE_BIGINT => ColumnType::BigInt,
            TYPE_LARGEINT => ColumnType::LargeInt,
            TYPE_FLOAT => ColumnType::Float,
            TYPE_DOUBLE => ColumnType::Double,
            TYPE_DATE => ColumnType::Date,
            TYPE_DATETIME => ColumnType::Datetime,
            TYPE_CHAR => ColumnType::Char(r.get_u32()?),
            TYPE_VARCHAR => ColumnType::Varchar(r.get_u32()?),
            TYPE_DECIMAL => ColumnType::Decimal {
                precision: r.get_u8()?,
                scale: r.get_u8()?,
            },
            _ => {
                return Err(EncodingError::UnknownVariant {
                    family: "column type",
                    tag,
                });
            }
        })
    }
}

/// How a non-key column merges values in an aggregate-keys table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateType {
    Sum,
    Max,
    Min,
    Replace,
    ReplaceIfNotNull,
    HllUnion,
    BitmapUnion,
}

impl AggregateType {
    /// 0 is reserved for "no aggregate type" on disk.
    fn as_u8(self) -> u8 {
        match self {
            AggregateType::Sum => 1,
            AggregateType::Max => 2,
            AggregateType::Min => 3,
            AggregateType::Replace => 4,
            AggregateType::ReplaceIfNotNull => 5,
            AggregateType::HllUnion => 6,
            AggregateType::BitmapUnion => 7,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AggregateType::Sum),
            2 => Some(AggregateType::Max),
            3 => Some(AggregateType::Min),
            4 => Some(AggregateType::Replace),
            5 => Some(AggregateType::ReplaceIfNotNull),
            6 => Some(AggregateType::HllUnion),
            7 => Some(AggregateType::BitmapUnion),
            _ => None,
        }
    }
}

/// A column definition.
///
/// Columns are immutable values; schema changes produce a new schema
/// version with new columns rather than editing attached ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    is_key: bool,
    aggregate_type: Option<AggregateType>,
    allow_null: bool,
    default_value: Option<String>,
    comment: String,
}

impl Column {
    /// Create a column.
    ///
    /// Key columns never aggregate. Whether a value column needs an
    /// aggregate type depends on the table's keys type and is checked by
    /// [`validate_schema`](super::validate_schema).
    pub fn new(
        name: impl Into<String>,
        column_type: ColumnType,
        is_key: bool,
        aggregate_type: Option<AggregateType>,
        default_value: Option<String>,
        comment: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName("column"));
        }
        if is_key && aggregate_type.is_some() {
            return Err(SchemaError::UnexpectedAggregateType(name));
        }
        Ok(Self {
            name,
            column_type,
            is_key,
            aggregate_type,
            allow_null: !is_key,
            default_value,
            comment: comment.into(),
        })
    }

    /// Key column shorthand.
    pub fn key(name: impl Into<String>, column_type: ColumnType) -> Result<Self, SchemaError> {
        Self::new(name, column_type, true, None, None, "")
    }

    pub fn with_allow_null(mut self, allow_null: bool) -> Self {
        self.allow_null = allow_null;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn aggregate_type(&self) -> Option<AggregateType> {
        self.aggregate_type
    }

    pub fn allow_null(&self) -> bool {
        self.allow_null
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Column names compare case-insensitively.
    pub fn name_eq(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

impl Persist for Column {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError> {
        w.put_str(&self.name)?;
        self.column_type.write_to(w)?;
        w.put_bool(self.is_key);
        w.put_u8(self.aggregate_type.map_or(0, AggregateType::as_u8));
        w.put_opt_str(self.default_value.as_deref())?;
        if w.context().has(META_VERSION_3) {
            w.put_bool(self.allow_null);
            w.put_str(&self.comment)?;
        }
        Ok(())
    }

    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError> {
        let name = r.get_str("column name")?;
        let column_type = ColumnType::read_from(r)?;
        let is_key = r.get_bool()?;
        let aggregate_type = match r.get_u8()? {
            0 => None,
            raw => Some(AggregateType::from_u8(raw).ok_or(EncodingError::InvalidValue {
                field: "aggregate type",
                value: raw as u64,
            })?),
        };
        let default_value = r.get_opt_str("column default value")?;
        let (allow_null, comment) = if r.context().has(META_VERSION_3) {
            (r.get_bool()?, r.get_str("column comment")?)
        } else {
            (!is_key, String::new())
        };

        let column = Column::new(name, column_type, is_key, aggregate_type, default_value, comment)
            .map_err(|e| EncodingError::Inconsistent(e.to_string()))?;
        Ok(column.with_allow_null(allow_null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetaContext;
    use crate::persist::{decode, encode};
    use crate::types::META_VERSION_2;

    #[test]
    fn test_new_column() {
        let col = Column::new(
            "v",
            ColumnType::BigInt,
            false,
            Some(AggregateType::Sum),
            Some("0".to_string()),
            "value",
        )
        .unwrap();
        assert_eq!(col.name(), "v");
        assert_eq!(col.column_type(), ColumnType::BigInt);
        assert!(!col.is_key());
        assert_eq!(col.aggregate_type(), Some(AggregateType::Sum));
        assert_eq!(col.default_value(), Some("0"));
        assert_eq!(col.comment(), "value");
        assert!(col.allow_null());
    }

    #[test]
    fn test_empty_name_rejected() {
        match Column::key("", ColumnType::Int) {
            Err(SchemaError::EmptyName("column")) => {}
            other => panic!("expected EmptyName, got {other:?}"),
        }
    }

    #[test]
    fn test_key_with_aggregate_rejected() {
        let err = Column::new("k", ColumnType::Int, true, Some(AggregateType::Max), None, "");
        assert!(matches!(err, Err(SchemaError::UnexpectedAggregateType(_))));
    }

    #[test]
    fn test_name_eq_ignores_case() {
        let col = Column::key("UserId", ColumnType::BigInt).unwrap();
        assert!(col.name_eq("userid"));
        assert!(!col.name_eq("user_id"));
    }

    #[test]
    fn test_column_type_display() {
        assert_eq!(ColumnType::Varchar(64).to_string(), "VARCHAR(64)");
        assert_eq!(
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
            .to_string(),
            "DECIMAL(10,2)"
        );
    }

    #[test]
    fn test_column_persist_current() {
        let col = Column::new(
            "city",
            ColumnType::Varchar(32),
            false,
            Some(AggregateType::Replace),
            None,
            "where",
        )
        .unwrap()
        .with_allow_null(false);
        let bytes = encode(&col, MetaContext::current()).unwrap();
        assert_eq!(decode::<Column>(&bytes).unwrap(), col);
    }

    #[test]
    fn test_column_persist_before_comment_version() {
        let col = Column::new(
            "price",
            ColumnType::Decimal {
                precision: 12,
                scale: 4,
            },
            false,
            Some(AggregateType::Max),
            None,
            "dropped at v2",
        )
        .unwrap()
        .with_allow_null(false);
        let bytes = encode(&col, MetaContext::new(META_VERSION_2)).unwrap();
        let decoded = decode::<Column>(&bytes).unwrap();
        assert_eq!(decoded.name(), "price");
        assert_eq!(decoded.comment(), "");
        // Fields added at v3 fall back to their defaults.
        assert!(decoded.allow_null());
    }

    #[test]
    fn test_unknown_column_type_tag() {
        let mut r = MetaReader::new(&[99], MetaContext::current());
        assert!(matches!(
            ColumnType::read_from(&mut r),
            Err(EncodingError::UnknownVariant {
                family: "column type",
                tag: 99
            })
        ));
    }
}
