//! Column and schema model.

mod column;

pub use column::{AggregateType, Column, ColumnType};

use crate::error::{EncodingError, SchemaError};

/// How rows with equal keys are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeysType {
    /// Duplicate keys are kept.
    DupKeys,
    /// Rows with equal keys are merged with per-column aggregate functions.
    AggKeys,
    /// The latest row for a key wins.
    UniqueKeys,
    /// Primary-key table with upsert semantics.
    PrimaryKeys,
}

impl KeysType {
    pub fn as_u8(self) -> u8 {
        match self {
            KeysType::DupKeys => 0,
            KeysType::AggKeys => 1,
            KeysType::UniqueKeys => 2,
            KeysType::PrimaryKeys => 3,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self, EncodingError> {
        match value {
            0 => Ok(KeysType::DupKeys),
            1 => Ok(KeysType::AggKeys),
            2 => Ok(KeysType::UniqueKeys),
            3 => Ok(KeysType::PrimaryKeys),
            other => Err(EncodingError::InvalidValue {
                field: "keys type",
                value: other as u64,
            }),
        }
    }
}

/// Validate a column list for a table or index of the given keys type.
///
/// - the list is non-empty
/// - names are unique (case-insensitive)
/// - in an aggregate-keys table every value column has an aggregate type
/// - in other tables no column has one
pub fn validate_schema(columns: &[Column], keys_type: KeysType) -> Result<(), SchemaError> {
    if columns.is_empty() {
        return Err(SchemaError::EmptySchema);
    }
    for (i, col) in columns.iter().enumerate() {
        if columns[..i].iter().any(|prev| prev.name_eq(col.name())) {
            return Err(SchemaError::DuplicateColumn(col.name().to_string()));
        }
        match (keys_type, col.is_key(), col.aggregate_type()) {
            (KeysType::AggKeys, false, None) => {
                return Err(SchemaError::MissingAggregateType(col.name().to_string()));
            }
            (KeysType::AggKeys, _, _) => {}
            (_, _, Some(_)) => {
                return Err(SchemaError::UnexpectedAggregateType(col.name().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Find a column by name (case-insensitive).
pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name_eq(name))
}
