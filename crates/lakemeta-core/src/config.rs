//! Catalog configuration and the meta-version context threaded through
//! serialization.

use serde::Deserialize;

use crate::error::SchemaError;
use crate::types::{DEFAULT_REPLICATION_NUM, META_VERSION_CURRENT, META_VERSION_MIN, StorageMedium};

/// Catalog-wide defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Meta version of checkpoints written by
    /// [`Catalog::save_checkpoint`](crate::Catalog::save_checkpoint).
    pub meta_version: u32,
    /// Replication factor applied to single-partition tables.
    pub default_replication_num: i16,
    /// Storage medium recorded for partitions without an explicit one.
    pub default_storage_medium: StorageMedium,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            meta_version: META_VERSION_CURRENT,
            default_replication_num: DEFAULT_REPLICATION_NUM,
            default_storage_medium: StorageMedium::Hdd,
        }
    }
}

impl CatalogConfig {
    /// Parse a config from JSON text. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let config: CatalogConfig = serde_json::from_str(text)
            .map_err(|e| SchemaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !(META_VERSION_MIN..=META_VERSION_CURRENT).contains(&self.meta_version) {
            return Err(SchemaError::InvalidConfig(format!(
                "meta_version {} outside supported range {META_VERSION_MIN}..={META_VERSION_CURRENT}",
                self.meta_version
            )));
        }
        if self.default_replication_num < 1 {
            return Err(SchemaError::InvalidConfig(format!(
                "default_replication_num must be >= 1 (got {})",
                self.default_replication_num
            )));
        }
        Ok(())
    }

    pub fn meta_context(&self) -> MetaContext {
        MetaContext::new(self.meta_version)
    }
}

/// Ambient serialization context.
///
/// Writers encode exactly the fields that exist at `meta_version`; readers
/// take the version from the stream header and carry it down to every
/// nested read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaContext {
    meta_version: u32,
}

impl MetaContext {
    pub fn new(meta_version: u32) -> Self {
        Self { meta_version }
    }

    /// Context for the newest format.
    pub fn current() -> Self {
        Self::new(META_VERSION_CURRENT)
    }

    pub fn meta_version(&self) -> u32 {
        self.meta_version
    }

    /// True if a field introduced at `version` is present in this stream.
    pub fn has(&self, version: u32) -> bool {
        self.meta_version >= version
    }
}

impl Default for MetaContext {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{META_VERSION_1, META_VERSION_2};

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.meta_version, META_VERSION_CURRENT);
        assert_eq!(config.default_replication_num, 3);
        assert_eq!(config.default_storage_medium, StorageMedium::Hdd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let text = r#"{"default_replication_num": 1, "default_storage_medium": "SSD"}"#;
        let config = CatalogConfig::from_json_str(text).unwrap();
        assert_eq!(config.default_replication_num, 1);
        assert_eq!(config.default_storage_medium, StorageMedium::Ssd);
        assert_eq!(config.meta_version, META_VERSION_CURRENT);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(CatalogConfig::from_json_str(r#"{"meta_version": 99}"#).is_err());
        assert!(CatalogConfig::from_json_str(r#"{"default_replication_num": 0}"#).is_err());
        assert!(CatalogConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_meta_context_gating() {
        let ctx = MetaContext::new(META_VERSION_2);
        assert!(ctx.has(META_VERSION_1));
        assert!(ctx.has(META_VERSION_2));
        assert!(!ctx.has(crate::types::META_VERSION_3));
        assert_eq!(MetaContext::default(), MetaContext::current());
    }
}
