//! Storage engine selection for logs and storage servers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigurationError, ConfigurationResult};

/// Key/value store engine. Persisted as its integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreType {
    /// B-tree on SSD, first on-disk format
    SsdBtreeV1,
    /// In-memory with durable log
    Memory,
    /// B-tree on SSD, second on-disk format
    SsdBtreeV2,
}

impl StoreType {
    /// Integer tag stored in the configuration table.
    pub fn tag(&self) -> i32 {
        match self {
            StoreType::SsdBtreeV1 => 0,
            StoreType::Memory => 1,
            StoreType::SsdBtreeV2 => 2,
        }
    }

    pub fn from_tag(tag: i32) -> ConfigurationResult<Self> {
        match tag {
            0 => Ok(StoreType::SsdBtreeV1),
            1 => Ok(StoreType::Memory),
            2 => Ok(StoreType::SsdBtreeV2),
            other => Err(ConfigurationError::UnknownStoreType(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::SsdBtreeV1 => "ssd-1",
            StoreType::Memory => "memory",
            StoreType::SsdBtreeV2 => "ssd-2",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for store in [StoreType::SsdBtreeV1, StoreType::Memory, StoreType::SsdBtreeV2] {
            assert_eq!(StoreType::from_tag(store.tag()).unwrap(), store);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!(
            StoreType::from_tag(3),
            Err(ConfigurationError::UnknownStoreType(3))
        ));
        assert!(StoreType::from_tag(-1).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(StoreType::Memory.to_string(), "memory");
        assert_eq!(StoreType::SsdBtreeV2.as_str(), "ssd-2");
    }
}
