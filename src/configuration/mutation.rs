//! Mutations delivered by the transaction layer.

use super::keys::KeyRange;

/// A committed change to the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetValue { key: String, value: Vec<u8> },
    /// Clears `[begin, end)`
    ClearRange(KeyRange),
}

impl Mutation {
    pub fn set(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Mutation::SetValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn clear_range(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Mutation::ClearRange(KeyRange::new(begin, end))
    }
}
