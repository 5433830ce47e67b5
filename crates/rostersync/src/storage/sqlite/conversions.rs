//! Conversions between entities and their stored JSON text.

use rostersync_core::storage::{Entity, Result, StoreError};

/// Encodes a key as the JSON text stored in the `key` column.
///
/// `"EMT"` is stored as `"\"EMT\""` and `42` as `"42"`, so string and numeric
/// keys never collide.
pub fn encode_key<T: Entity>(key: &T::Key) -> Result<String> {
    serde_json::to_string(key).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Encodes an entity as the JSON text stored in the `value` column.
pub fn encode_entity<T: Entity>(entity: &T) -> Result<String> {
    serde_json::to_string(entity).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decodes a `value` column back into an entity.
pub fn decode_entity<T: Entity>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Encodes an entity as a `(key, value)` row.
pub fn encode_row<T: Entity>(entity: &T) -> Result<(String, String)> {
    Ok((encode_key::<T>(&entity.key())?, encode_entity(entity)?))
}
