//! Composite `<Tag>.<Id>` keys used as the object store's primary key.

use crate::types::TypeTag;

/// Render the store key for a record of `tag` with identifier `id`.
pub fn composite_key(tag: TypeTag, id: &str) -> String {
    format!("{}.{id}", tag.as_atom())
}

/// Split a key into its tag and id components at the first `.`.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (tag, id) = key.split_once('.')?;
    if tag.is_empty() || id.is_empty() {
        return None;
    }
    Some((tag, id))
}

/// Type-tag component of a key, if the key is well formed.
pub fn key_tag(key: &str) -> Option<&str> {
    split_key(key).map(|(tag, _)| tag)
}
