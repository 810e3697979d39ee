//! JSON document form of the object store.
//!
//! The document is a single object keyed by composite key. Each member holds
//! every attribute of the record plus a `__class__` field naming its kind.
//! Members that cannot be rebuilt are kept verbatim and written back as-is.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::record::{CLASS_FIELD, Record, timestamp};
use crate::types::TypeTag;

#[derive(Serialize)]
struct StoredDocument<'a> {
    id: &'a str,
    #[serde(serialize_with = "timestamp::serialize")]
    created_at: NaiveDateTime,
    #[serde(serialize_with = "timestamp::serialize")]
    updated_at: NaiveDateTime,
    #[serde(flatten)]
    attributes: &'a BTreeMap<String, JsonValue>,
    #[serde(rename = "__class__")]
    class: &'static str,
}

impl<'a> From<&'a Record> for StoredDocument<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            id: record.id(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
            attributes: record.attributes(),
            class: record.tag().as_atom(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Member<'a> {
    Record(StoredDocument<'a>),
    Retained(&'a JsonValue),
}

/// Records recovered from a document, plus the members that were rejected.
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedRecord>,
}

/// A document member that could not be turned into a record.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: String,
    /// The member exactly as it appeared in the document.
    pub document: JsonValue,
}

/// Serialize the full mapping into the persisted document.
///
/// `retained` holds unreadable members from the last load; a record with the
/// same key takes precedence over them.
pub fn encode(
    objects: &BTreeMap<String, Record>,
    retained: &BTreeMap<String, JsonValue>,
) -> Result<String> {
    let mut document: BTreeMap<&str, Member<'_>> = retained
        .iter()
        .map(|(key, value)| (key.as_str(), Member::Retained(value)))
        .collect();
    for (key, record) in objects {
        document.insert(key.as_str(), Member::Record(StoredDocument::from(record)));
    }
    let text = serde_json::to_string(&document).context("failed to encode object store")?;
    Ok(text)
}

/// Parse a persisted document.
///
/// Text that is not a JSON object fails as a whole. Individual members that
/// cannot be rebuilt are reported together with their raw document.
pub fn decode(text: &str) -> Result<Decoded> {
    let document: Map<String, JsonValue> =
        serde_json::from_str(text).context("persisted document is not a JSON object")?;

    let mut decoded = Decoded::default();
    for (key, value) in document {
        match decode_member(&key, value.clone()) {
            Ok(record) => decoded.records.push(record),
            Err(err) => {
                warn!(%key, error = %format!("{err:#}"), "keeping unreadable persisted record");
                decoded.skipped.push(SkippedRecord {
                    key,
                    reason: format!("{err:#}"),
                    document: value,
                });
            }
        }
    }
    Ok(decoded)
}

fn decode_member(key: &str, value: JsonValue) -> Result<Record> {
    let JsonValue::Object(mut fields) = value else {
        bail!("member is not a JSON object");
    };
    let tag = match fields.remove(CLASS_FIELD) {
        Some(JsonValue::String(atom)) => TypeTag::from_atom(&atom)?,
        Some(other) => bail!("`{CLASS_FIELD}` must be a string, found {other}"),
        None => bail!("missing `{CLASS_FIELD}`"),
    };
    let record = tag.reconstruct(fields)?;
    let expected = record.key();
    if expected != key {
        bail!("member key does not match record key `{expected}`");
    }
    Ok(record)
}
