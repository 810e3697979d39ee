//! Common shape of every stored entity: id, two timestamps and an open
//! attribute bag.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::key::composite_key;
use crate::types::TypeTag;

/// Document field carrying the type tag of a persisted record.
pub const CLASS_FIELD: &str = "__class__";

/// Attribute names owned by the record itself.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", CLASS_FIELD];

/// Whether `name` is managed by the record and cannot be set directly.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Stored entity instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    tag: TypeTag,
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    attributes: BTreeMap<String, JsonValue>,
}

impl Record {
    /// New record with a random id and both timestamps set to now.
    pub fn fresh(tag: TypeTag) -> Self {
        let now = timestamp::now();
        Self {
            tag,
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            attributes: BTreeMap::new(),
        }
    }

    /// Rebuild a record from its persisted attribute map.
    ///
    /// `created_at` and `updated_at` are parsed from text; every other field
    /// except `id` and `__class__` is kept as the decoder produced it.
    pub fn from_fields(tag: TypeTag, mut fields: Map<String, JsonValue>) -> Result<Self> {
        fields.remove(CLASS_FIELD);
        let id = match fields.remove("id") {
            Some(JsonValue::String(id)) if !id.is_empty() => id,
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(other) => bail!("`id` must be a non-empty string or number, found {other}"),
            None => bail!("missing `id`"),
        };
        let created_at = take_timestamp(&mut fields, "created_at")?;
        let updated_at = take_timestamp(&mut fields, "updated_at")?;
        if created_at > updated_at {
            bail!("`created_at` {created_at} is later than `updated_at` {updated_at}");
        }
        Ok(Self {
            tag,
            id,
            created_at,
            updated_at,
            attributes: fields.into_iter().collect(),
        })
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Composite store key for this record.
    pub fn key(&self) -> String {
        composite_key(self.tag, &self.id)
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub fn attributes(&self) -> &BTreeMap<String, JsonValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    /// Set an extra attribute, returning the previous value if any.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: JsonValue,
    ) -> Result<Option<JsonValue>> {
        let name = name.into();
        if is_reserved(&name) {
            bail!("attribute `{name}` is managed by the record");
        }
        Ok(self.attributes.insert(name, value))
    }

    /// Refresh `updated_at`. It never moves before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = timestamp::now().max(self.created_at);
    }

    /// Full attribute map, timestamps rendered as text, without the type tag.
    pub fn to_fields(&self) -> Map<String, JsonValue> {
        let mut fields = Map::new();
        fields.insert("id".to_string(), JsonValue::String(self.id.clone()));
        fields.insert(
            "created_at".to_string(),
            JsonValue::String(timestamp::format(&self.created_at)),
        );
        fields.insert(
            "updated_at".to_string(),
            JsonValue::String(timestamp::format(&self.updated_at)),
        );
        for (name, value) in &self.attributes {
            fields.insert(name.clone(), value.clone());
        }
        fields
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}) {}",
            self.tag,
            self.id,
            JsonValue::Object(self.to_fields())
        )
    }
}

fn take_timestamp(fields: &mut Map<String, JsonValue>, name: &str) -> Result<NaiveDateTime> {
    match fields.remove(name) {
        Some(JsonValue::String(text)) => timestamp::parse(&text),
        Some(other) => bail!("`{name}` must be a timestamp string, found {other}"),
        None => bail!("missing `{name}`"),
    }
}

/// Fixed text form of record timestamps (`YYYY-MM-DDTHH:MM:SS.ffffff`).
pub mod timestamp {
    use anyhow::{Context, Result};
    use serde::Serializer;

    use super::*;

    pub const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    // `%.f` also accepts a missing fraction.
    const READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    /// Local wall-clock time at microsecond precision.
    pub fn now() -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(6)
    }

    pub fn format(ts: &NaiveDateTime) -> String {
        ts.format(WRITE_FORMAT).to_string()
    }

    pub fn parse(text: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(text, READ_FORMAT)
            .with_context(|| format!("invalid timestamp `{text}`"))
    }

    pub fn serialize<S: Serializer>(
        ts: &NaiveDateTime,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn fresh_records_get_distinct_ids() {
        let a = Record::fresh(TypeTag::User);
        let b = Record::fresh(TypeTag::User);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.key(), format!("User.{}", a.id()));
    }

    #[test]
    fn fields_roundtrip() -> Result<()> {
        let mut record = Record::fresh(TypeTag::Place);
        record.set_attribute("name", json!("Loft"))?;
        record.set_attribute("rooms", json!(3))?;
        record.set_attribute("tags", json!({"wifi": true, "floors": [1, 2]}))?;
        record.touch();

        let rebuilt = Record::from_fields(TypeTag::Place, record.to_fields())?;
        assert_eq!(rebuilt, record);
        Ok(())
    }

    #[test]
    fn reconstruction_skips_class_field_and_parses_timestamps() -> Result<()> {
        let record = Record::from_fields(
            TypeTag::City,
            fields(json!({
                "__class__": "City",
                "id": "abc",
                "created_at": "2017-09-28T21:03:54.052298",
                "updated_at": "2017-09-28T21:03:54.052302",
                "name": "Oakland",
            })),
        )?;
        assert_eq!(record.id(), "abc");
        assert_eq!(record.attribute("name"), Some(&json!("Oakland")));
        assert!(record.attribute(CLASS_FIELD).is_none());
        assert_eq!(
            timestamp::format(&record.created_at()),
            "2017-09-28T21:03:54.052298"
        );
        Ok(())
    }

    #[test]
    fn numeric_ids_keep_their_text_form() -> Result<()> {
        let record = Record::from_fields(
            TypeTag::User,
            fields(json!({
                "id": 1,
                "created_at": "2020-01-01T00:00:00.000000",
                "updated_at": "2020-01-01T00:00:00.000000",
                "email": "keep@me",
            })),
        )?;
        assert_eq!(record.key(), "User.1");
        assert_eq!(record.attribute("email"), Some(&json!("keep@me")));
        Ok(())
    }

    #[test]
    fn timestamps_without_fraction_are_accepted() -> Result<()> {
        let ts = timestamp::parse("2020-01-01T00:00:00")?;
        assert_eq!(timestamp::format(&ts), "2020-01-01T00:00:00.000000");
        Ok(())
    }

    #[test]
    fn reconstruction_rejects_bad_documents() {
        let missing_id = fields(json!({
            "created_at": "2020-01-01T00:00:00.000000",
            "updated_at": "2020-01-01T00:00:00.000000",
        }));
        assert!(Record::from_fields(TypeTag::User, missing_id).is_err());

        let bad_time = fields(json!({
            "id": "x",
            "created_at": "yesterday",
            "updated_at": "2020-01-01T00:00:00.000000",
        }));
        assert!(Record::from_fields(TypeTag::User, bad_time).is_err());

        let inverted = fields(json!({
            "id": "x",
            "created_at": "2021-01-01T00:00:00.000000",
            "updated_at": "2020-01-01T00:00:00.000000",
        }));
        assert!(Record::from_fields(TypeTag::User, inverted).is_err());
    }

    #[test]
    fn reserved_attributes_are_refused() {
        let mut record = Record::fresh(TypeTag::User);
        for name in RESERVED_FIELDS {
            assert!(record.set_attribute(name, json!("x")).is_err());
        }
        assert!(record.attributes().is_empty());
    }

    #[test]
    fn touch_keeps_ordering() {
        let mut record = Record::fresh(TypeTag::Amenity);
        record.touch();
        assert!(record.created_at() <= record.updated_at());
    }

    #[test]
    fn display_names_tag_and_id() {
        let record = Record::fresh(TypeTag::State);
        let rendered = record.to_string();
        assert!(rendered.starts_with(&format!("[State] ({}) {{", record.id())));
        assert!(rendered.contains("\"created_at\""));
    }
}
