//! Closed registry of the record kinds the store knows how to build.

use anyhow::{Result, bail};
use serde_json::{Map, Value as JsonValue};

use crate::record::Record;

/// Type tag naming one of the supported record kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    BaseModel,
    User,
    State,
    City,
    Amenity,
    Place,
    Review,
}

impl TypeTag {
    /// Every registered kind, in declaration order.
    pub const ALL: [TypeTag; 7] = [
        TypeTag::BaseModel,
        TypeTag::User,
        TypeTag::State,
        TypeTag::City,
        TypeTag::Amenity,
        TypeTag::Place,
        TypeTag::Review,
    ];

    /// Return the canonical class name for this kind.
    pub fn as_atom(self) -> &'static str {
        match self {
            TypeTag::BaseModel => "BaseModel",
            TypeTag::User => "User",
            TypeTag::State => "State",
            TypeTag::City => "City",
            TypeTag::Amenity => "Amenity",
            TypeTag::Place => "Place",
            TypeTag::Review => "Review",
        }
    }

    /// Membership test against the registry. Matching is exact.
    pub fn lookup(atom: &str) -> Option<TypeTag> {
        match atom {
            "BaseModel" => Some(TypeTag::BaseModel),
            "User" => Some(TypeTag::User),
            "State" => Some(TypeTag::State),
            "City" => Some(TypeTag::City),
            "Amenity" => Some(TypeTag::Amenity),
            "Place" => Some(TypeTag::Place),
            "Review" => Some(TypeTag::Review),
            _ => None,
        }
    }

    /// Parse a class name into a `TypeTag`.
    pub fn from_atom(atom: &str) -> Result<TypeTag> {
        match Self::lookup(atom) {
            Some(tag) => Ok(tag),
            None => bail!("unknown class `{atom}`"),
        }
    }

    /// Build a brand new record of this kind.
    pub fn fresh(self) -> Record {
        Record::fresh(self)
    }

    /// Rebuild a persisted record of this kind from its attribute map.
    pub fn reconstruct(self, fields: Map<String, JsonValue>) -> Result<Record> {
        Record::from_fields(self, fields)
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_atom())
    }
}
