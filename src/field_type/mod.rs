//! Field types for entity declarations
//!
//! Two encodings describe the same type space:
//! - the manifest shape, `{type: "int8!", ...conditional attributes}`, where a
//!   trailing `!` marks the field non-nullable
//! - the published wire shape, a tagged union such as `{"int8": true}` or
//!   `{"decimal128": [true, 38, 9]}` (see [`published`])
//!
//! Both convert into the typed [`FieldType`] tree, which the [`resolver`]
//! flattens into canonical descriptors for code generation.

pub mod entity;
pub mod published;
pub mod resolver;

pub use entity::{
    resolve_entity, resolve_published_entity, EntityDef, PublishedEntity, RelationDef, RelationKind,
    Relations, ResolvedEntity,
};
pub use published::{parse_published, PublishedField, PublishedFieldType};
pub use resolver::{resolve_field, CanonicalField, GeneratedEntity, GeneratedKind, RelationRef, ResolveError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time resolution for `time32`/`time64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Second => write!(f, "Second"),
            TimeUnit::Millisecond => write!(f, "Millisecond"),
            TimeUnit::Microsecond => write!(f, "Microsecond"),
            TimeUnit::Nanosecond => write!(f, "Nanosecond"),
        }
    }
}

/// Field type with its kind-specific parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float16,
    Float32,
    Float64,
    String,
    LargeString,
    Binary,
    LargeBinary,
    Date32,
    Date64,
    Decimal128 { precision: u8, scale: u8 },
    Decimal256 { precision: u8, scale: u8 },
    Time32 { unit: TimeUnit },
    Time64 { unit: TimeUnit },
    FixedSizeBinary { size: u32 },
    List { sub_type: Box<FieldType> },
    Struct { fields: Vec<NamedField> },
}

impl FieldKind {
    /// Manifest type token without the nullability suffix
    pub fn token(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Int8 => "int8",
            FieldKind::Int16 => "int16",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Uint8 => "uint8",
            FieldKind::Uint16 => "uint16",
            FieldKind::Uint32 => "uint32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Float16 => "float16",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::String => "string",
            FieldKind::LargeString => "largestring",
            FieldKind::Binary => "binary",
            FieldKind::LargeBinary => "largebinary",
            FieldKind::Date32 => "date32",
            FieldKind::Date64 => "date64",
            FieldKind::Decimal128 { .. } => "decimal128",
            FieldKind::Decimal256 { .. } => "decimal256",
            FieldKind::Time32 { .. } => "time32",
            FieldKind::Time64 { .. } => "time64",
            FieldKind::FixedSizeBinary { .. } => "fixedsizebinary",
            FieldKind::List { .. } => "list",
            FieldKind::Struct { .. } => "struct",
        }
    }
}

/// A field type as declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldNode", into = "RawFieldNode")]
pub struct FieldType {
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldType {
    pub fn nullable(kind: FieldKind) -> Self {
        Self { kind, nullable: true }
    }

    pub fn required(kind: FieldKind) -> Self {
        Self { kind, nullable: false }
    }

    /// `int8` or `int8!`
    pub fn type_token(&self) -> String {
        if self.nullable {
            self.kind.token().to_string()
        } else {
            format!("{}!", self.kind.token())
        }
    }
}

/// Named member of a struct or entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldNode", into = "RawFieldNode")]
pub struct NamedField {
    pub name: String,
    pub field_type: FieldType,
}

impl NamedField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Field type errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldTypeError {
    #[error("Unrecognized field type tag `{0}`")]
    UnrecognizedFieldTypeTag(String),

    #[error("Unknown field type `{0}`")]
    UnknownType(String),

    #[error("Field type `{token}` requires `{attribute}`")]
    MissingAttribute { token: String, attribute: &'static str },

    #[error("`{attribute}` is not allowed for field type `{token}`")]
    ForeignAttribute { token: String, attribute: &'static str },

    #[error("Struct member is missing a name")]
    MissingName,

    #[error("Malformed published field type: {0}")]
    Malformed(String),
}

//=============================================================================
// MANIFEST SHAPE
//=============================================================================

/// Untyped manifest node, shared by bare field types and named members
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type")]
    type_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_type: Option<Box<RawFieldNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<RawFieldNode>>,
}

impl RawFieldNode {
    fn present_attributes(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.precision.is_some() {
            present.push("precision");
        }
        if self.scale.is_some() {
            present.push("scale");
        }
        if self.unit.is_some() {
            present.push("unit");
        }
        if self.size.is_some() {
            present.push("size");
        }
        if self.sub_type.is_some() {
            present.push("subType");
        }
        if self.fields.is_some() {
            present.push("fields");
        }
        present
    }
}

fn require<T>(value: Option<T>, token: &str, attribute: &'static str) -> Result<T, FieldTypeError> {
    value.ok_or_else(|| FieldTypeError::MissingAttribute {
        token: token.to_string(),
        attribute,
    })
}

impl TryFrom<RawFieldNode> for FieldType {
    type Error = FieldTypeError;

    fn try_from(raw: RawFieldNode) -> Result<Self, Self::Error> {
        let (token, nullable) = match raw.type_token.strip_suffix('!') {
            Some(token) => (token.to_string(), false),
            None => (raw.type_token.clone(), true),
        };

        let owned = crate::schema::attributes_for(&token);
        if let Some(foreign) = raw.present_attributes().into_iter().find(|a| !owned.contains(a)) {
            return Err(FieldTypeError::ForeignAttribute {
                token,
                attribute: foreign,
            });
        }

        let kind = match token.as_str() {
            "boolean" => FieldKind::Boolean,
            "int8" => FieldKind::Int8,
            "int16" => FieldKind::Int16,
            "int32" => FieldKind::Int32,
            "int64" => FieldKind::Int64,
            "uint8" => FieldKind::Uint8,
            "uint16" => FieldKind::Uint16,
            "uint32" => FieldKind::Uint32,
            "uint64" => FieldKind::Uint64,
            "float16" => FieldKind::Float16,
            "float32" => FieldKind::Float32,
            "float64" => FieldKind::Float64,
            "string" => FieldKind::String,
            "largestring" => FieldKind::LargeString,
            "binary" => FieldKind::Binary,
            "largebinary" => FieldKind::LargeBinary,
            "date32" => FieldKind::Date32,
            "date64" => FieldKind::Date64,
            "decimal128" => FieldKind::Decimal128 {
                precision: require(raw.precision, &token, "precision")?,
                scale: require(raw.scale, &token, "scale")?,
            },
            "decimal256" => FieldKind::Decimal256 {
                precision: require(raw.precision, &token, "precision")?,
                scale: require(raw.scale, &token, "scale")?,
            },
            "time32" => FieldKind::Time32 {
                unit: require(raw.unit, &token, "unit")?,
            },
            "time64" => FieldKind::Time64 {
                unit: require(raw.unit, &token, "unit")?,
            },
            "fixedsizebinary" => FieldKind::FixedSizeBinary {
                size: require(raw.size, &token, "size")?,
            },
            "list" => {
                let sub = require(raw.sub_type, &token, "subType")?;
                FieldKind::List {
                    sub_type: Box::new(FieldType::try_from(*sub)?),
                }
            }
            "struct" => {
                let members = require(raw.fields, &token, "fields")?;
                FieldKind::Struct {
                    fields: members
                        .into_iter()
                        .map(NamedField::try_from)
                        .collect::<Result<Vec<_>, _>>()?,
                }
            }
            _ => return Err(FieldTypeError::UnknownType(raw.type_token)),
        };

        Ok(FieldType { kind, nullable })
    }
}

impl TryFrom<RawFieldNode> for NamedField {
    type Error = FieldTypeError;

    fn try_from(mut raw: RawFieldNode) -> Result<Self, Self::Error> {
        let name = raw.name.take().ok_or(FieldTypeError::MissingName)?;
        Ok(NamedField {
            name,
            field_type: FieldType::try_from(raw)?,
        })
    }
}

impl From<FieldType> for RawFieldNode {
    fn from(field_type: FieldType) -> Self {
        let mut raw = RawFieldNode {
            name: None,
            type_token: field_type.type_token(),
            precision: None,
            scale: None,
            unit: None,
            size: None,
            sub_type: None,
            fields: None,
        };

        match field_type.kind {
            FieldKind::Decimal128 { precision, scale } | FieldKind::Decimal256 { precision, scale } => {
                raw.precision = Some(precision);
                raw.scale = Some(scale);
            }
            FieldKind::Time32 { unit } | FieldKind::Time64 { unit } => raw.unit = Some(unit),
            FieldKind::FixedSizeBinary { size } => raw.size = Some(size),
            FieldKind::List { sub_type } => raw.sub_type = Some(Box::new(RawFieldNode::from(*sub_type))),
            FieldKind::Struct { fields } => {
                raw.fields = Some(fields.into_iter().map(RawFieldNode::from).collect());
            }
            _ => {}
        }

        raw
    }
}

impl From<NamedField> for RawFieldNode {
    fn from(field: NamedField) -> Self {
        let mut raw = RawFieldNode::from(field.field_type);
        raw.name = Some(field.name);
        raw
    }
}
