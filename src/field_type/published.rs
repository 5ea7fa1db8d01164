//! Published field type wire encoding
//!
//! Exactly one recognised tag per node. Primitive tags carry the required
//! flag, parameterised tags carry `[required, ...params]`:
//!
//! ```text
//! {"int8": true}
//! {"decimal128": [true, 38, 9]}       // precision, scale
//! {"time64": [false, "Nanosecond"]}
//! {"fixedsizebinary": [true, 32]}
//! {"list": [true, {"string": false}]}
//! {"struct": [true, [{"name": "a", "type": {"boolean": true}}]]}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{FieldKind, FieldType, FieldTypeError, NamedField, TimeUnit};

/// Tagged-union field type as stored on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishedFieldType {
    Boolean(bool),
    Int8(bool),
    Int16(bool),
    Int32(bool),
    Int64(bool),
    Uint8(bool),
    Uint16(bool),
    Uint32(bool),
    Uint64(bool),
    Float16(bool),
    Float32(bool),
    Float64(bool),
    String(bool),
    LargeString(bool),
    Binary(bool),
    LargeBinary(bool),
    Date32(bool),
    Date64(bool),
    Decimal128(bool, u8, u8),
    Decimal256(bool, u8, u8),
    Time32(bool, TimeUnit),
    Time64(bool, TimeUnit),
    FixedSizeBinary(bool, u32),
    List(bool, Box<PublishedFieldType>),
    Struct(bool, Vec<PublishedField>),
}

/// Named member of a published struct or entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: PublishedFieldType,
}

impl PublishedFieldType {
    /// Parse the wire shape, rejecting tags outside the recognised set
    pub fn from_value(value: &Value) -> Result<Self, FieldTypeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FieldTypeError::Malformed("expected an object".to_string()))?;
        if obj.len() != 1 {
            return Err(FieldTypeError::Malformed(format!(
                "expected exactly one tag, found {}",
                obj.len()
            )));
        }
        let (tag, payload) = obj
            .iter()
            .next()
            .ok_or_else(|| FieldTypeError::Malformed("expected exactly one tag".to_string()))?;

        let parsed = match tag.as_str() {
            "boolean" => PublishedFieldType::Boolean(flag(tag, payload)?),
            "int8" => PublishedFieldType::Int8(flag(tag, payload)?),
            "int16" => PublishedFieldType::Int16(flag(tag, payload)?),
            "int32" => PublishedFieldType::Int32(flag(tag, payload)?),
            "int64" => PublishedFieldType::Int64(flag(tag, payload)?),
            "uint8" => PublishedFieldType::Uint8(flag(tag, payload)?),
            "uint16" => PublishedFieldType::Uint16(flag(tag, payload)?),
            "uint32" => PublishedFieldType::Uint32(flag(tag, payload)?),
            "uint64" => PublishedFieldType::Uint64(flag(tag, payload)?),
            "float16" => PublishedFieldType::Float16(flag(tag, payload)?),
            "float32" => PublishedFieldType::Float32(flag(tag, payload)?),
            "float64" => PublishedFieldType::Float64(flag(tag, payload)?),
            "string" => PublishedFieldType::String(flag(tag, payload)?),
            "largestring" => PublishedFieldType::LargeString(flag(tag, payload)?),
            "binary" => PublishedFieldType::Binary(flag(tag, payload)?),
            "largebinary" => PublishedFieldType::LargeBinary(flag(tag, payload)?),
            "date32" => PublishedFieldType::Date32(flag(tag, payload)?),
            "date64" => PublishedFieldType::Date64(flag(tag, payload)?),
            "decimal128" => {
                let (required, params) = tuple(tag, payload, 2)?;
                PublishedFieldType::Decimal128(required, small_int(tag, &params[0])?, small_int(tag, &params[1])?)
            }
            "decimal256" => {
                let (required, params) = tuple(tag, payload, 2)?;
                PublishedFieldType::Decimal256(required, small_int(tag, &params[0])?, small_int(tag, &params[1])?)
            }
            "time32" => {
                let (required, params) = tuple(tag, payload, 1)?;
                PublishedFieldType::Time32(required, time_unit(tag, &params[0])?)
            }
            "time64" => {
                let (required, params) = tuple(tag, payload, 1)?;
                PublishedFieldType::Time64(required, time_unit(tag, &params[0])?)
            }
            "fixedsizebinary" => {
                let (required, params) = tuple(tag, payload, 1)?;
                let size = params[0]
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| FieldTypeError::Malformed(format!("`{}` size out of range", tag)))?;
                PublishedFieldType::FixedSizeBinary(required, size)
            }
            "list" => {
                let (required, params) = tuple(tag, payload, 1)?;
                PublishedFieldType::List(required, Box::new(PublishedFieldType::from_value(&params[0])?))
            }
            "struct" => {
                let (required, params) = tuple(tag, payload, 1)?;
                let members = params[0]
                    .as_array()
                    .ok_or_else(|| FieldTypeError::Malformed("`struct` members must be a list".to_string()))?;
                PublishedFieldType::Struct(
                    required,
                    members
                        .iter()
                        .map(PublishedField::from_value)
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
            other => return Err(FieldTypeError::UnrecognizedFieldTypeTag(other.to_string())),
        };

        Ok(parsed)
    }

    pub fn is_required(&self) -> bool {
        match self {
            PublishedFieldType::Boolean(r)
            | PublishedFieldType::Int8(r)
            | PublishedFieldType::Int16(r)
            | PublishedFieldType::Int32(r)
            | PublishedFieldType::Int64(r)
            | PublishedFieldType::Uint8(r)
            | PublishedFieldType::Uint16(r)
            | PublishedFieldType::Uint32(r)
            | PublishedFieldType::Uint64(r)
            | PublishedFieldType::Float16(r)
            | PublishedFieldType::Float32(r)
            | PublishedFieldType::Float64(r)
            | PublishedFieldType::String(r)
            | PublishedFieldType::LargeString(r)
            | PublishedFieldType::Binary(r)
            | PublishedFieldType::LargeBinary(r)
            | PublishedFieldType::Date32(r)
            | PublishedFieldType::Date64(r)
            | PublishedFieldType::Decimal128(r, _, _)
            | PublishedFieldType::Decimal256(r, _, _)
            | PublishedFieldType::Time32(r, _)
            | PublishedFieldType::Time64(r, _)
            | PublishedFieldType::FixedSizeBinary(r, _)
            | PublishedFieldType::List(r, _)
            | PublishedFieldType::Struct(r, _) => *r,
        }
    }
}

impl PublishedField {
    pub fn from_value(value: &Value) -> Result<Self, FieldTypeError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or(FieldTypeError::MissingName)?;
        let field_type = value
            .get("type")
            .ok_or_else(|| FieldTypeError::Malformed(format!("member `{}` has no type", name)))?;

        Ok(PublishedField {
            name: name.to_string(),
            field_type: PublishedFieldType::from_value(field_type)?,
        })
    }
}

impl<'de> Deserialize<'de> for PublishedFieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        PublishedFieldType::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for PublishedField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        PublishedField::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn flag(tag: &str, payload: &Value) -> Result<bool, FieldTypeError> {
    payload
        .as_bool()
        .ok_or_else(|| FieldTypeError::Malformed(format!("`{}` expects a required flag", tag)))
}

/// Split `[required, ...params]`, checking the parameter count
fn tuple<'a>(tag: &str, payload: &'a Value, params: usize) -> Result<(bool, &'a [Value]), FieldTypeError> {
    let items = payload
        .as_array()
        .filter(|items| items.len() == params + 1)
        .ok_or_else(|| {
            FieldTypeError::Malformed(format!("`{}` expects [required, {} parameter(s)]", tag, params))
        })?;
    Ok((flag(tag, &items[0])?, &items[1..]))
}

fn small_int(tag: &str, value: &Value) -> Result<u8, FieldTypeError> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| FieldTypeError::Malformed(format!("`{}` parameters must be between 0 and 255", tag)))
}

fn time_unit(tag: &str, value: &Value) -> Result<TimeUnit, FieldTypeError> {
    serde_json::from_value(value.clone())
        .map_err(|_| FieldTypeError::Malformed(format!("`{}` has an unknown time unit", tag)))
}

/// Parse a published node straight into the manifest field type
pub fn parse_published(value: &Value) -> Result<FieldType, FieldTypeError> {
    PublishedFieldType::from_value(value).map(|published| FieldType::from(&published))
}

//=============================================================================
// CONVERSIONS
//=============================================================================

impl From<&FieldType> for PublishedFieldType {
    fn from(field_type: &FieldType) -> Self {
        let r = !field_type.nullable;
        match &field_type.kind {
            FieldKind::Boolean => PublishedFieldType::Boolean(r),
            FieldKind::Int8 => PublishedFieldType::Int8(r),
            FieldKind::Int16 => PublishedFieldType::Int16(r),
            FieldKind::Int32 => PublishedFieldType::Int32(r),
            FieldKind::Int64 => PublishedFieldType::Int64(r),
            FieldKind::Uint8 => PublishedFieldType::Uint8(r),
            FieldKind::Uint16 => PublishedFieldType::Uint16(r),
            FieldKind::Uint32 => PublishedFieldType::Uint32(r),
            FieldKind::Uint64 => PublishedFieldType::Uint64(r),
            FieldKind::Float16 => PublishedFieldType::Float16(r),
            FieldKind::Float32 => PublishedFieldType::Float32(r),
            FieldKind::Float64 => PublishedFieldType::Float64(r),
            FieldKind::String => PublishedFieldType::String(r),
            FieldKind::LargeString => PublishedFieldType::LargeString(r),
            FieldKind::Binary => PublishedFieldType::Binary(r),
            FieldKind::LargeBinary => PublishedFieldType::LargeBinary(r),
            FieldKind::Date32 => PublishedFieldType::Date32(r),
            FieldKind::Date64 => PublishedFieldType::Date64(r),
            FieldKind::Decimal128 { precision, scale } => PublishedFieldType::Decimal128(r, *precision, *scale),
            FieldKind::Decimal256 { precision, scale } => PublishedFieldType::Decimal256(r, *precision, *scale),
            FieldKind::Time32 { unit } => PublishedFieldType::Time32(r, *unit),
            FieldKind::Time64 { unit } => PublishedFieldType::Time64(r, *unit),
            FieldKind::FixedSizeBinary { size } => PublishedFieldType::FixedSizeBinary(r, *size),
            FieldKind::List { sub_type } => {
                PublishedFieldType::List(r, Box::new(PublishedFieldType::from(sub_type.as_ref())))
            }
            FieldKind::Struct { fields } => {
                PublishedFieldType::Struct(r, fields.iter().map(PublishedField::from).collect())
            }
        }
    }
}

impl From<&PublishedFieldType> for FieldType {
    fn from(published: &PublishedFieldType) -> Self {
        let kind = match published {
            PublishedFieldType::Boolean(_) => FieldKind::Boolean,
            PublishedFieldType::Int8(_) => FieldKind::Int8,
            PublishedFieldType::Int16(_) => FieldKind::Int16,
            PublishedFieldType::Int32(_) => FieldKind::Int32,
            PublishedFieldType::Int64(_) => FieldKind::Int64,
            PublishedFieldType::Uint8(_) => FieldKind::Uint8,
            PublishedFieldType::Uint16(_) => FieldKind::Uint16,
            PublishedFieldType::Uint32(_) => FieldKind::Uint32,
            PublishedFieldType::Uint64(_) => FieldKind::Uint64,
            PublishedFieldType::Float16(_) => FieldKind::Float16,
            PublishedFieldType::Float32(_) => FieldKind::Float32,
            PublishedFieldType::Float64(_) => FieldKind::Float64,
            PublishedFieldType::String(_) => FieldKind::String,
            PublishedFieldType::LargeString(_) => FieldKind::LargeString,
            PublishedFieldType::Binary(_) => FieldKind::Binary,
            PublishedFieldType::LargeBinary(_) => FieldKind::LargeBinary,
            PublishedFieldType::Date32(_) => FieldKind::Date32,
            PublishedFieldType::Date64(_) => FieldKind::Date64,
            PublishedFieldType::Decimal128(_, precision, scale) => FieldKind::Decimal128 {
                precision: *precision,
                scale: *scale,
            },
            PublishedFieldType::Decimal256(_, precision, scale) => FieldKind::Decimal256 {
                precision: *precision,
                scale: *scale,
            },
            PublishedFieldType::Time32(_, unit) => FieldKind::Time32 { unit: *unit },
            PublishedFieldType::Time64(_, unit) => FieldKind::Time64 { unit: *unit },
            PublishedFieldType::FixedSizeBinary(_, size) => FieldKind::FixedSizeBinary { size: *size },
            PublishedFieldType::List(_, item) => FieldKind::List {
                sub_type: Box::new(FieldType::from(item.as_ref())),
            },
            PublishedFieldType::Struct(_, members) => FieldKind::Struct {
                fields: members.iter().map(NamedField::from).collect(),
            },
        };

        FieldType {
            kind,
            nullable: !published.is_required(),
        }
    }
}

impl From<&NamedField> for PublishedField {
    fn from(field: &NamedField) -> Self {
        PublishedField {
            name: field.name.clone(),
            field_type: PublishedFieldType::from(&field.field_type),
        }
    }
}

impl From<&PublishedField> for NamedField {
    fn from(field: &PublishedField) -> Self {
        NamedField {
            name: field.name.clone(),
            field_type: FieldType::from(&field.field_type),
        }
    }
}
