//! Field type resolution for code generation
//!
//! Flattens a [`FieldType`] tree into a canonical descriptor for the field
//! itself plus named sub-entities for every struct, decimal, time and
//! fixed-size-binary node encountered on the way down.
//!
//! Generated names are the capitalised name path followed by a kind suffix,
//! e.g. path `["transfer", "amount"]` with a `decimal128` type yields
//! `TransferAmountDecimal128`. Children are generated before their parent so
//! the accumulator order is stable across runs.

use super::{FieldKind, FieldType, FieldTypeError, RelationKind, TimeUnit};

/// Canonical description of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalField {
    /// Storage type token
    pub native_type: String,
    /// Value wrapper type token (generated entity name for complex types)
    pub wrapper_type: String,
    pub nullable: bool,
    /// Value types that need an explicit wrapper to express null
    pub needs_nullable_wrapper: bool,
    pub is_complex: bool,
    pub relation: Option<RelationRef>,
}

/// Relation target of an entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    pub kind: RelationKind,
    pub target: String,
    pub eager: bool,
}

/// Named sub-entity produced while resolving a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEntity {
    pub name: String,
    /// Nullability of the use site that produced this entity
    pub nullable: bool,
    pub kind: GeneratedKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKind {
    Struct { fields: Vec<(String, CanonicalField)> },
    Decimal128 { precision: u8, scale: u8 },
    Decimal256 { precision: u8, scale: u8 },
    Time32 { unit: TimeUnit },
    Time64 { unit: TimeUnit },
    FixedSizeBinary { size: u32 },
}

impl GeneratedKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            GeneratedKind::Struct { .. } => "Struct",
            GeneratedKind::Decimal128 { .. } => "Decimal128",
            GeneratedKind::Decimal256 { .. } => "Decimal256",
            GeneratedKind::Time32 { .. } => "Time32",
            GeneratedKind::Time64 { .. } => "Time64",
            GeneratedKind::FixedSizeBinary { .. } => "FixedSizeBinary",
        }
    }
}

/// Resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Generated name `{0}` is already used by a different definition")]
    NameCollision(String),

    #[error("A name path is required to generate sub-entities")]
    EmptyNamePath,

    #[error("Entity `{entity}` declares reserved field `{field}`")]
    ReservedFieldName { entity: String, field: String },

    #[error("Entity `{entity}` declares `{field}` more than once")]
    FieldCollision { entity: String, field: String },

    #[error(transparent)]
    FieldType(#[from] FieldTypeError),
}

/// Path segment used for list elements
const LIST_ITEM_SEGMENT: &str = "Item";

/// Resolve one field type under a name path.
///
/// `path` must identify the field uniquely (entity, ancestors, field), sibling
/// fields with the same leaf name under different parents must not share it.
pub fn resolve_field(
    field_type: &FieldType,
    path: &[String],
    generated: &mut Vec<GeneratedEntity>,
) -> Result<CanonicalField, ResolveError> {
    let nullable = field_type.nullable;

    let field = match &field_type.kind {
        FieldKind::Boolean => value_field("bool", "Boolean", nullable),
        FieldKind::Int8 => value_field("i8", "Int8", nullable),
        FieldKind::Int16 => value_field("i16", "Int16", nullable),
        FieldKind::Int32 => value_field("i32", "Int32", nullable),
        FieldKind::Int64 => value_field("i64", "Int64", nullable),
        FieldKind::Uint8 => value_field("u8", "UInt8", nullable),
        FieldKind::Uint16 => value_field("u16", "UInt16", nullable),
        FieldKind::Uint32 => value_field("u32", "UInt32", nullable),
        FieldKind::Uint64 => value_field("u64", "UInt64", nullable),
        FieldKind::Float16 => value_field("f32", "Float16", nullable),
        FieldKind::Float32 => value_field("f32", "Float32", nullable),
        FieldKind::Float64 => value_field("f64", "Float64", nullable),
        FieldKind::Date32 => value_field("i32", "Date32", nullable),
        FieldKind::Date64 => value_field("i64", "Date64", nullable),
        FieldKind::String => reference_field("string", "String", nullable),
        FieldKind::LargeString => reference_field("string", "LargeString", nullable),
        FieldKind::Binary => reference_field("bytes", "Binary", nullable),
        FieldKind::LargeBinary => reference_field("bytes", "LargeBinary", nullable),
        FieldKind::Decimal128 { precision, scale } => specialized_field(
            "Decimal128",
            GeneratedKind::Decimal128 {
                precision: *precision,
                scale: *scale,
            },
            nullable,
            path,
            generated,
        )?,
        FieldKind::Decimal256 { precision, scale } => specialized_field(
            "Decimal256",
            GeneratedKind::Decimal256 {
                precision: *precision,
                scale: *scale,
            },
            nullable,
            path,
            generated,
        )?,
        FieldKind::Time32 { unit } => {
            specialized_field("Time32", GeneratedKind::Time32 { unit: *unit }, nullable, path, generated)?
        }
        FieldKind::Time64 { unit } => {
            specialized_field("Time64", GeneratedKind::Time64 { unit: *unit }, nullable, path, generated)?
        }
        FieldKind::FixedSizeBinary { size } => specialized_field(
            "FixedSizeBinary",
            GeneratedKind::FixedSizeBinary { size: *size },
            nullable,
            path,
            generated,
        )?,
        FieldKind::List { sub_type } => {
            let mut item_path = path.to_vec();
            item_path.push(LIST_ITEM_SEGMENT.to_string());
            let item = resolve_field(sub_type, &item_path, generated)?;
            CanonicalField {
                native_type: format!("Vec<{}>", item.native_type),
                wrapper_type: format!("List<{}>", item.wrapper_type),
                nullable,
                needs_nullable_wrapper: false,
                is_complex: true,
                relation: None,
            }
        }
        FieldKind::Struct { fields } => {
            let mut members = Vec::with_capacity(fields.len());
            for member in fields {
                let mut member_path = path.to_vec();
                member_path.push(member.name.clone());
                let resolved = resolve_field(&member.field_type, &member_path, generated)?;
                members.push((member.name.clone(), resolved));
            }

            let name = generated_name(path, "Struct")?;
            register(
                generated,
                GeneratedEntity {
                    name: name.clone(),
                    nullable,
                    kind: GeneratedKind::Struct { fields: members },
                },
            )?;
            CanonicalField {
                native_type: "struct".to_string(),
                wrapper_type: name,
                nullable,
                needs_nullable_wrapper: false,
                is_complex: true,
                relation: None,
            }
        }
    };

    Ok(field)
}

fn value_field(native: &str, wrapper: &str, nullable: bool) -> CanonicalField {
    CanonicalField {
        native_type: native.to_string(),
        wrapper_type: wrapper.to_string(),
        nullable,
        needs_nullable_wrapper: nullable,
        is_complex: false,
        relation: None,
    }
}

fn reference_field(native: &str, wrapper: &str, nullable: bool) -> CanonicalField {
    CanonicalField {
        native_type: native.to_string(),
        wrapper_type: wrapper.to_string(),
        nullable,
        needs_nullable_wrapper: false,
        is_complex: false,
        relation: None,
    }
}

/// Decimal, time and fixed-size-binary share one storage wrapper across
/// nullable and non-nullable use sites; nullability lives on the generated entity.
fn specialized_field(
    native: &str,
    kind: GeneratedKind,
    nullable: bool,
    path: &[String],
    generated: &mut Vec<GeneratedEntity>,
) -> Result<CanonicalField, ResolveError> {
    let name = generated_name(path, kind.suffix())?;
    register(
        generated,
        GeneratedEntity {
            name: name.clone(),
            nullable,
            kind,
        },
    )?;

    Ok(CanonicalField {
        native_type: native.to_string(),
        wrapper_type: name,
        nullable: false,
        needs_nullable_wrapper: false,
        is_complex: true,
        relation: None,
    })
}

/// Concatenate capitalised path segments and append `suffix`
pub fn generated_name(path: &[String], suffix: &str) -> Result<String, ResolveError> {
    if path.is_empty() {
        return Err(ResolveError::EmptyNamePath);
    }
    let mut name: String = path.iter().map(|segment| capitalize(segment)).collect();
    name.push_str(suffix);
    Ok(name)
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Identical re-registration is a no-op; a different definition under the same name is an error
fn register(generated: &mut Vec<GeneratedEntity>, entity: GeneratedEntity) -> Result<(), ResolveError> {
    match generated.iter().find(|existing| existing.name == entity.name) {
        Some(existing) if *existing == entity => Ok(()),
        Some(_) => Err(ResolveError::NameCollision(entity.name)),
        None => {
            generated.push(entity);
            Ok(())
        }
    }
}
