//! Entities: named field collections with relations to other entities

use serde::{Deserialize, Deserializer, Serialize};

use super::resolver::{resolve_field, CanonicalField, GeneratedEntity, RelationRef, ResolveError};
use super::{NamedField, PublishedField};
use crate::manifest::null_as_default;
use crate::schema::RESERVED_FIELD_NAME;

/// Relation cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }
}

/// A relation declared on an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Local field name
    pub field: String,
    /// Target entity name
    pub entity: String,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub nullable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eager: bool,
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Relations {
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub one_to_one: Vec<RelationDef>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub one_to_many: Vec<RelationDef>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub many_to_one: Vec<RelationDef>,
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub many_to_many: Vec<RelationDef>,
}

impl Relations {
    /// All relations in declaration-kind order
    pub fn iter(&self) -> impl Iterator<Item = (RelationKind, &RelationDef)> {
        self.one_to_one
            .iter()
            .map(|r| (RelationKind::OneToOne, r))
            .chain(self.one_to_many.iter().map(|r| (RelationKind::OneToMany, r)))
            .chain(self.many_to_one.iter().map(|r| (RelationKind::ManyToOne, r)))
            .chain(self.many_to_many.iter().map(|r| (RelationKind::ManyToMany, r)))
    }
}

/// Entity declared with manifest-shaped field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub fields: Vec<NamedField>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Relations,
}

/// Entity as read back from the ledger, with published field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedEntity {
    pub name: String,
    pub fields: Vec<PublishedField>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Relations,
}

impl From<&PublishedEntity> for EntityDef {
    fn from(entity: &PublishedEntity) -> Self {
        EntityDef {
            name: entity.name.clone(),
            fields: entity.fields.iter().map(NamedField::from).collect(),
            relations: entity.relations.clone(),
        }
    }
}

/// Entity flattened for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub name: String,
    /// Declared fields followed by relation fields
    pub fields: Vec<(String, CanonicalField)>,
    pub generated: Vec<GeneratedEntity>,
}

/// Resolve an entity, enforcing field-name collision rules
pub fn resolve_entity(entity: &EntityDef) -> Result<ResolvedEntity, ResolveError> {
    let mut taken: Vec<&str> = Vec::new();
    let names = entity
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(entity.relations.iter().map(|(_, r)| r.field.as_str()));
    for name in names {
        if name == RESERVED_FIELD_NAME {
            return Err(ResolveError::ReservedFieldName {
                entity: entity.name.clone(),
                field: name.to_string(),
            });
        }
        if taken.contains(&name) {
            return Err(ResolveError::FieldCollision {
                entity: entity.name.clone(),
                field: name.to_string(),
            });
        }
        taken.push(name);
    }

    let mut generated = Vec::new();
    let mut fields = Vec::with_capacity(entity.fields.len());
    for field in &entity.fields {
        let path = vec![entity.name.clone(), field.name.clone()];
        let resolved = resolve_field(&field.field_type, &path, &mut generated)?;
        fields.push((field.name.clone(), resolved));
    }

    for (kind, relation) in entity.relations.iter() {
        let wrapper_type = if kind.is_to_many() {
            format!("Vec<{}>", relation.entity)
        } else {
            relation.entity.clone()
        };
        fields.push((
            relation.field.clone(),
            CanonicalField {
                native_type: "relation".to_string(),
                wrapper_type,
                nullable: relation.nullable,
                needs_nullable_wrapper: false,
                is_complex: true,
                relation: Some(RelationRef {
                    kind,
                    target: relation.entity.clone(),
                    eager: relation.eager,
                }),
            },
        ));
    }

    Ok(ResolvedEntity {
        name: entity.name.clone(),
        fields,
        generated,
    })
}

/// Convert published field types, then resolve
pub fn resolve_published_entity(entity: &PublishedEntity) -> Result<ResolvedEntity, ResolveError> {
    resolve_entity(&EntityDef::from(entity))
}
