//! Entities and read-only views over them.

use ifcstep_schema::{EntityType, EntityTypeId};

use crate::model::Model;
use crate::value::{EntityId, EntityKey, Value};

/// One schema-typed record of the model.
///
/// Owned exclusively by its [`Model`]; everything else refers to it by id or
/// by [`EntityKey`].
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) ty: EntityTypeId,
    pub(crate) attributes: Vec<Value>,
    pub(crate) inverses: Vec<Vec<EntityKey>>,
    pub(crate) raw: Option<String>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, ty: &EntityType) -> Self {
        Self {
            id,
            ty: ty.id,
            attributes: ty
                .slots
                .iter()
                .map(|s| if s.derived { Value::Derived } else { Value::Unset })
                .collect(),
            inverses: vec![Vec::new(); ty.inverses.len()],
            raw: None,
        }
    }

    pub(crate) fn incomplete(id: EntityId, ty: &EntityType, raw: String) -> Self {
        Self {
            id,
            ty: ty.id,
            attributes: Vec::new(),
            inverses: vec![Vec::new(); ty.inverses.len()],
            raw: Some(raw),
        }
    }

    /// Entity id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Entity type handle.
    pub fn type_id(&self) -> EntityTypeId {
        self.ty
    }

    /// Attribute values in slot order. Empty for incomplete entities.
    pub fn attributes(&self) -> &[Value] {
        &self.attributes
    }

    /// Back-references collected for inverse slot `index`.
    pub fn inverse(&self, index: usize) -> &[EntityKey] {
        self.inverses.get(index).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the record failed to decode and only its raw text is kept.
    pub fn is_incomplete(&self) -> bool {
        self.raw.is_some()
    }

    /// Raw parameter text of an incomplete entity.
    pub fn raw_arguments(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// Reflection over an entity's attributes and inverse collections by name.
pub trait Describe {
    /// `(attribute name, value)` pairs in slot order.
    fn describe(&self) -> Vec<(&str, &Value)>;

    /// `(inverse name, back-referencing ids)` pairs.
    fn describe_inverse(&self) -> Vec<(&str, Vec<EntityId>)>;
}

/// An entity together with its model and type.
#[derive(Clone, Copy)]
pub struct EntityView<'a> {
    pub(crate) model: &'a Model,
    pub(crate) key: EntityKey,
    pub(crate) entity: &'a Entity,
    pub(crate) ty: &'a EntityType,
}

impl<'a> EntityView<'a> {
    /// Arena key.
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Entity id.
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// The underlying entity.
    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// Schema type.
    pub fn entity_type(&self) -> &'a EntityType {
        self.ty
    }

    /// Type name as declared in the schema.
    pub fn type_name(&self) -> &'a str {
        &self.ty.name
    }

    /// Attribute by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.ty
            .slot_index(name)
            .and_then(|i| self.entity.attributes.get(i))
    }

    /// Entities referenced from attribute `name` that are present in the model.
    pub fn targets(&self, name: &str) -> Vec<EntityView<'a>> {
        let mut out = Vec::new();
        if let Some(value) = self.get(name) {
            value.visit_refs(&mut |r| {
                if let Some(view) = self.model.target(r).and_then(|k| self.model.view(k)) {
                    out.push(view);
                }
            });
        }
        out
    }

    /// Entities in inverse collection `name` (case-insensitive).
    pub fn inverse(&self, name: &str) -> Vec<EntityView<'a>> {
        self.ty
            .inverse_index(name)
            .map(|i| {
                self.entity
                    .inverse(i)
                    .iter()
                    .filter_map(|k| self.model.view(*k))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The entity as one STEP record.
    pub fn to_step(&self) -> String {
        crate::writer::serialize_entity(self.model, self.entity)
    }
}

impl std::fmt::Debug for EntityView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityView")
            .field("id", &self.entity.id)
            .field("type", &self.ty.name)
            .finish()
    }
}

impl Describe for EntityView<'_> {
    fn describe(&self) -> Vec<(&str, &Value)> {
        self.ty
            .slots
            .iter()
            .zip(self.entity.attributes.iter())
            .map(|(slot, value)| (slot.name.as_str(), value))
            .collect()
    }

    fn describe_inverse(&self) -> Vec<(&str, Vec<EntityId>)> {
        self.ty
            .inverses
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let ids = self
                    .entity
                    .inverse(i)
                    .iter()
                    .filter_map(|k| self.model.entity(*k).map(Entity::id))
                    .collect();
                (slot.name.as_str(), ids)
            })
            .collect()
    }
}
