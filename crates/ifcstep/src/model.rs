//! The entity registry.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ifcstep_schema::Schema;
use slotmap::SlotMap;

use crate::codec::conforms;
use crate::entity::{Entity, EntityView};
use crate::error::{Result, StepError};
use crate::header::Header;
use crate::value::{Binding, EntityId, EntityKey, LazyRef, Value};

/// A STEP model: the single owner of every entity.
///
/// Entities live in a slot arena. Cross-entity references, forward and
/// inverse, are ids or arena keys, never owners, so cyclic graphs need no
/// special care when the model is dropped.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    pub(crate) entities: SlotMap<EntityKey, Entity>,
    pub(crate) index: HashMap<EntityId, EntityKey>,
    pub(crate) order: Vec<EntityKey>,
    max_id: EntityId,
    header: Option<Header>,
    pub(crate) linked: bool,
}

impl Model {
    /// Create an empty model over `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entities: SlotMap::with_key(),
            index: HashMap::new(),
            order: Vec::new(),
            max_id: 0,
            header: None,
            linked: false,
        }
    }

    /// The model's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shared handle to the model's schema.
    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the model has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Header read from the file, if any.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Replace the header.
    pub fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    /// Whether inverse collections are currently maintained.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Smallest id above every id ever registered.
    pub fn next_id(&self) -> EntityId {
        self.max_id + 1
    }

    /// Create an entity with all attributes unset (derived slots hold `*`).
    ///
    /// With `id == None` the next free id is assigned.
    pub fn create_entity(&mut self, id: Option<EntityId>, type_name: &str) -> Result<EntityKey> {
        let id = id.unwrap_or_else(|| self.next_id());
        let schema = Arc::clone(&self.schema);
        let ty = schema
            .entity_type(type_name)
            .ok_or_else(|| StepError::UnknownEntityType {
                id,
                type_name: type_name.to_string(),
            })?;
        if ty.is_abstract {
            return Err(StepError::AbstractEntityType {
                id,
                type_name: ty.name.clone(),
            });
        }
        self.insert(Entity::new(id, ty))
    }

    /// Register an entity. The first registration of an id wins.
    pub(crate) fn insert(&mut self, entity: Entity) -> Result<EntityKey> {
        let id = entity.id;
        if id == 0 {
            return Err(StepError::malformed(Some(0), "entity ids must be positive"));
        }
        if self.index.contains_key(&id) {
            return Err(StepError::DuplicateIdentifier(id));
        }
        let key = self.entities.insert(entity);
        self.index.insert(id, key);
        self.order.push(key);
        self.max_id = self.max_id.max(id);
        Ok(key)
    }

    /// Key of the entity with `id`.
    pub fn get(&self, id: EntityId) -> Option<EntityKey> {
        self.index.get(&id).copied()
    }

    /// Entity by key.
    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// View of the entity with `key`.
    pub fn view(&self, key: EntityKey) -> Option<EntityView<'_>> {
        let entity = self.entities.get(key)?;
        Some(EntityView {
            model: self,
            key,
            entity,
            ty: self.schema.entity(entity.ty),
        })
    }

    /// View of the entity with `id`.
    pub fn view_by_id(&self, id: EntityId) -> Option<EntityView<'_>> {
        self.get(id).and_then(|k| self.view(k))
    }

    /// A reference to `id`, bound if the entity is already registered.
    pub fn resolve_reference(&self, id: EntityId) -> LazyRef {
        match self.get(id) {
            Some(key) => LazyRef::bound(id, key),
            None => LazyRef::new(id),
        }
    }

    /// Live target of a reference.
    pub fn target(&self, r: &LazyRef) -> Option<EntityKey> {
        match r.binding {
            Binding::Bound(key) => self.entities.contains_key(key).then_some(key),
            Binding::Pending => self.get(r.id),
            Binding::Missing => None,
        }
    }

    /// Attribute value by name (case-insensitive).
    pub fn attribute(&self, key: EntityKey, name: &str) -> Option<&Value> {
        self.view(key).and_then(|v| v.get(name))
    }

    /// Set an attribute after checking it against the slot's declared type.
    ///
    /// References are bound immediately; a reference to an entity of an
    /// incompatible type is rejected. When the model is linked, inverse
    /// collections are updated.
    pub fn set_attribute(&mut self, key: EntityKey, name: &str, mut value: Value) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let entity = self.entities.get(key).ok_or(StepError::StaleHandle)?;
        let id = entity.id;
        if entity.is_incomplete() {
            return Err(StepError::IncompleteEntity(id));
        }
        let ty = schema.entity(entity.ty);
        let slot_index = ty.slot_index(name).ok_or_else(|| {
            StepError::invalid_value(id, name, format!("{} has no attribute {}", ty.name, name))
        })?;
        let slot = &ty.slots[slot_index];
        if slot.derived && value != Value::Derived {
            return Err(StepError::invalid_value(
                id,
                &slot.name,
                format!("{} derives this attribute", ty.name),
            ));
        }
        conforms(&value, &slot.ty, &schema).map_err(|e| e.at(id, &slot.name))?;

        let mut problem = None;
        value.visit_refs_mut(&mut |r| {
            r.binding = match self.index.get(&r.id) {
                Some(k) => Binding::Bound(*k),
                None => Binding::Missing,
            };
            let Some(k) = r.key() else {
                return;
            };
            let target_ty = self.entities[k].ty;
            if problem.is_none() && !schema.accepts_entity(&slot.ty, target_ty) {
                problem = Some(StepError::type_mismatch(
                    id,
                    &slot.name,
                    schema.type_name(&slot.ty),
                    &schema.entity(target_ty).name,
                ));
            }
        });
        if let Some(err) = problem {
            return Err(err);
        }

        if self.linked {
            self.unlink_slot(key, slot_index);
        }
        self.entities[key].attributes[slot_index] = value;
        if self.linked {
            self.link_slot(key, slot_index);
        }
        Ok(())
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = EntityView<'_>> + '_ {
        self.order.iter().filter_map(move |k| self.view(*k))
    }

    /// Entities of a type, optionally including its subtypes, in insertion order.
    pub fn entities_of_type(&self, type_name: &str, include_subtypes: bool) -> Vec<EntityKey> {
        let Some(ty) = self.schema.entity_type(type_name) else {
            return Vec::new();
        };
        self.order
            .iter()
            .copied()
            .filter(|k| {
                let entity_ty = self.entities[*k].ty;
                entity_ty == ty.id
                    || (include_subtypes && self.schema.is_subtype_of(entity_ty, ty.id))
            })
            .collect()
    }

    /// Entity count per type name.
    pub fn type_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for entity in self.entities.values() {
            *counts
                .entry(self.schema.entity(entity.ty).name.as_str())
                .or_insert(0) += 1;
        }
        counts
    }

    /// Remove an entity.
    ///
    /// The entity is unlinked from inverse collections, and references to it
    /// are scrubbed from every other entity: a direct reference becomes `$`,
    /// a list element is dropped.
    pub fn remove_entity(&mut self, key: EntityKey) -> Option<Entity> {
        if !self.entities.contains_key(key) {
            return None;
        }
        if self.linked {
            self.unlink(key);
        }
        let entity = self.entities.remove(key)?;
        let id = entity.id;
        let dead = |r: &LazyRef| r.id == id;

        let mut scrubbed = 0usize;
        for (_, other) in self.entities.iter_mut() {
            for value in other.attributes.iter_mut() {
                if value.scrub_refs(&dead) {
                    scrubbed += 1;
                }
            }
            for list in other.inverses.iter_mut() {
                list.retain(|k| *k != key);
            }
        }

        self.index.remove(&id);
        self.order.retain(|k| *k != key);
        tracing::debug!(id, scrubbed, "removed entity");
        Some(entity)
    }

    /// Every entity reachable from `key` through forward references, and
    /// through inverse collections too when `include_inverse` is set.
    ///
    /// Breadth-first, starting with `key` itself.
    pub fn collect_dependents(&self, key: EntityKey, include_inverse: bool) -> Vec<EntityKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([key]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(entity) = self.entities.get(current) else {
                continue;
            };
            out.push(current);

            for value in &entity.attributes {
                value.visit_refs(&mut |r| {
                    if let Some(target) = self.target(r) {
                        if !seen.contains(&target) {
                            queue.push_back(target);
                        }
                    }
                });
            }
            if include_inverse {
                for list in &entity.inverses {
                    queue.extend(list.iter().copied().filter(|k| !seen.contains(k)));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Logical;
    use ifcstep_schema::{EntityDef, SchemaDef};

    fn model() -> Model {
        let schema = SchemaDef::new("MODEL")
            .defined("Label", "STRING")
            .entity(EntityDef::new("Root").abstract_type().optional("Name", "Label"))
            .entity(EntityDef::new("Node").supertype("Root").optional("Next", "Node"))
            .entity(
                EntityDef::new("Group")
                    .supertype("Root")
                    .attribute("Members", "SET [1:?] OF Node")
                    .optional("Visible", "BOOLEAN"),
            )
            .entity(EntityDef::new("Fixed").supertype("Node").derive("Name"))
            .compile()
            .unwrap();
        Model::new(Arc::new(schema))
    }

    #[test]
    fn test_create_and_lookup() {
        let mut m = model();
        let a = m.create_entity(Some(10), "NODE").unwrap();
        let b = m.create_entity(None, "Node").unwrap();
        assert_eq!(m.entity(b).unwrap().id(), 11);
        assert_eq!(m.get(10), Some(a));
        assert_eq!(m.next_id(), 12);
        assert_eq!(m.len(), 2);

        assert!(matches!(
            m.create_entity(Some(10), "Node"),
            Err(StepError::DuplicateIdentifier(10))
        ));
        assert!(matches!(
            m.create_entity(None, "Nope"),
            Err(StepError::UnknownEntityType { .. })
        ));
        assert!(matches!(
            m.create_entity(None, "Root"),
            Err(StepError::AbstractEntityType { .. })
        ));
    }

    #[test]
    fn test_derived_slots_start_derived() {
        let mut m = model();
        let f = m.create_entity(None, "Fixed").unwrap();
        assert_eq!(m.attribute(f, "Name"), Some(&Value::Derived));
        assert!(m
            .set_attribute(f, "Name", Value::String("x".into()))
            .is_err());
    }

    #[test]
    fn test_resolve_reference() {
        let mut m = model();
        let pending = m.resolve_reference(5);
        assert_eq!(pending.key(), None);
        assert_eq!(m.target(&pending), None);

        let key = m.create_entity(Some(5), "Node").unwrap();
        assert_eq!(m.resolve_reference(5).key(), Some(key));
        // an unbound reference resolves once the target exists
        assert_eq!(m.target(&pending), Some(key));
    }

    #[test]
    fn test_set_attribute_checks_types() {
        let mut m = model();
        let node = m.create_entity(None, "Node").unwrap();
        let group = m.create_entity(None, "Group").unwrap();

        m.set_attribute(group, "Visible", Value::Logical(Logical::True))
            .unwrap();
        assert!(m
            .set_attribute(group, "Visible", Value::Logical(Logical::Unknown))
            .is_err());
        assert!(matches!(
            m.set_attribute(group, "Members", Value::Integer(1)),
            Err(StepError::TypeMismatch { .. })
        ));
        assert!(matches!(
            m.set_attribute(node, "Next", Value::reference(2)),
            Err(StepError::TypeMismatch { .. })
        ));
        assert!(m.set_attribute(node, "Missing", Value::Unset).is_err());

        m.set_attribute(group, "Members", Value::List(vec![Value::reference(1)]))
            .unwrap();
        let members = m.attribute(group, "members").unwrap();
        assert_eq!(members.as_list().unwrap()[0].as_reference().unwrap().key(), Some(node));
    }

    #[test]
    fn test_entities_of_type() {
        let mut m = model();
        m.create_entity(None, "Node").unwrap();
        m.create_entity(None, "Fixed").unwrap();
        m.create_entity(None, "Group").unwrap();
        assert_eq!(m.entities_of_type("Node", false).len(), 1);
        assert_eq!(m.entities_of_type("Node", true).len(), 2);
        assert_eq!(m.entities_of_type("Root", true).len(), 3);
        assert!(m.entities_of_type("Unknown", true).is_empty());
        assert_eq!(m.type_counts().get("Fixed"), Some(&1));
    }

    #[test]
    fn test_remove_scrubs_references() {
        let mut m = model();
        let a = m.create_entity(None, "Node").unwrap();
        let b = m.create_entity(None, "Node").unwrap();
        let g = m.create_entity(None, "Group").unwrap();
        m.set_attribute(b, "Next", Value::reference(1)).unwrap();
        m.set_attribute(
            g,
            "Members",
            Value::List(vec![Value::reference(1), Value::reference(2)]),
        )
        .unwrap();

        let removed = m.remove_entity(a).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(m.entity(a).is_none());
        assert!(m.get(1).is_none());
        assert_eq!(m.attribute(b, "Next"), Some(&Value::Unset));
        assert_eq!(
            m.attribute(g, "Members"),
            Some(&Value::List(vec![Value::reference(2)]))
        );
        assert!(m.remove_entity(a).is_none());
        assert_eq!(m.entities().count(), 2);
        // ids are never handed out twice by the allocator
        assert_eq!(m.next_id(), 4);
    }

    #[test]
    fn test_collect_dependents() {
        let mut m = model();
        let a = m.create_entity(None, "Node").unwrap();
        let b = m.create_entity(None, "Node").unwrap();
        let c = m.create_entity(None, "Node").unwrap();
        m.set_attribute(a, "Next", Value::reference(2)).unwrap();
        m.set_attribute(b, "Next", Value::reference(3)).unwrap();
        m.set_attribute(c, "Next", Value::reference(1)).unwrap();

        assert_eq!(m.collect_dependents(b, false), vec![b, c, a]);
        let unrelated = m.create_entity(None, "Node").unwrap();
        assert_eq!(m.collect_dependents(unrelated, true), vec![unrelated]);
    }
}
