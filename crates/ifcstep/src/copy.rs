//! Deep copy with a per-type sharing policy.

use std::collections::{BTreeMap, HashMap};

use ifcstep_schema::{AttrType, EntityTypeId, Schema, SchemaError};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{Result, StepError};
use crate::guid::new_ifc_guid;
use crate::model::Model;
use crate::value::{EntityKey, LazyRef, Value};

/// How a referenced entity is treated by a deep copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Clone the entity and recurse into its references.
    #[default]
    Deep,
    /// Keep referencing the original entity.
    Shallow,
}

/// Deep copy options.
///
/// ```toml
/// default_mode = "deep"
/// fresh_guid_types = ["IfcGloballyUniqueId"]
///
/// [modes]
/// IfcOwnerHistory = "shallow"
/// IfcRepresentationContext = "shallow"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Mode for types with no entry in `modes`.
    pub default_mode: CopyMode,
    /// Mode per entity type name; an entry covers the type's subtypes.
    pub modes: BTreeMap<String, CopyMode>,
    /// Defined types whose string values are replaced by a fresh IFC GUID in
    /// the clones.
    pub fresh_guid_types: Vec<String>,
}

impl CopyOptions {
    /// Set the mode for one type.
    pub fn with_mode(mut self, type_name: impl Into<String>, mode: CopyMode) -> Self {
        self.modes.insert(type_name.into(), mode);
        self
    }

    /// Mode for an entity type: the nearest ancestor with an entry wins.
    pub fn mode_for(&self, schema: &Schema, ty: EntityTypeId) -> CopyMode {
        schema
            .ancestors(ty)
            .find_map(|t| {
                let name = &schema.entity(t).name;
                self.modes
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, mode)| *mode)
            })
            .unwrap_or(self.default_mode)
    }

    /// Check that every named type exists in `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for name in self.modes.keys() {
            if schema.entity_type(name).is_none() {
                return Err(SchemaError::unknown_type(name, "copy modes").into());
            }
        }
        for name in &self.fresh_guid_types {
            match schema.lookup(name) {
                Some(ifcstep_schema::NamedType::Defined(_)) => {}
                _ => {
                    return Err(StepError::InvalidOptions(format!(
                        "fresh_guid_types: {} is not a defined type",
                        name
                    )))
                }
            }
        }
        Ok(())
    }

    fn refreshes_guid(&self, schema: &Schema, ty: &AttrType) -> bool {
        match ty {
            AttrType::Defined(id) => {
                let name = &schema.defined_type(*id).name;
                self.fresh_guid_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(name))
            }
            _ => false,
        }
    }
}

impl Model {
    /// Clone `root` and every entity it reaches through forward references
    /// into this model, under fresh ids.
    ///
    /// Referenced entities whose type maps to [`CopyMode::Shallow`] (and
    /// incomplete entities) are shared rather than cloned, and traversal stops
    /// there. The root itself is always cloned. Each reached entity is cloned
    /// once, so shared substructure and cycles are reproduced, not duplicated.
    /// Returns the key of the root's clone.
    pub fn deep_copy(&mut self, root: EntityKey, options: &CopyOptions) -> Result<EntityKey> {
        let schema = self.shared_schema();
        let root_entity = self.entities.get(root).ok_or(StepError::StaleHandle)?;
        if root_entity.is_incomplete() {
            return Err(StepError::IncompleteEntity(root_entity.id));
        }

        // discover
        let mut to_clone = vec![root];
        let mut memo: HashMap<EntityKey, EntityKey> = HashMap::new();
        let mut queued = std::collections::HashSet::from([root]);
        let mut shared = 0usize;
        let mut cursor = 0;
        while cursor < to_clone.len() {
            let current = to_clone[cursor];
            cursor += 1;
            for value in &self.entities[current].attributes {
                value.visit_refs(&mut |r| {
                    let Some(target) = self.target(r) else {
                        return;
                    };
                    if queued.contains(&target) {
                        return;
                    }
                    let entity = &self.entities[target];
                    if entity.is_incomplete()
                        || options.mode_for(&schema, entity.ty) == CopyMode::Shallow
                    {
                        shared += 1;
                        return;
                    }
                    queued.insert(target);
                    to_clone.push(target);
                });
            }
        }

        // allocate
        for &original in &to_clone {
            let entity = &self.entities[original];
            let clone = Entity {
                id: self.next_id(),
                ty: entity.ty,
                attributes: Vec::new(),
                inverses: vec![Vec::new(); entity.inverses.len()],
                raw: None,
            };
            let key = self.insert(clone)?;
            memo.insert(original, key);
        }

        // fill
        for &original in &to_clone {
            let entity = &self.entities[original];
            let ty = schema.entity(entity.ty);
            let mut attributes = entity.attributes.clone();
            for (slot, value) in ty.slots.iter().zip(attributes.iter_mut()) {
                if options.refreshes_guid(&schema, &slot.ty) && matches!(value, Value::String(_)) {
                    *value = Value::String(new_ifc_guid());
                    continue;
                }
                value.visit_refs_mut(&mut |r| {
                    let target = self.target(r);
                    if let Some(clone) = target.and_then(|t| memo.get(&t)) {
                        *r = LazyRef::bound(self.entities[*clone].id, *clone);
                    }
                });
            }
            self.entities[memo[&original]].attributes = attributes;
        }

        let clones: Vec<EntityKey> = to_clone.iter().map(|k| memo[k]).collect();
        if self.linked {
            self.link_entities(&clones);
        }

        tracing::debug!(cloned = clones.len(), shared, "deep copy");
        Ok(memo[&root])
    }
}
