//! Inverse relationship linking.
//!
//! A forward attribute feeds an inverse collection on its target when the
//! target's type declares an inverse for that (source type, attribute) pair.
//! Back-references are arena keys and never own the source.

use crate::error::{Diagnostic, StepError};
use crate::model::Model;
use crate::value::EntityKey;

/// One back-reference to maintain: `source` belongs in `target.inverses[inverse]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub source: EntityKey,
    pub target: EntityKey,
    pub inverse: usize,
}

impl Model {
    /// Forward edges of `key`, optionally restricted to one slot.
    ///
    /// References to entities of an incompatible type produce a
    /// `TypeMismatch` diagnostic instead of an edge.
    pub(crate) fn forward_edges(
        &self,
        key: EntityKey,
        only_slot: Option<usize>,
    ) -> (Vec<Edge>, Vec<Diagnostic>) {
        let mut edges = Vec::new();
        let mut diagnostics = Vec::new();
        let Some(entity) = self.entities.get(key) else {
            return (edges, diagnostics);
        };
        if entity.is_incomplete() {
            return (edges, diagnostics);
        }
        let schema = self.schema();
        let ty = schema.entity(entity.ty);

        for (slot_index, value) in entity.attributes.iter().enumerate() {
            if only_slot.is_some_and(|s| s != slot_index) {
                continue;
            }
            let slot = &ty.slots[slot_index];
            value.visit_refs(&mut |r| {
                let Some(target_key) = self.target(r) else {
                    return;
                };
                let target = &self.entities[target_key];
                if !schema.accepts_entity(&slot.ty, target.ty) {
                    diagnostics.push(Diagnostic::new(
                        Some(entity.id),
                        None,
                        StepError::type_mismatch(
                            entity.id,
                            &slot.name,
                            schema.type_name(&slot.ty),
                            format!("#{} {}", target.id, schema.entity(target.ty).name),
                        ),
                    ));
                    return;
                }
                if let Some(inverse) = schema.find_inverse(target.ty, entity.ty, slot_index) {
                    edges.push(Edge {
                        source: key,
                        target: target_key,
                        inverse,
                    });
                }
            });
        }
        (edges, diagnostics)
    }

    fn add_edges(&mut self, edges: &[Edge]) -> usize {
        let mut added = 0;
        for edge in edges {
            let Some(target) = self.entities.get_mut(edge.target) else {
                continue;
            };
            let list = &mut target.inverses[edge.inverse];
            if !list.contains(&edge.source) {
                list.push(edge.source);
                added += 1;
            }
        }
        added
    }

    fn remove_edges(&mut self, edges: &[Edge]) {
        for edge in edges {
            if let Some(target) = self.entities.get_mut(edge.target) {
                target.inverses[edge.inverse].retain(|k| *k != edge.source);
            }
        }
    }

    /// Populate every inverse collection from the forward references.
    ///
    /// Must run after [`Model::resolve_references`]. Idempotent: a
    /// back-reference is never inserted twice.
    pub fn link_inverses(&mut self) -> Vec<Diagnostic> {
        let mut edges = Vec::new();
        let mut diagnostics = Vec::new();
        for &key in &self.order {
            let (e, d) = self.forward_edges(key, None);
            edges.extend(e);
            diagnostics.extend(d);
        }
        let added = self.add_edges(&edges);
        self.linked = true;
        tracing::debug!(
            edges = edges.len(),
            added,
            mismatches = diagnostics.len(),
            "linked inverse relationships"
        );
        diagnostics
    }

    /// Remove `key`'s back-references from every target's inverse collections.
    pub fn unlink(&mut self, key: EntityKey) {
        let (edges, _) = self.forward_edges(key, None);
        self.remove_edges(&edges);
    }

    /// Clear every inverse collection and stop maintaining them.
    pub fn unlink_all(&mut self) {
        for entity in self.entities.values_mut() {
            entity.inverses.iter_mut().for_each(Vec::clear);
        }
        self.linked = false;
    }

    pub(crate) fn unlink_slot(&mut self, key: EntityKey, slot: usize) {
        let (edges, _) = self.forward_edges(key, Some(slot));
        self.remove_edges(&edges);
    }

    pub(crate) fn link_slot(&mut self, key: EntityKey, slot: usize) {
        let (edges, _) = self.forward_edges(key, Some(slot));
        self.add_edges(&edges);
    }

    /// Link the forward references of the given entities only.
    pub(crate) fn link_entities(&mut self, keys: &[EntityKey]) {
        for &key in keys {
            let (edges, _) = self.forward_edges(key, None);
            self.add_edges(&edges);
        }
    }
}
