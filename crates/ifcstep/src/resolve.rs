//! Reference resolution.

use crate::error::{Diagnostic, StepError};
use crate::model::Model;
use crate::value::Binding;

impl Model {
    /// Bind every stored reference against the registry.
    ///
    /// Runs once all entities exist. A reference whose id is not registered is
    /// bound to [`Binding::Missing`], keeps its id (so it serializes
    /// unchanged) and yields an `UnresolvedReference` warning. Incomplete
    /// entities are skipped. Safe to run again after edits.
    pub fn resolve_references(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut bound = 0usize;
        let index = &self.index;

        for &key in &self.order {
            let Some(entity) = self.entities.get_mut(key) else {
                continue;
            };
            if entity.is_incomplete() {
                continue;
            }
            let owner = entity.id;
            for value in entity.attributes.iter_mut() {
                value.visit_refs_mut(&mut |r| match index.get(&r.id) {
                    Some(target) => {
                        r.binding = Binding::Bound(*target);
                        bound += 1;
                    }
                    None => {
                        r.binding = Binding::Missing;
                        diagnostics.push(Diagnostic::new(
                            Some(owner),
                            None,
                            StepError::UnresolvedReference {
                                id: owner,
                                target: r.id,
                            },
                        ));
                    }
                });
            }
        }

        tracing::debug!(bound, unresolved = diagnostics.len(), "resolved references");
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ifcstep_schema::{EntityDef, SchemaDef};

    use crate::model::Model;
    use crate::value::Value;

    #[test]
    fn test_dangling_reference_is_reported() {
        let schema = SchemaDef::new("R")
            .entity(EntityDef::new("Node").optional("Next", "Node"))
            .compile()
            .unwrap();
        let mut m = Model::new(Arc::new(schema));
        let a = m.create_entity(Some(1), "Node").unwrap();
        let b = m.create_entity(Some(2), "Node").unwrap();
        m.entities[a].attributes[0] = Value::reference(2);
        m.entities[b].attributes[0] = Value::reference(9);

        let diagnostics = m.resolve_references();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].entity, Some(2));
        assert!(!diagnostics[0].is_error());

        let next = m.attribute(a, "Next").unwrap().as_reference().unwrap();
        assert_eq!(next.key(), Some(b));
        let dangling = m.attribute(b, "Next").unwrap().as_reference().unwrap();
        assert!(dangling.is_missing());
        assert_eq!(dangling.id, 9);
        assert_eq!(m.target(dangling), None);
    }
}
