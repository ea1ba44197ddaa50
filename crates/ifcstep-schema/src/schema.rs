//! Compiled, index-addressed schema.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::def::SchemaDef;
use crate::error::SchemaError;
use crate::typeexpr::{AggregateKind, Bounds, SimpleType, TypeExpr};

macro_rules! type_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Position of the type in its schema table.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

type_id!(
    /// Handle to an entity type within one [`Schema`].
    EntityTypeId
);
type_id!(
    /// Handle to a defined type within one [`Schema`].
    DefinedTypeId
);
type_id!(
    /// Handle to an enumeration within one [`Schema`].
    EnumId
);
type_id!(
    /// Handle to a select within one [`Schema`].
    SelectId
);

/// Any named type of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedType {
    /// An entity type.
    Entity(EntityTypeId),
    /// A defined type.
    Defined(DefinedTypeId),
    /// An enumeration.
    Enumeration(EnumId),
    /// A select.
    Select(SelectId),
}

/// Resolved attribute type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    /// `INTEGER`
    Integer,
    /// `REAL`
    Real,
    /// `NUMBER`
    Number,
    /// `BOOLEAN`
    Boolean,
    /// `LOGICAL`
    Logical,
    /// `STRING`
    String,
    /// `BINARY`
    Binary,
    /// A defined type.
    Defined(DefinedTypeId),
    /// An enumeration.
    Enumeration(EnumId),
    /// A reference to an entity of the given type or a subtype.
    Entity(EntityTypeId),
    /// A select.
    Select(SelectId),
    /// A collection.
    Aggregate {
        /// Collection kind.
        kind: AggregateKind,
        /// Optional bounds.
        bounds: Option<Bounds>,
        /// Element type.
        element: Box<AttrType>,
    },
}

impl AttrType {
    /// Element type if this is an aggregate.
    pub fn element(&self) -> Option<&AttrType> {
        match self {
            AttrType::Aggregate { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// A defined type, e.g. `IfcLabel = STRING`.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedType {
    /// Type name as declared.
    pub name: String,
    /// Upper-case name used in typed STEP values.
    pub keyword: String,
    /// Underlying type.
    pub underlying: AttrType,
}

/// An enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    /// Type name as declared.
    pub name: String,
    /// Member tokens, upper-case.
    pub values: Vec<String>,
}

impl EnumType {
    /// Match a token case-insensitively, returning the canonical member.
    pub fn member(&self, token: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(token))
            .map(String::as_str)
    }
}

/// A select type.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectType {
    /// Type name as declared.
    pub name: String,
    /// Direct members.
    pub members: Vec<NamedType>,
}

/// One positional attribute slot of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSlot {
    /// Attribute name.
    pub name: String,
    /// Declared type.
    pub ty: AttrType,
    /// Whether `$` is allowed.
    pub optional: bool,
    /// Whether a subtype redeclares the attribute as DERIVE (serialized as `*`).
    pub derived: bool,
    /// Entity type that declared the attribute.
    pub declared_by: EntityTypeId,
}

/// One inverse collection of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseSlot {
    /// Inverse attribute name.
    pub name: String,
    /// Entity type holding the forward attribute.
    pub source: EntityTypeId,
    /// Index of the forward attribute in the source type's slot list.
    pub source_slot: usize,
    /// Entity type that declared the inverse.
    pub declared_by: EntityTypeId,
}

/// A fully flattened entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    /// Handle of this type.
    pub id: EntityTypeId,
    /// Type name as declared.
    pub name: String,
    /// Upper-case STEP keyword.
    pub keyword: String,
    /// Direct supertype.
    pub supertype: Option<EntityTypeId>,
    /// Whether the type is abstract.
    pub is_abstract: bool,
    /// Attribute slots, supertype slots first.
    pub slots: Vec<AttributeSlot>,
    /// Inverse collections, supertype inverses first.
    pub inverses: Vec<InverseSlot>,
}

impl EntityType {
    /// Number of positional arguments in a record of this type.
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the attribute slot with the given name (case-insensitive).
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Index of the inverse collection with the given name (case-insensitive).
    pub fn inverse_index(&self, name: &str) -> Option<usize> {
        self.inverses
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// A compiled schema.
///
/// All type handles returned by a schema are only meaningful for that schema.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    entities: Vec<EntityType>,
    defined: Vec<DefinedType>,
    enums: Vec<EnumType>,
    selects: Vec<SelectType>,
    names: HashMap<String, NamedType>,
}

impl Schema {
    pub(crate) fn compile(def: &SchemaDef) -> Result<Self, SchemaError> {
        let mut names = HashMap::new();
        {
            let mut register = |name: &str, ty: NamedType| match names
                .entry(name.to_ascii_uppercase())
            {
                Entry::Occupied(_) => Err(SchemaError::DuplicateType(name.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(ty);
                    Ok(())
                }
            };
            for (i, d) in def.defined_types.iter().enumerate() {
                register(&d.name, NamedType::Defined(DefinedTypeId::from_index(i)))?;
            }
            for (i, e) in def.enumerations.iter().enumerate() {
                register(&e.name, NamedType::Enumeration(EnumId::from_index(i)))?;
            }
            for (i, s) in def.selects.iter().enumerate() {
                register(&s.name, NamedType::Select(SelectId::from_index(i)))?;
            }
            for (i, e) in def.entities.iter().enumerate() {
                register(&e.name, NamedType::Entity(EntityTypeId::from_index(i)))?;
            }
        }

        let mut schema = Schema {
            name: def.name.clone(),
            entities: Vec::with_capacity(def.entities.len()),
            defined: Vec::with_capacity(def.defined_types.len()),
            enums: Vec::with_capacity(def.enumerations.len()),
            selects: Vec::with_capacity(def.selects.len()),
            names,
        };

        for d in &def.defined_types {
            let underlying = schema.resolve_text(&d.ty, &d.name)?;
            schema.defined.push(DefinedType {
                name: d.name.clone(),
                keyword: d.name.to_ascii_uppercase(),
                underlying,
            });
        }
        schema.check_defined_cycles()?;

        for e in &def.enumerations {
            schema.enums.push(EnumType {
                name: e.name.clone(),
                values: e.values.iter().map(|v| v.to_ascii_uppercase()).collect(),
            });
        }

        for s in &def.selects {
            let members = s
                .members
                .iter()
                .map(|m| {
                    schema
                        .lookup(m)
                        .ok_or_else(|| SchemaError::unknown_type(m, &s.name))
                })
                .collect::<Result<Vec<_>, _>>()?;
            schema.selects.push(SelectType {
                name: s.name.clone(),
                members,
            });
        }

        let supertypes = def
            .entities
            .iter()
            .map(|e| match &e.supertype {
                None => Ok(None),
                Some(sup) => match schema.lookup(sup) {
                    Some(NamedType::Entity(id)) => Ok(Some(id)),
                    _ => Err(SchemaError::unknown_type(sup, &e.name)),
                },
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, e) in def.entities.iter().enumerate() {
            let mut current = supertypes[i];
            let mut steps = 0;
            while let Some(sup) = current {
                steps += 1;
                if steps > supertypes.len() {
                    return Err(SchemaError::SupertypeCycle(e.name.clone()));
                }
                current = supertypes[sup.index()];
            }
        }

        let mut own_slots = Vec::with_capacity(def.entities.len());
        for (i, e) in def.entities.iter().enumerate() {
            let slots = e
                .attributes
                .iter()
                .map(|a| {
                    Ok(AttributeSlot {
                        name: a.name.clone(),
                        ty: schema.resolve_text(&a.ty, &format!("{}.{}", e.name, a.name))?,
                        optional: a.optional,
                        derived: false,
                        declared_by: EntityTypeId::from_index(i),
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            own_slots.push(slots);
        }

        for (i, e) in def.entities.iter().enumerate() {
            let chain = root_first_chain(&supertypes, i);
            let mut slots: Vec<AttributeSlot> = chain
                .iter()
                .flat_map(|&c| own_slots[c].iter().cloned())
                .collect();
            for &c in &chain {
                for name in &def.entities[c].derived {
                    let slot = slots
                        .iter_mut()
                        .find(|s| s.name.eq_ignore_ascii_case(name))
                        .ok_or_else(|| {
                            SchemaError::unknown_attribute(&def.entities[c].name, name)
                        })?;
                    slot.derived = true;
                }
            }
            schema.entities.push(EntityType {
                id: EntityTypeId::from_index(i),
                name: e.name.clone(),
                keyword: e.name.to_ascii_uppercase(),
                supertype: supertypes[i],
                is_abstract: e.is_abstract,
                slots,
                inverses: Vec::new(),
            });
        }

        for i in 0..def.entities.len() {
            let mut inverses = Vec::new();
            for c in root_first_chain(&supertypes, i) {
                let declaring = &def.entities[c];
                for inv in &declaring.inverses {
                    let source = match schema.lookup(&inv.entity) {
                        Some(NamedType::Entity(id)) => id,
                        Some(_) => {
                            return Err(SchemaError::invalid_inverse(
                                &declaring.name,
                                &inv.name,
                                format!("{} is not an entity type", inv.entity),
                            ))
                        }
                        None => {
                            return Err(SchemaError::unknown_type(
                                &inv.entity,
                                format!("{}.{}", declaring.name, inv.name),
                            ))
                        }
                    };
                    let source_type = schema.entity(source);
                    let source_slot = source_type.slot_index(&inv.attribute).ok_or_else(|| {
                        SchemaError::unknown_attribute(&source_type.name, &inv.attribute)
                    })?;
                    let target = EntityTypeId::from_index(c);
                    if !schema.accepts_entity(&source_type.slots[source_slot].ty, target) {
                        return Err(SchemaError::invalid_inverse(
                            &declaring.name,
                            &inv.name,
                            format!(
                                "{}.{} cannot reference {}",
                                source_type.name, inv.attribute, declaring.name
                            ),
                        ));
                    }
                    inverses.push(InverseSlot {
                        name: inv.name.clone(),
                        source,
                        source_slot,
                        declared_by: target,
                    });
                }
            }
            schema.entities[i].inverses = inverses;
        }

        Ok(schema)
    }

    fn resolve_text(&self, text: &str, context: &str) -> Result<AttrType, SchemaError> {
        let expr = TypeExpr::parse(text)?;
        self.resolve_expr(&expr, context)
    }

    fn resolve_expr(&self, expr: &TypeExpr, context: &str) -> Result<AttrType, SchemaError> {
        Ok(match expr {
            TypeExpr::Simple(simple) => match simple {
                SimpleType::Integer => AttrType::Integer,
                SimpleType::Real => AttrType::Real,
                SimpleType::Number => AttrType::Number,
                SimpleType::Boolean => AttrType::Boolean,
                SimpleType::Logical => AttrType::Logical,
                SimpleType::String => AttrType::String,
                SimpleType::Binary => AttrType::Binary,
            },
            TypeExpr::Named(name) => self
                .lookup(name)
                .map(Self::named_attr_type)
                .ok_or_else(|| SchemaError::unknown_type(name, context))?,
            TypeExpr::Aggregate {
                kind,
                bounds,
                element,
            } => AttrType::Aggregate {
                kind: *kind,
                bounds: *bounds,
                element: Box::new(self.resolve_expr(element, context)?),
            },
        })
    }

    fn check_defined_cycles(&self) -> Result<(), SchemaError> {
        for d in &self.defined {
            let mut current = &d.underlying;
            let mut steps = 0;
            while let AttrType::Defined(next) = current {
                steps += 1;
                if steps > self.defined.len() {
                    return Err(SchemaError::DefinedTypeCycle(d.name.clone()));
                }
                current = &self.defined[next.index()].underlying;
            }
        }
        Ok(())
    }

    /// Schema identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up any named type (case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<NamedType> {
        self.names.get(&name.to_ascii_uppercase()).copied()
    }

    /// Look up an entity type by name or STEP keyword (case-insensitive).
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        match self.lookup(name)? {
            NamedType::Entity(id) => Some(self.entity(id)),
            _ => None,
        }
    }

    /// Entity type by handle.
    pub fn entity(&self, id: EntityTypeId) -> &EntityType {
        &self.entities[id.index()]
    }

    /// All entity types in declaration order.
    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    /// Defined type by handle.
    pub fn defined_type(&self, id: DefinedTypeId) -> &DefinedType {
        &self.defined[id.index()]
    }

    /// Enumeration by handle.
    pub fn enumeration(&self, id: EnumId) -> &EnumType {
        &self.enums[id.index()]
    }

    /// Select by handle.
    pub fn select(&self, id: SelectId) -> &SelectType {
        &self.selects[id.index()]
    }

    /// The attribute type denoting values of a named type.
    pub fn named_attr_type(named: NamedType) -> AttrType {
        match named {
            NamedType::Entity(id) => AttrType::Entity(id),
            NamedType::Defined(id) => AttrType::Defined(id),
            NamedType::Enumeration(id) => AttrType::Enumeration(id),
            NamedType::Select(id) => AttrType::Select(id),
        }
    }

    /// Declared name of a named type.
    pub fn named_type_name(&self, named: NamedType) -> &str {
        match named {
            NamedType::Entity(id) => &self.entity(id).name,
            NamedType::Defined(id) => &self.defined_type(id).name,
            NamedType::Enumeration(id) => &self.enumeration(id).name,
            NamedType::Select(id) => &self.select(id).name,
        }
    }

    /// Human-readable rendering of an attribute type.
    pub fn type_name(&self, ty: &AttrType) -> String {
        match ty {
            AttrType::Integer => "INTEGER".into(),
            AttrType::Real => "REAL".into(),
            AttrType::Number => "NUMBER".into(),
            AttrType::Boolean => "BOOLEAN".into(),
            AttrType::Logical => "LOGICAL".into(),
            AttrType::String => "STRING".into(),
            AttrType::Binary => "BINARY".into(),
            AttrType::Defined(id) => self.defined_type(*id).name.clone(),
            AttrType::Enumeration(id) => self.enumeration(*id).name.clone(),
            AttrType::Entity(id) => self.entity(*id).name.clone(),
            AttrType::Select(id) => self.select(*id).name.clone(),
            AttrType::Aggregate { kind, element, .. } => {
                let kind = match kind {
                    AggregateKind::List => "LIST",
                    AggregateKind::Set => "SET",
                    AggregateKind::Bag => "BAG",
                    AggregateKind::Array => "ARRAY",
                };
                format!("{} OF {}", kind, self.type_name(element))
            }
        }
    }

    /// Strip defined-type aliases down to the underlying type.
    pub fn underlying<'a>(&'a self, mut ty: &'a AttrType) -> &'a AttrType {
        while let AttrType::Defined(id) = ty {
            ty = &self.defined_type(*id).underlying;
        }
        ty
    }

    /// Iterate over `id` and its supertypes, most derived first.
    pub fn ancestors(&self, id: EntityTypeId) -> impl Iterator<Item = EntityTypeId> + '_ {
        std::iter::successors(Some(id), move |&t| self.entity(t).supertype)
    }

    /// Whether `sub` is `sup` or one of its subtypes.
    pub fn is_subtype_of(&self, sub: EntityTypeId, sup: EntityTypeId) -> bool {
        self.ancestors(sub).any(|t| t == sup)
    }

    /// Whether a value of type `ty` may hold a reference to an entity of type `entity`.
    pub fn accepts_entity(&self, ty: &AttrType, entity: EntityTypeId) -> bool {
        match self.underlying(ty) {
            AttrType::Entity(expected) => self.is_subtype_of(entity, *expected),
            AttrType::Select(select) => {
                let mut visited = Vec::new();
                self.select_accepts_entity(*select, entity, &mut visited)
            }
            AttrType::Aggregate { element, .. } => self.accepts_entity(element, entity),
            _ => false,
        }
    }

    fn select_accepts_entity(
        &self,
        select: SelectId,
        entity: EntityTypeId,
        visited: &mut Vec<SelectId>,
    ) -> bool {
        if visited.contains(&select) {
            return false;
        }
        visited.push(select);
        self.select(select).members.iter().any(|m| match m {
            NamedType::Entity(expected) => self.is_subtype_of(entity, *expected),
            NamedType::Select(inner) => self.select_accepts_entity(*inner, entity, visited),
            NamedType::Defined(id) => {
                self.accepts_entity(&self.defined_type(*id).underlying, entity)
            }
            NamedType::Enumeration(_) => false,
        })
    }

    /// Find a non-entity member of a select (searching nested selects) by name.
    ///
    /// Used to decode typed values such as `IFCLABEL('x')` in select position.
    pub fn select_member(&self, select: SelectId, name: &str) -> Option<NamedType> {
        let mut visited = Vec::new();
        self.find_select_member(select, name, &mut visited)
    }

    fn find_select_member(
        &self,
        select: SelectId,
        name: &str,
        visited: &mut Vec<SelectId>,
    ) -> Option<NamedType> {
        if visited.contains(&select) {
            return None;
        }
        visited.push(select);
        for member in &self.select(select).members {
            match member {
                NamedType::Select(inner) => {
                    if let Some(found) = self.find_select_member(*inner, name, visited) {
                        return Some(found);
                    }
                }
                NamedType::Defined(_) | NamedType::Enumeration(_) => {
                    if self.named_type_name(*member).eq_ignore_ascii_case(name) {
                        return Some(*member);
                    }
                }
                NamedType::Entity(_) => {}
            }
        }
        None
    }

    /// Locate the inverse collection on `target` fed by slot `source_slot` of
    /// entities of type `source`.
    pub fn find_inverse(
        &self,
        target: EntityTypeId,
        source: EntityTypeId,
        source_slot: usize,
    ) -> Option<usize> {
        self.entity(target)
            .inverses
            .iter()
            .position(|inv| {
                inv.source_slot == source_slot && self.is_subtype_of(source, inv.source)
            })
    }

    /// Entity types that are `id` or a subtype of it.
    pub fn subtypes_of(&self, id: EntityTypeId) -> impl Iterator<Item = EntityTypeId> + '_ {
        self.entities
            .iter()
            .map(|e| e.id)
            .filter(move |&e| self.is_subtype_of(e, id))
    }
}

fn root_first_chain(supertypes: &[Option<EntityTypeId>], index: usize) -> Vec<usize> {
    let mut chain = vec![index];
    let mut current = supertypes[index];
    while let Some(sup) = current {
        chain.push(sup.index());
        current = supertypes[sup.index()];
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::EntityDef;

    fn sample() -> SchemaDef {
        SchemaDef::new("SAMPLE")
            .defined("Label", "STRING")
            .defined("Ratio", "REAL")
            .enumeration("Side", &["left", "RIGHT"])
            .select("Value", &["Label", "Ratio"])
            .select("Definition", &["Point", "Value"])
            .entity(EntityDef::new("Root").abstract_type().attribute("Name", "Label"))
            .entity(
                EntityDef::new("Point")
                    .supertype("Root")
                    .attribute("Coordinates", "LIST [1:3] OF REAL")
                    .inverse("UsedBy", "Line", "Points"),
            )
            .entity(
                EntityDef::new("Line")
                    .supertype("Root")
                    .attribute("Points", "LIST [2:?] OF Point")
                    .optional("Side", "Side"),
            )
            .entity(EntityDef::new("FixedLine").supertype("Line").derive("Side"))
    }

    #[test]
    fn test_flattened_slots() {
        let schema = sample().compile().unwrap();
        let fixed = schema.entity_type("FIXEDLINE").unwrap();
        let names: Vec<&str> = fixed.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Points", "Side"]);
        assert_eq!(fixed.arity(), 3);
        assert!(fixed.slots[2].derived);
        assert!(!schema.entity_type("Line").unwrap().slots[2].derived);
        assert_eq!(
            fixed.slots[0].declared_by,
            schema.entity_type("Root").unwrap().id
        );
    }

    #[test]
    fn test_inverse_resolution() {
        let schema = sample().compile().unwrap();
        let point = schema.entity_type("Point").unwrap();
        let line = schema.entity_type("Line").unwrap();
        let fixed = schema.entity_type("FixedLine").unwrap();

        assert_eq!(point.inverses.len(), 1);
        assert_eq!(point.inverses[0].source, line.id);
        assert_eq!(point.inverses[0].source_slot, 1);

        assert_eq!(schema.find_inverse(point.id, line.id, 1), Some(0));
        // subtype of the declared source feeds the same collection
        assert_eq!(schema.find_inverse(point.id, fixed.id, 1), Some(0));
        assert_eq!(schema.find_inverse(point.id, line.id, 0), None);
    }

    #[test]
    fn test_subtypes_and_selects() {
        let schema = sample().compile().unwrap();
        let root = schema.entity_type("Root").unwrap().id;
        let point = schema.entity_type("Point").unwrap().id;
        let line = schema.entity_type("Line").unwrap().id;
        let definition = match schema.lookup("Definition") {
            Some(NamedType::Select(id)) => id,
            other => panic!("unexpected {:?}", other),
        };

        assert!(schema.is_subtype_of(point, root));
        assert!(!schema.is_subtype_of(root, point));
        assert!(schema.accepts_entity(&AttrType::Select(definition), point));
        assert!(!schema.accepts_entity(&AttrType::Select(definition), line));

        let label = schema.select_member(definition, "LABEL").unwrap();
        assert_eq!(schema.named_type_name(label), "Label");
        assert!(schema.select_member(definition, "Point").is_none());

        let subtypes: Vec<_> = schema.subtypes_of(root).collect();
        assert_eq!(subtypes.len(), 4);
    }

    #[test]
    fn test_enum_members_canonical() {
        let schema = sample().compile().unwrap();
        let side = match schema.lookup("side") {
            Some(NamedType::Enumeration(id)) => schema.enumeration(id),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(side.member("Left"), Some("LEFT"));
        assert_eq!(side.member("UP"), None);
    }

    #[test]
    fn test_type_name() {
        let schema = sample().compile().unwrap();
        let line = schema.entity_type("Line").unwrap();
        assert_eq!(schema.type_name(&line.slots[1].ty), "LIST OF Point");
    }

    #[test]
    fn test_duplicate_type() {
        let err = SchemaDef::new("X")
            .defined("Label", "STRING")
            .entity(EntityDef::new("LABEL"))
            .compile()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType("LABEL".into()));
    }

    #[test]
    fn test_unknown_type() {
        let err = SchemaDef::new("X")
            .entity(EntityDef::new("A").attribute("B", "Missing"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn test_supertype_cycle() {
        let err = SchemaDef::new("X")
            .entity(EntityDef::new("A").supertype("B"))
            .entity(EntityDef::new("B").supertype("A"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, SchemaError::SupertypeCycle(_)));
    }

    #[test]
    fn test_defined_cycle() {
        let err = SchemaDef::new("X")
            .defined("A", "B")
            .defined("B", "A")
            .compile()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DefinedTypeCycle(_)));
    }

    #[test]
    fn test_derived_must_be_inherited() {
        let err = SchemaDef::new("X")
            .entity(EntityDef::new("A").derive("Nope"))
            .compile()
            .unwrap_err();
        assert_eq!(err, SchemaError::unknown_attribute("A", "Nope"));
    }

    #[test]
    fn test_inverse_needs_entity_attribute() {
        let err = SchemaDef::new("X")
            .entity(EntityDef::new("A").attribute("Count", "INTEGER"))
            .entity(EntityDef::new("B").inverse("Users", "A", "Count"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidInverse { .. }));

        let err = SchemaDef::new("X")
            .entity(EntityDef::new("A").attribute("Target", "B"))
            .entity(EntityDef::new("B").inverse("Users", "A", "Tgt"))
            .compile()
            .unwrap_err();
        assert_eq!(err, SchemaError::unknown_attribute("A", "Tgt"));
    }
}
