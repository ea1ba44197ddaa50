//! Serializable schema definitions.
//!
//! A [`SchemaDef`] is the external, data-driven description of a schema. It is
//! normally loaded from TOML:
//!
//! ```toml
//! name = "IFC4"
//!
//! [[defined]]
//! name = "IfcLabel"
//! type = "STRING"
//!
//! [[entity]]
//! name = "IfcMaterial"
//! attributes = [
//!     { name = "Name", type = "IfcLabel" },
//!     { name = "Description", type = "IfcText", optional = true },
//! ]
//! inverses = [
//!     { name = "IsRelatedWith", entity = "IfcMaterialRelationship", attribute = "RelatedMaterials" },
//! ]
//! ```
//!
//! and turned into an index-addressed [`Schema`](crate::Schema) by [`SchemaDef::compile`].

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::Schema;

/// A complete schema definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Schema identifier, compared against the `FILE_SCHEMA` header entry.
    pub name: String,
    /// Defined (aliased) types.
    #[serde(default, rename = "defined")]
    pub defined_types: Vec<DefinedTypeDef>,
    /// Enumeration types.
    #[serde(default, rename = "enumeration")]
    pub enumerations: Vec<EnumerationDef>,
    /// Select (union) types.
    #[serde(default, rename = "select")]
    pub selects: Vec<SelectDef>,
    /// Entity types.
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDef>,
}

/// `TYPE name = underlying;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedTypeDef {
    /// Type name.
    pub name: String,
    /// Underlying type expression.
    #[serde(rename = "type")]
    pub ty: String,
}

/// `TYPE name = ENUMERATION OF (...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationDef {
    /// Type name.
    pub name: String,
    /// Member tokens, without the surrounding dots.
    pub values: Vec<String>,
}

/// `TYPE name = SELECT (...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectDef {
    /// Type name.
    pub name: String,
    /// Names of member types.
    pub members: Vec<String>,
}

/// An entity type with its own (non-inherited) attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name.
    pub name: String,
    /// Direct supertype, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supertype: Option<String>,
    /// Whether the entity is abstract.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Explicit attributes declared at this level, in order.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Inherited attributes redeclared as DERIVE at this level.
    #[serde(default)]
    pub derived: Vec<String>,
    /// Inverse attributes declared at this level.
    #[serde(default)]
    pub inverses: Vec<InverseDef>,
}

/// An explicit attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name.
    pub name: String,
    /// Type expression.
    #[serde(rename = "type")]
    pub ty: String,
    /// Whether `$` is allowed.
    #[serde(default)]
    pub optional: bool,
}

/// `INVERSE name : SET OF entity FOR attribute;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseDef {
    /// Inverse attribute name.
    pub name: String,
    /// Entity type holding the forward attribute.
    pub entity: String,
    /// Forward attribute name on `entity`.
    pub attribute: String,
}

impl SchemaDef {
    /// Create an empty schema definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Load a schema definition from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        toml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Load a schema definition from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Compile into a resolved [`Schema`].
    pub fn compile(&self) -> Result<Schema, SchemaError> {
        Schema::compile(self)
    }

    /// Add a defined type.
    pub fn defined(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.defined_types.push(DefinedTypeDef {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Add an enumeration.
    pub fn enumeration(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.enumerations.push(EnumerationDef {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Add a select.
    pub fn select(mut self, name: impl Into<String>, members: &[&str]) -> Self {
        self.selects.push(SelectDef {
            name: name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    /// Add an entity.
    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }
}

impl EntityDef {
    /// Create an entity definition with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            is_abstract: false,
            attributes: Vec::new(),
            derived: Vec::new(),
            inverses: Vec::new(),
        }
    }

    /// Set the supertype.
    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.supertype = Some(name.into());
        self
    }

    /// Mark as abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a mandatory attribute.
    pub fn attribute(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            ty: ty.into(),
            optional: false,
        });
        self
    }

    /// Add an optional attribute.
    pub fn optional(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.attributes.push(AttributeDef {
            name: name.into(),
            ty: ty.into(),
            optional: true,
        });
        self
    }

    /// Redeclare an inherited attribute as derived.
    pub fn derive(mut self, name: impl Into<String>) -> Self {
        self.derived.push(name.into());
        self
    }

    /// Add an inverse attribute.
    pub fn inverse(
        mut self,
        name: impl Into<String>,
        entity: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.inverses.push(InverseDef {
            name: name.into(),
            entity: entity.into(),
            attribute: attribute.into(),
        });
        self
    }
}
