#![warn(missing_docs)]

//! Schema registry for STEP entity graphs.
//!
//! A schema is supplied as data ([`SchemaDef`], usually TOML) and compiled once
//! into a [`Schema`]: every entity type carries its flattened attribute slot
//! list (supertype slots first) and the inverse collections declared on it, so
//! the codec never walks inheritance chains at decode time.
//!
//! # Example
//!
//! ```
//! use ifcstep_schema::{EntityDef, SchemaDef};
//!
//! let schema = SchemaDef::new("DEMO")
//!     .defined("Label", "STRING")
//!     .entity(EntityDef::new("Named").abstract_type().attribute("Name", "Label"))
//!     .entity(EntityDef::new("Unit").supertype("Named").attribute("Scale", "REAL"))
//!     .compile()
//!     .unwrap();
//!
//! let unit = schema.entity_type("UNIT").unwrap();
//! assert_eq!(unit.arity(), 2);
//! assert_eq!(unit.slots[0].name, "Name");
//! ```

mod def;
mod error;
mod schema;
mod typeexpr;

pub use def::{
    AttributeDef, DefinedTypeDef, EntityDef, EnumerationDef, InverseDef, SchemaDef, SelectDef,
};
pub use error::SchemaError;
pub use schema::{
    AttrType, AttributeSlot, DefinedType, DefinedTypeId, EntityType, EntityTypeId, EnumId,
    EnumType, InverseSlot, NamedType, Schema, SelectId, SelectType,
};
pub use typeexpr::{AggregateKind, Bounds, SimpleType, TypeExpr};
