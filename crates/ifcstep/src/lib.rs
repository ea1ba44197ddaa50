#![warn(missing_docs)]

//! Schema-driven ISO 10303-21 (STEP) entity-graph codec for IFC models.
//!
//! A [`Model`] owns every entity in a slot arena. References between
//! entities are ids bound lazily to arena keys, and inverse collections hold
//! non-owning keys, so cyclic graphs need no reference counting.
//!
//! Loading is staged: records are scanned, decoded against the schema (in
//! parallel), registered, then references are resolved and inverse
//! relationships linked. Problems with individual records are collected as
//! [`Diagnostic`]s; only a corrupt stream fails the load.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ifcstep::{parse_model, write_step_to_string, ReadOptions, WriteOptions};
//! use ifcstep::schema::{EntityDef, SchemaDef};
//!
//! let schema = SchemaDef::new("DEMO")
//!     .entity(EntityDef::new("Point").attribute("X", "REAL").attribute("Y", "REAL"))
//!     .compile()
//!     .unwrap();
//!
//! let text = "ISO-10303-21;HEADER;FILE_SCHEMA(('DEMO'));ENDSEC;\
//!             DATA;#1=POINT(0.5,2.);ENDSEC;END-ISO-10303-21;";
//! let loaded = parse_model(text, Arc::new(schema), &ReadOptions::default()).unwrap();
//! assert!(loaded.diagnostics.is_empty());
//!
//! let point = loaded.model.view_by_id(1).unwrap();
//! assert_eq!(point.get("x").and_then(|v| v.as_real()), Some(0.5));
//! assert_eq!(point.to_step(), "#1= POINT(0.5,2.);");
//!
//! let out = write_step_to_string(&loaded.model, &WriteOptions::default());
//! assert!(out.contains("#1= POINT(0.5,2.);"));
//! ```

mod codec;
mod copy;
mod entity;
mod error;
mod guid;
mod header;
mod lexer;
mod link;
mod model;
mod reader;
mod resolve;
mod value;
mod writer;

/// The schema registry crate.
pub use ifcstep_schema as schema;

pub use codec::{conforms, decode, decode_untyped, encode, format_real, value_kind};
pub use copy::{CopyMode, CopyOptions};
pub use entity::{Describe, Entity, EntityView};
pub use error::{Diagnostic, Result, Severity, StepError, ValueError};
pub use guid::{compress_guid, expand_guid, new_ifc_guid};
pub use header::{Header, HeaderRecord};
pub use lexer::{
    decode_string, encode_string, scan_records, split_arguments, Lexer, Position, RawRecord,
    ScannedFile, SpannedToken, Token,
};
pub use model::Model;
pub use reader::{parse_model, read_step, read_step_from_buffer, LoadResult, ReadOptions};
pub use value::{Binding, EntityId, EntityKey, LazyRef, Logical, Value};
pub use writer::{
    serialize_entity, write_step, write_step_to_buffer, write_step_to_string, WriteOptions,
};
