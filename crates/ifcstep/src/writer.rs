//! STEP file writer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::encode;
use crate::entity::Entity;
use crate::error::{Result, StepError};
use crate::header::Header;
use crate::model::Model;

/// Options for writing a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Write records in ascending id order instead of insertion order.
    pub sort_by_id: bool,
    /// File name recorded in a generated header.
    pub file_name: Option<String>,
}

impl WriteOptions {
    /// Check the options for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.as_deref().is_some_and(str::is_empty) {
            return Err(StepError::InvalidOptions("file_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Serialize one entity as `#id= KEYWORD(args);`.
///
/// Derived slots are written as `*`. An incomplete entity is written with its
/// original parameter text.
pub fn serialize_entity(model: &Model, entity: &Entity) -> String {
    let schema = model.schema();
    let ty = schema.entity(entity.ty);
    let mut out = format!("#{}= {}(", entity.id, ty.keyword);
    match entity.raw_arguments() {
        Some(raw) => out.push_str(raw),
        None => {
            for (i, (slot, value)) in ty.slots.iter().zip(&entity.attributes).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if slot.derived {
                    out.push('*');
                } else {
                    encode(value, Some(&slot.ty), schema, &mut out);
                }
            }
        }
    }
    out.push_str(");");
    out
}

/// Serialize a whole model to STEP text.
///
/// The model's header is written as read; a model without one gets a default
/// header naming its schema.
pub fn write_step_to_string(model: &Model, options: &WriteOptions) -> String {
    let default_header;
    let header = match model.header() {
        Some(header) => header,
        None => {
            default_header = Header::new(
                options.file_name.as_deref().unwrap_or(""),
                model.schema().name(),
                concat!("ifcstep ", env!("CARGO_PKG_VERSION")),
            );
            &default_header
        }
    };

    let mut out = String::from("ISO-10303-21;\nHEADER;\n");
    for record in header.records() {
        out.push_str(&record.keyword);
        out.push('(');
        out.push_str(&record.arguments);
        out.push_str(");\n");
    }
    out.push_str("ENDSEC;\nDATA;\n");

    let mut entities: Vec<&Entity> = model
        .order
        .iter()
        .filter_map(|k| model.entities.get(*k))
        .collect();
    if options.sort_by_id {
        entities.sort_by_key(|e| e.id);
    }
    for entity in entities {
        out.push_str(&serialize_entity(model, entity));
        out.push('\n');
    }

    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    out
}

/// Serialize a whole model to bytes.
pub fn write_step_to_buffer(model: &Model, options: &WriteOptions) -> Vec<u8> {
    write_step_to_string(model, options).into_bytes()
}

/// Write a model to a file.
pub fn write_step(model: &Model, path: impl AsRef<Path>, options: &WriteOptions) -> Result<()> {
    options.validate()?;
    let path = path.as_ref();
    let mut options = options.clone();
    if options.file_name.is_none() {
        options.file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    }
    std::fs::write(path, write_step_to_buffer(model, &options))?;
    tracing::info!(path = %path.display(), entities = model.len(), "wrote STEP file");
    Ok(())
}
