//! STEP file reader: scans, decodes and links a whole file into a [`Model`].
//!
//! Loading runs in stages. Records are cut out of the stream, decoded against
//! the schema (in parallel when enabled), registered in file order, and only
//! then are references bound and inverse collections populated. A bad record
//! never aborts the load; it is reported as a [`Diagnostic`].

use std::path::Path;
use std::sync::Arc;

use ifcstep_schema::{EntityTypeId, Schema};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::decode;
use crate::entity::Entity;
use crate::error::{Diagnostic, Result, StepError, ValueError};
use crate::header::{Header, HeaderRecord};
use crate::lexer::{
    closing_paren, scan_records, split_arguments, Lexer, RawRecord, SpannedToken, Token,
};
use crate::model::Model;
use crate::value::{EntityId, Value};

/// Options for loading a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Decode records on the rayon thread pool.
    pub parallel: bool,
    /// Worker threads for decoding. `None` uses the global pool.
    pub threads: Option<usize>,
    /// Populate inverse collections after resolving references.
    pub link_inverses: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            link_inverses: true,
        }
    }
}

impl ReadOptions {
    /// Check the options for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(StepError::InvalidOptions("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// A loaded model and everything that went wrong while loading it.
#[derive(Debug)]
pub struct LoadResult {
    /// The best-effort model.
    pub model: Model,
    /// Per-record problems, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    /// Whether any diagnostic is error-severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Read a STEP file from a path.
pub fn read_step(
    path: impl AsRef<Path>,
    schema: Arc<Schema>,
    options: &ReadOptions,
) -> Result<LoadResult> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "read STEP file");
    read_step_from_buffer(&data, schema, options)
}

/// Read a STEP file from a byte buffer.
///
/// Conforming files are ASCII. Input that is not valid UTF-8 is read as
/// ISO 8859-1, which maps every byte to a character.
pub fn read_step_from_buffer(
    data: &[u8],
    schema: Arc<Schema>,
    options: &ReadOptions,
) -> Result<LoadResult> {
    match std::str::from_utf8(data) {
        Ok(text) => parse_model(text, schema, options),
        Err(e) => {
            tracing::warn!(
                offset = e.valid_up_to(),
                "input is not UTF-8, decoding as ISO 8859-1"
            );
            let text: String = data.iter().map(|&b| char::from(b)).collect();
            parse_model(&text, schema, options)
        }
    }
}

/// Parse STEP text into a model.
///
/// Fails only when the stream itself is corrupt or the options are invalid.
pub fn parse_model(input: &str, schema: Arc<Schema>, options: &ReadOptions) -> Result<LoadResult> {
    options.validate()?;
    let scanned = scan_records(input)?;
    let mut diagnostics = Vec::new();

    let header = read_header(&scanned.header, &mut diagnostics);
    if !header.declares_schema(schema.name()) {
        diagnostics.push(Diagnostic::new(
            None,
            None,
            StepError::SchemaMismatch {
                expected: schema.name().to_string(),
                found: header.schema_identifiers().join(", "),
            },
        ));
    }

    let decoded = decode_records(&scanned.data, &schema, options)?;
    tracing::debug!(records = decoded.len(), "decoded records");

    let mut model = Model::new(Arc::clone(&schema));
    model.set_header(header);
    for record in decoded {
        let entity = match record.outcome {
            Outcome::Complete(entity) => entity,
            Outcome::Incomplete(entity, error) => {
                diagnostics.push(Diagnostic::new(Some(entity.id), Some(record.line), error));
                entity
            }
            Outcome::Rejected(id, error) => {
                diagnostics.push(Diagnostic::new(id, Some(record.line), error));
                continue;
            }
        };
        let id = entity.id;
        if let Err(error) = model.insert(entity) {
            diagnostics.push(Diagnostic::new(Some(id), Some(record.line), error));
        }
    }
    tracing::debug!(entities = model.len(), "registered entities");

    diagnostics.extend(model.resolve_references());
    if options.link_inverses {
        diagnostics.extend(model.link_inverses());
    }

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if !diagnostics.is_empty() {
        tracing::warn!(
            errors,
            warnings = diagnostics.len() - errors,
            "model loaded with diagnostics"
        );
    }
    tracing::info!(
        entities = model.len(),
        schema = schema.name(),
        "loaded STEP model"
    );
    Ok(LoadResult { model, diagnostics })
}

fn read_header(records: &[RawRecord<'_>], diagnostics: &mut Vec<Diagnostic>) -> Header {
    let mut header = Header::default();
    for record in records {
        match HeaderRecord::parse(record.text) {
            Ok(parsed) => header.set(parsed),
            Err(error) => diagnostics.push(Diagnostic::new(None, Some(record.line), error)),
        }
    }
    header
}

/// Result of decoding one DATA record.
enum Outcome {
    Complete(Entity),
    /// Registered with its raw arguments only.
    Incomplete(Entity, StepError),
    /// Not registered at all.
    Rejected(Option<EntityId>, StepError),
}

struct DecodedRecord {
    line: usize,
    outcome: Outcome,
}

fn decode_records(
    records: &[RawRecord<'_>],
    schema: &Schema,
    options: &ReadOptions,
) -> Result<Vec<DecodedRecord>> {
    let decode_one = |record: &RawRecord<'_>| DecodedRecord {
        line: record.line,
        outcome: decode_record(record.text, schema),
    };

    if !options.parallel {
        return Ok(records.iter().map(decode_one).collect());
    }
    match options.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| StepError::InvalidOptions(e.to_string()))?;
            Ok(pool.install(|| records.par_iter().map(decode_one).collect()))
        }
        None => Ok(records.par_iter().map(decode_one).collect()),
    }
}

/// Split `#id= KEYWORD(args)` into its parts.
fn parse_record_head(text: &str) -> std::result::Result<(EntityId, String, &str), StepError> {
    let mut lexer = Lexer::new(text);
    let mut next = || {
        lexer
            .next_token()
            .map(|t| t.map(|t| t.token))
            .map_err(|e| StepError::malformed(None, e.to_string()))
    };

    let id = match next()? {
        Some(Token::EntityRef(id)) => id,
        _ => return Err(StepError::malformed(None, "record does not start with #id")),
    };
    if !matches!(next()?, Some(Token::Equals)) {
        return Err(StepError::malformed(Some(id), "expected '=' after entity id"));
    }
    let keyword = match next()? {
        Some(Token::Keyword(keyword)) => keyword,
        Some(Token::LParen) => {
            return Err(StepError::malformed(
                Some(id),
                "complex entity instances are not supported",
            ))
        }
        _ => return Err(StepError::malformed(Some(id), "expected entity type keyword")),
    };

    let open = match lexer.next_token() {
        Ok(Some(SpannedToken {
            token: Token::LParen,
            pos,
        })) => pos.offset,
        _ => {
            return Err(StepError::malformed(
                Some(id),
                "expected parenthesized parameter list",
            ))
        }
    };
    let close =
        closing_paren(text, open).map_err(|e| StepError::malformed(Some(id), e.to_string()))?;
    if !matches!(Lexer::new(&text[close + 1..]).next_token(), Ok(None)) {
        return Err(StepError::malformed(
            Some(id),
            "unexpected text after parameter list",
        ));
    }
    Ok((id, keyword, &text[open + 1..close]))
}

fn decode_record(text: &str, schema: &Schema) -> Outcome {
    let (id, keyword, arguments) = match parse_record_head(text) {
        Ok(head) => head,
        Err(error) => {
            let id = match &error {
                StepError::MalformedRecord { id, .. } => *id,
                _ => None,
            };
            return Outcome::Rejected(id, error);
        }
    };

    let Some(ty) = schema.entity_type(&keyword) else {
        return Outcome::Rejected(
            Some(id),
            StepError::UnknownEntityType {
                id,
                type_name: keyword,
            },
        );
    };
    if ty.is_abstract {
        return Outcome::Rejected(
            Some(id),
            StepError::AbstractEntityType {
                id,
                type_name: ty.name.clone(),
            },
        );
    }

    let args = match split_arguments(arguments) {
        Ok(args) => args,
        Err(e) => {
            return Outcome::Rejected(Some(id), StepError::malformed(Some(id), e.to_string()))
        }
    };
    let incomplete = |error: StepError| {
        Outcome::Incomplete(Entity::incomplete(id, ty, arguments.trim().to_string()), error)
    };

    if args.len() != ty.arity() {
        return incomplete(StepError::ArgumentCountMismatch {
            id,
            type_name: ty.keyword.clone(),
            expected: ty.arity(),
            actual: args.len(),
        });
    }

    match decode_attributes(&args, ty.id, schema) {
        Ok(attributes) => {
            let mut entity = Entity::new(id, ty);
            entity.attributes = attributes;
            Outcome::Complete(entity)
        }
        Err((slot, error)) => incomplete(error.at(id, &ty.slots[slot].name)),
    }
}

fn decode_attributes(
    args: &[&str],
    ty: EntityTypeId,
    schema: &Schema,
) -> std::result::Result<Vec<Value>, (usize, ValueError)> {
    schema
        .entity(ty)
        .slots
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (slot, text))| decode(text, &slot.ty, schema).map_err(|e| (i, e)))
        .collect()
}
