//! HEADER section records.
//!
//! Header records are kept verbatim; only `FILE_SCHEMA` is interpreted.

use crate::error::StepError;
use crate::lexer::{encode_string, Lexer, Token};

/// One header statement, e.g. `FILE_NAME(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Upper-case keyword.
    pub keyword: String,
    /// Text between the outer parentheses, as written.
    pub arguments: String,
}

impl HeaderRecord {
    /// Create a record.
    pub fn new(keyword: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_ascii_uppercase(),
            arguments: arguments.into(),
        }
    }

    /// Parse `KEYWORD(arguments)`.
    pub fn parse(text: &str) -> Result<Self, StepError> {
        let open = text.find('(').ok_or_else(|| {
            StepError::malformed(None, format!("header record without arguments: {}", text))
        })?;
        let keyword = text[..open].trim();
        let inner = text[open + 1..]
            .trim_end()
            .strip_suffix(')')
            .ok_or_else(|| {
                StepError::malformed(None, format!("unterminated header record {}", keyword))
            })?;
        if keyword.is_empty() {
            return Err(StepError::malformed(None, "header record without keyword"));
        }
        Ok(Self::new(keyword, inner.trim()))
    }
}

/// The HEADER section of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    records: Vec<HeaderRecord>,
}

impl Header {
    /// Build the default header for a new file.
    pub fn new(file_name: &str, schema_name: &str, application: &str) -> Self {
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        Self {
            records: vec![
                HeaderRecord::new(
                    "FILE_DESCRIPTION",
                    "('ViewDefinition [CoordinationView]'),'2;1'",
                ),
                HeaderRecord::new(
                    "FILE_NAME",
                    format!(
                        "{},'{}',(''),('',''),'',{},''",
                        encode_string(file_name),
                        timestamp,
                        encode_string(application)
                    ),
                ),
                HeaderRecord::new("FILE_SCHEMA", format!("({})", encode_string(schema_name))),
            ],
        }
    }

    /// Records in file order.
    pub fn records(&self) -> &[HeaderRecord] {
        &self.records
    }

    /// Record by keyword (case-insensitive).
    pub fn get(&self, keyword: &str) -> Option<&HeaderRecord> {
        self.records
            .iter()
            .find(|r| r.keyword.eq_ignore_ascii_case(keyword))
    }

    /// Replace the record with the same keyword, or append.
    pub fn set(&mut self, record: HeaderRecord) {
        match self.records.iter_mut().find(|r| r.keyword == record.keyword) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Schema identifiers listed in `FILE_SCHEMA`.
    pub fn schema_identifiers(&self) -> Vec<String> {
        let Some(record) = self.get("FILE_SCHEMA") else {
            return Vec::new();
        };
        Lexer::new(&record.arguments)
            .tokenize()
            .map(|tokens| {
                tokens
                    .into_iter()
                    .filter_map(|t| match t.token {
                        Token::String(s) => Some(s),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `FILE_SCHEMA` names `schema` (case-insensitive).
    ///
    /// A header without `FILE_SCHEMA` matches anything.
    pub fn declares_schema(&self, schema: &str) -> bool {
        let ids = self.schema_identifiers();
        ids.is_empty() || ids.iter().any(|id| id.eq_ignore_ascii_case(schema))
    }
}
