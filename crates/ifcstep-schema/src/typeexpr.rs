//! EXPRESS-style type expressions as written in schema definitions.
//!
//! Grammar:
//!
//! ```text
//! type      := simple | name | aggregate
//! simple    := INTEGER | REAL | NUMBER | BOOLEAN | LOGICAL | STRING | BINARY
//! aggregate := (LIST | SET | BAG | ARRAY) [ "[" lo ":" hi "]" ] OF [UNIQUE] type
//! ```

use crate::error::SchemaError;

/// Aggregation kind of a collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// Ordered, duplicates allowed.
    List,
    /// Unordered, no duplicates.
    Set,
    /// Unordered, duplicates allowed.
    Bag,
    /// Fixed-size, indexed.
    Array,
}

/// Aggregate bounds `[lower:upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bounds {
    /// Minimum number of elements.
    pub lower: u32,
    /// Maximum number of elements, `None` for `?`.
    pub upper: Option<u32>,
}

/// Built-in simple types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    /// `INTEGER`
    Integer,
    /// `REAL`
    Real,
    /// `NUMBER` (integer or real).
    Number,
    /// `BOOLEAN` (`.T.` / `.F.`).
    Boolean,
    /// `LOGICAL` (`.T.` / `.F.` / `.U.`).
    Logical,
    /// `STRING`
    String,
    /// `BINARY`
    Binary,
}

/// A parsed, not yet name-resolved, type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A built-in simple type.
    Simple(SimpleType),
    /// Reference to a named schema type.
    Named(String),
    /// A collection of another type.
    Aggregate {
        /// Collection kind.
        kind: AggregateKind,
        /// Optional bounds.
        bounds: Option<Bounds>,
        /// Element type.
        element: Box<TypeExpr>,
    },
}

impl TypeExpr {
    /// Parse a type expression such as `SET [1:?] OF IfcMaterial`.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let spaced = text
            .replace('[', " [ ")
            .replace(']', " ] ")
            .replace(':', " : ");
        let tokens: Vec<&str> = spaced.split_whitespace().collect();
        let (expr, rest) = parse_tokens(&tokens, text)?;
        if let Some(extra) = rest.first() {
            return Err(SchemaError::type_expr(
                text,
                format!("unexpected token '{}'", extra),
            ));
        }
        Ok(expr)
    }
}

fn parse_tokens<'a>(
    tokens: &'a [&'a str],
    source: &str,
) -> Result<(TypeExpr, &'a [&'a str]), SchemaError> {
    let (first, rest) = tokens
        .split_first()
        .ok_or_else(|| SchemaError::type_expr(source, "missing type"))?;
    let upper = first.to_ascii_uppercase();

    let kind = match upper.as_str() {
        "LIST" => Some(AggregateKind::List),
        "SET" => Some(AggregateKind::Set),
        "BAG" => Some(AggregateKind::Bag),
        "ARRAY" => Some(AggregateKind::Array),
        _ => None,
    };

    if let Some(kind) = kind {
        let (bounds, rest) = match rest {
            ["[", lo, ":", hi, "]", after @ ..] => (Some(parse_bounds(lo, hi, source)?), after),
            ["[", ..] => return Err(SchemaError::type_expr(source, "malformed bounds")),
            _ => (None, rest),
        };
        let rest = match rest.split_first() {
            Some((of, after)) if of.eq_ignore_ascii_case("OF") => after,
            _ => return Err(SchemaError::type_expr(source, "expected OF")),
        };
        let rest = match rest.split_first() {
            Some((unique, after)) if unique.eq_ignore_ascii_case("UNIQUE") => after,
            _ => rest,
        };
        let (element, rest) = parse_tokens(rest, source)?;
        return Ok((
            TypeExpr::Aggregate {
                kind,
                bounds,
                element: Box::new(element),
            },
            rest,
        ));
    }

    let expr = match upper.as_str() {
        "INTEGER" => TypeExpr::Simple(SimpleType::Integer),
        "REAL" => TypeExpr::Simple(SimpleType::Real),
        "NUMBER" => TypeExpr::Simple(SimpleType::Number),
        "BOOLEAN" => TypeExpr::Simple(SimpleType::Boolean),
        "LOGICAL" => TypeExpr::Simple(SimpleType::Logical),
        "STRING" => TypeExpr::Simple(SimpleType::String),
        "BINARY" => TypeExpr::Simple(SimpleType::Binary),
        _ if is_identifier(first) => TypeExpr::Named((*first).to_string()),
        _ => {
            return Err(SchemaError::type_expr(
                source,
                format!("'{}' is not a type name", first),
            ))
        }
    };
    Ok((expr, rest))
}

fn parse_bounds(lo: &str, hi: &str, source: &str) -> Result<Bounds, SchemaError> {
    let lower = lo
        .parse::<u32>()
        .map_err(|_| SchemaError::type_expr(source, format!("invalid lower bound '{}'", lo)))?;
    let upper = if hi == "?" {
        None
    } else {
        let upper = hi
            .parse::<u32>()
            .map_err(|_| SchemaError::type_expr(source, format!("invalid upper bound '{}'", hi)))?;
        if upper < lower {
            return Err(SchemaError::type_expr(source, "upper bound below lower bound"));
        }
        Some(upper)
    };
    Ok(Bounds { lower, upper })
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_types() {
        assert_eq!(
            TypeExpr::parse("REAL").unwrap(),
            TypeExpr::Simple(SimpleType::Real)
        );
        assert_eq!(
            TypeExpr::parse("  logical ").unwrap(),
            TypeExpr::Simple(SimpleType::Logical)
        );
    }

    #[test]
    fn test_named() {
        assert_eq!(
            TypeExpr::parse("IfcLabel").unwrap(),
            TypeExpr::Named("IfcLabel".into())
        );
    }

    #[test]
    fn test_aggregate_with_bounds() {
        let expr = TypeExpr::parse("SET [1:?] OF IfcMaterial").unwrap();
        assert_eq!(
            expr,
            TypeExpr::Aggregate {
                kind: AggregateKind::Set,
                bounds: Some(Bounds {
                    lower: 1,
                    upper: None
                }),
                element: Box::new(TypeExpr::Named("IfcMaterial".into())),
            }
        );
    }

    #[test]
    fn test_nested_aggregate_compact_bounds() {
        let expr = TypeExpr::parse("LIST[2:2]OF UNIQUE LIST [1:3] OF REAL");
        // "OF" glued to "]" is split by the bracket spacing
        let expr = expr.unwrap();
        match expr {
            TypeExpr::Aggregate {
                kind: AggregateKind::List,
                bounds: Some(Bounds { lower: 2, upper: Some(2) }),
                element,
            } => match *element {
                TypeExpr::Aggregate { element, .. } => {
                    assert_eq!(*element, TypeExpr::Simple(SimpleType::Real))
                }
                other => panic!("expected inner aggregate, got {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert!(TypeExpr::parse("").is_err());
        assert!(TypeExpr::parse("LIST OF").is_err());
        assert!(TypeExpr::parse("LIST [1:] OF REAL").is_err());
        assert!(TypeExpr::parse("SET [3:1] OF REAL").is_err());
        assert!(TypeExpr::parse("REAL REAL").is_err());
        assert!(TypeExpr::parse("SET [1:?] IfcRoot").is_err());
        assert!(TypeExpr::parse("12abc").is_err());
    }
}
