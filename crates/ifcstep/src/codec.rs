//! Type-directed value codec.
//!
//! [`decode`] turns one argument's text into a [`Value`] checked against the
//! slot's declared [`AttrType`]; [`encode`] writes it back. References are
//! never dereferenced here: `#id` becomes an unbound [`LazyRef`].

use ifcstep_schema::{AttrType, Schema};

use crate::error::ValueError;
use crate::lexer::{Lexer, Token};
use crate::value::{LazyRef, Logical, Value};

/// Deepest list or typed-value nesting accepted in one argument.
const MAX_DEPTH: usize = 256;

/// Decode one argument against its declared type.
pub fn decode(text: &str, ty: &AttrType, schema: &Schema) -> Result<Value, ValueError> {
    decode_with(text, Some(ty), schema)
}

/// Decode one argument without a declared type.
///
/// Typed values and lists are kept as written; `.T.`/`.F.`/`.U.` become logicals.
pub fn decode_untyped(text: &str, schema: &Schema) -> Result<Value, ValueError> {
    decode_with(text, None, schema)
}

fn decode_with(text: &str, ty: Option<&AttrType>, schema: &Schema) -> Result<Value, ValueError> {
    let tokens = Lexer::new(text)
        .tokenize()?
        .into_iter()
        .map(|t| t.token)
        .collect::<Vec<_>>();
    let mut parser = ValueParser {
        tokens,
        pos: 0,
        depth: 0,
        schema,
    };
    let value = parser.value(ty)?;
    if parser.pos < parser.tokens.len() {
        return Err(ValueError::Malformed(format!(
            "unexpected {} after value",
            describe_token(&parser.tokens[parser.pos])
        )));
    }
    Ok(value)
}

struct ValueParser<'s> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    schema: &'s Schema,
}

impl ValueParser<'_> {
    fn next(&mut self) -> Result<Token, ValueError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ValueError::Malformed("missing value".into()))?;
        self.pos += 1;
        Ok(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ValueError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ValueError::Malformed(format!(
                "expected {}, found {}",
                describe_token(&expected),
                describe_token(&token)
            )))
        }
    }

    fn mismatch(&self, ty: &AttrType, actual: &str) -> ValueError {
        ValueError::Mismatch {
            expected: self.schema.type_name(ty),
            actual: actual.to_string(),
        }
    }

    fn value(&mut self, ty: Option<&AttrType>) -> Result<Value, ValueError> {
        if self.depth >= MAX_DEPTH {
            return Err(ValueError::Malformed("nesting too deep".into()));
        }
        self.depth += 1;
        let value = self.parse_value(ty);
        self.depth -= 1;
        value
    }

    fn parse_value(&mut self, ty: Option<&AttrType>) -> Result<Value, ValueError> {
        let schema = self.schema;
        let declared = ty.map(|t| schema.underlying(t));
        let token = self.next()?;

        match token {
            Token::Dollar => Ok(Value::Unset),
            Token::Asterisk => Ok(Value::Derived),
            Token::EntityRef(id) => match declared {
                None | Some(AttrType::Entity(_) | AttrType::Select(_)) => {
                    Ok(Value::Ref(LazyRef::new(id)))
                }
                Some(other) => Err(self.mismatch(other, "entity reference")),
            },
            Token::String(s) => match declared {
                None | Some(AttrType::String | AttrType::Select(_)) => Ok(Value::String(s)),
                Some(other) => Err(self.mismatch(other, "string")),
            },
            Token::Binary(b) => match declared {
                None | Some(AttrType::Binary | AttrType::Select(_)) => Ok(Value::Binary(b)),
                Some(other) => Err(self.mismatch(other, "binary")),
            },
            Token::Integer(i) => match declared {
                None | Some(AttrType::Integer | AttrType::Number | AttrType::Select(_)) => {
                    Ok(Value::Integer(i))
                }
                Some(AttrType::Real) => Ok(Value::Real(i as f64)),
                Some(other) => Err(self.mismatch(other, "integer")),
            },
            Token::Real(r) => match declared {
                None | Some(AttrType::Real | AttrType::Number | AttrType::Select(_)) => {
                    Ok(Value::Real(r))
                }
                Some(other) => Err(self.mismatch(other, "real")),
            },
            Token::Enum(name) => self.enumeration(&name, declared),
            Token::LParen => match declared {
                None | Some(AttrType::Select(_)) => self.untyped_list(),
                Some(AttrType::Aggregate { element, .. }) => self.aggregate(element),
                Some(other) => Err(self.mismatch(other, "list")),
            },
            Token::Keyword(name) => match declared {
                Some(AttrType::Select(select)) => {
                    let member = schema.select_member(*select, &name).ok_or_else(|| {
                        ValueError::Invalid(format!(
                            "{} is not a member of {}",
                            name,
                            schema.select(*select).name
                        ))
                    })?;
                    let inner_ty = Schema::named_attr_type(member);
                    self.expect(Token::LParen)?;
                    let inner = self.value(Some(&inner_ty))?;
                    self.expect(Token::RParen)?;
                    Ok(Value::typed(schema.named_type_name(member), inner))
                }
                None => {
                    self.expect(Token::LParen)?;
                    let inner = self.value(None)?;
                    self.expect(Token::RParen)?;
                    Ok(Value::typed(&name, inner))
                }
                Some(other) => Err(self.mismatch(other, &format!("typed value {}", name))),
            },
            other => Err(ValueError::Malformed(format!(
                "unexpected {}",
                describe_token(&other)
            ))),
        }
    }

    fn enumeration(&self, token: &str, declared: Option<&AttrType>) -> Result<Value, ValueError> {
        match declared {
            Some(AttrType::Enumeration(id)) => {
                let enumeration = self.schema.enumeration(*id);
                enumeration
                    .member(token)
                    .map(|m| Value::Enum(m.to_string()))
                    .ok_or_else(|| {
                        ValueError::Invalid(format!(
                            ".{}. is not a member of {}",
                            token, enumeration.name
                        ))
                    })
            }
            Some(AttrType::Logical) => Logical::from_token(token)
                .map(Value::Logical)
                .ok_or_else(|| ValueError::Invalid(format!(".{}. is not a logical", token))),
            Some(AttrType::Boolean) => match Logical::from_token(token) {
                Some(l @ (Logical::True | Logical::False)) => Ok(Value::Logical(l)),
                _ => Err(ValueError::Invalid(format!(".{}. is not a boolean", token))),
            },
            None | Some(AttrType::Select(_)) => Ok(match token {
                "T" | "F" | "U" => {
                    Value::Logical(Logical::from_token(token).unwrap_or(Logical::Unknown))
                }
                _ => Value::Enum(token.to_string()),
            }),
            Some(other) => Err(self.mismatch(other, "enumeration")),
        }
    }

    /// Items after an opening parenthesis, up to and including the closing one.
    fn items(&mut self, element: Option<&AttrType>) -> Result<Vec<Value>, ValueError> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.value(element)?);
            match self.next()? {
                Token::Comma => {}
                Token::RParen => return Ok(items),
                other => {
                    return Err(ValueError::Malformed(format!(
                        "expected ',' or ')', found {}",
                        describe_token(&other)
                    )))
                }
            }
        }
    }

    fn aggregate(&mut self, element: &AttrType) -> Result<Value, ValueError> {
        let schema = self.schema;
        match schema.underlying(element) {
            AttrType::Aggregate { element: inner, .. } => {
                let mut rows = Vec::new();
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Value::NestedList(rows));
                }
                loop {
                    self.expect(Token::LParen)?;
                    rows.push(self.items(Some(inner))?);
                    match self.next()? {
                        Token::Comma => {}
                        Token::RParen => return Ok(Value::NestedList(rows)),
                        other => {
                            return Err(ValueError::Malformed(format!(
                                "expected ',' or ')', found {}",
                                describe_token(&other)
                            )))
                        }
                    }
                }
            }
            _ => Ok(Value::List(self.items(Some(element))?)),
        }
    }

    fn untyped_list(&mut self) -> Result<Value, ValueError> {
        let items = self.items(None)?;
        let all_lists = !items.is_empty() && items.iter().all(|v| matches!(v, Value::List(_)));
        if !all_lists {
            return Ok(Value::List(items));
        }
        Ok(Value::NestedList(
            items
                .into_iter()
                .map(|v| match v {
                    Value::List(row) => row,
                    other => vec![other],
                })
                .collect(),
        ))
    }
}

fn describe_token(token: &Token) -> String {
    match token {
        Token::Keyword(k) => format!("keyword {}", k),
        Token::EntityRef(id) => format!("#{}", id),
        Token::String(_) => "string".into(),
        Token::Binary(_) => "binary".into(),
        Token::Real(_) => "real".into(),
        Token::Integer(_) => "integer".into(),
        Token::Enum(e) => format!(".{}.", e),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::Comma => "','".into(),
        Token::Semicolon => "';'".into(),
        Token::Equals => "'='".into(),
        Token::Asterisk => "'*'".into(),
        Token::Dollar => "'$'".into(),
    }
}

/// Append the encoded form of `value` to `out`.
///
/// A typed wrapper `TYPENAME(...)` is written only where the declared type is
/// a select (or unknown); elsewhere the inner value is written bare.
pub fn encode(value: &Value, ty: Option<&AttrType>, schema: &Schema, out: &mut String) {
    let declared = ty.map(|t| schema.underlying(t));
    match value {
        Value::Typed { type_name, value } => {
            let inner_ty = schema.lookup(type_name).map(Schema::named_attr_type);
            match declared {
                None | Some(AttrType::Select(_)) => {
                    out.push_str(type_name);
                    out.push('(');
                    encode(value, inner_ty.as_ref(), schema, out);
                    out.push(')');
                }
                Some(_) => encode(value, ty, schema, out),
            }
        }
        Value::List(items) => {
            let element = declared.and_then(AttrType::element);
            encode_items(items, element, schema, out);
        }
        Value::NestedList(rows) => {
            let element = declared
                .and_then(AttrType::element)
                .map(|e| schema.underlying(e))
                .and_then(AttrType::element);
            out.push('(');
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_items(row, element, schema, out);
            }
            out.push(')');
        }
        leaf => {
            use std::fmt::Write;
            let _ = write!(out, "{}", leaf);
        }
    }
}

fn encode_items(items: &[Value], element: Option<&AttrType>, schema: &Schema, out: &mut String) {
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode(item, element, schema, out);
    }
    out.push(')');
}

/// Format a real so that parsing it back yields the same `f64`.
///
/// Uses the shortest round-tripping digits, always with a decimal point and an
/// upper-case exponent: `1.`, `0.5`, `1.E-10`.
pub fn format_real(value: f64) -> String {
    let s = format!("{:?}", value);
    if let Some(pos) = s.find('e') {
        let (mantissa, exponent) = s.split_at(pos);
        let exponent = &exponent[1..];
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.E{}", mantissa, exponent)
        }
    } else if let Some(stripped) = s.strip_suffix(".0") {
        format!("{}.", stripped)
    } else {
        s
    }
}

/// Check that a value built in code fits the declared type.
///
/// Mirrors what [`decode`] accepts. Reference targets are not checked here.
pub fn conforms(value: &Value, ty: &AttrType, schema: &Schema) -> Result<(), ValueError> {
    let declared = schema.underlying(ty);
    let mismatch = |actual: &str| ValueError::Mismatch {
        expected: schema.type_name(ty),
        actual: actual.to_string(),
    };

    match (value, declared) {
        (Value::Unset | Value::Derived, _) => Ok(()),
        (Value::Ref(_), AttrType::Entity(_) | AttrType::Select(_)) => Ok(()),
        (Value::String(_), AttrType::String | AttrType::Select(_)) => Ok(()),
        (Value::Binary(b), AttrType::Binary | AttrType::Select(_)) => {
            if !b.is_empty() && b.bytes().all(|c| c.is_ascii_hexdigit()) {
                Ok(())
            } else {
                Err(ValueError::Invalid(format!("'{}' is not a hex binary", b)))
            }
        }
        (Value::Integer(_), AttrType::Integer | AttrType::Number | AttrType::Select(_)) => Ok(()),
        (Value::Real(r), AttrType::Real | AttrType::Number | AttrType::Select(_)) => {
            if r.is_finite() {
                Ok(())
            } else {
                Err(ValueError::Invalid(format!("{} cannot be written", r)))
            }
        }
        (Value::Logical(_), AttrType::Logical | AttrType::Select(_)) => Ok(()),
        (Value::Logical(l), AttrType::Boolean) => match l {
            Logical::Unknown => Err(ValueError::Invalid(".U. is not a boolean".into())),
            _ => Ok(()),
        },
        (Value::Enum(token), AttrType::Enumeration(id)) => {
            let enumeration = schema.enumeration(*id);
            match enumeration.member(token) {
                Some(m) if m == token => Ok(()),
                Some(m) => Err(ValueError::Invalid(format!(
                    ".{}. must be written in canonical case .{}.",
                    token, m
                ))),
                None => Err(ValueError::Invalid(format!(
                    ".{}. is not a member of {}",
                    token, enumeration.name
                ))),
            }
        }
        (Value::Enum(_), AttrType::Select(_)) => Ok(()),
        (Value::Typed { type_name, value }, AttrType::Select(select)) => {
            let member = schema.select_member(*select, type_name).ok_or_else(|| {
                ValueError::Invalid(format!(
                    "{} is not a member of {}",
                    type_name,
                    schema.select(*select).name
                ))
            })?;
            conforms(value, &Schema::named_attr_type(member), schema)
        }
        (Value::List(items), AttrType::Aggregate { element, .. }) => items
            .iter()
            .try_for_each(|item| conforms(item, element, schema)),
        (Value::List(_) | Value::NestedList(_), AttrType::Select(_)) => Ok(()),
        (Value::NestedList(rows), AttrType::Aggregate { element, .. }) => {
            match schema.underlying(element) {
                AttrType::Aggregate { element: inner, .. } => rows
                    .iter()
                    .flatten()
                    .try_for_each(|item| conforms(item, inner, schema)),
                _ => Err(mismatch("nested list")),
            }
        }
        (other, _) => Err(mismatch(value_kind(other))),
    }
}

/// Short name of a value's variant, for messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Unset => "unset",
        Value::Derived => "derived",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Logical(_) => "logical",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Enum(_) => "enumeration",
        Value::Ref(_) => "entity reference",
        Value::Typed { .. } => "typed value",
        Value::List(_) => "list",
        Value::NestedList(_) => "nested list",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifcstep_schema::{EntityDef, NamedType, SchemaDef};

    fn schema() -> Schema {
        SchemaDef::new("CODEC")
            .defined("Label", "STRING")
            .defined("Length", "REAL")
            .defined("Count", "INTEGER")
            .enumeration("Side", &["LEFT", "RIGHT"])
            .select("Measure", &["Length", "Count", "Label"])
            .select("Target", &["Point", "Measure"])
            .entity(EntityDef::new("Point").attribute("Coordinates", "LIST [1:3] OF Length"))
            .compile()
            .unwrap()
    }

    fn ty(schema: &Schema, name: &str) -> AttrType {
        Schema::named_attr_type(schema.lookup(name).unwrap())
    }

    fn list_of(inner: AttrType) -> AttrType {
        AttrType::Aggregate {
            kind: ifcstep_schema::AggregateKind::List,
            bounds: None,
            element: Box::new(inner),
        }
    }

    #[test]
    fn test_primitives() {
        let s = schema();
        assert_eq!(decode("$", &AttrType::Real, &s).unwrap(), Value::Unset);
        assert_eq!(decode("*", &AttrType::Real, &s).unwrap(), Value::Derived);
        assert_eq!(decode("1.5", &ty(&s, "Length"), &s).unwrap(), Value::Real(1.5));
        assert_eq!(decode("2", &AttrType::Real, &s).unwrap(), Value::Real(2.0));
        assert_eq!(decode("2", &AttrType::Number, &s).unwrap(), Value::Integer(2));
        assert_eq!(
            decode("'a''b'", &ty(&s, "Label"), &s).unwrap(),
            Value::String("a'b".into())
        );
        assert_eq!(
            decode(".U.", &AttrType::Logical, &s).unwrap(),
            Value::Logical(Logical::Unknown)
        );
        assert!(decode(".U.", &AttrType::Boolean, &s).is_err());
        assert_eq!(
            decode("\"1F\"", &AttrType::Binary, &s).unwrap(),
            Value::Binary("1F".into())
        );
    }

    #[test]
    fn test_enumeration_case_insensitive() {
        let s = schema();
        let side = ty(&s, "Side");
        assert_eq!(decode(".left.", &side, &s).unwrap(), Value::Enum("LEFT".into()));
        assert!(matches!(
            decode(".UP.", &side, &s),
            Err(ValueError::Invalid(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let s = schema();
        assert!(matches!(
            decode("'x'", &AttrType::Real, &s),
            Err(ValueError::Mismatch { .. })
        ));
        assert!(matches!(
            decode("#4", &ty(&s, "Label"), &s),
            Err(ValueError::Mismatch { .. })
        ));
        assert!(matches!(
            decode("1.5", &AttrType::Integer, &s),
            Err(ValueError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_reference_is_lazy() {
        let s = schema();
        let point = ty(&s, "Point");
        let value = decode("#42", &point, &s).unwrap();
        let r = value.as_reference().unwrap();
        assert_eq!(r.id, 42);
        assert_eq!(r.key(), None);
    }

    #[test]
    fn test_lists() {
        let s = schema();
        let coords = list_of(ty(&s, "Length"));
        assert_eq!(
            decode("(0.,1.,2.5)", &coords, &s).unwrap(),
            Value::List(vec![Value::Real(0.0), Value::Real(1.0), Value::Real(2.5)])
        );
        assert_eq!(decode("()", &coords, &s).unwrap(), Value::List(vec![]));

        let nested = list_of(list_of(AttrType::Integer));
        assert_eq!(
            decode("((1,2),(3))", &nested, &s).unwrap(),
            Value::NestedList(vec![
                vec![Value::Integer(1), Value::Integer(2)],
                vec![Value::Integer(3)]
            ])
        );
        assert!(decode("(1,2", &coords, &s).is_err());
        assert!(decode("(1,2) 3", &coords, &s).is_err());
    }

    #[test]
    fn test_select_typed_values() {
        let s = schema();
        let target = ty(&s, "Target");
        assert_eq!(
            decode("LENGTH(2.)", &target, &s).unwrap(),
            Value::typed("Length", Value::Real(2.0))
        );
        assert!(matches!(
            decode("ifclabel('x')", &target, &s),
            Err(ValueError::Invalid(_))
        ));
        assert_eq!(
            decode("#7", &target, &s).unwrap(),
            Value::reference(7)
        );
        assert!(matches!(
            decode("COUNT(1.5)", &target, &s),
            Err(ValueError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_untyped() {
        let s = schema();
        assert_eq!(
            decode_untyped("((1,2),(3,4))", &s).unwrap(),
            Value::NestedList(vec![
                vec![Value::Integer(1), Value::Integer(2)],
                vec![Value::Integer(3), Value::Integer(4)]
            ])
        );
        assert_eq!(
            decode_untyped("FOO(.BAR.)", &s).unwrap(),
            Value::typed("FOO", Value::Enum("BAR".into()))
        );
    }

    #[test]
    fn test_encode_select_wrapper_policy() {
        let s = schema();
        let typed = Value::typed("Length", Value::Real(2.0));
        let mut out = String::new();
        encode(&typed, Some(&ty(&s, "Target")), &s, &mut out);
        assert_eq!(out, "LENGTH(2.)");

        // outside select position the wrapper is dropped
        let mut out = String::new();
        encode(&typed, Some(&ty(&s, "Length")), &s, &mut out);
        assert_eq!(out, "2.");

        let list = Value::List(vec![typed.clone(), Value::reference(3)]);
        let mut out = String::new();
        encode(&list, Some(&list_of(ty(&s, "Target"))), &s, &mut out);
        assert_eq!(out, "(LENGTH(2.),#3)");
    }

    #[test]
    fn test_decode_encode_text_stable() {
        let s = schema();
        let target = list_of(ty(&s, "Target"));
        for text in ["(LENGTH(1.E-10),#3,COUNT(7),LABEL('x''y'))", "()", "$"] {
            let value = decode(text, &target, &s).unwrap();
            let mut out = String::new();
            encode(&value, Some(&target), &s, &mut out);
            assert_eq!(out, text);
        }
    }

    #[test]
    fn test_nesting_limit() {
        let s = schema();
        let deep = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            decode(&deep, &ty(&s, "Measure"), &s),
            Err(ValueError::Malformed(msg)) if msg == "nesting too deep"
        ));
        assert!(matches!(
            decode_untyped(&deep, &s),
            Err(ValueError::Malformed(_))
        ));

        let shallow = format!("{}1{}", "(".repeat(8), ")".repeat(8));
        assert!(decode(&shallow, &ty(&s, "Measure"), &s).is_ok());
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.0), "1.");
        assert_eq!(format_real(-0.5), "-0.5");
        assert_eq!(format_real(1e-10), "1.E-10");
        assert_eq!(format_real(1.5e300), "1.5E300");
        assert_eq!(format_real(0.1 + 0.2), "0.30000000000000004");
        for v in [0.1, 1.0 / 3.0, 6.02214076e23, -2.5e-8] {
            let text = format_real(v);
            assert_eq!(text.parse::<f64>().unwrap(), v, "{}", text);
        }
    }

    #[test]
    fn test_conforms() {
        let s = schema();
        let target = ty(&s, "Target");
        assert!(conforms(&Value::typed("COUNT", Value::Integer(3)), &target, &s).is_ok());
        assert!(conforms(&Value::typed("COUNT", Value::Real(3.0)), &target, &s).is_err());
        assert!(conforms(&Value::typed("Side", Value::Enum("LEFT".into())), &target, &s).is_err());
        assert!(conforms(&Value::Enum("LEFT".into()), &ty(&s, "Side"), &s).is_ok());
        assert!(conforms(&Value::Enum("left".into()), &ty(&s, "Side"), &s).is_err());
        assert!(conforms(&Value::Real(f64::NAN), &AttrType::Real, &s).is_err());
        assert!(conforms(&Value::String("x".into()), &AttrType::Integer, &s).is_err());
        assert!(matches!(s.lookup("Side"), Some(NamedType::Enumeration(_))));
    }
}
