//! Attribute values.

use std::fmt;

use crate::codec::format_real;
use crate::lexer::encode_string;

slotmap::new_key_type! {
    /// Arena handle of an entity. Keys of removed entities no longer resolve.
    pub struct EntityKey;
}

/// Entity id as written in the file (`#id`).
pub type EntityId = u64;

/// Three-valued logical (`.T.`, `.F.`, `.U.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logical {
    /// `.T.`
    True,
    /// `.F.`
    False,
    /// `.U.`
    Unknown,
}

impl Logical {
    /// Parse an enumeration token (without dots), case-insensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "T" | "TRUE" => Some(Self::True),
            "F" | "FALSE" => Some(Self::False),
            "U" | "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Canonical token.
    pub fn token(self) -> &'static str {
        match self {
            Self::True => ".T.",
            Self::False => ".F.",
            Self::Unknown => ".U.",
        }
    }
}

impl From<bool> for Logical {
    fn from(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Resolution state of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Not yet looked up.
    Pending,
    /// Bound to a live arena entry.
    Bound(EntityKey),
    /// Looked up and not found.
    Missing,
}

/// A reference by id, bound to an arena key once the target is known.
///
/// Equality compares ids only.
#[derive(Debug, Clone, Copy)]
pub struct LazyRef {
    /// Referenced id.
    pub id: EntityId,
    /// Current binding.
    pub binding: Binding,
}

impl LazyRef {
    /// An unbound reference.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            binding: Binding::Pending,
        }
    }

    /// A reference already bound to `key`.
    pub fn bound(id: EntityId, key: EntityKey) -> Self {
        Self {
            id,
            binding: Binding::Bound(key),
        }
    }

    /// Bound key, if any.
    pub fn key(&self) -> Option<EntityKey> {
        match self.binding {
            Binding::Bound(key) => Some(key),
            _ => None,
        }
    }

    /// Whether the reference was looked up and found nothing.
    pub fn is_missing(&self) -> bool {
        self.binding == Binding::Missing
    }
}

impl PartialEq for LazyRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `$`
    Unset,
    /// `*`
    Derived,
    /// Integer literal.
    Integer(i64),
    /// Real literal.
    Real(f64),
    /// `.T.`, `.F.` or `.U.`
    Logical(Logical),
    /// String literal, escapes decoded.
    String(String),
    /// Binary literal, hex digits as written (first digit is the pad count).
    Binary(String),
    /// Enumeration token, canonical upper case, without dots.
    Enum(String),
    /// `#id`
    Ref(LazyRef),
    /// `TYPENAME(value)` in select position.
    Typed {
        /// Upper-case type keyword.
        type_name: String,
        /// Wrapped value.
        value: Box<Value>,
    },
    /// `(a, b, ...)`
    List(Vec<Value>),
    /// `((a, b), (c, d), ...)`
    NestedList(Vec<Vec<Value>>),
}

impl Value {
    /// Shorthand for an unbound reference.
    pub fn reference(id: EntityId) -> Self {
        Self::Ref(LazyRef::new(id))
    }

    /// Shorthand for a typed select value.
    pub fn typed(type_name: &str, value: Value) -> Self {
        Self::Typed {
            type_name: type_name.to_ascii_uppercase(),
            value: Box::new(value),
        }
    }

    /// Whether the value is `$`.
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Typed { value, .. } => value.as_integer(),
            _ => None,
        }
    }

    /// Real value; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(r) => Some(*r),
            Self::Integer(i) => Some(*i as f64),
            Self::Typed { value, .. } => value.as_real(),
            _ => None,
        }
    }

    /// String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Typed { value, .. } => value.as_str(),
            _ => None,
        }
    }

    /// Enumeration token.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Self::Enum(s) => Some(s),
            Self::Typed { value, .. } => value.as_enum(),
            _ => None,
        }
    }

    /// Logical value.
    pub fn as_logical(&self) -> Option<Logical> {
        match self {
            Self::Logical(l) => Some(*l),
            Self::Typed { value, .. } => value.as_logical(),
            _ => None,
        }
    }

    /// Reference.
    pub fn as_reference(&self) -> Option<&LazyRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Flat list elements.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Call `f` on every reference inside the value.
    pub fn visit_refs(&self, f: &mut impl FnMut(&LazyRef)) {
        match self {
            Self::Ref(r) => f(r),
            Self::Typed { value, .. } => value.visit_refs(f),
            Self::List(items) => items.iter().for_each(|v| v.visit_refs(f)),
            Self::NestedList(rows) => rows.iter().flatten().for_each(|v| v.visit_refs(f)),
            _ => {}
        }
    }

    /// Call `f` on every reference inside the value, mutably.
    pub fn visit_refs_mut(&mut self, f: &mut impl FnMut(&mut LazyRef)) {
        match self {
            Self::Ref(r) => f(r),
            Self::Typed { value, .. } => value.visit_refs_mut(f),
            Self::List(items) => items.iter_mut().for_each(|v| v.visit_refs_mut(f)),
            Self::NestedList(rows) => rows
                .iter_mut()
                .flatten()
                .for_each(|v| v.visit_refs_mut(f)),
            _ => {}
        }
    }

    /// All references inside the value, in order.
    pub fn refs(&self) -> Vec<LazyRef> {
        let mut out = Vec::new();
        self.visit_refs(&mut |r| out.push(*r));
        out
    }

    /// Remove references for which `dead` returns true.
    ///
    /// List elements are dropped; a directly held reference becomes `$`.
    /// Returns whether anything changed.
    pub fn scrub_refs(&mut self, dead: &impl Fn(&LazyRef) -> bool) -> bool {
        if matches!(self, Self::Ref(r) if dead(r)) {
            *self = Self::Unset;
            return true;
        }
        let (changed, emptied) = match self {
            Self::Typed { value, .. } => {
                let changed = value.scrub_refs(dead);
                (changed, value.is_unset())
            }
            Self::List(items) => (scrub_list(items, dead), false),
            Self::NestedList(rows) => {
                let mut changed = false;
                for row in rows.iter_mut() {
                    changed |= scrub_list(row, dead);
                }
                (changed, false)
            }
            _ => (false, false),
        };
        if emptied {
            *self = Self::Unset;
        }
        changed
    }
}

fn scrub_list(items: &mut Vec<Value>, dead: &impl Fn(&LazyRef) -> bool) -> bool {
    let before = items.len();
    items.retain(|v| !is_dead_ref(v, dead));
    let mut changed = items.len() != before;
    for item in items.iter_mut() {
        changed |= item.scrub_refs(dead);
    }
    changed
}

/// A reference, possibly behind typed wrappers, that `dead` rejects.
fn is_dead_ref(value: &Value, dead: &impl Fn(&LazyRef) -> bool) -> bool {
    match value {
        Value::Ref(r) => dead(r),
        Value::Typed { value, .. } => is_dead_ref(value, dead),
        _ => false,
    }
}

/// Writes the value exactly as it would appear in a record, typed wrappers included.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("$"),
            Self::Derived => f.write_str("*"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => f.write_str(&format_real(*r)),
            Self::Logical(l) => f.write_str(l.token()),
            Self::String(s) => f.write_str(&encode_string(s)),
            Self::Binary(b) => write!(f, "\"{}\"", b),
            Self::Enum(e) => write!(f, ".{}.", e),
            Self::Ref(r) => write!(f, "#{}", r.id),
            Self::Typed { type_name, value } => write!(f, "{}({})", type_name, value),
            Self::List(items) => write_list(f, items),
            Self::NestedList(rows) => {
                f.write_str("(")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_list(f, row)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let value = Value::List(vec![
            Value::reference(3),
            Value::Unset,
            Value::typed("IfcLabel", Value::String("it's".into())),
            Value::Logical(Logical::Unknown),
            Value::Enum("LENGTHUNIT".into()),
        ]);
        assert_eq!(value.to_string(), "(#3,$,IFCLABEL('it''s'),.U.,.LENGTHUNIT.)");

        let nested = Value::NestedList(vec![
            vec![Value::Real(0.0), Value::Real(1.5)],
            vec![Value::Integer(-2)],
        ]);
        assert_eq!(nested.to_string(), "((0.,1.5),(-2))");
    }

    #[test]
    fn test_lazy_ref_equality_ignores_binding() {
        let mut a = LazyRef::new(5);
        let b = LazyRef::new(5);
        a.binding = Binding::Missing;
        assert_eq!(a, b);
        assert_ne!(a, LazyRef::new(6));
    }

    #[test]
    fn test_visit_refs() {
        let value = Value::NestedList(vec![
            vec![Value::reference(1), Value::reference(2)],
            vec![Value::typed("X", Value::reference(3))],
        ]);
        let ids: Vec<EntityId> = value.refs().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_scrub_refs() {
        let dead = |r: &LazyRef| r.id == 2;

        let mut direct = Value::reference(2);
        assert!(direct.scrub_refs(&dead));
        assert!(direct.is_unset());

        let mut list = Value::List(vec![Value::reference(1), Value::reference(2)]);
        assert!(list.scrub_refs(&dead));
        assert_eq!(list, Value::List(vec![Value::reference(1)]));

        let mut other = Value::reference(1);
        assert!(!other.scrub_refs(&dead));
    }

    #[test]
    fn test_scrub_refs_drops_typed_list_elements() {
        let dead = |r: &LazyRef| r.id == 2;

        let mut list = Value::List(vec![
            Value::typed("IfcMaterial", Value::reference(2)),
            Value::typed("IfcMaterial", Value::reference(1)),
            Value::typed("IfcLabel", Value::String("kept".into())),
        ]);
        assert!(list.scrub_refs(&dead));
        assert_eq!(
            list,
            Value::List(vec![
                Value::typed("IfcMaterial", Value::reference(1)),
                Value::typed("IfcLabel", Value::String("kept".into())),
            ])
        );
        assert_eq!(list.to_string(), "(IFCMATERIAL(#1),IFCLABEL('kept'))");

        let mut rows = Value::NestedList(vec![vec![
            Value::reference(1),
            Value::typed("X", Value::reference(2)),
        ]]);
        assert!(rows.scrub_refs(&dead));
        assert_eq!(rows, Value::NestedList(vec![vec![Value::reference(1)]]));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Integer(3).as_real(), Some(3.0));
        assert_eq!(
            Value::typed("IfcLabel", Value::String("a".into())).as_str(),
            Some("a")
        );
        assert_eq!(Logical::from_token("t"), Some(Logical::True));
        assert_eq!(Logical::from(false).token(), ".F.");
    }
}
