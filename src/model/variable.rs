//! Variables: the atomic unit of declaration merging.
//!
//! A [`VarDecl`] stands for an attribute, a parameter, a local or an enum
//! member. Its type is a plain string so that free-form type names read from
//! a declaration file survive verbatim; the closed set inferred from source
//! is `object`, `bint`, `long`, `double`, `list`, `dict`, `tuple`, `set`
//! and `unicode`.

use crate::diagnostics::{Diagnostics, Event};

/// Type used when nothing better can be inferred.
pub const DEFAULT_TYPE: &str = "object";

/// Maps a literal tree node kind to its declaration type.
///
/// Container kinds map by shape alone; element types are not inspected.
pub fn literal_type_for_kind(kind: &str) -> Option<&'static str> {
    match kind {
        "integer" => Some("long"),
        "float" => Some("double"),
        "true" | "false" => Some("bint"),
        "none" => Some("object"),
        "string" | "concatenated_string" => Some("unicode"),
        "list" => Some("list"),
        "dictionary" => Some("dict"),
        "tuple" => Some("tuple"),
        "set" => Some("set"),
        _ => None,
    }
}

/// The value slot of a variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// No value was ever present.
    Undefined,
    /// A value was present but could not be evaluated as a literal.
    Invalid,
    /// A defined literal, kept as source text.
    Literal(String),
}

impl Value {
    /// True when a default value exists, analyzable or not.
    pub fn is_present(&self) -> bool {
        !matches!(self, Value::Undefined)
    }

    fn is(&self, text: &str) -> bool {
        matches!(self, Value::Literal(s) if s == text)
    }

    /// Values that never overwrite a concrete counterpart during a merge.
    fn is_weak(&self) -> bool {
        match self {
            Value::Undefined | Value::Invalid => true,
            Value::Literal(s) => matches!(s.as_str(), "" | "None" | "object" | "*"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "<undefined>"),
            Value::Invalid => write!(f, "<invalid>"),
            Value::Literal(s) => write!(f, "{}", s),
        }
    }
}

/// A single variable declaration: `type name [= value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    /// Identifier; the merge key.
    pub name: String,
    /// Declared or inferred type, or a `__conflict__type__` sentinel.
    pub ty: String,
    /// Default or enumerator value.
    pub value: Value,
}

impl VarDecl {
    /// A variable of unknown type with no value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: DEFAULT_TYPE.to_string(),
            value: Value::Undefined,
        }
    }

    /// A variable with a known type and no value.
    pub fn with_type(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            value: Value::Undefined,
        }
    }

    /// The merge key. Two declarations with the same key are the same slot,
    /// whatever their types or values.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Parses an argument or attribute fragment: `type name [= value]`.
    ///
    /// A fragment without a type defaults to `object`; anything the grammar
    /// cannot account for degrades to a best-effort declaration rather than
    /// failing the surrounding read.
    pub fn from_arg(text: &str, diag: &mut Diagnostics) -> Self {
        let (head, value) = match text.split_once('=') {
            Some((h, v)) => (h.trim(), v.trim()),
            None => (text.trim(), ""),
        };
        let tokens: Vec<&str> = head.split_whitespace().collect();
        let (ty, name) = match tokens[..] {
            [name] => (DEFAULT_TYPE, name),
            [ty, name] => (ty, name),
            _ => {
                diag.report(Event::MalformedLine { text: text.trim().to_string() });
                (DEFAULT_TYPE, head)
            },
        };
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            value: if value.is_empty() {
                Value::Undefined
            } else {
                Value::Literal(value.to_string())
            },
        }
    }

    /// Parses a locals-annotation fragment: `name = type`.
    pub fn from_local(text: &str) -> Self {
        let (name, ty) = match text.split_once('=') {
            Some((n, t)) => (n.trim(), t.trim()),
            None => (text.trim(), ""),
        };
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            value: Value::Undefined,
        }
    }

    /// Merges the persisted declaration `other` into this freshly inferred
    /// one. Both type and value go through the shared reconciliation rule.
    ///
    /// # Panics
    ///
    /// Panics if the two declarations have different names; pairing them up
    /// is the caller's contract.
    pub fn merge(&mut self, other: &VarDecl, diag: &mut Diagnostics) {
        assert_eq!(self.key(), other.key(), "cannot merge variables with different names");
        log::debug!("VarDecl::merge: {}", self.name);
        self.ty = merge_types(&self.name, &self.ty, &other.ty, diag);
        self.value = merge_values(&self.name, &self.value, &other.value, diag);
    }
}

impl std::fmt::Display for VarDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

/// The shared type-reconciliation rule.
///
/// The sequence is load-bearing: it is checked in this exact order, and the
/// asymmetry decides which side wins on ties. `ours` is the freshly
/// inferred side, `theirs` the persisted one.
pub(crate) fn merge_types(name: &str, ours: &str, theirs: &str, diag: &mut Diagnostics) -> String {
    if ours == theirs {
        return ours.to_string();
    }
    log::debug!("    merge type: {:?} and {:?}", ours, theirs);
    if ours.is_empty() {
        // Unknown loses to anything concrete.
        return if theirs.is_empty() { ours } else { theirs }.to_string();
    }
    if ours == "None" {
        return if matches!(theirs, "" | "None") { ours } else { theirs }.to_string();
    }
    if ours == "object" {
        return if matches!(theirs, "" | "None" | "object") { ours } else { theirs }.to_string();
    }
    if matches!(theirs, "" | "None" | "object") {
        return ours.to_string();
    }
    if ours == "long" && theirs == "size_t" {
        log::debug!("    promoting {} to {}", ours, theirs);
        return theirs.to_string();
    }
    let resolved = format!("__conflict__type__: \"{}\" \"{}\"", ours, theirs);
    diag.report(Event::TypeConflict { name: name.to_string(), resolved: resolved.clone() });
    resolved
}

/// The shared value-reconciliation rule, same ladder as [`merge_types`]
/// with the opaque `*` placeholder and the undefined/invalid states counted
/// as weak.
pub(crate) fn merge_values(name: &str, ours: &Value, theirs: &Value, diag: &mut Diagnostics) -> Value {
    if ours == theirs {
        return ours.clone();
    }
    log::debug!("    merge val: {} and {}", ours, theirs);
    if ours.is("") {
        return if theirs.is("") || !matches!(theirs, Value::Literal(_)) {
            ours.clone()
        } else {
            theirs.clone()
        };
    }
    if ours.is("None") {
        return if theirs.is("") || theirs.is("None") || !matches!(theirs, Value::Literal(_)) {
            ours.clone()
        } else {
            theirs.clone()
        };
    }
    if ours.is("object") {
        return if theirs.is("") || theirs.is("None") || theirs.is("object") {
            ours.clone()
        } else {
            theirs.clone()
        };
    }
    if theirs.is_weak() {
        return ours.clone();
    }
    let resolved = format!("__conflict__val__: \"{}\" \"{}\"", ours, theirs);
    diag.report(Event::ValueConflict { name: name.to_string(), resolved: resolved.clone() });
    Value::Literal(resolved)
}
