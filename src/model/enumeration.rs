//! Enum declarations recognized from `Name = Enum("Name", (...))` patterns.

use crate::diagnostics::Diagnostics;
use crate::model::variable::VarDecl;

/// An enumeration declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    /// Identifier; the merge key.
    pub name: String,
    /// Underlying storage type; empty when unspecified.
    pub ty: String,
    /// Enumerators in declaration order, each with an optional value.
    pub members: Vec<VarDecl>,
}

impl EnumDecl {
    /// An empty enum declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: String::new(),
            members: Vec::new(),
        }
    }

    /// The merge key.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Merges the persisted declaration `other` into this freshly inferred
    /// one: each enumerator merges with its same-named persisted
    /// counterpart; enumerators without one keep their inferred state.
    ///
    /// # Panics
    ///
    /// Panics if the two declarations have different names.
    pub fn merge(&mut self, other: &EnumDecl, diag: &mut Diagnostics) {
        assert_eq!(self.key(), other.key(), "cannot merge enums with different names");
        log::debug!("EnumDecl::merge: {}", self.name);
        for member in &mut self.members {
            if let Some(theirs) = other.members.iter().find(|m| m.key() == member.key()) {
                member.merge(theirs, diag);
            }
        }
    }
}
