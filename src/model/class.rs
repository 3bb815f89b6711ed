//! Class declarations: bases, methods and gathered attributes.

use std::collections::BTreeMap;

use crate::diagnostics::Diagnostics;
use crate::model::function::FuncDecl;
use crate::model::variable::VarDecl;

/// A class declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Identifier; the merge key.
    pub name: String,
    /// Storage qualifier captured from a declaration file; empty when
    /// inferred from source. Not serialized back.
    pub qualifier: String,
    /// Base-class names in declaration order, deduplicated.
    pub bases: Vec<String>,
    /// Methods in first-seen order; dunder methods are never listed.
    pub meths: Vec<FuncDecl>,
    /// Attributes by name, gathered from `self`-assignments in every method
    /// body plus class-body assignments.
    pub attrs: BTreeMap<String, VarDecl>,
}

impl ClassDecl {
    /// An empty class declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifier: String::new(),
            bases: Vec::new(),
            meths: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// The merge key.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Appends a base name unless already present.
    pub fn push_base(&mut self, base: impl Into<String>) {
        let base = base.into();
        if !self.bases.contains(&base) {
            self.bases.push(base);
        }
    }

    /// Looks up a method by name.
    pub fn find_method(&self, name: &str) -> Option<&FuncDecl> {
        self.meths.iter().find(|m| m.key() == name)
    }

    /// Merges the persisted declaration `other` into this freshly inferred
    /// one: bases union receiver-first, attributes union favouring receiver
    /// keys with slot-wise merge, methods union by name with persisted-only
    /// methods appended after the receiver's.
    ///
    /// # Panics
    ///
    /// Panics if the two declarations have different names.
    pub fn merge(&mut self, other: &ClassDecl, diag: &mut Diagnostics) {
        assert_eq!(self.key(), other.key(), "cannot merge classes with different names");
        log::debug!("ClassDecl::merge: {}", self.name);

        for base in &other.bases {
            if !self.bases.contains(base) {
                self.bases.push(base.clone());
            }
        }

        for (name, theirs) in &other.attrs {
            self.attrs
                .entry(name.clone())
                .or_insert_with(|| theirs.clone());
        }
        for (name, attr) in &mut self.attrs {
            if let Some(theirs) = other.attrs.get(name) {
                attr.merge(theirs, diag);
            }
        }

        let appended: Vec<FuncDecl> = other
            .meths
            .iter()
            .filter(|m| self.find_method(m.key()).is_none())
            .cloned()
            .collect();
        self.meths.extend(appended);
        for meth in &mut self.meths {
            if let Some(theirs) = other.meths.iter().find(|m| m.key() == meth.key()) {
                meth.merge(theirs, diag);
            }
        }
    }
}
