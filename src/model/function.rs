//! Function declarations: `cpdef type name(args)` plus inferred locals.

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostics, Event};
use crate::model::variable::{merge_types, VarDecl};

/// True for special method names reserved by the language: prefixed and
/// suffixed with a double underscore and longer than four characters.
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    /// Identifier; the merge key. Unique within a class's method list.
    pub name: String,
    /// Inferred or declared return type; empty when unknown.
    pub ret: String,
    /// Parameters in call-site order. The order is significant and never
    /// rebuilt by a merge.
    pub args: Vec<VarDecl>,
    /// Local variables by name; written sorted.
    pub locals: BTreeMap<String, VarDecl>,
    /// Owning class name, if any. Only consulted to type the conventional
    /// `self` parameter; never merged or serialized.
    pub class_name: Option<String>,
}

impl FuncDecl {
    /// An empty declaration for `name`, optionally owned by a class.
    pub fn new(name: impl Into<String>, class_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            ret: String::new(),
            args: Vec::new(),
            locals: BTreeMap::new(),
            class_name,
        }
    }

    /// The merge key.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Looks up the inferred type of a parameter or local by name.
    pub fn lookup_type(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.ty.as_str())
            .or_else(|| self.locals.get(name).map(|v| v.ty.as_str()))
    }

    /// Records an assignment to a plain name inside the body: refines the
    /// parameter of the same name if one exists, otherwise adds or replaces
    /// a local.
    pub fn assign_local(&mut self, var: VarDecl, diag: &mut Diagnostics) {
        if let Some(arg) = self.args.iter_mut().find(|a| a.key() == var.key()) {
            arg.merge(&var, diag);
        } else {
            self.locals.insert(var.name.clone(), var);
        }
    }

    /// Merges the persisted declaration `other` into this freshly inferred
    /// one.
    ///
    /// The fresh parse is authoritative on which parameters exist: a
    /// parameter only present on the persisted side is recorded as removed
    /// but not re-added, and one only present here is recorded as added.
    /// Matching parameters and locals merge slot-wise.
    ///
    /// # Panics
    ///
    /// Panics if the two declarations have different names.
    pub fn merge(&mut self, other: &FuncDecl, diag: &mut Diagnostics) {
        assert_eq!(self.key(), other.key(), "cannot merge functions with different names");
        log::debug!("FuncDecl::merge: {}", self.name);
        self.ret = merge_types(&self.name, &self.ret, &other.ret, diag);

        for arg in &mut self.args {
            match other.args.iter().find(|o| o.key() == arg.key()) {
                Some(theirs) => arg.merge(theirs, diag),
                None => diag.report(Event::ArgumentAdded {
                    function: self.name.clone(),
                    argument: arg.name.clone(),
                }),
            }
        }
        for theirs in &other.args {
            if !self.args.iter().any(|a| a.key() == theirs.key()) {
                diag.report(Event::ArgumentRemoved {
                    function: self.name.clone(),
                    argument: theirs.name.clone(),
                });
            }
        }

        for (name, theirs) in &other.locals {
            self.locals
                .entry(name.clone())
                .or_insert_with(|| theirs.clone());
        }
        for (name, var) in &mut self.locals {
            if let Some(theirs) = other.locals.get(name) {
                var.merge(theirs, diag);
            }
        }
    }
}
