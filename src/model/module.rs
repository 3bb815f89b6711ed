//! The module declaration: the top-level read/merge/write unit.

use std::collections::HashSet;

use crate::diagnostics::Diagnostics;
use crate::model::class::ClassDecl;
use crate::model::enumeration::EnumDecl;

/// Everything declared by one source module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDecl {
    /// Classes in declaration order, unique by name.
    pub classes: Vec<ClassDecl>,
    /// Enums in declaration order, unique by name.
    pub enums: Vec<EnumDecl>,
}

impl ModuleDecl {
    /// An empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the module declares nothing.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.enums.is_empty()
    }

    /// Adds a class; a later definition of the same name replaces the
    /// earlier one.
    pub fn push_class(&mut self, class: ClassDecl) {
        match self.classes.iter_mut().find(|c| c.key() == class.key()) {
            Some(existing) => *existing = class,
            None => self.classes.push(class),
        }
    }

    /// Adds an enum; a later definition of the same name replaces the
    /// earlier one.
    pub fn push_enum(&mut self, decl: EnumDecl) {
        match self.enums.iter_mut().find(|e| e.key() == decl.key()) {
            Some(existing) => *existing = decl,
            None => self.enums.push(decl),
        }
    }

    /// Looks up a class by name.
    pub fn find_class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.key() == name)
    }

    /// Looks up an enum by name.
    pub fn find_enum(&self, name: &str) -> Option<&EnumDecl> {
        self.enums.iter().find(|e| e.key() == name)
    }

    /// Merges the persisted module `other` into this freshly inferred one.
    ///
    /// Classes and enums pair up by name and merge recursively. Entries only
    /// present on the persisted side are dropped: the declaration file never
    /// keeps an entry that no longer corresponds to source.
    pub fn merge(&mut self, other: &ModuleDecl, diag: &mut Diagnostics) {
        log::debug!("ModuleDecl::merge");
        for class in &mut self.classes {
            if let Some(theirs) = other.classes.iter().find(|c| c.key() == class.key()) {
                class.merge(theirs, diag);
            }
        }
        for decl in &mut self.enums {
            if let Some(theirs) = other.enums.iter().find(|e| e.key() == decl.key()) {
                decl.merge(theirs, diag);
            }
        }
    }

    /// Removes from every class the attributes already declared by an
    /// in-module ancestor, so the written file never repeats what
    /// inheritance makes visible.
    ///
    /// Children are stripped before their parents: a child must still see
    /// the duplicate in its parent to know the attribute is inherited.
    /// Bases declared outside this module are left alone.
    pub fn resolve_hierarchy(&mut self) {
        for idx in 0..self.classes.len() {
            let mut visiting = HashSet::new();
            Self::resolve_class(&mut self.classes, idx, &mut visiting);
        }
    }

    fn resolve_class(classes: &mut [ClassDecl], idx: usize, visiting: &mut HashSet<String>) {
        let name = classes[idx].name.clone();
        if !visiting.insert(name.clone()) {
            return;
        }

        let children: Vec<usize> = classes
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != idx && c.bases.contains(&name))
            .map(|(i, _)| i)
            .collect();
        for child in children {
            Self::resolve_class(classes, child, visiting);
        }

        let bases = classes[idx].bases.clone();
        let mut inherited: HashSet<String> = HashSet::new();
        for base in &bases {
            if *base == name {
                continue;
            }
            if let Some(parent) = classes.iter().find(|c| c.name == *base) {
                log::debug!("resolve_hierarchy: {} is child of {}", name, parent.name);
                inherited.extend(parent.attrs.keys().cloned());
            }
        }
        classes[idx].attrs.retain(|attr, _| !inherited.contains(attr));

        visiting.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarDecl;

    fn class(name: &str, bases: &[&str], attrs: &[&str]) -> ClassDecl {
        let mut c = ClassDecl::new(name);
        for b in bases {
            c.push_base(*b);
        }
        for a in attrs {
            c.attrs.insert(a.to_string(), VarDecl::new(*a));
        }
        c
    }

    #[test]
    fn test_merge_drops_persisted_only_entries() {
        let mut diag = Diagnostics::new();
        let mut fresh = ModuleDecl::new();
        fresh.push_class(ClassDecl::new("Kept"));

        let mut persisted = ModuleDecl::new();
        persisted.push_class(ClassDecl::new("Kept"));
        persisted.push_class(ClassDecl::new("Deleted"));
        persisted.push_enum(EnumDecl::new("Stale"));

        fresh.merge(&persisted, &mut diag);
        assert_eq!(fresh.classes.len(), 1);
        assert!(fresh.enums.is_empty());
    }

    #[test]
    fn test_merge_idempotent_against_copy() {
        let mut diag = Diagnostics::new();
        let mut module = ModuleDecl::new();
        module.push_class(class("A", &[], &["x", "y"]));
        module.push_enum(EnumDecl::new("E"));

        let copy = module.clone();
        module.merge(&copy, &mut diag);
        assert_eq!(module, copy);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_push_class_replaces_same_name() {
        let mut module = ModuleDecl::new();
        module.push_class(class("A", &[], &["old"]));
        module.push_class(class("A", &[], &["new"]));
        assert_eq!(module.classes.len(), 1);
        assert!(module.classes[0].attrs.contains_key("new"));
    }

    #[test]
    fn test_hierarchy_removes_inherited_attrs() {
        let mut module = ModuleDecl::new();
        module.push_class(class("Base", &[], &["x", "shared"]));
        module.push_class(class("Child", &["Base"], &["shared", "own"]));

        module.resolve_hierarchy();
        let child = module.find_class("Child").unwrap();
        assert!(!child.attrs.contains_key("shared"));
        assert!(child.attrs.contains_key("own"));
        assert!(module.find_class("Base").unwrap().attrs.contains_key("shared"));
    }

    #[test]
    fn test_hierarchy_is_transitive_regardless_of_order() {
        // Grandchild declared before its ancestors; the duplicate must end
        // up only on the furthest ancestor.
        let mut module = ModuleDecl::new();
        module.push_class(class("C", &["B"], &["x"]));
        module.push_class(class("B", &["A"], &["x"]));
        module.push_class(class("A", &[], &["x"]));

        module.resolve_hierarchy();
        assert!(module.find_class("A").unwrap().attrs.contains_key("x"));
        assert!(!module.find_class("B").unwrap().attrs.contains_key("x"));
        assert!(!module.find_class("C").unwrap().attrs.contains_key("x"));
    }

    #[test]
    fn test_hierarchy_ignores_external_bases() {
        let mut module = ModuleDecl::new();
        module.push_class(class("C", &["outside.Base"], &["x"]));
        module.resolve_hierarchy();
        assert!(module.find_class("C").unwrap().attrs.contains_key("x"));
    }

    #[test]
    fn test_hierarchy_survives_cyclic_bases() {
        let mut module = ModuleDecl::new();
        module.push_class(class("A", &["B"], &["x"]));
        module.push_class(class("B", &["A"], &["y"]));
        module.resolve_hierarchy();
        // No hang; both classes still present.
        assert_eq!(module.classes.len(), 2);
    }
}
