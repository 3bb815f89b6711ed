//! The inference visitor: walks a parsed source tree and produces a fresh
//! [`ModuleDecl`] with best-effort types for everything it can observe
//! syntactically.
//!
//! Inference is local and defensive throughout: any expression that is not
//! a recognizable literal classifies as `object`, and unsupported
//! constructs are reported and skipped without losing the enclosing
//! declaration.

use std::collections::BTreeMap;

use tree_sitter::{Node, Tree};

use crate::diagnostics::{Diagnostics, Event};
use crate::model::{
    is_dunder, literal_type_for_kind, ClassDecl, EnumDecl, FuncDecl, ModuleDecl, Value, VarDecl,
    DEFAULT_TYPE,
};

/// Derives a module declaration from a parsed source tree.
///
/// Top-level classes become [`ClassDecl`]s, module-scope assignments of a
/// call carrying a tuple of string literals become [`EnumDecl`]s, and
/// everything else is ignored. Hierarchy resolution runs on the result
/// before it is returned.
pub fn infer_from_tree(tree: &Tree, source: &[u8], diag: &mut Diagnostics) -> ModuleDecl {
    let root = tree.root_node();
    let mut module = ModuleDecl::new();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "class_definition" => {
                if let Some(class) = infer_class(child, source, diag) {
                    module.push_class(class);
                }
            },
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    if def.kind() == "class_definition" {
                        if let Some(class) = infer_class(def, source, diag) {
                            module.push_class(class);
                        }
                    }
                }
            },
            "expression_statement" => {
                if let Some(stmt) = child.named_child(0) {
                    if stmt.kind() == "assignment" {
                        if let Some(decl) = try_enum(stmt, source) {
                            module.push_enum(decl);
                        }
                    }
                }
            },
            "function_definition" => {
                log::debug!(
                    "skipping module-level function `{}`",
                    field_text(child, "name", source)
                );
            },
            _ => {},
        }
    }

    module.resolve_hierarchy();
    module
}

fn infer_class(node: Node, source: &[u8], diag: &mut Diagnostics) -> Option<ClassDecl> {
    let name = node.child_by_field_name("name")?;
    let mut class = ClassDecl::new(node_text(name, source));
    log::debug!("inferring class {}", class.name);

    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for arg in superclasses.named_children(&mut cursor) {
            if let Some(base) = base_name(arg, source) {
                class.push_base(base);
            }
        }
    }

    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    for stmt in body.named_children(&mut cursor) {
        let stmt = match stmt.kind() {
            "decorated_definition" => match stmt.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            },
            _ => stmt,
        };
        match stmt.kind() {
            "function_definition" => {
                if let Some((func, attrs)) = infer_function(stmt, source, Some(&class.name), diag)
                {
                    class.attrs.extend(attrs);
                    if !is_dunder(&func.name) {
                        class.meths.push(func);
                    }
                }
            },
            "class_definition" => {
                diag.report(Event::UnsupportedConstruct {
                    construct: "nested class".to_string(),
                    name: field_text(stmt, "name", source),
                    line: stmt.start_position().row + 1,
                });
            },
            "expression_statement" => {
                if let Some(inner) = stmt.named_child(0) {
                    if inner.kind() == "assignment" {
                        infer_class_attr(inner, source, &mut class);
                    }
                }
            },
            _ => {},
        }
    }

    Some(class)
}

/// Class-body assignments become attributes; `__slots__` is bookkeeping,
/// not an attribute.
fn infer_class_attr(node: Node, source: &[u8], class: &mut ClassDecl) {
    let (targets, value) = assignment_targets(node);
    let ty = value
        .and_then(|v| classify_literal(v, source))
        .map(|(ty, _)| ty.to_string())
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());
    for target in targets {
        if target.kind() == "identifier" {
            let name = node_text(target, source);
            if name != "__slots__" {
                class.attrs.insert(name.clone(), VarDecl::with_type(name, ty.clone()));
            }
        }
    }
}

fn infer_function(
    node: Node,
    source: &[u8],
    class_name: Option<&str>,
    diag: &mut Diagnostics,
) -> Option<(FuncDecl, BTreeMap<String, VarDecl>)> {
    let name = node.child_by_field_name("name")?;
    let mut func = FuncDecl::new(node_text(name, source), class_name.map(String::from));
    let mut attrs = BTreeMap::new();
    log::debug!("inferring function {}", func.name);

    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if let Some(arg) = infer_parameter(param, source, class_name) {
                func.args.push(arg);
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk_body(body, source, &mut func, &mut attrs, diag);
    }

    Some((func, attrs))
}

fn infer_parameter(node: Node, source: &[u8], class_name: Option<&str>) -> Option<VarDecl> {
    let mut arg = match node.kind() {
        "identifier" => VarDecl::new(node_text(node, source)),
        "typed_parameter" => {
            let name = node.named_child(0).filter(|c| c.kind() == "identifier")?;
            VarDecl::new(node_text(name, source))
        },
        "default_parameter" | "typed_default_parameter" => {
            let name = node.child_by_field_name("name")?;
            let mut arg = VarDecl::new(node_text(name, source));
            match node.child_by_field_name("value").and_then(|v| classify_literal(v, source)) {
                Some((ty, text)) => {
                    arg.ty = ty.to_string();
                    arg.value = Value::Literal(text);
                },
                None => {
                    arg.ty = DEFAULT_TYPE.to_string();
                    arg.value = Value::Invalid;
                },
            }
            arg
        },
        // *args / **kwargs and bare separators carry no declaration.
        _ => return None,
    };
    if arg.name == "self" {
        if let Some(class_name) = class_name {
            arg.ty = class_name.to_string();
        }
    }
    Some(arg)
}

fn walk_body(
    node: Node,
    source: &[u8],
    func: &mut FuncDecl,
    attrs: &mut BTreeMap<String, VarDecl>,
    diag: &mut Diagnostics,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let child = match child.kind() {
            "decorated_definition" => match child.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            },
            _ => child,
        };
        match child.kind() {
            "function_definition" => {
                diag.report(Event::UnsupportedConstruct {
                    construct: "nested function".to_string(),
                    name: format!("{}.{}", func.name, field_text(child, "name", source)),
                    line: child.start_position().row + 1,
                });
            },
            "class_definition" => {
                diag.report(Event::UnsupportedConstruct {
                    construct: "nested class".to_string(),
                    name: field_text(child, "name", source),
                    line: child.start_position().row + 1,
                });
            },
            "assignment" => handle_assignment(child, source, func, attrs, diag),
            "for_statement" => {
                handle_for(child, source, func, diag);
                if let Some(body) = child.child_by_field_name("body") {
                    walk_body(body, source, func, attrs, diag);
                }
            },
            "return_statement" => {
                func.ret = child
                    .named_child(0)
                    .and_then(|v| classify_literal(v, source))
                    .map(|(ty, _)| ty.to_string())
                    .unwrap_or_else(|| DEFAULT_TYPE.to_string());
            },
            _ => walk_body(child, source, func, attrs, diag),
        }
    }
}

fn handle_assignment(
    node: Node,
    source: &[u8],
    func: &mut FuncDecl,
    attrs: &mut BTreeMap<String, VarDecl>,
    diag: &mut Diagnostics,
) {
    let (targets, value) = assignment_targets(node);
    let ty = value
        .map(|v| assigned_type(v, source, func))
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());

    for target in targets {
        match target.kind() {
            "attribute" => {
                let receiver = target.child_by_field_name("object");
                let is_self = receiver
                    .map(|r| r.kind() == "identifier" && node_text(r, source) == "self")
                    .unwrap_or(false);
                if is_self {
                    if let Some(attr) = target.child_by_field_name("attribute") {
                        let name = node_text(attr, source);
                        attrs.insert(name.clone(), VarDecl::with_type(name, ty.clone()));
                    }
                }
            },
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                // Element-wise types are not attempted for unpacking.
                let mut cursor = target.walk();
                for element in target.named_children(&mut cursor) {
                    if element.kind() == "identifier" {
                        func.assign_local(VarDecl::new(node_text(element, source)), diag);
                    }
                }
            },
            "identifier" => {
                let name = node_text(target, source);
                func.assign_local(VarDecl::with_type(name, ty.clone()), diag);
            },
            _ => {},
        }
    }
}

fn handle_for(node: Node, source: &[u8], func: &mut FuncDecl, diag: &mut Diagnostics) {
    let iter_ty = node
        .child_by_field_name("right")
        .and_then(|v| classify_literal(v, source))
        .map(|(ty, _)| ty.to_string())
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());

    if let Some(target) = node.child_by_field_name("left") {
        match target.kind() {
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                let mut cursor = target.walk();
                for element in target.named_children(&mut cursor) {
                    if element.kind() == "identifier" {
                        func.assign_local(VarDecl::new(node_text(element, source)), diag);
                    }
                }
            },
            "identifier" => {
                func.assign_local(VarDecl::with_type(node_text(target, source), iter_ty), diag);
            },
            _ => {},
        }
    }
}

/// Collects every target of a possibly chained assignment (`a = b = 0`)
/// plus the final assigned expression.
fn assignment_targets(node: Node) -> (Vec<Node>, Option<Node>) {
    let mut targets = Vec::new();
    let mut current = node;
    loop {
        if let Some(left) = current.child_by_field_name("left") {
            targets.push(left);
        }
        match current.child_by_field_name("right") {
            Some(right) if right.kind() == "assignment" => current = right,
            right => return (targets, right),
        }
    }
}

/// Best-effort type of an assigned expression: a literal classifies through
/// the type table, a plain name borrows the type of the parameter or local
/// it refers to, anything else is `object`.
fn assigned_type(node: Node, source: &[u8], func: &FuncDecl) -> String {
    if let Some((ty, _)) = classify_literal(node, source) {
        return ty.to_string();
    }
    if node.kind() == "identifier" {
        if let Some(ty) = func.lookup_type(&node_text(node, source)) {
            return ty.to_string();
        }
    }
    DEFAULT_TYPE.to_string()
}

/// Classifies a node as a compile-time literal, returning the declaration
/// type and the literal's source text. Returns `None` for anything that
/// would need evaluation.
fn classify_literal(node: Node, source: &[u8]) -> Option<(&'static str, String)> {
    if let Some(ty) = literal_type_for_kind(node.kind()) {
        return Some((ty, node_text(node, source)));
    }
    match node.kind() {
        "parenthesized_expression" => node
            .named_child(0)
            .and_then(|inner| classify_literal(inner, source)),
        "unary_operator" => {
            let argument = node.child_by_field_name("argument")?;
            match argument.kind() {
                "integer" | "float" => {
                    let ty = literal_type_for_kind(argument.kind())?;
                    Some((ty, node_text(node, source)))
                },
                _ => None,
            }
        },
        _ => None,
    }
}

/// Recognizes a module-scope enum: a single name assigned a call that
/// carries a tuple of string literals. The strings become the enumerators.
fn try_enum(node: Node, source: &[u8]) -> Option<EnumDecl> {
    let left = node.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let right = node.child_by_field_name("right")?;
    if right.kind() != "call" {
        return None;
    }
    let arguments = right.child_by_field_name("arguments")?;

    let mut cursor = arguments.walk();
    let tuple = arguments
        .named_children(&mut cursor)
        .find(|a| a.kind() == "tuple")?;

    let mut decl = EnumDecl::new(node_text(left, source));
    let mut cursor = tuple.walk();
    for item in tuple.named_children(&mut cursor) {
        if item.kind() == "string" {
            let raw = node_text(item, source);
            let name = string_content(&raw);
            if !name.is_empty() {
                decl.members.push(VarDecl::new(name));
            }
        }
    }
    if decl.members.is_empty() {
        return None;
    }
    log::debug!("inferred enum {} with {} members", decl.name, decl.members.len());
    Some(decl)
}

/// Flattens a base-class expression to a dotted name.
fn base_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source)),
        "attribute" => {
            let object = base_name(node.child_by_field_name("object")?, source)?;
            let attr = node.child_by_field_name("attribute")?;
            Some(format!("{}.{}", object, node_text(attr, source)))
        },
        _ => None,
    }
}

fn node_text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}

fn field_text(node: Node, field: &str, source: &[u8]) -> String {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .unwrap_or_default()
}

/// Strips string prefixes and quotes from a string literal's source text.
fn string_content(raw: &str) -> &str {
    let s = raw.trim_start_matches(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F'));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if s.len() >= 2 * quote.len() && s.starts_with(quote) && s.ends_with(quote) {
            return &s[quote.len()..s.len() - quote.len()];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn infer(src: &str) -> (ModuleDecl, Diagnostics) {
        let mut parser = Parser::new().unwrap();
        let tree = parser.parse_str(src).unwrap();
        let mut diag = Diagnostics::new();
        let module = infer_from_tree(&tree, src.as_bytes(), &mut diag);
        (module, diag)
    }

    #[test]
    fn test_point_class_attrs_typed_from_parameter_defaults() {
        let src = "\
class Point:
    def __init__(self, x=0, y=0):
        self.x = x
        self.y = y
";
        let (module, diag) = infer(src);
        let point = module.find_class("Point").unwrap();

        // The constructor is a dunder and never listed.
        assert!(point.meths.is_empty());
        assert_eq!(point.attrs["x"].ty, "long");
        assert_eq!(point.attrs["y"].ty, "long");
        assert!(diag.is_empty());
    }

    #[test]
    fn test_dunder_attrs_fold_but_method_hidden() {
        let src = "\
class C:
    def __call__(self):
        self.called = True
    def run(self):
        return True
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        let names: Vec<&str> = c.meths.iter().map(|m| m.key()).collect();
        assert_eq!(names, ["run"]);
        assert_eq!(c.attrs["called"].ty, "bint");
        assert_eq!(c.find_method("run").unwrap().ret, "bint");
    }

    #[test]
    fn test_parameter_inference() {
        let src = "\
class C:
    def f(self, a, b=1.5, c=None, d=[], e=compute()):
        pass
";
        let (module, _) = infer(src);
        let f = module.find_class("C").unwrap().find_method("f").unwrap();
        let shapes: Vec<(&str, &str, bool)> = f
            .args
            .iter()
            .map(|a| (a.name.as_str(), a.ty.as_str(), a.value.is_present()))
            .collect();
        assert_eq!(
            shapes,
            [
                ("self", "C", false),
                ("a", "object", false),
                ("b", "double", true),
                ("c", "object", true),
                ("d", "list", true),
                // Non-literal default: type unknown, value present but invalid.
                ("e", "object", true),
            ]
        );
        assert_eq!(f.args[4].value, Value::Invalid);
    }

    #[test]
    fn test_locals_and_for_targets() {
        let src = "\
class C:
    def f(self):
        total = 0
        name = 'x'
        a, b = pair()
        for i in items:
            pass
        for k, v in mapping.items():
            pass
";
        let (module, _) = infer(src);
        let f = module.find_class("C").unwrap().find_method("f").unwrap();
        assert_eq!(f.locals["total"].ty, "long");
        assert_eq!(f.locals["name"].ty, "unicode");
        // Unpacking targets are unknown-typed.
        assert_eq!(f.locals["a"].ty, "object");
        assert_eq!(f.locals["b"].ty, "object");
        assert_eq!(f.locals["k"].ty, "object");
        assert_eq!(f.locals["v"].ty, "object");
        // Plain for target over a non-literal iterand is unknown too.
        assert_eq!(f.locals["i"].ty, "object");
    }

    #[test]
    fn test_local_reassignment_last_write_wins() {
        let src = "\
class C:
    def f(self):
        total = 0
        total = fetch()
";
        let (module, _) = infer(src);
        let f = module.find_class("C").unwrap().find_method("f").unwrap();
        assert_eq!(f.locals["total"].ty, "object");
    }

    #[test]
    fn test_self_attribute_borrowing_local_type() {
        let src = "\
class C:
    def f(self):
        count = 1
        self.count = count
        self.other.x = 1
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        assert_eq!(c.attrs["count"].ty, "long");
        // Only direct self attributes are gathered.
        assert!(!c.attrs.contains_key("x"));
    }

    #[test]
    fn test_return_inference_literal_only() {
        let src = "\
class C:
    def yes(self):
        return True
    def number(self):
        return 42
    def negative(self):
        return -1
    def opaque(self):
        return compute()
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        assert_eq!(c.find_method("yes").unwrap().ret, "bint");
        assert_eq!(c.find_method("number").unwrap().ret, "long");
        assert_eq!(c.find_method("negative").unwrap().ret, "long");
        assert_eq!(c.find_method("opaque").unwrap().ret, "object");
    }

    #[test]
    fn test_bases_flattened_and_deduplicated() {
        let src = "\
class C(base.Mixin, Other, Other):
    pass
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        assert_eq!(c.bases, ["base.Mixin", "Other"]);
    }

    #[test]
    fn test_class_body_assignment_becomes_attr_and_slots_skipped() {
        let src = "\
class C:
    __slots__ = ('a', 'b')
    limit = 10
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        assert!(!c.attrs.contains_key("__slots__"));
        assert_eq!(c.attrs["limit"].ty, "long");
    }

    #[test]
    fn test_nested_class_reported_and_skipped() {
        let src = "\
class Outer:
    class Inner:
        pass
    def f(self):
        pass
";
        let (module, diag) = infer(src);
        let outer = module.find_class("Outer").unwrap();
        assert!(outer.find_method("f").is_some());
        assert!(module.find_class("Inner").is_none());
        assert_eq!(diag.events().len(), 1);
    }

    #[test]
    fn test_nested_function_reported_and_skipped() {
        let src = "\
class C:
    def outer(self):
        def inner():
            leak = 1
        self.ok = True
";
        let (module, diag) = infer(src);
        let c = module.find_class("C").unwrap();
        assert_eq!(c.attrs["ok"].ty, "bint");
        let f = c.find_method("outer").unwrap();
        assert!(!f.locals.contains_key("leak"));
        assert_eq!(diag.events().len(), 1);
    }

    #[test]
    fn test_enum_from_tuple_of_strings() {
        let src = "Color = Enum(\"Color\", (\"RED\", \"GREEN\", \"BLUE\"))\n";
        let (module, _) = infer(src);
        let color = module.find_enum("Color").unwrap();
        let names: Vec<&str> = color.members.iter().map(|m| m.key()).collect();
        assert_eq!(names, ["RED", "GREEN", "BLUE"]);
        assert!(color.members.iter().all(|m| m.value == Value::Undefined));
    }

    #[test]
    fn test_plain_module_assignment_is_not_an_enum() {
        let src = "TIMEOUT = 30\nNAMES = compute()\n";
        let (module, _) = infer(src);
        assert!(module.is_empty());
    }

    #[test]
    fn test_hierarchy_resolved_on_fresh_module() {
        let src = "\
class Base:
    def __init__(self):
        self.shared = 0

class Child(Base):
    def __init__(self):
        self.shared = 0
        self.own = ''
";
        let (module, _) = infer(src);
        let child = module.find_class("Child").unwrap();
        assert!(!child.attrs.contains_key("shared"));
        assert!(child.attrs.contains_key("own"));
    }

    #[test]
    fn test_chained_assignment_reaches_all_targets() {
        let src = "\
class C:
    def f(self):
        self.a = self.b = 0
";
        let (module, _) = infer(src);
        let c = module.find_class("C").unwrap();
        assert_eq!(c.attrs["a"].ty, "long");
        assert_eq!(c.attrs["b"].ty, "long");
    }

    #[test]
    fn test_string_content() {
        assert_eq!(string_content("'RED'"), "RED");
        assert_eq!(string_content("\"RED\""), "RED");
        assert_eq!(string_content("u'RED'"), "RED");
        assert_eq!(string_content("'''RED'''"), "RED");
    }
}
