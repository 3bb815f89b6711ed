//! The declaration-file writer: deterministic serialization of a
//! [`ModuleDecl`].
//!
//! Output is content-stable: the same model always serializes to the same
//! bytes, so the caller can detect a no-op run by comparing content past
//! the fixed header.

use std::io::Write;

use crate::model::{ClassDecl, EnumDecl, FuncDecl, ModuleDecl, Value, VarDecl};

/// Fixed header preceding the generated declarations. Its byte length is
/// known to the caller, which excludes it from change detection.
pub const HEADER: &str = "\
# -----------------------------------------------------------------
# This file is maintained by pxdgen. Generated declarations are
# refreshed on every run; hand-written edits to types and values
# are preserved, and disagreements are marked with __conflict__
# sentinels for manual resolution.
# -----------------------------------------------------------------

";

const INDENT: &str = "    ";

/// Serializes a module declaration, header included.
pub fn write_module(module: &ModuleDecl, out: &mut impl Write) -> std::io::Result<()> {
    out.write_all(HEADER.as_bytes())?;
    for class in &module.classes {
        write_class(class, out)?;
        writeln!(out)?;
    }
    for decl in &module.enums {
        write_enum(decl, out)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Serializes a module to a string. What the generator diffs against the
/// file on disk.
pub fn module_to_string(module: &ModuleDecl) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail.
    write_module(module, &mut buf).expect("in-memory write");
    String::from_utf8(buf).expect("writer emits UTF-8")
}

fn write_class(class: &ClassDecl, out: &mut impl Write) -> std::io::Result<()> {
    let bases = if class.bases.is_empty() {
        String::new()
    } else {
        format!("({})", class.bases.join(", "))
    };
    writeln!(out, "cdef class {}{}:", class.name, bases)?;

    if class.attrs.is_empty() && class.meths.is_empty() {
        writeln!(out, "{}pass", INDENT)?;
        return Ok(());
    }
    for attr in class.attrs.values() {
        writeln!(out, "{}cdef public {:<12} {}", INDENT, attr.ty, attr.name)?;
    }
    if !class.attrs.is_empty() && !class.meths.is_empty() {
        writeln!(out, "{}#", INDENT)?;
    }
    for meth in &class.meths {
        write_function(meth, out)?;
    }
    Ok(())
}

fn write_function(func: &FuncDecl, out: &mut impl Write) -> std::io::Result<()> {
    if !func.locals.is_empty() {
        let locals: Vec<String> = func
            .locals
            .values()
            .map(|l| format!("{} = {}", l.name, l.ty))
            .collect();
        writeln!(out, "{}@cython.locals ({})", INDENT, locals.join(", "))?;
    }

    let args: Vec<String> = func.args.iter().map(render_arg).collect();
    writeln!(
        out,
        "{}cpdef {:<12} {:<16}({})",
        INDENT,
        func.ret,
        func.name,
        args.join(", ")
    )?;
    Ok(())
}

/// Renders one argument. A present default is never echoed literally: it
/// appears as the opaque `=*` placeholder, except for a conflict sentinel,
/// which stays verbatim so it can be grepped and fixed.
fn render_arg(arg: &VarDecl) -> String {
    let mut rendered = String::new();
    if !arg.ty.is_empty() {
        rendered.push_str(&arg.ty);
        rendered.push(' ');
    }
    rendered.push_str(&arg.name);
    match &arg.value {
        Value::Undefined => {},
        Value::Literal(text) if text.starts_with("__conflict__") => rendered.push_str(text),
        _ => rendered.push_str("=*"),
    }
    rendered
}

fn write_enum(decl: &EnumDecl, out: &mut impl Write) -> std::io::Result<()> {
    if decl.ty.is_empty() {
        writeln!(out, "cdef enum {}:", decl.name)?;
    } else {
        writeln!(out, "cdef enum {} {}:", decl.ty, decl.name)?;
    }
    if decl.members.is_empty() {
        writeln!(out, "{}pass", INDENT)?;
        return Ok(());
    }
    for member in &decl.members {
        match &member.value {
            Value::Literal(text) => writeln!(out, "{}{} = {}", INDENT, member.name, text)?,
            Value::Undefined | Value::Invalid => writeln!(out, "{}{}", INDENT, member.name)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::model::VarDecl;
    use crate::reader::read_declarations;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample_module() -> ModuleDecl {
        let mut module = ModuleDecl::new();

        let mut point = ClassDecl::new("Point");
        point.push_base("Base");
        point.attrs.insert("x".into(), VarDecl::with_type("x", "long"));
        point.attrs.insert("y".into(), VarDecl::with_type("y", "long"));
        let mut movef = FuncDecl::new("move", Some("Point".to_string()));
        movef.ret = "bint".to_string();
        let mut dx = VarDecl::with_type("dx", "long");
        dx.value = Value::Literal("0".to_string());
        movef.args.push(dx);
        movef.locals.insert("i".into(), VarDecl::with_type("i", "long"));
        point.meths.push(movef);
        module.push_class(point);

        let mut color = EnumDecl::new("Color");
        color.members.push(VarDecl::new("RED"));
        let mut green = VarDecl::new("GREEN");
        green.value = Value::Literal("2".to_string());
        color.members.push(green);
        module.push_enum(color);

        module
    }

    #[test]
    fn test_write_layout() {
        let text = module_to_string(&sample_module());
        let body = &text[HEADER.len()..];
        assert_eq!(
            body,
            "cdef class Point(Base):\n\
             \x20   cdef public long         x\n\
             \x20   cdef public long         y\n\
             \x20   #\n\
             \x20   @cython.locals (i = long)\n\
             \x20   cpdef bint         move            (long dx=*)\n\
             \n\
             cdef enum Color:\n\
             \x20   RED\n\
             \x20   GREEN = 2\n\
             \n"
        );
    }

    #[test]
    fn test_empty_class_gets_pass() {
        let mut module = ModuleDecl::new();
        module.push_class(ClassDecl::new("Empty"));
        let text = module_to_string(&module);
        assert!(text.contains("cdef class Empty:\n    pass\n"));
    }

    #[test]
    fn test_conflict_value_written_verbatim() {
        let mut module = ModuleDecl::new();
        let mut c = ClassDecl::new("C");
        let mut f = FuncDecl::new("f", None);
        let mut arg = VarDecl::with_type("x", "long");
        arg.value = Value::Literal("__conflict__val__: \"0\" \"1\"".to_string());
        f.args.push(arg);
        c.meths.push(f);
        module.push_class(c);

        let text = module_to_string(&module);
        assert!(text.contains("long x__conflict__val__: \"0\" \"1\""));
        assert!(!text.contains("=*"));
    }

    #[test]
    fn test_invalid_default_still_renders_placeholder() {
        let mut module = ModuleDecl::new();
        let mut c = ClassDecl::new("C");
        let mut f = FuncDecl::new("f", None);
        let mut arg = VarDecl::with_type("x", "object");
        arg.value = Value::Invalid;
        f.args.push(arg);
        c.meths.push(f);
        module.push_class(c);
        assert!(module_to_string(&module).contains("(object x=*)"));
    }

    #[test]
    fn test_write_is_deterministic() {
        let module = sample_module();
        assert_eq!(module_to_string(&module), module_to_string(&module));
    }

    #[test]
    fn test_write_read_write_round_trip_is_stable() {
        let first = module_to_string(&sample_module());

        let mut diag = Diagnostics::new();
        let reread = read_declarations(Cursor::new(first.as_str()), &mut diag).unwrap();
        let second = module_to_string(&reread);
        assert_eq!(first, second);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_enum_with_underlying_type() {
        let mut module = ModuleDecl::new();
        let mut flags = EnumDecl::new("Flags");
        flags.ty = "int".to_string();
        flags.members.push(VarDecl::new("A"));
        module.push_enum(flags);
        assert!(module_to_string(&module).contains("cdef enum int Flags:\n    A\n"));
    }
}
