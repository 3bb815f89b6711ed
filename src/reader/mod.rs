//! The declaration-file reader: parses a previously written `.pxd` file
//! back into a [`ModuleDecl`] so it can be merged with a fresh parse.
//!
//! Reading is line-oriented and deliberately forgiving: one malformed line
//! degrades to a best-effort declaration instead of losing the rest of the
//! file to it.

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::model::{ClassDecl, EnumDecl, FuncDecl, ModuleDecl, VarDecl};

/// Reassembles physical lines into logical statements.
///
/// Physical lines are joined until parentheses balance, trailing comments
/// are stripped (a line that is nothing but a comment is kept verbatim) and
/// repeated whitespace collapses to single spaces, so a declaration spread
/// over several lines reads as one statement. Lazy and single-pass; a
/// blank physical line comes through as an empty logical line, which block
/// parsers treat as a dedent.
pub struct LogicalLines<R> {
    input: R,
    pending: Vec<String>,
    depth: i32,
    done: bool,
}

impl<R: BufRead> LogicalLines<R> {
    /// Wraps a buffered reader.
    pub fn new(input: R) -> Self {
        Self {
            input,
            pending: Vec::new(),
            depth: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LogicalLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let mut raw = String::new();
            match self.input.read_line(&mut raw) {
                Ok(0) => {
                    // EOF; an unbalanced tail is dropped.
                    self.done = true;
                    return None;
                },
                Ok(_) => {},
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                },
            }

            let mut line = raw.trim().to_string();
            if !line.is_empty() && !line.starts_with('#') {
                line = line.split('#').next().unwrap_or("").trim().to_string();
            }

            for c in line.chars() {
                match c {
                    '(' => self.depth += 1,
                    ')' => self.depth -= 1,
                    _ => {},
                }
            }
            self.pending.push(line);

            if self.depth == 0 {
                let mut joined = self.pending.join(" ");
                self.pending.clear();
                while joined.contains("  ") {
                    joined = joined.replace("  ", " ");
                }
                log::debug!("LogicalLines: {}", joined);
                return Some(Ok(joined));
            }
        }
    }
}

/// Parses a declaration file into a module.
///
/// The grammar is the writer's own output plus whatever a human edited in:
/// class blocks, enum blocks, comments and blank separators. Unreadable
/// fragments are reconstructed best-effort and reported, never fatal.
pub fn read_declarations(input: impl BufRead, diag: &mut Diagnostics) -> Result<ModuleDecl> {
    let mut module = ModuleDecl::new();
    let mut lines = LogicalLines::new(input);

    while let Some(line) = lines.next() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(decl) = line.strip_suffix(':') {
            if decl.contains("enum ") {
                let mut e = read_enum_decl(decl);
                read_enum_block(&mut lines, &mut e, diag)?;
                module.push_enum(e);
                continue;
            }
            if decl.contains("class ") {
                let mut c = read_class_decl(decl);
                read_class_block(&mut lines, &mut c, diag)?;
                module.push_class(c);
                continue;
            }
        }
        log::debug!("ignoring declaration line: {}", line);
    }
    Ok(module)
}

/// Parses `[cdef] class [qualifier] Name[(Base, ...)]` (the trailing `:`
/// already removed).
fn read_class_decl(decl: &str) -> ClassDecl {
    let after = match decl.split_once("class ") {
        Some((_, rest)) => rest.trim(),
        None => decl.trim(),
    };
    let (head, bases) = match after.split_once('(') {
        Some((head, rest)) => {
            let inner = rest.trim_end().trim_end_matches(')');
            let bases: Vec<String> = inner
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
            (head.trim(), bases)
        },
        None => (after, Vec::new()),
    };
    let tokens: Vec<&str> = head.split_whitespace().collect();
    let (qualifier, name) = match tokens[..] {
        [name] => ("", name),
        [qualifier, name] => (qualifier, name),
        _ => ("", head),
    };
    let mut class = ClassDecl::new(name.trim());
    class.qualifier = qualifier.to_string();
    for base in bases {
        class.push_base(base);
    }
    log::debug!("read class {}", class.name);
    class
}

fn read_class_block(
    lines: &mut LogicalLines<impl BufRead>,
    class: &mut ClassDecl,
    diag: &mut Diagnostics,
) -> Result<()> {
    let mut pending_locals: BTreeMap<String, VarDecl> = BTreeMap::new();
    while let Some(line) = lines.next() {
        let line = line?;
        if line.is_empty() {
            return Ok(());
        }
        if line == "pass" {
            continue;
        }
        if let Some(rest) = line.strip_prefix("cpdef ") {
            let mut func = read_func_decl(rest, diag);
            func.class_name = Some(class.name.clone());
            func.locals = std::mem::take(&mut pending_locals);
            log::debug!("    read method {}", func.name);
            class.meths.push(func);
        } else if let Some(rest) = line.strip_prefix("cdef ") {
            let attr = rest.strip_prefix("public ").unwrap_or(rest);
            let var = VarDecl::from_arg(attr, diag);
            class.attrs.insert(var.name.clone(), var);
        } else if let Some(rest) = line.strip_prefix("@cython.locals") {
            pending_locals = read_locals(rest);
        }
        // Anything else (separator comments, hand notes) is ignored.
    }
    Ok(())
}

/// Parses `type name(arg, arg=value, ...)`.
fn read_func_decl(decl: &str, diag: &mut Diagnostics) -> FuncDecl {
    let (head, args) = match decl.split_once('(') {
        Some((head, rest)) => (head.trim(), rest.trim().trim_end_matches(')')),
        None => (decl.trim(), ""),
    };
    let tokens: Vec<&str> = head.split_whitespace().collect();
    let (ret, name) = match tokens[..] {
        [name] => ("", name),
        [ret, name] => (ret, name),
        _ => ("", head),
    };
    let mut func = FuncDecl::new(name, None);
    func.ret = ret.to_string();
    let args = args.trim();
    if !args.is_empty() {
        for arg in args.split(',') {
            func.args.push(VarDecl::from_arg(arg, diag));
        }
    }
    func
}

/// Parses the parenthesized list of a `@cython.locals (a = type, ...)`
/// annotation into a locals map applied to the next method.
fn read_locals(rest: &str) -> BTreeMap<String, VarDecl> {
    let inner = rest
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let mut locals = BTreeMap::new();
    for entry in inner.split(',') {
        let var = VarDecl::from_local(entry);
        if !var.name.is_empty() {
            locals.insert(var.name.clone(), var);
        }
    }
    locals
}

/// Parses `[cdef] enum [type] Name` (the trailing `:` already removed).
fn read_enum_decl(decl: &str) -> EnumDecl {
    let after = match decl.split_once("enum ") {
        Some((_, rest)) => rest.trim(),
        None => decl.trim(),
    };
    let tokens: Vec<&str> = after.split_whitespace().collect();
    let (ty, name) = match tokens[..] {
        [name] => ("", name),
        [ty, name] => (ty, name),
        _ => ("", after),
    };
    let mut decl = EnumDecl::new(name.trim());
    decl.ty = ty.to_string();
    log::debug!("read enum {}", decl.name);
    decl
}

fn read_enum_block(
    lines: &mut LogicalLines<impl BufRead>,
    decl: &mut EnumDecl,
    diag: &mut Diagnostics,
) -> Result<()> {
    while let Some(line) = lines.next() {
        let line = line?;
        if line.is_empty() {
            return Ok(());
        }
        if line == "pass" {
            continue;
        }
        for item in line.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let member = VarDecl::from_arg(item, diag);
            log::debug!("    read enumerator {}", member.name);
            decl.members.push(member);
        }
    }
    Ok(())
}
