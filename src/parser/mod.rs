//! Parser module wrapping the tree-sitter Python grammar.
//!
//! The rest of the crate only consumes the generic `tree_sitter::Node`
//! tree-walk; this is the single place the concrete grammar is loaded.

use std::path::Path;

use tree_sitter::Parser as TsParser;

use crate::error::{Error, Result};

/// Parses Python source text into syntax trees.
pub struct Parser {
    parser: TsParser,
}

impl Parser {
    /// Creates a parser for Python.
    pub fn new() -> Result<Self> {
        let mut parser = TsParser::new();
        let language = tree_sitter_python::language();
        parser
            .set_language(language)
            .map_err(|e| Error::parser_error(format!("failed to load Python grammar: {}", e)))?;
        Ok(Self { parser })
    }

    /// Reads and parses a source file, returning the tree together with the
    /// source text the tree's byte ranges index into.
    pub fn parse_file(&mut self, path: &Path) -> Result<(tree_sitter::Tree, String)> {
        let source = std::fs::read_to_string(path)?;
        let tree = self.parse_str(&source)?;
        Ok((tree, source))
    }

    /// Parses a source string.
    pub fn parse_str(&mut self, source: &str) -> Result<tree_sitter::Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| Error::parser_error("failed to parse source code".to_string()))
    }
}
