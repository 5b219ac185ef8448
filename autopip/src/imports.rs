//! Import extraction for Python scripts
//!
//! Walks a tree-sitter syntax tree and collects the top-level module name of
//! every absolute import:
//! - `import a.b.c` / `import a as x` -> `a`
//! - `from a.b import c` -> `a`
//! - `from __future__ import annotations` -> `__future__`
//!
//! Relative imports (`from . import x`, `from .pkg import y`) refer to files
//! next to the script and are never reported.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tree_sitter::{Node, Parser};

/// Top-level module names imported by one script, sorted and deduplicated.
pub type ImportSet = BTreeSet<String>;

/// Error type for import extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Script not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Syntax error in {name} at line {line}, column {column}")]
    Syntax {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("Python grammar unavailable: {0}")]
    Grammar(String),
}

/// Read a script from disk and extract its imports.
pub fn extract_imports(path: &Path) -> Result<ImportSet, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }

    let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    extract_imports_from_source(&source, &path.display().to_string())
}

/// Extract imports from in-memory source text. `name` is only used in errors.
pub fn extract_imports_from_source(source: &str, name: &str) -> Result<ImportSet, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| ExtractError::Grammar(e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::Grammar("parser returned no tree".to_string()))?;

    let root = tree.root_node();
    let error_at = if root.has_error() {
        Some(first_error_position(&root).unwrap_or((1, 0)))
    } else {
        first_legacy_statement(&root)
    };
    if let Some((line, column)) = error_at {
        return Err(ExtractError::Syntax {
            name: name.to_string(),
            line,
            column,
        });
    }

    let mut imports = ImportSet::new();
    collect_imports(&root, source, &mut imports);
    Ok(imports)
}

fn collect_imports(node: &Node, source: &str, imports: &mut ImportSet) {
    match node.kind() {
        "import_statement" => {
            for i in 0..node.child_count() {
                let Some(child) = node.child(i) else { continue };
                let dotted = match child.kind() {
                    "dotted_name" => Some(child),
                    "aliased_import" => child.child_by_field_name("name"),
                    _ => None,
                };
                if let Some(name) = dotted.and_then(|n| root_module(&n, source)) {
                    imports.insert(name);
                }
            }
            return;
        }
        "import_from_statement" => {
            // `relative_import` nodes are skipped on purpose
            if let Some(module) = node.child_by_field_name("module_name") {
                if module.kind() == "dotted_name" {
                    if let Some(name) = root_module(&module, source) {
                        imports.insert(name);
                    }
                }
            }
            return;
        }
        "future_import_statement" => {
            imports.insert("__future__".to_string());
            return;
        }
        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_imports(&child, source, imports);
        }
    }
}

/// First component of a dotted name (`os.path` -> `os`).
fn root_module(node: &Node, source: &str) -> Option<String> {
    let text = node.utf8_text(source.as_bytes()).ok()?;
    let root = text.split('.').next()?.trim();
    if root.is_empty() {
        None
    } else {
        Some(root.to_string())
    }
}

/// 1-based line and 0-based column of the first error or missing node.
fn first_error_position(node: &Node) -> Option<(usize, usize)> {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        return Some((pos.row + 1, pos.column));
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.has_error() || child.is_missing() {
                if let Some(pos) = first_error_position(&child) {
                    return Some(pos);
                }
            }
        }
    }
    None
}

/// Python 2 statements the grammar still accepts but Python 3 rejects.
const LEGACY_STATEMENTS: &[&str] = &["print_statement", "exec_statement"];

/// Position of the first Python 2 only statement, if any.
fn first_legacy_statement(node: &Node) -> Option<(usize, usize)> {
    if LEGACY_STATEMENTS.contains(&node.kind()) {
        let pos = node.start_position();
        return Some((pos.row + 1, pos.column));
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if let Some(pos) = first_legacy_statement(&child) {
                return Some(pos);
            }
        }
    }
    None
}
