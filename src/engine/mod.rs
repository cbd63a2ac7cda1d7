//! Handlebars-compatible template engine.
//!
//! Sources are compiled once into a tree and then evaluated against any
//! number of records. Supported syntax:
//!
//! - `{{path}}` (escaped) and `{{{path}}}` / `{{& path}}` (raw) output
//! - `{{#if}}`, `{{else if}}`, `{{else}}`, `{{#unless}}`, `{{#each}}`,
//!   `{{#with}}` and inverted sections `{{^path}}`
//! - helper calls with positional arguments and `(subexpressions)`
//! - partials `{{> name}}` and `{{> name context}}`
//! - comments `{{! }}` / `{{!-- --}}` and `~` whitespace control
//!
//! # Example
//!
//! ```
//! use rendoc::engine::Engine;
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let out = engine
//!     .render_str("{{uppercase cliente}}: {{psXvolume ps volume}}", &json!({
//!         "cliente": "acme", "ps": 13, "volume": 500
//!     }))
//!     .unwrap();
//! assert_eq!(out, "ACME: 6500");
//! ```

mod ast;
mod eval;
pub mod helpers;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use eval::{escape_html, MAX_PARTIAL_DEPTH};
pub use helpers::{
    classify_equipment, HelperCall, HelperError, HelperRegistry, InspectionRequirement,
    PAGE_BREAK,
};
pub use lexer::Position;

/// Errors raised while compiling or evaluating a template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Malformed template source.
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// What was wrong
        message: String,
        /// Line of the offending tag
        line: usize,
        /// Column of the offending tag
        column: usize,
    },

    /// A helper name that is not registered.
    #[error("Unknown helper '{name}' at line {line}, column {column}")]
    UnknownHelper {
        /// Helper name as written
        name: String,
        /// Line of the offending tag
        line: usize,
        /// Column of the offending tag
        column: usize,
    },

    /// A partial name that is not registered.
    #[error("Unknown partial '{name}' at line {line}, column {column}")]
    UnknownPartial {
        /// Partial name as written
        name: String,
        /// Line of the offending tag
        line: usize,
        /// Column of the offending tag
        column: usize,
    },

    /// A helper returned an error.
    #[error("Helper '{name}' failed: {message}")]
    Helper {
        /// Helper name
        name: String,
        /// Message returned by the helper
        message: String,
    },

    /// Partials nested deeper than the limit, usually a cycle.
    #[error("Partials nested more than {0} levels deep")]
    PartialDepth(usize),
}

impl TemplateError {
    /// Source position, when the error has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            TemplateError::Syntax { line, column, .. }
            | TemplateError::UnknownHelper { line, column, .. }
            | TemplateError::UnknownPartial { line, column, .. } => Some(Position {
                line: *line,
                column: *column,
            }),
            TemplateError::Helper { .. } | TemplateError::PartialDepth(_) => None,
        }
    }
}

/// A template compiled against an engine's helper registry.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    nodes: Vec<ast::Node>,
}

impl CompiledTemplate {
    /// Names of partials referenced directly by this template.
    pub fn partial_names(&self) -> Vec<String> {
        let mut found = Vec::new();
        ast::partial_names(&self.nodes, &mut found);
        found.into_iter().map(|(name, _)| name).collect()
    }
}

/// Template engine holding helpers and partials.
///
/// Engines are independent: registering a helper or partial on one never
/// affects another, so concurrent renders can each own an engine.
#[derive(Debug, Clone)]
pub struct Engine {
    helpers: HelperRegistry,
    partials: HashMap<String, Arc<CompiledTemplate>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the built-in helpers.
    pub fn new() -> Self {
        Self::with_helpers(HelperRegistry::with_builtins())
    }

    /// Create an engine with a specific helper registry.
    pub fn with_helpers(helpers: HelperRegistry) -> Self {
        Self {
            helpers,
            partials: HashMap::new(),
        }
    }

    /// The helper registry used for compilation and evaluation.
    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Register a helper on this engine.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperCall<'_>) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.helpers.register(name, helper);
    }

    /// Compile and register a partial.
    ///
    /// References from a partial to other partials are resolved at render
    /// time, so partials may be registered in any order.
    pub fn register_partial(
        &mut self,
        name: impl Into<String>,
        source: &str,
    ) -> Result<(), TemplateError> {
        let nodes = parser::parse(source, &self.helpers)?;
        self.partials
            .insert(name.into(), Arc::new(CompiledTemplate { nodes }));
        Ok(())
    }

    /// Check whether a partial is registered.
    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    /// Compile template source.
    ///
    /// Fails on syntax errors, unknown helpers and references to partials
    /// that are not registered.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate, TemplateError> {
        let nodes = parser::parse(source, &self.helpers)?;
        let mut referenced = Vec::new();
        ast::partial_names(&nodes, &mut referenced);
        if let Some((name, pos)) = referenced
            .into_iter()
            .find(|(name, _)| !self.partials.contains_key(name))
        {
            return Err(TemplateError::UnknownPartial {
                name,
                line: pos.line,
                column: pos.column,
            });
        }
        Ok(CompiledTemplate { nodes })
    }

    /// Evaluate a compiled template against a record.
    pub fn render(&self, template: &CompiledTemplate, record: &Value) -> Result<String, TemplateError> {
        let evaluator = eval::Evaluator {
            helpers: &self.helpers,
            partials: &self.partials,
        };
        evaluator.render(&template.nodes, record)
    }

    /// Compile and evaluate in one step.
    pub fn render_str(&self, source: &str, record: &Value) -> Result<String, TemplateError> {
        let template = self.compile(source)?;
        self.render(&template, record)
    }
}
