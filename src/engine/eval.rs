//! Evaluates a compiled tree against a record.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::ast::{Block, BlockKind, Expr, Node, PathExpr, PathRoot};
use super::helpers::HelperRegistry;
use super::{CompiledTemplate, TemplateError};
use crate::record::{self, is_block_truthy, to_output_string};

/// Maximum nesting of partial invocations.
pub const MAX_PARTIAL_DEPTH: usize = 32;

type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Clone)]
struct LoopData {
    index: usize,
    first: bool,
    last: bool,
    key: Option<String>,
}

/// One level of the context stack.
struct Frame<'r> {
    value: Cow<'r, Value>,
    data: Option<LoopData>,
}

impl<'r> Frame<'r> {
    fn plain(value: Cow<'r, Value>) -> Self {
        Self { value, data: None }
    }
}

pub(crate) struct Evaluator<'e> {
    pub helpers: &'e HelperRegistry,
    pub partials: &'e HashMap<String, Arc<CompiledTemplate>>,
}

impl<'e> Evaluator<'e> {
    /// Render `nodes` with `record` as the root context.
    pub fn render(&self, nodes: &[Node], record: &Value) -> Result<String> {
        let mut out = String::new();
        let mut stack = vec![Frame::plain(Cow::Borrowed(record))];
        self.render_nodes(nodes, &mut stack, &mut out, 0)?;
        Ok(out)
    }

    fn render_nodes<'r>(
        &self,
        nodes: &[Node],
        stack: &mut Vec<Frame<'r>>,
        out: &mut String,
        depth: usize,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output { expr, escape } => {
                    let value = self.eval(expr, stack)?;
                    let text = to_output_string(value.as_deref());
                    if *escape {
                        escape_html_into(&text, out);
                    } else {
                        out.push_str(&text);
                    }
                }
                Node::Block(block) => self.render_block(block, stack, out, depth)?,
                Node::Partial { name, context, pos } => {
                    let partial = self.partials.get(name).ok_or_else(|| {
                        TemplateError::UnknownPartial {
                            name: name.clone(),
                            line: pos.line,
                            column: pos.column,
                        }
                    })?;
                    if depth >= MAX_PARTIAL_DEPTH {
                        return Err(TemplateError::PartialDepth(MAX_PARTIAL_DEPTH));
                    }
                    match context {
                        Some(expr) => {
                            let value = self
                                .eval(expr, stack)?
                                .unwrap_or(Cow::Owned(Value::Null));
                            stack.push(Frame::plain(value));
                            let result = self.render_nodes(&partial.nodes, stack, out, depth + 1);
                            stack.pop();
                            result?;
                        }
                        None => self.render_nodes(&partial.nodes, stack, out, depth + 1)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn render_block<'r>(
        &self,
        block: &Block,
        stack: &mut Vec<Frame<'r>>,
        out: &mut String,
        depth: usize,
    ) -> Result<()> {
        let value = self.eval(&block.param, stack)?;
        let truthy = is_block_truthy(value.as_deref());

        match block.kind {
            BlockKind::If => {
                let branch = if truthy { &block.body } else { &block.inverse };
                self.render_nodes(branch, stack, out, depth)
            }
            BlockKind::Unless => {
                let branch = if truthy { &block.inverse } else { &block.body };
                self.render_nodes(branch, stack, out, depth)
            }
            BlockKind::With => match value {
                Some(value) if truthy => {
                    stack.push(Frame::plain(value));
                    let result = self.render_nodes(&block.body, stack, out, depth);
                    stack.pop();
                    result
                }
                _ => self.render_nodes(&block.inverse, stack, out, depth),
            },
            BlockKind::Each => {
                let entries = value.map(entries).unwrap_or_default();
                if entries.is_empty() {
                    return self.render_nodes(&block.inverse, stack, out, depth);
                }
                let count = entries.len();
                for (index, (key, item)) in entries.into_iter().enumerate() {
                    stack.push(Frame {
                        value: item,
                        data: Some(LoopData {
                            index,
                            first: index == 0,
                            last: index + 1 == count,
                            key,
                        }),
                    });
                    let result = self.render_nodes(&block.body, stack, out, depth);
                    stack.pop();
                    result?;
                }
                Ok(())
            }
        }
    }

    fn eval<'r>(&self, expr: &Expr, stack: &[Frame<'r>]) -> Result<Option<Cow<'r, Value>>> {
        match expr {
            Expr::Literal(value) => Ok(Some(Cow::Owned(value.clone()))),
            Expr::Undefined => Ok(None),
            Expr::Path(path) => Ok(resolve_path(path, stack)),
            Expr::Call { name, args, pos } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, stack)?.map(Cow::into_owned));
                }
                match self.helpers.invoke(name, &values) {
                    Some(Ok(value)) => Ok(Some(Cow::Owned(value))),
                    Some(Err(err)) => Err(TemplateError::Helper {
                        name: name.clone(),
                        message: err.to_string(),
                    }),
                    None => Err(TemplateError::UnknownHelper {
                        name: name.clone(),
                        line: pos.line,
                        column: pos.column,
                    }),
                }
            }
        }
    }
}

fn resolve_path<'r>(path: &PathExpr, stack: &[Frame<'r>]) -> Option<Cow<'r, Value>> {
    match &path.root {
        PathRoot::Context { depth } => {
            let frame = stack.len().checked_sub(depth + 1).and_then(|i| stack.get(i))?;
            lookup(&frame.value, &path.segments)
        }
        PathRoot::Root => lookup(&stack.first()?.value, &path.segments),
        PathRoot::Data(name) => {
            let data = stack.iter().rev().find_map(|f| f.data.as_ref())?;
            let value = match name.as_str() {
                "index" => Value::from(data.index),
                "first" => Value::Bool(data.first),
                "last" => Value::Bool(data.last),
                "key" => Value::String(data.key.clone()?),
                _ => return None,
            };
            lookup(&Cow::Owned(value), &path.segments)
        }
    }
}

/// Values reached through an owned frame are cloned, so results never
/// borrow from the stack itself.
fn lookup<'r>(value: &Cow<'r, Value>, segments: &[String]) -> Option<Cow<'r, Value>> {
    match value {
        Cow::Borrowed(v) => record::resolve_segments(*v, segments),
        Cow::Owned(v) => record::resolve_segments(v, segments).map(|c| Cow::Owned(c.into_owned())),
    }
}

type Entry<'r> = (Option<String>, Cow<'r, Value>);

fn entries(value: Cow<'_, Value>) -> Vec<Entry<'_>> {
    match value {
        Cow::Borrowed(Value::Array(items)) => {
            items.iter().map(|item| (None, Cow::Borrowed(item))).collect()
        }
        Cow::Borrowed(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (Some(k.clone()), Cow::Borrowed(v)))
            .collect(),
        Cow::Owned(Value::Array(items)) => {
            items.into_iter().map(|item| (None, Cow::Owned(item))).collect()
        }
        Cow::Owned(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| (Some(k), Cow::Owned(v)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Escape text for inclusion in markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_html_into(text, &mut out);
    out
}

fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            c => out.push(c),
        }
    }
}
