//! Compiled template tree.

use serde_json::Value;

use super::lexer::Position;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output { expr: Expr, escape: bool },
    Block(Block),
    Partial {
        name: String,
        context: Option<Expr>,
        pos: Position,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    If,
    Unless,
    Each,
    With,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    pub kind: BlockKind,
    pub param: Expr,
    pub body: Vec<Node>,
    pub inverse: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Undefined,
    Path(PathExpr),
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Position,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathRoot {
    /// Current context, `depth` levels up (`../`)
    Context { depth: usize },
    /// `@root`
    Root,
    /// `@index`, `@first`, `@last`, `@key`
    Data(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathExpr {
    pub root: PathRoot,
    pub segments: Vec<String>,
    /// Written with `this`, `./` or `../`
    pub scoped: bool,
}

impl PathExpr {
    /// A bare identifier that could also name a helper.
    pub fn simple_name(&self) -> Option<&str> {
        if self.scoped {
            return None;
        }
        match (&self.root, self.segments.as_slice()) {
            (PathRoot::Context { depth: 0 }, [only]) => Some(only),
            _ => None,
        }
    }
}

/// Names of partials referenced anywhere in a node list.
pub(crate) fn partial_names(nodes: &[Node], out: &mut Vec<(String, Position)>) {
    for node in nodes {
        match node {
            Node::Partial { name, pos, .. } => out.push((name.clone(), *pos)),
            Node::Block(block) => {
                partial_names(&block.body, out);
                partial_names(&block.inverse, out);
            }
            Node::Text(_) | Node::Output { .. } => {}
        }
    }
}
