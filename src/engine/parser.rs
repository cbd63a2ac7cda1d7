//! Builds the compiled tree from lexer tokens.
//!
//! Helper names are checked against the registry while parsing, so a call
//! to an unregistered helper fails compilation rather than rendering.

use serde_json::Value;

use super::ast::{Block, BlockKind, Expr, Node, PathExpr, PathRoot};
use super::helpers::HelperRegistry;
use super::lexer::{tokenize, Position, Tag, TagKind, Token};
use super::TemplateError;
use crate::record;

type Result<T> = std::result::Result<T, TemplateError>;

/// Parse template source into a node list.
pub(crate) fn parse(source: &str, helpers: &HelperRegistry) -> Result<Vec<Node>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: tokens.into_iter(),
        helpers,
    };
    let (nodes, stop) = parser.parse_nodes()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::Close { name, pos } => {
            Err(pos.syntax(format!("unexpected closing tag '{{{{/{}}}}}'", name)))
        }
        Stop::Else { pos, .. } => Err(pos.syntax("'{{else}}' outside of a block")),
    }
}

enum Stop {
    Eof,
    Close { name: String, pos: Position },
    Else { chain: String, pos: Position },
}

struct Parser<'h> {
    tokens: std::vec::IntoIter<Token>,
    helpers: &'h HelperRegistry,
}

impl<'h> Parser<'h> {
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Stop)> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            let tag = match token {
                Token::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Token::Tag(tag) => tag,
            };
            match tag.kind {
                TagKind::Comment => {}
                TagKind::Escaped | TagKind::Raw => {
                    let expr = self.mustache(&tag)?;
                    nodes.push(Node::Output {
                        expr,
                        escape: tag.kind == TagKind::Escaped,
                    });
                }
                TagKind::Open => nodes.push(Node::Block(self.open_block(&tag)?)),
                TagKind::OpenInverse => {
                    let tokens = lex_expr(&tag.body, tag.pos)?;
                    let param = self.exprs(&tokens, tag.pos).single_expression()?;
                    let block = self.block_body(BlockKind::Unless, param, &tag.body, tag.pos)?;
                    nodes.push(Node::Block(block));
                }
                TagKind::Partial => nodes.push(self.partial(&tag)?),
                TagKind::Close => {
                    return Ok((
                        nodes,
                        Stop::Close {
                            name: tag.body,
                            pos: tag.pos,
                        },
                    ))
                }
                TagKind::Else => {
                    return Ok((
                        nodes,
                        Stop::Else {
                            chain: tag.body,
                            pos: tag.pos,
                        },
                    ))
                }
            }
        }
        Ok((nodes, Stop::Eof))
    }

    fn open_block(&mut self, tag: &Tag) -> Result<Block> {
        let (name, param) = self.block_head(&tag.body, tag.pos)?;
        let kind = block_kind(&name).ok_or_else(|| self.not_a_block(&name, tag.pos))?;
        self.block_body(kind, param, &name, tag.pos)
    }

    /// Split `name arg` into the block name and its single argument.
    fn block_head(&self, body: &str, pos: Position) -> Result<(String, Expr)> {
        let tokens = lex_expr(body, pos)?;
        let name = match tokens.first() {
            Some(ExprToken::Word(word)) => word.clone(),
            _ => return Err(pos.syntax("expected a block name")),
        };
        let args = self.exprs(&tokens[1..], pos).all_arguments()?;
        match <[Expr; 1]>::try_from(args) {
            Ok([param]) => Ok((name, param)),
            Err(args) => Err(pos.syntax(format!(
                "'{{{{#{}}}}}' expects exactly one argument, found {}",
                name,
                args.len()
            ))),
        }
    }

    fn not_a_block(&self, name: &str, pos: Position) -> TemplateError {
        if self.helpers.contains(name) {
            pos.syntax(format!("helper '{}' cannot be used as a block", name))
        } else {
            TemplateError::UnknownHelper {
                name: name.to_string(),
                line: pos.line,
                column: pos.column,
            }
        }
    }

    fn block_body(
        &mut self,
        kind: BlockKind,
        param: Expr,
        open_name: &str,
        open_pos: Position,
    ) -> Result<Block> {
        let (body, stop) = self.parse_nodes()?;
        let inverse = match stop {
            Stop::Eof => return Err(unclosed(open_name, open_pos)),
            Stop::Close { name, pos } => {
                check_close(open_name, &name, pos)?;
                Vec::new()
            }
            Stop::Else { chain, .. } if chain.is_empty() => {
                let (inverse, stop) = self.parse_nodes()?;
                match stop {
                    Stop::Eof => return Err(unclosed(open_name, open_pos)),
                    Stop::Close { name, pos } => check_close(open_name, &name, pos)?,
                    Stop::Else { pos, .. } => {
                        return Err(pos.syntax(format!(
                            "second '{{{{else}}}}' in '{{{{#{}}}}}' block",
                            open_name
                        )))
                    }
                }
                inverse
            }
            Stop::Else { chain, pos } => {
                // `else if` shares the closing tag of the outer block
                let (name, param) = self.block_head(&chain, pos)?;
                let kind = match name.as_str() {
                    "if" => BlockKind::If,
                    "unless" => BlockKind::Unless,
                    _ => {
                        return Err(pos.syntax(format!("unsupported '{{{{else {}}}}}'", name)))
                    }
                };
                vec![Node::Block(self.block_body(kind, param, open_name, open_pos)?)]
            }
        };
        Ok(Block {
            kind,
            param,
            body,
            inverse,
        })
    }

    fn mustache(&self, tag: &Tag) -> Result<Expr> {
        let tokens = lex_expr(&tag.body, tag.pos)?;
        let mut exprs = self.exprs(&tokens, tag.pos);

        let head = match tokens.first() {
            Some(ExprToken::Word(word)) => word.clone(),
            _ => return exprs.single_expression(),
        };

        if tokens.len() == 1 {
            let expr = exprs.argument()?;
            if let Expr::Path(path) = &expr {
                if let Some(name) = path.simple_name() {
                    if self.helpers.contains(name) {
                        return Ok(Expr::Call {
                            name: name.to_string(),
                            args: Vec::new(),
                            pos: tag.pos,
                        });
                    }
                }
            }
            return Ok(expr);
        }

        exprs.index = 1;
        if !self.helpers.contains(&head) {
            return Err(TemplateError::UnknownHelper {
                name: head,
                line: tag.pos.line,
                column: tag.pos.column,
            });
        }
        let args = exprs.all_arguments()?;
        Ok(Expr::Call {
            name: head,
            args,
            pos: tag.pos,
        })
    }

    fn partial(&self, tag: &Tag) -> Result<Node> {
        let tokens = lex_expr(&tag.body, tag.pos)?;
        let name = match tokens.first() {
            Some(ExprToken::Word(word)) | Some(ExprToken::Str(word)) => word.clone(),
            _ => return Err(tag.pos.syntax("expected a partial name")),
        };
        let mut args = self.exprs(&tokens[1..], tag.pos).all_arguments()?;
        if args.len() > 1 {
            return Err(tag.pos.syntax(format!(
                "partial '{}' takes at most one context argument",
                name
            )));
        }
        Ok(Node::Partial {
            name,
            context: args.pop(),
            pos: tag.pos,
        })
    }

    fn exprs<'a>(&'a self, tokens: &'a [ExprToken], pos: Position) -> ExprParser<'a> {
        ExprParser {
            tokens,
            index: 0,
            pos,
            helpers: self.helpers,
        }
    }
}

fn block_kind(name: &str) -> Option<BlockKind> {
    match name {
        "if" => Some(BlockKind::If),
        "unless" => Some(BlockKind::Unless),
        "each" => Some(BlockKind::Each),
        "with" => Some(BlockKind::With),
        _ => None,
    }
}

fn unclosed(name: &str, pos: Position) -> TemplateError {
    pos.syntax(format!("unclosed block '{{{{#{}}}}}'", name))
}

fn check_close(open: &str, close: &str, pos: Position) -> Result<()> {
    if open == close {
        Ok(())
    } else {
        Err(pos.syntax(format!(
            "expected '{{{{/{}}}}}', found '{{{{/{}}}}}'",
            open, close
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    OpenParen,
    CloseParen,
    Assign,
    Str(String),
    Num(f64),
    Word(String),
}

fn lex_expr(body: &str, pos: Position) -> Result<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(ExprToken::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(ExprToken::CloseParen);
            }
            '=' => {
                chars.next();
                tokens.push(ExprToken::Assign);
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                text.push(escaped);
                            }
                        }
                        Some(ch) if ch == c => break,
                        Some(ch) => text.push(ch),
                        None => return Err(pos.syntax("unterminated string literal")),
                    }
                }
                tokens.push(ExprToken::Str(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '=' | '"' | '\'') {
                        break;
                    }
                    chars.next();
                    word.push(ch);
                    if ch == '[' {
                        for inner in chars.by_ref() {
                            word.push(inner);
                            if inner == ']' {
                                break;
                            }
                        }
                    }
                }
                match parse_number_literal(&word) {
                    Some(n) => tokens.push(ExprToken::Num(n)),
                    None => tokens.push(ExprToken::Word(word)),
                }
            }
        }
    }
    Ok(tokens)
}

fn parse_number_literal(word: &str) -> Option<f64> {
    let digits = word.strip_prefix('-').unwrap_or(word);
    let mut parts = digits.splitn(2, '.');
    let int = parts.next()?;
    let frac = parts.next();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int) || frac.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    word.parse().ok()
}

struct ExprParser<'t> {
    tokens: &'t [ExprToken],
    index: usize,
    pos: Position,
    helpers: &'t HelperRegistry,
}

impl<'t> ExprParser<'t> {
    fn single_expression(&mut self) -> Result<Expr> {
        let expr = self.argument()?;
        if self.index < self.tokens.len() {
            return Err(self.pos.syntax("unexpected tokens after expression"));
        }
        Ok(expr)
    }

    /// Parse every remaining argument of a tag.
    fn all_arguments(&mut self) -> Result<Vec<Expr>> {
        let args = self.arguments()?;
        if self.index < self.tokens.len() {
            return Err(self.pos.syntax("unexpected ')'"));
        }
        Ok(args)
    }

    /// Parse arguments until the end of input or a closing parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while let Some(token) = self.tokens.get(self.index) {
            if *token == ExprToken::CloseParen {
                break;
            }
            args.push(self.argument()?);
        }
        Ok(args)
    }

    fn argument(&mut self) -> Result<Expr> {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| self.pos.syntax("expected an expression"))?;
        self.index += 1;

        if self.tokens.get(self.index) == Some(&ExprToken::Assign) {
            return Err(self.pos.syntax("hash arguments are not supported"));
        }

        match token {
            ExprToken::Str(text) => Ok(Expr::Literal(Value::String(text))),
            ExprToken::Num(n) => Ok(Expr::Literal(record::number(n))),
            ExprToken::Word(word) => Ok(match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Undefined,
                _ => Expr::Path(parse_path(&word, self.pos)?),
            }),
            ExprToken::OpenParen => self.subexpression(),
            ExprToken::CloseParen => Err(self.pos.syntax("unexpected ')'")),
            ExprToken::Assign => Err(self.pos.syntax("hash arguments are not supported")),
        }
    }

    fn subexpression(&mut self) -> Result<Expr> {
        let name = match self.tokens.get(self.index) {
            Some(ExprToken::Word(word)) => word.clone(),
            _ => return Err(self.pos.syntax("expected a helper name after '('")),
        };
        self.index += 1;
        if !self.helpers.contains(&name) {
            return Err(TemplateError::UnknownHelper {
                name,
                line: self.pos.line,
                column: self.pos.column,
            });
        }
        let args = self.arguments()?;
        match self.tokens.get(self.index) {
            Some(ExprToken::CloseParen) => self.index += 1,
            _ => return Err(self.pos.syntax("unclosed subexpression")),
        }
        Ok(Expr::Call {
            name,
            args,
            pos: self.pos,
        })
    }
}

/// Parse `a.b`, `this.x`, `../x`, `@index`, `@root.a`, `items.[0]`.
fn parse_path(word: &str, pos: Position) -> Result<PathExpr> {
    if let Some(data) = word.strip_prefix('@') {
        let mut segments = split_path(data, pos)?;
        if segments.is_empty() {
            return Err(pos.syntax("empty data variable"));
        }
        let head = segments.remove(0);
        let root = if head == "root" {
            PathRoot::Root
        } else {
            PathRoot::Data(head)
        };
        return Ok(PathExpr {
            root,
            segments,
            scoped: true,
        });
    }

    let mut rest = word;
    let mut depth = 0;
    let mut scoped = false;
    while let Some(stripped) = rest.strip_prefix("../") {
        depth += 1;
        scoped = true;
        rest = stripped;
    }
    if rest == ".." {
        depth += 1;
        scoped = true;
        rest = "";
    }
    if rest == "this" || rest == "." {
        scoped = true;
        rest = "";
    } else if let Some(stripped) = rest
        .strip_prefix("this.")
        .or_else(|| rest.strip_prefix("this/"))
        .or_else(|| rest.strip_prefix("./"))
    {
        scoped = true;
        rest = stripped;
    }

    Ok(PathExpr {
        root: PathRoot::Context { depth },
        segments: split_path(rest, pos)?,
        scoped,
    })
}

fn split_path(path: &str, pos: Position) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return Ok(segments);
    }

    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => literal.push(ch),
                        None => return Err(pos.syntax(format!("unclosed '[' in path '{}'", path))),
                    }
                }
                if current.is_empty() {
                    current = literal;
                } else {
                    // `name[0]` keeps its index for the field resolver
                    current = format!("{}[{}]", current, literal);
                }
            }
            '.' | '/' => {
                if current.is_empty() {
                    return Err(pos.syntax(format!("empty segment in path '{}'", path)));
                }
                segments.push(std::mem::take(&mut current));
            }
            ch => current.push(ch),
        }
    }
    if current.is_empty() {
        return Err(pos.syntax(format!("path '{}' ends with a separator", path)));
    }
    segments.push(current);
    Ok(segments)
}
