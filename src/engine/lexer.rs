//! Splits template source into literal text and mustache tags.

use super::TemplateError;

/// Line and column (both 1-based) of a tag in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number
    pub line: usize,
    /// Column number, counted in characters
    pub column: usize,
}

impl Position {
    pub(crate) fn syntax(self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Text(String),
    Tag(Tag),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tag {
    pub kind: TagKind,
    /// Tag content without delimiters, sigil or whitespace-control marks
    pub body: String,
    pub pos: Position,
    pub strip_before: bool,
    pub strip_after: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    Comment,
    /// `{{expr}}`
    Escaped,
    /// `{{{expr}}}` or `{{& expr}}`
    Raw,
    /// `{{#name ...}}`
    Open,
    /// `{{^name}}`
    OpenInverse,
    /// `{{/name}}`
    Close,
    /// `{{else}}`, `{{^}}` or `{{else if ...}}`
    Else,
    /// `{{> name}}`
    Partial,
}

struct Cursor {
    line: usize,
    column: usize,
}

impl Cursor {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

/// Tokenize template source, applying `~` whitespace control.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut cursor = Cursor { line: 1, column: 1 };
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 && rest.as_bytes()[start - 1] == b'\\' {
            text.push_str(&rest[..start - 1]);
            text.push_str("{{");
            cursor.advance(&rest[..start + 2]);
            rest = &rest[start + 2..];
            continue;
        }

        text.push_str(&rest[..start]);
        cursor.advance(&rest[..start]);
        rest = &rest[start..];

        let (tag, consumed) = read_tag(rest, cursor.position())?;
        cursor.advance(&rest[..consumed]);
        rest = &rest[consumed..];

        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(&mut text)));
        }
        tokens.push(Token::Tag(tag));
    }
    text.push_str(rest);
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }

    apply_whitespace_control(&mut tokens);
    Ok(tokens)
}

/// Read one tag from the start of `input`, which begins with `{{`.
fn read_tag(input: &str, pos: Position) -> Result<(Tag, usize), TemplateError> {
    let mut i = 2;
    let triple = input[i..].starts_with('{');
    if triple {
        i += 1;
    }
    let strip_before = input[i..].starts_with('~');
    if strip_before {
        i += 1;
    }

    if !triple && input[i..].starts_with("!--") {
        let body_start = i + 3;
        let end = input[body_start..]
            .find("--}}")
            .or_else(|| input[body_start..].find("--~}}"))
            .ok_or_else(|| pos.syntax("unterminated comment"))?;
        let tail = &input[body_start + end..];
        let strip_after = tail.starts_with("--~");
        let close_len = if strip_after { 5 } else { 4 };
        let tag = Tag {
            kind: TagKind::Comment,
            body: input[body_start..body_start + end].to_string(),
            pos,
            strip_before,
            strip_after,
        };
        return Ok((tag, body_start + end + close_len));
    }

    let close = if triple { "}}}" } else { "}}" };
    let end = input[i..]
        .find(close)
        .ok_or_else(|| pos.syntax("unclosed tag, expected '}}'"))?;
    let mut inner = &input[i..i + end];
    let consumed = i + end + close.len();

    let strip_after = inner.ends_with('~');
    if strip_after {
        inner = &inner[..inner.len() - 1];
    }

    let (kind, body) = if triple {
        (TagKind::Raw, inner.trim())
    } else {
        classify(inner.trim())
    };

    if body.is_empty() && !matches!(kind, TagKind::Comment | TagKind::Else) {
        return Err(pos.syntax("empty tag"));
    }

    let tag = Tag {
        kind,
        body: body.to_string(),
        pos,
        strip_before,
        strip_after,
    };
    Ok((tag, consumed))
}

fn classify(inner: &str) -> (TagKind, &str) {
    let mut chars = inner.chars();
    match chars.next() {
        Some('!') => (TagKind::Comment, chars.as_str()),
        Some('#') => (TagKind::Open, chars.as_str().trim()),
        Some('/') => (TagKind::Close, chars.as_str().trim()),
        Some('>') => (TagKind::Partial, chars.as_str().trim()),
        Some('&') => (TagKind::Raw, chars.as_str().trim()),
        Some('^') => {
            let rest = chars.as_str().trim();
            if rest.is_empty() {
                (TagKind::Else, rest)
            } else {
                (TagKind::OpenInverse, rest)
            }
        }
        _ if inner == "else" => (TagKind::Else, ""),
        _ if inner.starts_with("else ") || inner.starts_with("else\t") => {
            (TagKind::Else, inner["else".len()..].trim())
        }
        _ => (TagKind::Escaped, inner),
    }
}

fn apply_whitespace_control(tokens: &mut Vec<Token>) {
    for i in 0..tokens.len() {
        let (before, after) = match &tokens[i] {
            Token::Tag(tag) => (tag.strip_before, tag.strip_after),
            Token::Text(_) => continue,
        };
        if before && i > 0 {
            if let Token::Text(text) = &mut tokens[i - 1] {
                let trimmed = text.trim_end().len();
                text.truncate(trimmed);
            }
        }
        if after {
            if let Some(Token::Text(text)) = tokens.get_mut(i + 1) {
                *text = text.trim_start().to_string();
            }
        }
    }
    tokens.retain(|t| !matches!(t, Token::Text(text) if text.is_empty()));
}
