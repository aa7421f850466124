//! Removal of TypeScript-only syntax from scripts.
//!
//! A JavaScript project receives `.js`/`.jsx` files, so everything only the type checker
//! reads has to go: `interface` and `type` declarations, `declare` statements, annotations
//! on parameters, return types, variables and class fields, generic parameters and call
//! type arguments, `as`/`satisfies` expressions, non-null assertions and class member
//! modifiers.
//!
//! The rendered module is tokenized (imports stay opaque), the byte ranges holding type
//! syntax are collected, and only those ranges are cut out. Constructs that emit code
//! (`enum`, `namespace`, constructor parameter properties) cannot be erased and fail with
//! [`CompkitError::ParseError`].

use std::ops::Range;
use std::path::Path;

use super::parser::{
    EXPRESSION_KEYWORDS, ImportKind, Language, SourceModule, is_ident_char, is_ident_start,
};
use crate::core::{CompkitError, Result};

/// Multi-character punctuators. `<` and `>` always stand alone so nested type arguments
/// close one level at a time.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "=>", "==", "!=", "?.", "??", "&&", "||", "++", "--",
];

/// Words that never end an expression.
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "declare", "default", "delete", "do", "else", "enum", "export", "extends",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "of", "return", "satisfies", "switch", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield",
];

/// Words that start a statement when they open a line.
const STATEMENT_KEYWORDS: &[&str] = &[
    "break", "class", "const", "continue", "do", "export", "for", "function", "if", "import",
    "interface", "let", "return", "switch", "throw", "try", "type", "var", "while",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "override", "declare", "abstract",
];

/// Remove TypeScript-only syntax from a TypeScript script. Any other module is returned
/// as is.
///
/// # Errors
///
/// [`CompkitError::ParseError`] for `enum` and `namespace` declarations and constructor
/// parameter properties.
pub(super) fn strip_type_syntax(module: SourceModule) -> Result<SourceModule> {
    let Language::Script {
        jsx,
        typescript: true,
    } = module.language
    else {
        return Ok(module);
    };

    let (text, imports) = module.render_with_spans();
    let tokens = Lexer::new(&text, &module.path, jsx, &imports).tokens(None)?;
    let mut stripper = Stripper {
        src: &text,
        path: &module.path,
        removals: Vec::new(),
    };
    stripper.strip(&tokens)?;
    if stripper.removals.is_empty() {
        return Ok(module);
    }
    let stripped = stripper.apply();
    SourceModule::parse(module.path.clone(), &stripped)
}

fn parse_error(src: &str, path: &Path, at: usize, reason: impl Into<String>) -> CompkitError {
    CompkitError::ParseError {
        path: path.to_path_buf(),
        line: src[..at.min(src.len())].matches('\n').count() + 1,
        reason: reason.into(),
    }
}

#[derive(Debug)]
enum Kind {
    Ident,
    Punct,
    /// String, number or regex
    Literal,
    /// Template literal with its `${}` expressions
    Template(Vec<Vec<Token>>),
    /// JSX element with its `{}` expressions
    Jsx(Vec<Vec<Token>>),
    Import {
        dynamic: bool,
    },
}

#[derive(Debug)]
struct Token {
    kind: Kind,
    start: usize,
    end: usize,
    /// A line break separates the token from the previous one
    newline_before: bool,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    path: &'a Path,
    jsx: bool,
    imports: &'a [(Range<usize>, ImportKind)],
    pos: usize,
    expr_allowed: bool,
    newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(
        src: &'a str,
        path: &'a Path,
        jsx: bool,
        imports: &'a [(Range<usize>, ImportKind)],
    ) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            path,
            jsx,
            imports,
            pos: 0,
            expr_allowed: true,
            newline: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> CompkitError {
        parse_error(self.src, self.path, at, reason)
    }

    fn token(&self, kind: Kind, start: usize, newline_before: bool) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
            newline_before,
        }
    }

    /// Tokens up to the end of input, or up to the unmatched `stop` byte (not consumed).
    fn tokens(&mut self, stop: Option<u8>) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        loop {
            let start = self.pos;
            if let Ok(index) = self.imports.binary_search_by_key(&start, |(span, _)| span.start)
                && self.imports[index].0.end > start
            {
                let (span, kind) = &self.imports[index];
                let (end, dynamic) = (span.end, *kind == ImportKind::Dynamic);
                let newline = std::mem::take(&mut self.newline);
                self.pos = end;
                out.push(self.token(Kind::Import { dynamic }, start, newline));
                self.expr_allowed = !dynamic;
                continue;
            }
            let Some(c) = self.peek(0) else {
                return match stop {
                    Some(_) => Err(self.error(start, "unexpected end of file in expression")),
                    None => Ok(out),
                };
            };
            match c {
                b'\n' => {
                    self.newline = true;
                    self.pos += 1;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.peek(0).is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let close = self.src[start + 2..]
                        .find("*/")
                        .ok_or_else(|| self.error(start, "unterminated comment"))?;
                    self.pos = start + 2 + close + 2;
                    if self.src[start..self.pos].contains('\n') {
                        self.newline = true;
                    }
                }
                b'\'' | b'"' => {
                    let newline = std::mem::take(&mut self.newline);
                    self.string(c)?;
                    out.push(self.token(Kind::Literal, start, newline));
                    self.expr_allowed = false;
                }
                b'`' => {
                    let newline = std::mem::take(&mut self.newline);
                    let parts = self.template()?;
                    out.push(self.token(Kind::Template(parts), start, newline));
                    self.expr_allowed = false;
                }
                b'/' if self.expr_allowed => {
                    let newline = std::mem::take(&mut self.newline);
                    let kind = if self.regex() {
                        self.expr_allowed = false;
                        Kind::Literal
                    } else {
                        self.pos += 1;
                        Kind::Punct
                    };
                    out.push(self.token(kind, start, newline));
                }
                b'<' if self.jsx
                    && self.expr_allowed
                    && self.peek(1).is_some_and(|n| is_ident_start(n) || n == b'>') =>
                {
                    let newline = std::mem::take(&mut self.newline);
                    let mut parts = Vec::new();
                    self.jsx_element(&mut parts)?;
                    out.push(self.token(Kind::Jsx(parts), start, newline));
                    self.expr_allowed = false;
                }
                b if is_ident_start(b) => {
                    let newline = std::mem::take(&mut self.newline);
                    while self.peek(0).is_some_and(is_ident_char) {
                        self.pos += 1;
                    }
                    let word = &self.src[start..self.pos];
                    let after_dot = start > 0 && self.bytes[start - 1] == b'.';
                    self.expr_allowed = !after_dot && EXPRESSION_KEYWORDS.contains(&word);
                    out.push(self.token(Kind::Ident, start, newline));
                }
                b if b.is_ascii_digit() => {
                    let newline = std::mem::take(&mut self.newline);
                    while self.peek(0).is_some_and(|b| is_ident_char(b) || b == b'.') {
                        self.pos += 1;
                    }
                    out.push(self.token(Kind::Literal, start, newline));
                    self.expr_allowed = false;
                }
                b'(' | b'[' | b'{' => {
                    let newline = std::mem::take(&mut self.newline);
                    depth += 1;
                    self.pos += 1;
                    out.push(self.token(Kind::Punct, start, newline));
                    self.expr_allowed = true;
                }
                b')' | b']' | b'}' => {
                    if depth == 0 {
                        if stop == Some(c) {
                            return Ok(out);
                        }
                        return Err(self.error(start, format!("unexpected '{}'", c as char)));
                    }
                    let newline = std::mem::take(&mut self.newline);
                    depth -= 1;
                    self.pos += 1;
                    out.push(self.token(Kind::Punct, start, newline));
                    self.expr_allowed = c == b'}';
                }
                _ => {
                    let newline = std::mem::take(&mut self.newline);
                    let rest = &self.src[start..];
                    self.pos += PUNCTUATORS
                        .iter()
                        .find(|p| rest.starts_with(**p))
                        .map_or(1, |p| p.len());
                    out.push(self.token(Kind::Punct, start, newline));
                    self.expr_allowed = true;
                }
            }
        }
    }

    /// Tokens of an embedded expression; consumes the closing `}`.
    fn nested(&mut self) -> Result<Vec<Token>> {
        self.expr_allowed = true;
        self.newline = false;
        let tokens = self.tokens(Some(b'}'))?;
        self.pos += 1;
        self.newline = false;
        Ok(tokens)
    }

    fn string(&mut self, quote: u8) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return Err(self.error(start, "unterminated string literal")),
                Some(b'\\') => self.pos += 2,
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn template(&mut self) -> Result<Vec<Vec<Token>>> {
        let start = self.pos;
        self.pos += 1;
        let mut parts = Vec::new();
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated template literal")),
                Some(b'\\') => self.pos += 2,
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(parts);
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    parts.push(self.nested()?);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Consume a regex literal; `false` (without moving) when the `/` does not start one.
    fn regex(&mut self) -> bool {
        let mut p = self.pos + 1;
        let mut in_class = false;
        loop {
            match self.bytes.get(p) {
                None | Some(b'\n') => return false,
                Some(b'\\') => p += 2,
                Some(b'[') => {
                    in_class = true;
                    p += 1;
                }
                Some(b']') => {
                    in_class = false;
                    p += 1;
                }
                Some(b'/') if !in_class => {
                    p += 1;
                    while self.bytes.get(p).is_some_and(u8::is_ascii_alphabetic) {
                        p += 1;
                    }
                    self.pos = p;
                    return true;
                }
                Some(_) => p += 1,
            }
        }
    }

    fn jsx_element(&mut self, parts: &mut Vec<Vec<Token>>) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        if self.peek(0) == Some(b'>') {
            self.pos += 1;
            return self.jsx_children(start, parts);
        }
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated JSX element")),
                Some(b'/') if self.peek(1) == Some(b'>') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(b'>') => {
                    self.pos += 1;
                    return self.jsx_children(start, parts);
                }
                Some(b'{') => {
                    self.pos += 1;
                    parts.push(self.nested()?);
                }
                Some(quote @ (b'"' | b'\'')) => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(|b| b != quote) {
                        self.pos += 1;
                    }
                    if self.peek(0).is_none() {
                        return Err(self.error(start, "unterminated JSX attribute"));
                    }
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn jsx_children(&mut self, start: usize, parts: &mut Vec<Vec<Token>>) -> Result<()> {
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated JSX element")),
                Some(b'{') => {
                    self.pos += 1;
                    parts.push(self.nested()?);
                }
                Some(b'<') => {
                    let mut next = self.pos + 1;
                    while self.bytes.get(next).is_some_and(u8::is_ascii_whitespace) {
                        next += 1;
                    }
                    if self.bytes.get(next) == Some(&b'/') {
                        let close = self.src[next..]
                            .find('>')
                            .ok_or_else(|| self.error(start, "unterminated JSX element"))?;
                        self.pos = next + close + 1;
                        return Ok(());
                    }
                    self.jsx_element(parts)?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

/// Walks a token tree and records the byte ranges of type syntax.
struct Stripper<'a> {
    src: &'a str,
    path: &'a Path,
    removals: Vec<Range<usize>>,
}

impl<'a> Stripper<'a> {
    fn apply(mut self) -> String {
        self.removals.sort_by_key(|r| r.start);
        let mut out = String::with_capacity(self.src.len());
        let mut pos = 0;
        for range in &self.removals {
            if range.start > pos {
                out.push_str(&self.src[pos..range.start]);
            }
            pos = pos.max(range.end);
        }
        out.push_str(&self.src[pos..]);
        out
    }

    fn error(&self, tok: &Token, reason: impl Into<String>) -> CompkitError {
        parse_error(self.src, self.path, tok.start, reason)
    }

    fn text(&self, tok: &Token) -> &'a str {
        &self.src[tok.start..tok.end]
    }

    fn is_punct(&self, t: &[Token], i: usize, s: &str) -> bool {
        t.get(i).is_some_and(|tok| matches!(tok.kind, Kind::Punct) && self.text(tok) == s)
    }

    fn is_ident(&self, t: &[Token], i: usize) -> bool {
        t.get(i).is_some_and(|tok| matches!(tok.kind, Kind::Ident))
    }

    fn word(&self, t: &[Token], i: usize) -> Option<&'a str> {
        t.get(i)
            .filter(|tok| matches!(tok.kind, Kind::Ident))
            .map(|tok| self.text(tok))
    }

    fn is_word(&self, t: &[Token], i: usize, s: &str) -> bool {
        self.word(t, i) == Some(s)
    }

    fn ends_expression(&self, tok: &Token) -> bool {
        match tok.kind {
            Kind::Ident => !KEYWORDS.contains(&self.text(tok)),
            Kind::Punct => matches!(self.text(tok), ")" | "]" | "}"),
            Kind::Literal | Kind::Template(_) | Kind::Jsx(_) => true,
            Kind::Import { dynamic } => dynamic,
        }
    }

    fn remove(&mut self, start: usize, end: usize) {
        if start < end {
            self.removals.push(start..end);
        }
    }

    /// Remove `start..end`, with its indentation and line break when nothing else shares
    /// its lines.
    fn remove_lines(&mut self, start: usize, end: usize) {
        let bytes = self.src.as_bytes();
        let mut from = start;
        while from > 0 && matches!(bytes[from - 1], b' ' | b'\t') {
            from -= 1;
        }
        let mut to = end;
        while to < bytes.len() && matches!(bytes[to], b' ' | b'\t' | b'\r') {
            to += 1;
        }
        if (from == 0 || bytes[from - 1] == b'\n') && (to == bytes.len() || bytes[to] == b'\n') {
            self.remove(from, (to + 1).min(bytes.len()));
        } else {
            self.remove(start, end);
        }
    }

    /// Remove the tokens `start..end` as a whole statement.
    fn remove_statement(&mut self, t: &[Token], start: usize, end: usize) {
        self.remove_lines(t[start].start, t[end - 1].end);
    }

    /// Index of the bracket closing the one at `open`.
    fn matching(&self, t: &[Token], open: usize) -> Option<usize> {
        let open_text = self.text(t.get(open)?);
        let close = match open_text {
            "(" => ")",
            "[" => "]",
            "{" => "}",
            "<" => ">",
            _ => return None,
        };
        let mut depth = 0usize;
        for (j, tok) in t.iter().enumerate().skip(open) {
            if !matches!(tok.kind, Kind::Punct) {
                continue;
            }
            let s = self.text(tok);
            if s == open_text {
                depth += 1;
            } else if s == close {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            } else if open_text == "<" && matches!(s, ";" | "=>" | "&&" | "||") {
                return None;
            }
        }
        None
    }

    fn with_semicolon(&self, t: &[Token], j: usize) -> usize {
        if self.is_punct(t, j, ";") { j + 1 } else { j }
    }

    /// Start of the statement introduced by the keyword at `i` (modifiers such as `export`
    /// included), or `None` when `t[i]` does not begin a statement.
    fn statement_start(&self, t: &[Token], i: usize) -> Option<usize> {
        let mut s = i;
        while s > 0
            && !t[s].newline_before
            && self.word(t, s - 1).is_some_and(|w| {
                matches!(w, "export" | "default" | "declare" | "const" | "async" | "abstract")
            })
        {
            s -= 1;
        }
        let begins = s == 0
            || t[s].newline_before
            || matches!(t[s - 1].kind, Kind::Import { dynamic: false })
            || (matches!(t[s - 1].kind, Kind::Punct)
                && matches!(self.text(&t[s - 1]), ";" | "{" | "}"));
        begins.then_some(s)
    }

    /// End of a type-level statement starting at `i`: after its `;`, or before the first
    /// token on a new line that cannot continue it.
    fn statement_end(&self, t: &[Token], i: usize) -> usize {
        let mut depth = 0usize;
        for j in i..t.len() {
            let tok = &t[j];
            if depth == 0 && j > i && tok.newline_before && !self.continues(&t[j - 1], tok) {
                return j;
            }
            if matches!(tok.kind, Kind::Punct) {
                match self.text(tok) {
                    "(" | "[" | "{" | "<" => depth += 1,
                    ")" | "]" | "}" | ">" => {
                        if depth == 0 {
                            return j;
                        }
                        depth -= 1;
                    }
                    ";" if depth == 0 => return j + 1,
                    _ => {}
                }
            }
        }
        t.len()
    }

    /// Whether `next`, first on its line, continues the type that `prev` is part of.
    fn continues(&self, prev: &Token, next: &Token) -> bool {
        let punct = |tok: &Token, set: &[&str]| {
            matches!(tok.kind, Kind::Punct) && set.contains(&self.text(tok))
        };
        let word = |tok: &Token, set: &[&str]| {
            matches!(tok.kind, Kind::Ident) && set.contains(&self.text(tok))
        };
        punct(prev, &["=", "|", "&", ",", "=>", ":", "?", "<", "(", "[", "{", "."])
            || word(prev, &["extends", "keyof", "typeof", "infer", "is", "declare", "readonly"])
            || punct(next, &["|", "&", "?", ":", "=>", ".", "=", "{", "<", ">", ")", "]", "}", ","])
            || word(next, &["extends"])
    }

    /// Index after the type starting at `i`, or `i` when no type starts there.
    fn type_end(&self, t: &[Token], i: usize) -> usize {
        let mut j = i;
        if self.is_punct(t, j, "|") || self.is_punct(t, j, "&") {
            j += 1;
        }
        loop {
            let Some(end) = self.type_operand_end(t, j) else {
                return i;
            };
            if self.is_punct(t, end, "|") || self.is_punct(t, end, "&") {
                j = end + 1;
            } else if self.is_word(t, end, "extends")
                && !t[end].newline_before
                && self.is_punct(t, self.type_end(t, end + 1), "?")
            {
                // conditional type
                let question = self.type_end(t, end + 1);
                let then = self.type_end(t, question + 1);
                if !self.is_punct(t, then, ":") {
                    return i;
                }
                return self.type_end(t, then + 1);
            } else {
                return end;
            }
        }
    }

    fn type_operand_end(&self, t: &[Token], i: usize) -> Option<usize> {
        let tok = t.get(i)?;
        let mut j = match &tok.kind {
            Kind::Ident => match self.text(tok) {
                "keyof" | "readonly" | "unique" | "infer" => return self.type_operand_end(t, i + 1),
                "typeof" => self.dotted_end(t, i + 1)?,
                "asserts" if self.is_ident(t, i + 1) => {
                    let j = i + 2;
                    return Some(if self.is_word(t, j, "is") { self.type_end(t, j + 1) } else { j });
                }
                "new" if self.is_punct(t, i + 1, "(") => return self.function_type_end(t, i + 1),
                _ => {
                    let mut j = self.dotted_end(t, i)?;
                    if self.is_punct(t, j, "<") && !t[j].newline_before {
                        j = self.matching(t, j)? + 1;
                    }
                    if self.is_word(t, j, "is") {
                        return Some(self.type_end(t, j + 1));
                    }
                    j
                }
            },
            Kind::Punct => match self.text(tok) {
                "(" => {
                    let close = self.matching(t, i)?;
                    if self.is_punct(t, close + 1, "=>") {
                        return Some(self.type_end(t, close + 2));
                    }
                    close + 1
                }
                "<" => {
                    let close = self.matching(t, i)?;
                    return self.function_type_end(t, close + 1);
                }
                "{" | "[" => self.matching(t, i)? + 1,
                "-" if t.get(i + 1).is_some_and(|n| matches!(n.kind, Kind::Literal)) => i + 2,
                _ => return None,
            },
            Kind::Literal | Kind::Template(_) => i + 1,
            Kind::Jsx(_) | Kind::Import { .. } => return None,
        };
        while self.is_punct(t, j, "[") && !t[j].newline_before {
            j = self.matching(t, j)? + 1;
        }
        Some(j)
    }

    /// `(params) => T` starting at `i`.
    fn function_type_end(&self, t: &[Token], i: usize) -> Option<usize> {
        if !self.is_punct(t, i, "(") {
            return None;
        }
        let close = self.matching(t, i)?;
        self.is_punct(t, close + 1, "=>").then(|| self.type_end(t, close + 2))
    }

    /// `a.b.c` starting at `i`.
    fn dotted_end(&self, t: &[Token], i: usize) -> Option<usize> {
        if !self.is_ident(t, i) {
            return None;
        }
        let mut j = i + 1;
        while self.is_punct(t, j, ".") && self.is_ident(t, j + 1) {
            j += 2;
        }
        Some(j)
    }

    /// Index of the `>` closing a type argument list that opens at `open`.
    fn type_arguments_end(&self, t: &[Token], open: usize) -> Option<usize> {
        if !self.is_punct(t, open, "<") {
            return None;
        }
        let mut j = open + 1;
        loop {
            let end = self.type_end(t, j);
            if end == j {
                return None;
            }
            if self.is_punct(t, end, ",") {
                j = end + 1;
            } else if self.is_punct(t, end, ">") {
                return Some(end);
            } else {
                return None;
            }
        }
    }

    /// Closing `>` of type arguments given to the call at `i` (`f<T>(`, `new Map<K, V>()`,
    /// ``tag<T>`...` ``).
    fn call_type_arguments(&self, t: &[Token], i: usize) -> Option<usize> {
        if !self.ends_expression(t.get(i)?) || t.get(i + 1).is_none_or(|n| n.newline_before) {
            return None;
        }
        let close = self.type_arguments_end(t, i + 1)?;
        let next = t.get(close + 1)?;
        (self.is_punct(t, close + 1, "(") || matches!(next.kind, Kind::Template(_)))
            .then_some(close)
    }

    /// Opening `<` of generic parameters written right before the `(` at `open`.
    fn generic_params_before(&self, t: &[Token], open: usize) -> Option<usize> {
        if open == 0 || !self.is_punct(t, open - 1, ">") {
            return None;
        }
        let mut depth = 0usize;
        for j in (0..open).rev() {
            if !matches!(t[j].kind, Kind::Punct) {
                continue;
            }
            match self.text(&t[j]) {
                ">" => depth += 1,
                "<" => {
                    depth -= 1;
                    if depth == 0 {
                        let generic = j == 0 || !self.ends_expression(&t[j - 1]);
                        return generic.then_some(j);
                    }
                }
                ";" | "{" | "}" | "=>" => return None,
                _ => {}
            }
        }
        None
    }

    fn strip(&mut self, t: &[Token]) -> Result<()> {
        let mut i = 0;
        while i < t.len() {
            i = self.step(t, i)?.max(i + 1);
        }
        Ok(())
    }

    fn step(&mut self, t: &[Token], i: usize) -> Result<usize> {
        let tok = &t[i];
        match &tok.kind {
            Kind::Template(parts) | Kind::Jsx(parts) => {
                for part in parts {
                    self.strip(part)?;
                }
                return Ok(i + 1);
            }
            Kind::Literal | Kind::Import { .. } => return Ok(i + 1),
            Kind::Punct => return self.punct(t, i),
            Kind::Ident => {}
        }
        if let Some(end) = self.declaration(t, i)? {
            return Ok(end);
        }
        match self.text(tok) {
            "function" => return self.function(t, i),
            "class" => return self.class(t, i),
            "const" | "let" | "var" => return self.declarators(t, i),
            "as" | "satisfies"
                if i > 0 && !tok.newline_before && self.ends_expression(&t[i - 1]) =>
            {
                let end = self.type_end(t, i + 1);
                if end > i + 1 {
                    self.remove(t[i - 1].end, t[end - 1].end);
                    return Ok(end);
                }
            }
            _ => {}
        }
        if let Some(close) = self.call_type_arguments(t, i) {
            self.remove(t[i + 1].start, t[close].end);
            return Ok(close + 1);
        }
        Ok(i + 1)
    }

    /// Type-only and unsupported declarations introduced by the word at `i`.
    fn declaration(&mut self, t: &[Token], i: usize) -> Result<Option<usize>> {
        let word = self.text(&t[i]);
        let named = self.is_ident(t, i + 1);
        let (start, end) = match word {
            "interface" if named => {
                let Some(start) = self.statement_start(t, i) else {
                    return Ok(None);
                };
                let Some(open) = (i + 2..t.len()).find(|&j| self.is_punct(t, j, "{")) else {
                    return Ok(None);
                };
                let Some(close) = self.matching(t, open) else {
                    return Ok(None);
                };
                (start, self.with_semicolon(t, close + 1))
            }
            "type" if named && (self.is_punct(t, i + 2, "=") || self.is_punct(t, i + 2, "<")) => {
                let Some(start) = self.statement_start(t, i) else {
                    return Ok(None);
                };
                (start, self.statement_end(t, i + 1))
            }
            "declare"
                if t.get(i + 1).is_some_and(|n| matches!(n.kind, Kind::Ident | Kind::Literal)) =>
            {
                let Some(start) = self.statement_start(t, i) else {
                    return Ok(None);
                };
                (start, self.statement_end(t, i + 1))
            }
            "export" if self.is_word(t, i + 1, "type") && self.is_punct(t, i + 2, "{") => {
                let Some(close) = self.matching(t, i + 2) else {
                    return Ok(None);
                };
                (i, self.with_semicolon(t, close + 1))
            }
            // local export list; `as` renames bindings here
            "export" if self.is_punct(t, i + 1, "{") => {
                return Ok(self.matching(t, i + 1).map(|close| close + 1));
            }
            "enum" | "namespace" | "module"
                if named
                    && self.statement_start(t, i).is_some()
                    && (word == "enum"
                        || self.is_punct(t, i + 2, "{")
                        || self.is_punct(t, i + 2, ".")) =>
            {
                return Err(self.error(
                    &t[i],
                    format!("TypeScript `{word}` declarations have no JavaScript equivalent"),
                ));
            }
            "abstract" if self.is_word(t, i + 1, "class") => {
                self.remove(t[i].start, t[i + 1].start);
                return Ok(Some(i + 1));
            }
            _ => return Ok(None),
        };
        self.remove_statement(t, start, end);
        Ok(Some(end))
    }

    fn punct(&mut self, t: &[Token], i: usize) -> Result<usize> {
        match self.text(&t[i]) {
            "(" => self.parens(t, i),
            "!" if i > 0
                && !t[i].newline_before
                && self.ends_expression(&t[i - 1])
                && t.get(i + 1).is_none_or(|next| {
                    matches!(next.kind, Kind::Punct)
                        && matches!(
                            self.text(next),
                            "." | "?." | ")" | "]" | "," | ";" | "[" | ":" | "}" | "="
                        )
                }) =>
            {
                self.remove(t[i].start, t[i].end);
                Ok(i + 1)
            }
            _ => Ok(i + 1),
        }
    }

    /// A `(` that opens the parameters of an arrow function or method has its parameters
    /// and return type stripped.
    fn parens(&mut self, t: &[Token], open: usize) -> Result<usize> {
        let Some(close) = self.matching(t, open) else {
            return Ok(open + 1);
        };
        let prev = open.checked_sub(1).map(|p| &t[p]);
        let arrow = self.arrow_head(prev);
        let method = self.method_head(prev);
        let after = close + 1;

        if arrow && self.is_punct(t, after, "=>") {
            self.arrow_generics(t, open);
            self.params(t, open, close)?;
            return Ok(after);
        }
        let in_ternary = prev.is_some_and(|p| matches!(p.kind, Kind::Punct) && self.text(p) == "?");
        if self.is_punct(t, after, ":") && !in_ternary {
            let end = self.type_end(t, after + 1);
            let arrow_return = arrow && self.is_punct(t, end, "=>");
            let method_return = method && self.is_punct(t, end, "{");
            if end > after + 1 && (arrow_return || method_return) {
                if arrow_return {
                    self.arrow_generics(t, open);
                }
                self.params(t, open, close)?;
                self.remove(t[after].start, t[end - 1].end);
                return Ok(end);
            }
        }
        if method && self.is_punct(t, after, "{") {
            self.params(t, open, close)?;
            return Ok(after);
        }
        Ok(open + 1)
    }

    fn arrow_generics(&mut self, t: &[Token], open: usize) {
        if let Some(lt) = self.generic_params_before(t, open) {
            self.remove(t[lt].start, t[open - 1].end);
        }
    }

    fn arrow_head(&self, prev: Option<&Token>) -> bool {
        prev.is_none_or(|p| match p.kind {
            Kind::Punct => !matches!(self.text(p), ")" | "]" | "}"),
            Kind::Ident => matches!(self.text(p), "async" | "return" | "yield" | "await" | "default"),
            _ => false,
        })
    }

    fn method_head(&self, prev: Option<&Token>) -> bool {
        prev.is_some_and(|p| match p.kind {
            Kind::Ident => {
                let w = self.text(p);
                w == "catch" || !KEYWORDS.contains(&w)
            }
            Kind::Literal => true,
            Kind::Punct => matches!(self.text(p), "]" | ">"),
            _ => false,
        })
    }

    /// Strip annotations, optional markers and `this` parameters between `open` and `close`.
    fn params(&mut self, t: &[Token], open: usize, close: usize) -> Result<()> {
        let mut j = open + 1;
        while j < close {
            let param = j;
            if let Some(word) = self.word(t, j)
                && MEMBER_MODIFIERS.contains(&word)
                && (self.is_ident(t, j + 1) || self.is_punct(t, j + 1, "{") || self.is_punct(t, j + 1, "["))
            {
                return Err(self.error(
                    &t[j],
                    "constructor parameter properties have no JavaScript equivalent",
                ));
            }
            if self.is_punct(t, j, "...") {
                j += 1;
            }
            let this_param = self.is_word(t, j, "this");
            let binding_end = if self.is_punct(t, j, "{") || self.is_punct(t, j, "[") {
                self.matching(t, j).map_or(close, |c| c + 1).min(close)
            } else {
                (j + 1).min(close)
            };
            self.strip(&t[j..binding_end])?;
            j = binding_end;

            let marker = j;
            if self.is_punct(t, j, "?") {
                j += 1;
            }
            if self.is_punct(t, j, ":") {
                j = self.type_end(t, j + 1).max(j + 1).min(close);
            }
            if j > marker {
                self.remove(t[marker].start, t[j - 1].end);
            }
            if this_param {
                let end = if self.is_punct(t, j, ",") { t[j + 1].start } else { t[j - 1].end };
                self.remove(t[param].start, end);
            }
            if self.is_punct(t, j, "=") {
                let end = self.expression_end(t, j + 1, close);
                self.strip(&t[j + 1..end])?;
                j = end;
            }
            while j < close && !self.is_punct(t, j, ",") {
                j += 1;
            }
            j += 1;
        }
        Ok(())
    }

    /// End of the expression starting at `i`, at most `limit`: the first `,` `;` or
    /// unmatched closing bracket, or a line that starts a new statement.
    fn expression_end(&self, t: &[Token], i: usize, limit: usize) -> usize {
        let mut j = i;
        while j < limit {
            let tok = &t[j];
            if j > i && tok.newline_before {
                let statement = self.word(t, j).is_some_and(|w| STATEMENT_KEYWORDS.contains(&w));
                let operand = match tok.kind {
                    Kind::Ident => !KEYWORDS.contains(&self.text(tok)),
                    Kind::Literal => true,
                    _ => false,
                };
                if statement || (operand && self.ends_expression(&t[j - 1])) {
                    return j;
                }
            }
            if let Some(close) = self.call_type_arguments(t, j) {
                j = close + 1;
                continue;
            }
            if matches!(tok.kind, Kind::Punct) {
                match self.text(tok) {
                    "(" | "[" | "{" => {
                        j = self.matching(t, j).map_or(limit, |c| c + 1);
                        continue;
                    }
                    ")" | "]" | "}" | "," | ";" => return j,
                    _ => {}
                }
            }
            j += 1;
        }
        limit
    }

    /// `const`/`let`/`var` declarators: binding annotations are removed and initializers
    /// stripped.
    fn declarators(&mut self, t: &[Token], i: usize) -> Result<usize> {
        if self.is_word(t, i + 1, "enum") {
            return Err(self.error(
                &t[i + 1],
                "TypeScript `enum` declarations have no JavaScript equivalent",
            ));
        }
        let mut j = i + 1;
        loop {
            let binding = j;
            if self.is_punct(t, j, "{") || self.is_punct(t, j, "[") {
                let Some(close) = self.matching(t, j) else {
                    return Ok(j);
                };
                j = close + 1;
            } else if self.is_ident(t, j) {
                j += 1;
            } else {
                return Ok(j);
            }
            self.strip(&t[binding..j])?;

            let marker = j;
            if self.is_punct(t, j, "!") && self.is_punct(t, j + 1, ":") {
                j += 1;
            }
            if self.is_punct(t, j, ":") {
                j = self.type_end(t, j + 1).max(j + 1);
            }
            if j > marker {
                self.remove(t[marker].start, t[j - 1].end);
            }
            if !self.is_punct(t, j, "=") {
                return Ok(j);
            }
            let end = self.expression_end(t, j + 1, t.len());
            self.strip(&t[j + 1..end])?;
            j = end;
            if !self.is_punct(t, j, ",") {
                return Ok(j);
            }
            j += 1;
        }
    }

    fn function(&mut self, t: &[Token], i: usize) -> Result<usize> {
        let mut j = i + 1;
        if self.is_punct(t, j, "*") {
            j += 1;
        }
        if self.is_ident(t, j) {
            j += 1;
        }
        if self.is_punct(t, j, "<")
            && let Some(close) = self.matching(t, j)
        {
            self.remove(t[j].start, t[close].end);
            j = close + 1;
        }
        if !self.is_punct(t, j, "(") {
            return Ok(i + 1);
        }
        let Some(close) = self.matching(t, j) else {
            return Ok(i + 1);
        };
        self.params(t, j, close)?;
        let mut end = close + 1;
        if self.is_punct(t, end, ":") {
            let type_end = self.type_end(t, end + 1).max(end + 1);
            self.remove(t[end].start, t[type_end - 1].end);
            end = type_end;
        }
        if !self.is_punct(t, end, "{")
            && let Some(start) = self.statement_start(t, i)
        {
            // overload signature
            let end = self.with_semicolon(t, end);
            self.remove_statement(t, start, end);
            return Ok(end);
        }
        Ok(end)
    }

    fn class(&mut self, t: &[Token], i: usize) -> Result<usize> {
        let mut j = i + 1;
        if self.word(t, j).is_some_and(|w| w != "extends" && w != "implements") {
            j += 1;
        }
        if self.is_punct(t, j, "<")
            && let Some(close) = self.matching(t, j)
        {
            self.remove(t[j].start, t[close].end);
            j = close + 1;
        }
        if self.is_word(t, j, "extends") {
            j += 1;
            while j < t.len() && !self.is_punct(t, j, "{") && !self.is_word(t, j, "implements") {
                if let Some(close) = self.type_arguments_end(t, j) {
                    self.remove(t[j].start, t[close].end);
                    j = close + 1;
                } else if self.is_punct(t, j, "(") {
                    j = self.matching(t, j).map_or(j + 1, |c| c + 1);
                } else {
                    j += 1;
                }
            }
        }
        if self.is_word(t, j, "implements") {
            let clause = j;
            while j < t.len() && !self.is_punct(t, j, "{") {
                j += 1;
            }
            self.remove(t[clause - 1].end, t[j - 1].end);
        }
        if !self.is_punct(t, j, "{") {
            return Ok(i + 1);
        }
        let Some(close) = self.matching(t, j) else {
            return Ok(i + 1);
        };
        let body = &t[j + 1..close];
        let mut k = 0;
        while k < body.len() {
            k = self.member(body, k)?.max(k + 1);
        }
        Ok(close + 1)
    }

    /// Whether a member name or another modifier follows the word before `i`.
    fn member_follows(&self, t: &[Token], i: usize) -> bool {
        t.get(i).is_some_and(|tok| match tok.kind {
            Kind::Ident | Kind::Literal => true,
            Kind::Punct => matches!(self.text(tok), "[" | "#" | "*"),
            _ => false,
        })
    }

    /// One class member starting at `start`; returns the index after it.
    fn member(&mut self, t: &[Token], start: usize) -> Result<usize> {
        if self.is_punct(t, start, ";") {
            return Ok(start + 1);
        }
        if self.is_word(t, start, "static") && self.is_punct(t, start + 1, "{") {
            let Some(close) = self.matching(t, start + 1) else {
                return Ok(t.len());
            };
            self.strip(&t[start + 2..close])?;
            return Ok(close + 1);
        }

        let mut j = start;
        let mut signature_only = false;
        while let Some(word) = self.word(t, j)
            && self.member_follows(t, j + 1)
        {
            if MEMBER_MODIFIERS.contains(&word) {
                signature_only |= matches!(word, "abstract" | "declare");
                self.remove(t[j].start, t[j + 1].start);
            } else if !matches!(word, "static" | "async" | "get" | "set" | "accessor") {
                break;
            }
            j += 1;
        }
        if self.is_punct(t, j, "*") {
            j += 1;
        }

        if self.is_punct(t, j, "[") {
            if self.is_ident(t, j + 1) && self.is_punct(t, j + 2, ":") {
                // index signature
                let mut end = self.matching(t, j).map_or(t.len(), |c| c + 1);
                if self.is_punct(t, end, ":") {
                    end = self.type_end(t, end + 1).max(end + 1);
                }
                let end = self.with_semicolon(t, end);
                self.remove_statement(t, start, end);
                return Ok(end);
            }
            j = self.matching(t, j).map_or(t.len(), |c| c + 1);
        } else if self.is_punct(t, j, "#") {
            j += 2;
        } else {
            j += 1;
        }

        if self.is_punct(t, j, "?") || self.is_punct(t, j, "!") {
            self.remove(t[j].start, t[j].end);
            j += 1;
        }
        if self.is_punct(t, j, "<")
            && let Some(close) = self.matching(t, j)
        {
            self.remove(t[j].start, t[close].end);
            j = close + 1;
        }

        if self.is_punct(t, j, "(") {
            let Some(close) = self.matching(t, j) else {
                return Ok(t.len());
            };
            self.params(t, j, close)?;
            let mut k = close + 1;
            if self.is_punct(t, k, ":") {
                let end = self.type_end(t, k + 1).max(k + 1);
                self.remove(t[k].start, t[end - 1].end);
                k = end;
            }
            if self.is_punct(t, k, "{")
                && let Some(body) = self.matching(t, k)
            {
                self.strip(&t[k + 1..body])?;
                return Ok(body + 1);
            }
            // overload or abstract signature
            let end = self.with_semicolon(t, k);
            self.remove_statement(t, start, end);
            return Ok(end);
        }

        if self.is_punct(t, j, ":") {
            let end = self.type_end(t, j + 1).max(j + 1);
            self.remove(t[j].start, t[end - 1].end);
            j = end;
        }
        if self.is_punct(t, j, "=") {
            let end = self.expression_end(t, j + 1, t.len());
            self.strip(&t[j + 1..end])?;
            j = end;
        }
        let end = self.with_semicolon(t, j).min(t.len());
        if signature_only && end > start {
            self.remove_statement(t, start, end);
        }
        Ok(end)
    }
}
