//! Structural representation of a source file.
//!
//! The parser does not build a full syntax tree. It splits a file into a sequence of
//! [`Item`]s: verbatim [`Item::Code`] text and [`Item::Import`] declarations whose module
//! specifier can be rewritten. Concatenating the rendered items reproduces the input byte
//! for byte, so transformers only touch what they change.
//!
//! Scripts are scanned with enough of the JavaScript lexical grammar to never mistake the
//! inside of a string, template literal, comment, regular expression or JSX text for an
//! import. Stylesheets are scanned for `@import`, `@use` and `@forward` rules.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::core::{CompkitError, Result};

/// How a file is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// JavaScript or TypeScript, optionally with JSX
    Script {
        /// Whether `<Tag>` starts a JSX element
        jsx: bool,
        /// Whether the file is TypeScript
        typescript: bool,
    },
    /// CSS, SCSS or Less
    Stylesheet,
    /// Anything else; never rewritten
    Opaque,
}

impl Language {
    /// Language of a file, from its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "ts" | "mts" | "cts" => Self::Script {
                jsx: false,
                typescript: true,
            },
            "tsx" => Self::Script {
                jsx: true,
                typescript: true,
            },
            "js" | "mjs" | "cjs" => Self::Script {
                jsx: false,
                typescript: false,
            },
            "jsx" => Self::Script {
                jsx: true,
                typescript: false,
            },
            "css" | "scss" | "sass" | "less" => Self::Stylesheet,
            _ => Self::Opaque,
        }
    }
}

/// Syntactic form of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "m"`, `import "m"`
    Static,
    /// `export { x } from "m"`, `export * from "m"`
    ReExport,
    /// `import("m")` or `require("m")`
    Dynamic,
    /// `@import "m"`, `@use "m"`, `@forward "m"`
    Stylesheet,
}

/// An import declaration.
///
/// Rendered as `prefix + quote + specifier + quote + suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Syntactic form
    pub kind: ImportKind,
    /// Source text before the specifier's opening quote
    pub prefix: String,
    /// Quote character, `None` for unquoted CSS `url(...)`
    pub quote: Option<char>,
    /// The module specifier
    pub specifier: String,
    /// Source text after the closing quote, up to and including a terminating `;`
    pub suffix: String,
    /// `import type ...` / `export type ... from`
    pub type_only: bool,
    /// Removed declarations render as nothing
    pub removed: bool,
}

impl ImportDecl {
    /// Render the declaration.
    #[must_use]
    pub fn render(&self) -> String {
        if self.removed {
            return String::new();
        }
        let quote = self.quote.map(String::from).unwrap_or_default();
        format!("{}{quote}{}{quote}{}", self.prefix, self.specifier, self.suffix)
    }

    /// Whether the specifier is a relative path (`./x`, `../x`).
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.specifier.starts_with("./") || self.specifier.starts_with("../")
    }

    /// Names bound by the `{ ... }` clause, without `type` markers or renames.
    #[must_use]
    pub fn named_bindings(&self) -> Vec<String> {
        let Some((open, close)) = brace_span(&self.prefix) else {
            return Vec::new();
        };
        self.prefix[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let s = s.strip_prefix("type ").map_or(s, str::trim_start);
                s.rsplit(" as ").next().unwrap_or(s).trim().to_string()
            })
            .collect()
    }
}

/// Byte span of the first `{ ... }` in an import prefix.
pub(crate) fn brace_span(prefix: &str) -> Option<(usize, usize)> {
    let open = prefix.find('{')?;
    let close = open + prefix[open..].find('}')?;
    Some((open, close))
}

/// One piece of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Verbatim text
    Code(String),
    /// A rewritable import
    Import(ImportDecl),
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    /// Path relative to the installation target
    pub path: PathBuf,
    /// How the file was scanned
    pub language: Language,
    /// The file as a sequence of items
    pub items: Vec<Item>,
}

impl SourceModule {
    /// Parse `content`.
    ///
    /// # Errors
    ///
    /// [`CompkitError::ParseError`] for unterminated strings, template literals, comments
    /// or JSX elements, and for unbalanced brackets.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let language = Language::from_path(&path);
        let items = match language {
            Language::Script {
                jsx,
                ..
            } => {
                let mut scanner = Scanner::new(content, &path, jsx);
                scanner.scan_script(None)?;
                scanner.finish()
            }
            Language::Stylesheet => {
                let mut scanner = Scanner::new(content, &path, false);
                scanner.scan_stylesheet()?;
                scanner.finish()
            }
            Language::Opaque => vec![Item::Code(content.to_string())],
        };
        Ok(Self {
            path,
            language,
            items,
        })
    }

    /// Render the module back to text.
    ///
    /// A removed import also takes the line break that followed it.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_with_spans().0
    }

    /// [`SourceModule::render`], plus the byte span and kind of every live import in the
    /// output, in order.
    pub(crate) fn render_with_spans(&self) -> (String, Vec<(Range<usize>, ImportKind)>) {
        let mut out = String::new();
        let mut spans = Vec::new();
        let mut swallow_newline = false;
        for item in &self.items {
            match item {
                Item::Import(import) => {
                    let start = out.len();
                    out.push_str(&import.render());
                    if !import.removed {
                        spans.push((start..out.len(), import.kind));
                    }
                    swallow_newline = import.removed;
                }
                Item::Code(code) => {
                    let code = if swallow_newline {
                        code.strip_prefix("\r\n")
                            .or_else(|| code.strip_prefix('\n'))
                            .unwrap_or(code)
                    } else {
                        code
                    };
                    out.push_str(code);
                    swallow_newline = false;
                }
            }
        }
        (out, spans)
    }

    /// Live (not removed) imports.
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Import(import) if !import.removed => Some(import),
            _ => None,
        })
    }

    /// Mutable access to live imports.
    pub fn imports_mut(&mut self) -> impl Iterator<Item = &mut ImportDecl> {
        self.items.iter_mut().filter_map(|item| match item {
            Item::Import(import) if !import.removed => Some(import),
            _ => None,
        })
    }

    /// All verbatim code, concatenated.
    #[must_use]
    pub fn code_text(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Code(code) => Some(code.as_str()),
                Item::Import(_) => None,
            })
            .collect()
    }

    /// Whether this is a script (JS/TS).
    #[must_use]
    pub fn is_script(&self) -> bool {
        matches!(self.language, Language::Script { .. })
    }
}

/// Keywords after which `/` starts a regex and `<` starts JSX.
pub(super) const EXPRESSION_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
    "default",
    "extends",
];

pub(super) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

pub(super) fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    path: &'a Path,
    jsx: bool,
    pos: usize,
    code_start: usize,
    /// Whether the next `/` starts a regex and the next `<` may start JSX
    expr_allowed: bool,
    items: Vec<Item>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, path: &'a Path, jsx: bool) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            path,
            jsx,
            pos: 0,
            code_start: 0,
            expr_allowed: true,
            items: Vec::new(),
        }
    }

    fn finish(mut self) -> Vec<Item> {
        if self.code_start < self.src.len() {
            self.items.push(Item::Code(self.src[self.code_start..].to_string()));
        }
        self.items
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> CompkitError {
        let line = self.src[..at.min(self.src.len())].matches('\n').count() + 1;
        CompkitError::ParseError {
            path: self.path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at(&self, p: usize) -> Option<u8> {
        self.bytes.get(p).copied()
    }

    fn skip_ws_from(&self, mut p: usize) -> usize {
        while self.at(p).is_some_and(|b| b.is_ascii_whitespace()) {
            p += 1;
        }
        p
    }

    fn word_at(&self, p: usize) -> &'a str {
        let mut end = p;
        while self.at(end).is_some_and(is_ident_char) {
            end += 1;
        }
        &self.src[p..end]
    }

    fn emit_import(&mut self, start: usize, import: ImportDecl, end: usize) {
        if self.code_start < start {
            self.items.push(Item::Code(self.src[self.code_start..start].to_string()));
        }
        self.items.push(Item::Import(import));
        self.code_start = end;
        self.pos = end;
    }

    /// Scan script code until EOF (`stop == None`) or an unmatched `stop` byte, which is
    /// left unconsumed.
    fn scan_script(&mut self, stop: Option<u8>) -> Result<()> {
        let mut brackets: Vec<(u8, usize)> = Vec::new();
        loop {
            let Some(c) = self.peek(0) else {
                if let Some((open, at)) = brackets.last() {
                    return Err(self.error(*at, format!("unclosed '{}'", *open as char)));
                }
                if stop.is_some() {
                    return Err(self.error(self.pos, "unexpected end of file in expression"));
                }
                return Ok(());
            };

            match c {
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'\'' | b'"' => {
                    self.skip_string(c)?;
                    self.expr_allowed = false;
                }
                b'`' => {
                    self.skip_template()?;
                    self.expr_allowed = false;
                }
                b'/' if self.expr_allowed => {
                    if self.skip_regex() {
                        self.expr_allowed = false;
                    } else {
                        self.pos += 1;
                        self.expr_allowed = true;
                    }
                }
                b'<' if self.jsx
                    && self.expr_allowed
                    && self.peek(1).is_some_and(|n| is_ident_start(n) || n == b'>') =>
                {
                    self.skip_jsx_element()?;
                    self.expr_allowed = false;
                }
                b'(' | b'[' | b'{' => {
                    brackets.push((c, self.pos));
                    self.pos += 1;
                    self.expr_allowed = true;
                }
                b')' | b']' | b'}' => {
                    let Some((open, _)) = brackets.pop() else {
                        if stop == Some(c) {
                            return Ok(());
                        }
                        return Err(self.error(self.pos, format!("unexpected '{}'", c as char)));
                    };
                    let expected = match open {
                        b'(' => b')',
                        b'[' => b']',
                        _ => b'}',
                    };
                    if c != expected {
                        return Err(self.error(
                            self.pos,
                            format!("expected '{}' but found '{}'", expected as char, c as char),
                        ));
                    }
                    self.pos += 1;
                    self.expr_allowed = c == b'}';
                }
                b if is_ident_start(b) => {
                    let start = self.pos;
                    let word = self.word_at(start);
                    self.pos += word.len();
                    let after_dot = start > 0 && self.bytes[start - 1] == b'.';
                    let matched = !after_dot
                        && match word {
                            "import" => self.try_import(start)?,
                            "export" => self.try_reexport(start)?,
                            "require" => self.try_dynamic(start, self.pos)?,
                            _ => false,
                        };
                    if !matched {
                        self.expr_allowed = EXPRESSION_KEYWORDS.contains(&word);
                    }
                }
                b if b.is_ascii_digit() => {
                    while self.peek(0).is_some_and(|b| is_ident_char(b) || b == b'.') {
                        self.pos += 1;
                    }
                    self.expr_allowed = false;
                }
                _ => {
                    self.pos += 1;
                    self.expr_allowed = true;
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek(0).is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start = self.pos;
        match self.src[self.pos + 2..].find("*/") {
            Some(offset) => {
                self.pos += 2 + offset + 2;
                Ok(())
            }
            None => Err(self.error(start, "unterminated comment")),
        }
    }

    fn skip_string(&mut self, quote: u8) -> Result<()> {
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

    fn skip_template(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None => return Err(self.error(start, "unterminated template literal")),
                Some(b'\\') => self.pos += 2,
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.expr_allowed = true;
                    self.scan_script(Some(b'}'))?;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Skip a regex literal. Returns `false` (without moving) when the `/` does not start
    /// a literal that closes on the same line.
    fn skip_regex(&mut self) -> bool {
        let mut p = self.pos + 1;
        let mut in_class = false;
        loop {
            match self.at(p) {
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
                    while self.at(p).is_some_and(|b| b.is_ascii_alphabetic()) {
                        p += 1;
                    }
                    self.pos = p;
                    return true;
                }
                Some(_) => p += 1,
            }
        }
    }

    /// Skip `{ expression }` inside JSX. `self.pos` is at the `{`.
    fn skip_jsx_expression(&mut self) -> Result<()> {
        self.pos += 1;
        self.expr_allowed = true;
        self.scan_script(Some(b'}'))?;
        self.pos += 1;
        Ok(())
    }

    fn skip_jsx_element(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        if self.peek(0) == Some(b'>') {
            self.pos += 1;
            return self.skip_jsx_children(start);
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
                    return self.skip_jsx_children(start);
                }
                Some(b'{') => self.skip_jsx_expression()?,
                Some(q @ (b'"' | b'\'')) => {
                    let open = self.pos;
                    self.pos += 1;
                    while self.peek(0).is_some_and(|b| b != q) {
                        self.pos += 1;
                    }
                    if self.peek(0).is_none() {
                        return Err(self.error(open, "unterminated JSX attribute"));
                    }
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_jsx_children(&mut self, element_start: usize) -> Result<()> {
        loop {
            match self.peek(0) {
                None => return Err(self.error(element_start, "unterminated JSX element")),
                Some(b'{') => self.skip_jsx_expression()?,
                Some(b'<') => {
                    let next = self.skip_ws_from(self.pos + 1);
                    if self.at(next) == Some(b'/') {
                        match self.src[next..].find('>') {
                            Some(offset) => {
                                self.pos = next + offset + 1;
                                return Ok(());
                            }
                            None => {
                                return Err(self.error(element_start, "unterminated JSX element"));
                            }
                        }
                    }
                    self.skip_jsx_element()?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Parse a quoted specifier at `p`. Returns `(quote, specifier, end)`.
    fn quoted_at(&self, p: usize) -> Option<(u8, &'a str, usize)> {
        let quote = self.at(p).filter(|q| *q == b'\'' || *q == b'"')?;
        let mut end = p + 1;
        loop {
            match self.at(end)? {
                b'\n' | b'\\' => return None,
                b if b == quote => return Some((quote, &self.src[p + 1..end], end + 1)),
                _ => end += 1,
            }
        }
    }

    /// Position after an optional `;` on the same line.
    fn statement_end(&self, mut p: usize) -> usize {
        let mut q = p;
        while self.at(q).is_some_and(|b| b == b' ' || b == b'\t') {
            q += 1;
        }
        if self.at(q) == Some(b';') {
            p = q + 1;
        }
        p
    }

    /// Parse an import/export clause at `p`. Returns `(type_only, end)`.
    fn clause_at(&self, p: usize, allow_default: bool) -> Option<(bool, usize)> {
        let mut p = self.skip_ws_from(p);
        let mut type_only = false;
        if self.word_at(p) == "type" {
            let after = self.skip_ws_from(p + 4);
            let next = self.at(after)?;
            let is_modifier = next == b'{'
                || next == b'*'
                || (allow_default
                    && after > p + 4
                    && is_ident_start(next)
                    && self.word_at(after) != "from");
            if is_modifier {
                type_only = true;
                p = after;
            }
        }

        let named_or_namespace = |p: usize| -> Option<usize> {
            match self.at(p)? {
                b'{' => {
                    let mut q = p + 1;
                    loop {
                        match self.at(q)? {
                            b'}' => return Some(q + 1),
                            b if is_ident_char(b) || b.is_ascii_whitespace() || b == b',' => {
                                q += 1;
                            }
                            _ => return None,
                        }
                    }
                }
                b'*' => {
                    let q = self.skip_ws_from(p + 1);
                    if self.word_at(q) == "as" {
                        let r = self.skip_ws_from(q + 2);
                        let ident = self.word_at(r);
                        (!ident.is_empty()).then_some(r + ident.len())
                    } else {
                        Some(p + 1)
                    }
                }
                _ => None,
            }
        };

        let next = self.at(p)?;
        if next == b'{' || next == b'*' {
            return named_or_namespace(p).map(|end| (type_only, end));
        }
        if !allow_default || !is_ident_start(next) {
            return None;
        }
        let ident = self.word_at(p);
        let after_ident = self.skip_ws_from(p + ident.len());
        if self.at(after_ident) == Some(b',') {
            let q = self.skip_ws_from(after_ident + 1);
            return named_or_namespace(q).map(|end| (type_only, end));
        }
        Some((type_only, p + ident.len()))
    }

    /// `from "specifier"` after a clause ending at `p`.
    fn from_specifier(&self, p: usize) -> Option<(usize, u8, &'a str, usize)> {
        let q = self.skip_ws_from(p);
        if self.word_at(q) != "from" {
            return None;
        }
        let r = self.skip_ws_from(q + 4);
        let (quote, specifier, end) = self.quoted_at(r)?;
        Some((r, quote, specifier, end))
    }

    fn try_import(&mut self, start: usize) -> Result<bool> {
        let after_keyword = self.pos;
        let p = self.skip_ws_from(after_keyword);
        match self.at(p) {
            Some(b'(') => self.try_dynamic(start, after_keyword),
            Some(b'\'' | b'"') => {
                let Some((quote, specifier, end)) = self.quoted_at(p) else {
                    return Ok(false);
                };
                let end_stmt = self.statement_end(end);
                let import = ImportDecl {
                    kind: ImportKind::Static,
                    prefix: self.src[start..p].to_string(),
                    quote: Some(quote as char),
                    specifier: specifier.to_string(),
                    suffix: self.src[end..end_stmt].to_string(),
                    type_only: false,
                    removed: false,
                };
                self.emit_import(start, import, end_stmt);
                self.expr_allowed = true;
                Ok(true)
            }
            _ => {
                let Some((type_only, clause_end)) = self.clause_at(p, true) else {
                    return Ok(false);
                };
                let Some((quote_pos, quote, specifier, end)) = self.from_specifier(clause_end)
                else {
                    return Ok(false);
                };
                let end_stmt = self.statement_end(end);
                let import = ImportDecl {
                    kind: ImportKind::Static,
                    prefix: self.src[start..quote_pos].to_string(),
                    quote: Some(quote as char),
                    specifier: specifier.to_string(),
                    suffix: self.src[end..end_stmt].to_string(),
                    type_only,
                    removed: false,
                };
                self.emit_import(start, import, end_stmt);
                self.expr_allowed = true;
                Ok(true)
            }
        }
    }

    fn try_reexport(&mut self, start: usize) -> Result<bool> {
        let Some((type_only, clause_end)) = self.clause_at(self.pos, false) else {
            return Ok(false);
        };
        let Some((quote_pos, quote, specifier, end)) = self.from_specifier(clause_end) else {
            return Ok(false);
        };
        let end_stmt = self.statement_end(end);
        let import = ImportDecl {
            kind: ImportKind::ReExport,
            prefix: self.src[start..quote_pos].to_string(),
            quote: Some(quote as char),
            specifier: specifier.to_string(),
            suffix: self.src[end..end_stmt].to_string(),
            type_only,
            removed: false,
        };
        self.emit_import(start, import, end_stmt);
        self.expr_allowed = true;
        Ok(true)
    }

    /// `import("m")` / `require("m")` with a plain string argument.
    fn try_dynamic(&mut self, start: usize, after_keyword: usize) -> Result<bool> {
        let open = self.skip_ws_from(after_keyword);
        if self.at(open) != Some(b'(') {
            return Ok(false);
        }
        let quote_pos = self.skip_ws_from(open + 1);
        let Some((quote, specifier, end)) = self.quoted_at(quote_pos) else {
            return Ok(false);
        };
        let close = self.skip_ws_from(end);
        if self.at(close) != Some(b')') {
            return Ok(false);
        }
        let import = ImportDecl {
            kind: ImportKind::Dynamic,
            prefix: self.src[start..quote_pos].to_string(),
            quote: Some(quote as char),
            specifier: specifier.to_string(),
            suffix: self.src[end..=close].to_string(),
            type_only: false,
            removed: false,
        };
        self.emit_import(start, import, close + 1);
        self.expr_allowed = false;
        Ok(true)
    }

    fn scan_stylesheet(&mut self) -> Result<()> {
        let mut depth: Vec<usize> = Vec::new();
        loop {
            let Some(c) = self.peek(0) else {
                if let Some(at) = depth.last() {
                    return Err(self.error(*at, "unclosed '{'"));
                }
                return Ok(());
            };
            match c {
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                // SCSS/Less line comment; `url(http://...)` is not one
                b'/' if self.peek(1) == Some(b'/')
                    && (self.pos == 0 || self.bytes[self.pos - 1].is_ascii_whitespace()) =>
                {
                    self.skip_line_comment();
                }
                b'\'' | b'"' => self.skip_string(c)?,
                b'{' => {
                    depth.push(self.pos);
                    self.pos += 1;
                }
                b'}' => {
                    if depth.pop().is_none() {
                        return Err(self.error(self.pos, "unexpected '}'"));
                    }
                    self.pos += 1;
                }
                b'@' => {
                    let start = self.pos;
                    let word = self.word_at(start + 1);
                    self.pos += 1 + word.len();
                    if matches!(word, "import" | "use" | "forward") {
                        self.try_css_import(start)?;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    fn try_css_import(&mut self, start: usize) -> Result<()> {
        let p = self.skip_ws_from(self.pos);
        let (quote_pos, quote, specifier, end) = if let Some((q, s, e)) = self.quoted_at(p) {
            (p, Some(q as char), s, e)
        } else if self.src[p..].starts_with("url(") {
            let inner = self.skip_ws_from(p + 4);
            if let Some((q, s, e)) = self.quoted_at(inner) {
                (inner, Some(q as char), s, e)
            } else {
                let Some(close) = self.src[inner..].find(')') else {
                    return Err(self.error(start, "unterminated url()"));
                };
                let raw = self.src[inner..inner + close].trim_end();
                (inner, None, raw, inner + raw.len())
            }
        } else {
            return Ok(());
        };

        let mut stmt_end = self.src[end..].find([';', '\n']).map_or(self.src.len(), |i| end + i);
        if self.at(stmt_end) == Some(b';') {
            stmt_end += 1;
        }
        let import = ImportDecl {
            kind: ImportKind::Stylesheet,
            prefix: self.src[start..quote_pos].to_string(),
            quote,
            specifier: specifier.to_string(),
            suffix: self.src[end..stmt_end].to_string(),
            type_only: false,
            removed: false,
        };
        self.emit_import(start, import, stmt_end);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(module: &SourceModule) -> Vec<&str> {
        module.imports().map(|i| i.specifier.as_str()).collect()
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        let source = r#"import * as React from "react"
import { cn } from '@/lib/utils';
import type { VariantProps } from "class-variance-authority"
export { Slot } from "@radix-ui/react-slot";
export * as icons from './icons';
import './button.css';

const Lazy = React.lazy(() => import("./lazy"));
const legacy = require('./legacy');

export function Button({ className, ...props }: Props) {
  return <button className={cn("inline-flex", className)} {...props} />;
}
"#;
        let module = SourceModule::parse("ui/button.tsx", source).unwrap();
        assert_eq!(module.render(), source);
        assert_eq!(
            specifiers(&module),
            vec![
                "react",
                "@/lib/utils",
                "class-variance-authority",
                "@radix-ui/react-slot",
                "./icons",
                "./button.css",
                "./lazy",
                "./legacy"
            ]
        );
        let kinds: Vec<_> = module.imports().map(|i| i.kind).collect();
        assert_eq!(kinds[3], ImportKind::ReExport);
        assert_eq!(kinds[6], ImportKind::Dynamic);
        assert!(module.imports().nth(2).unwrap().type_only);
        assert!(!module.imports().nth(1).unwrap().type_only);
    }

    #[test]
    fn test_imports_inside_strings_comments_and_jsx_are_ignored() {
        let source = r#"// import a from "commented"
/* import b from "block" */
const s = "import c from 'string'";
const t = `import d from "${name}" ${`nested ${"import"}`}`;
const r = /import e from "regex"/g;
export const View = () => (
  <div title="it's fine">
    Don't import f from "text" here {value > 1 ? <b>yes</b> : null}
    <>fragment's text</>
  </div>
);
import real from "./real";
"#;
        let module = SourceModule::parse("view.jsx", source).unwrap();
        assert_eq!(specifiers(&module), vec!["./real"]);
        assert_eq!(module.render(), source);
    }

    #[test]
    fn test_division_is_not_a_regex() {
        let source = "const half = total / 2 / count;\nimport x from \"./x\";\n";
        let module = SourceModule::parse("math.ts", source).unwrap();
        assert_eq!(specifiers(&module), vec!["./x"]);
    }

    #[test]
    fn test_comparisons_in_ts_are_not_jsx() {
        let source = "if (a < b && c > d) { run() }\nimport y from './y'\n";
        let module = SourceModule::parse("cmp.ts", source).unwrap();
        assert_eq!(specifiers(&module), vec!["./y"]);
    }

    #[test]
    fn test_named_bindings() {
        let module = SourceModule::parse(
            "a.ts",
            "import Def, { type A, b as c, cn } from 'm';\nexport { x } from 'n';\n",
        )
        .unwrap();
        let first = module.imports().next().unwrap();
        assert_eq!(first.named_bindings(), vec!["A", "c", "cn"]);
    }

    #[test]
    fn test_local_exports_are_code() {
        let source = "const a = 1;\nexport { a };\nexport default a;\nexport type T = string;\n";
        let module = SourceModule::parse("a.ts", source).unwrap();
        assert_eq!(module.imports().count(), 0);
        assert_eq!(module.items.len(), 1);
    }

    #[test]
    fn test_stylesheet_imports() {
        let source = "@import \"./base.css\";\n@import url(theme.css) screen;\n@use 'sass:math';\n.a { color: red; }\n";
        let module = SourceModule::parse("styles/app.css", source).unwrap();
        assert_eq!(specifiers(&module), vec!["./base.css", "theme.css", "sass:math"]);
        assert_eq!(module.render(), source);
    }

    #[test]
    fn test_parse_errors_carry_location() {
        let err = SourceModule::parse("bad.ts", "const a = 1;\nconst s = 'open\n").unwrap_err();
        assert_eq!(
            err,
            CompkitError::ParseError {
                path: "bad.ts".into(),
                line: 2,
                reason: "unterminated string literal".into()
            }
        );

        let err = SourceModule::parse("bad.tsx", "function f() {\n  return (\n").unwrap_err();
        assert!(matches!(err, CompkitError::ParseError { .. }));

        let err = SourceModule::parse("bad.jsx", "const x = <div><span></div>").unwrap_err();
        assert!(matches!(err, CompkitError::ParseError { .. }));

        let err = SourceModule::parse("bad.ts", "a = `unterminated ${b}").unwrap_err();
        assert!(matches!(err, CompkitError::ParseError { line: 1, .. }));

        let err = SourceModule::parse("bad.css", ".a { color: red;").unwrap_err();
        assert!(matches!(err, CompkitError::ParseError { .. }));
    }

    #[test]
    fn test_opaque_files_pass_through() {
        let module = SourceModule::parse("README.md", "import x from 'y' `").unwrap();
        assert_eq!(module.language, Language::Opaque);
        assert_eq!(module.imports().count(), 0);
        assert_eq!(module.render(), "import x from 'y' `");
    }

    #[test]
    fn test_removed_import_takes_its_line() {
        let mut module =
            SourceModule::parse("a.ts", "import type { A } from './a';\nconst x = 1;\n").unwrap();
        module.imports_mut().for_each(|i| i.removed = true);
        assert_eq!(module.render(), "const x = 1;\n");
    }
}
