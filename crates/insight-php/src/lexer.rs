//! Lexical analysis for PHP source files.
//!
//! The lexer produces the structural tokens the outline parser needs: names,
//! variables, braces, parentheses and a handful of operators. Whitespace,
//! comments, string bodies and inline HTML never produce structural tokens,
//! so a `{` inside a string or comment cannot unbalance the parser.
//!
//! # Design Principles
//!
//! - **Never panic**: every slice is taken at a character boundary
//! - **Precise spans**: every token carries its byte range in the file
//! - **Fail loudly on truncation**: an unterminated string, comment or
//!   heredoc is a [`LexError`] naming where it started
//!
//! # Example
//!
//! ```
//! use insight_php::lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("<?php new \\Foo\\Bar();").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::OpenTag);
//! assert_eq!(tokens[2].kind, TokenKind::Name);
//! ```

use std::fmt;

use insight_core::span::Span;

/// Kind of a structural token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Text outside `<?php ... ?>`.
    InlineHtml,
    /// `<?php`, `<?=` or `<?`.
    OpenTag,
    /// `?>`.
    CloseTag,
    /// Identifier or keyword, possibly qualified: `Foo`, `A\B`, `\A\B`, `namespace\A`.
    Name,
    /// `$name`.
    Variable,
    /// Quoted string, backtick command, heredoc or nowdoc.
    String,
    /// Numeric literal.
    Number,
    /// `\` not followed by a name (group-use prefix `A\{`).
    Backslash,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semicolon,
    Comma,
    Colon,
    /// `::`.
    DoubleColon,
    /// `->` or `?->`.
    Arrow,
    /// `#[`.
    AttributeStart,
    /// Any other punctuation.
    Other,
}

/// A token with its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// The token text.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.span.as_range()).unwrap_or("")
    }
}

/// What was left unterminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedComment,
    UnterminatedHeredoc,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LexErrorKind::UnterminatedString => "unterminated string",
            LexErrorKind::UnterminatedComment => "unterminated comment",
            LexErrorKind::UnterminatedHeredoc => "unterminated heredoc",
        };
        write!(f, "{}", s)
    }
}

/// A lexing failure; `offset` is where the construct started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Html,
    Php,
}

/// Streaming PHP lexer.
///
/// Yields `Result<Token, LexError>`; after the first error it yields nothing.
pub struct Lexer<'src> {
    source: &'src str,
    position: usize,
    mode: Mode,
    failed: bool,
}

impl fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.position)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Tokenize a whole file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

pub(crate) fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

impl<'src> Lexer<'src> {
    /// Creates a lexer positioned at the start of `source`, in HTML mode.
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            position: 0,
            mode: Mode::Html,
            failed: false,
        }
    }

    fn rest(&self) -> &'src str {
        self.source.get(self.position..).unwrap_or("")
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn advance_by(&mut self, bytes: usize) {
        self.position = (self.position + bytes).min(self.source.len());
    }

    fn advance_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(&predicate) {
            self.advance();
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    fn error(&mut self, kind: LexErrorKind, offset: usize) -> LexError {
        self.failed = true;
        LexError { kind, offset }
    }

    /// Length of an open tag at the current position, if any.
    fn open_tag_len(&self) -> Option<usize> {
        let rest = self.rest();
        if let Some(head) = rest.get(..5) {
            if head.eq_ignore_ascii_case("<?php")
                && rest[5..].chars().next().is_none_or(|c| c.is_ascii_whitespace())
            {
                return Some(5);
            }
        }
        if rest.starts_with("<?=") {
            return Some(3);
        }
        None
    }

    fn lex_html(&mut self) -> Option<Token> {
        let start = self.position;
        loop {
            if self.position >= self.source.len() {
                self.mode = Mode::Php;
                return (self.position > start).then(|| self.token(TokenKind::InlineHtml, start));
            }
            if let Some(len) = self.open_tag_len().or_else(|| {
                let rest = self.rest();
                let short = rest.starts_with("<?")
                    && rest[2..].chars().next().is_none_or(|c| c.is_ascii_whitespace());
                short.then_some(2)
            }) {
                if self.position > start {
                    return Some(self.token(TokenKind::InlineHtml, start));
                }
                self.advance_by(len);
                self.mode = Mode::Php;
                return Some(self.token(TokenKind::OpenTag, start));
            }
            match self.rest().find('<') {
                Some(0) => {
                    self.advance();
                }
                Some(n) => self.advance_by(n),
                None => self.position = self.source.len(),
            }
        }
    }

    /// Skip whitespace and comments. Stops before `?>` inside a line comment.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            let rest = self.rest();
            if rest.starts_with(|c: char| c.is_ascii_whitespace()) {
                self.advance_while(|c| c.is_ascii_whitespace());
            } else if rest.starts_with("//") || (rest.starts_with('#') && !rest.starts_with("#[")) {
                self.skip_line_comment();
            } else if rest.starts_with("/*") {
                let start = self.position;
                match rest[2..].find("*/") {
                    Some(end) => self.advance_by(2 + end + 2),
                    None => return Err(self.error(LexErrorKind::UnterminatedComment, start)),
                }
            } else {
                return Ok(());
            }
        }
    }

    fn skip_line_comment(&mut self) {
        let rest = self.rest();
        let newline = rest.find('\n').unwrap_or(rest.len());
        let close = rest.find("?>").unwrap_or(rest.len());
        self.advance_by(newline.min(close));
    }

    fn lex_quoted(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.position;
        self.advance();
        loop {
            match self.advance() {
                None => return Err(self.error(LexErrorKind::UnterminatedString, start)),
                Some('\\') => {
                    self.advance();
                }
                Some(c) if c == quote => return Ok(self.token(TokenKind::String, start)),
                Some(_) => {}
            }
        }
    }

    /// Heredoc or nowdoc starting at `<<<`. Returns `None` if the text after
    /// `<<<` is not a heredoc label.
    fn lex_heredoc(&mut self) -> Option<Result<Token, LexError>> {
        let start = self.position;
        let after = self.rest().get(3..)?;
        let trimmed = after.trim_start_matches([' ', '\t']);
        let label_part = trimmed.trim_start_matches(['"', '\'']);
        if !label_part.starts_with(is_name_start) {
            return None;
        }
        let label_len = label_part
            .find(|c: char| !is_name_continue(c))
            .unwrap_or(label_part.len());
        let label = &label_part[..label_len];

        let header = after.find('\n')?;
        let body_start = start + 3 + header + 1;
        let body = self.source.get(body_start..).unwrap_or("");

        let mut line_start = 0;
        for line in body.split_inclusive('\n') {
            let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
            let candidate = &line[indent..];
            if let Some(tail) = candidate.strip_prefix(label) {
                if !tail.starts_with(is_name_continue) {
                    self.position = body_start + line_start + indent + label.len();
                    return Some(Ok(self.token(TokenKind::String, start)));
                }
            }
            line_start += line.len();
        }
        Some(Err(self.error(LexErrorKind::UnterminatedHeredoc, start)))
    }

    fn lex_name_tail(&mut self) {
        loop {
            self.advance_while(is_name_continue);
            if self.peek_char() == Some('\\') && self.peek_char_n(1).is_some_and(is_name_start) {
                self.advance();
            } else {
                return;
            }
        }
    }

    fn lex_php(&mut self) -> Option<Result<Token, LexError>> {
        if let Err(e) = self.skip_trivia() {
            return Some(Err(e));
        }
        let start = self.position;
        let rest = self.rest();
        let c = self.peek_char()?;

        let simple = |lexer: &mut Self, len: usize, kind: TokenKind| -> Option<Result<Token, LexError>> {
            lexer.advance_by(len);
            Some(Ok(lexer.token(kind, start)))
        };

        match c {
            '?' if rest.starts_with("?>") => {
                self.advance_by(2);
                self.mode = Mode::Html;
                Some(Ok(self.token(TokenKind::CloseTag, start)))
            }
            '?' if rest.starts_with("?->") => simple(self, 3, TokenKind::Arrow),
            '-' if rest.starts_with("->") => simple(self, 2, TokenKind::Arrow),
            ':' if rest.starts_with("::") => simple(self, 2, TokenKind::DoubleColon),
            ':' => simple(self, 1, TokenKind::Colon),
            '#' => simple(self, 2, TokenKind::AttributeStart),
            '{' => simple(self, 1, TokenKind::LBrace),
            '}' => simple(self, 1, TokenKind::RBrace),
            '(' => simple(self, 1, TokenKind::LParen),
            ')' => simple(self, 1, TokenKind::RParen),
            ';' => simple(self, 1, TokenKind::Semicolon),
            ',' => simple(self, 1, TokenKind::Comma),
            '\'' | '"' | '`' => Some(self.lex_quoted(c)),
            '<' if rest.starts_with("<<<") => match self.lex_heredoc() {
                Some(result) => Some(result),
                None => simple(self, 3, TokenKind::Other),
            },
            '$' if self.peek_char_n(1).is_some_and(is_name_start) => {
                self.advance();
                self.advance_while(is_name_continue);
                Some(Ok(self.token(TokenKind::Variable, start)))
            }
            '\\' if self.peek_char_n(1).is_some_and(is_name_start) => {
                self.advance();
                self.lex_name_tail();
                Some(Ok(self.token(TokenKind::Name, start)))
            }
            '\\' => simple(self, 1, TokenKind::Backslash),
            c if is_name_start(c) => {
                self.lex_name_tail();
                Some(Ok(self.token(TokenKind::Name, start)))
            }
            c if c.is_ascii_digit() => {
                self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                Some(Ok(self.token(TokenKind::Number, start)))
            }
            _ => {
                self.advance();
                Some(Ok(self.token(TokenKind::Other, start)))
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.mode {
                Mode::Html => {
                    if let Some(token) = self.lex_html() {
                        return Some(Ok(token));
                    }
                }
                Mode::Php => return self.lex_php(),
            }
        }
    }
}
