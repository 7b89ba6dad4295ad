//! Expression lexer
//!
//! Produces an ordered token sequence terminated by `Eof`. Every token
//! carries its byte offset plus 1-based line and column for diagnostics.
//! An `Error` token aborts tokenization and is the last token emitted.
//!
//! Identifiers may contain `:`, `-`, `$` and `@` so that dynamic
//! references like `@dynamic(request.headers):x-video-codec` lex as a
//! single token (including the parenthesized path); the parser and the
//! dynamic resolver split them later. The flip side is that record fields
//! themselves must be snake_case.

/// Token kind. All action keywords (`SET`, `SET_IF_EMPTY`, `APPEND`,
/// `REMOVE`, `DELETE`) emit `Set` with the original word retained as the
/// token value; the parser distinguishes them by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    String,
    Number,
    /// `=`
    Equals,
    /// `!=` (normally rewritten by the preprocessor; kept for raw input)
    NotEquals,
    /// `?=`
    SetIfEmptyAssign,
    /// `+=`
    AppendAssign,
    /// `-=`
    RemoveAssign,
    LeftParen,
    RightParen,
    Comma,
    And,
    Or,
    Not,
    Set,
    Error,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub position: usize,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is_error(&self) -> bool {
        self.kind == TokenKind::Error
    }
}

struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    src: &'a str,
    index: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().collect(),
            src,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).map(|(_, c)| *c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.index)
            .map(|(pos, _)| *pos)
            .unwrap_or(self.src.len())
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = *self.chars.get(self.index)?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn token(&self, kind: TokenKind, value: String, position: usize, line: u32, column: u32) -> Token {
        Token {
            kind,
            value,
            position,
            line,
            column,
        }
    }

    fn is_identifier_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_' || c == '@' || c == '$'
    }

    fn is_identifier_continue(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-' || c == '$' || c == '@'
    }

    fn next_token(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }

        let position = self.position();
        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, String::new(), position, line, column);
        };

        match c {
            '(' => {
                self.advance();
                self.token(TokenKind::LeftParen, "(".to_string(), position, line, column)
            }
            ')' => {
                self.advance();
                self.token(TokenKind::RightParen, ")".to_string(), position, line, column)
            }
            ',' => {
                self.advance();
                self.token(TokenKind::Comma, ",".to_string(), position, line, column)
            }
            '=' => {
                self.advance();
                self.token(TokenKind::Equals, "=".to_string(), position, line, column)
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.token(TokenKind::NotEquals, "!=".to_string(), position, line, column)
                } else {
                    self.token(
                        TokenKind::Error,
                        "unexpected character '!'".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '?' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.token(TokenKind::SetIfEmptyAssign, "?=".to_string(), position, line, column)
                } else {
                    self.token(
                        TokenKind::Error,
                        "unexpected character '?'".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '+' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.token(TokenKind::AppendAssign, "+=".to_string(), position, line, column)
                } else {
                    self.token(
                        TokenKind::Error,
                        "unexpected character '+'".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '-' => {
                // A '-' immediately before a digit is a negative number;
                // otherwise it must be '-='.
                if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                    self.lex_number(position, line, column)
                } else {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.token(TokenKind::RemoveAssign, "-=".to_string(), position, line, column)
                    } else {
                        self.token(
                            TokenKind::Error,
                            "unexpected character '-'".to_string(),
                            position,
                            line,
                            column,
                        )
                    }
                }
            }
            '"' | '\'' => self.lex_string(position, line, column),
            c if c.is_ascii_digit() => self.lex_number(position, line, column),
            c if Self::is_identifier_start(c) => self.lex_identifier(position, line, column),
            other => {
                self.advance();
                self.token(
                    TokenKind::Error,
                    format!("unexpected character '{other}'"),
                    position,
                    line,
                    column,
                )
            }
        }
    }

    fn lex_string(&mut self, position: usize, line: u32, column: u32) -> Token {
        let quote = self.advance().expect("caller saw the quote");
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    // Error reported at the opening quote.
                    return self.token(
                        TokenKind::Error,
                        "unterminated string".to_string(),
                        position,
                        line,
                        column,
                    );
                }
                Some(c) if c == quote => {
                    return self.token(TokenKind::String, value, position, line, column);
                }
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some(other) => value.push(other),
                    None => {
                        return self.token(
                            TokenKind::Error,
                            "unterminated string".to_string(),
                            position,
                            line,
                            column,
                        );
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_number(&mut self, position: usize, line: u32, column: u32) -> Token {
        let mut value = String::new();
        if self.peek() == Some('-') {
            value.push('-');
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            value.push(self.advance().expect("digit peeked"));
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            value.push('.');
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                value.push(self.advance().expect("digit peeked"));
            }
        }
        self.token(TokenKind::Number, value, position, line, column)
    }

    fn lex_identifier(&mut self, position: usize, line: u32, column: u32) -> Token {
        let starts_with_at = self.peek() == Some('@');
        let mut had_parenthesized_path = false;
        let mut value = String::new();
        value.push(self.advance().expect("caller saw the start char"));

        while let Some(c) = self.peek() {
            if Self::is_identifier_continue(c) {
                value.push(c);
                self.advance();
            } else if c == '(' && starts_with_at && !had_parenthesized_path {
                // Dynamic reference path: consume through the closing ')'.
                value.push(c);
                self.advance();
                while let Some(inner) = self.peek() {
                    if inner.is_whitespace() {
                        break;
                    }
                    value.push(inner);
                    self.advance();
                    if inner == ')' {
                        break;
                    }
                }
                had_parenthesized_path = true;
            } else {
                break;
            }
        }

        let kind = match value.as_str() {
            "AND" | "and" => TokenKind::And,
            "OR" | "or" => TokenKind::Or,
            "NOT" | "not" => TokenKind::Not,
            "SET" | "set" | "SET_IF_EMPTY" | "set_if_empty" | "APPEND" | "append" | "REMOVE"
            | "remove" | "DELETE" | "delete" => TokenKind::Set,
            _ => TokenKind::Identifier,
        };

        self.token(kind, value, position, line, column)
    }
}

/// Tokenize an expression. The returned sequence ends with either an
/// `Eof` token or a single `Error` token that aborted tokenization.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token();
        let done = matches!(token.kind, TokenKind::Eof | TokenKind::Error);
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}
