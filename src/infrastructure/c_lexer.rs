//! Lexer for C translation units
//!
//! Produces a flat token stream with byte spans, so that later stages can
//! slice the original text of whole definitions out of the source. Comments
//! are dropped. Preprocessor lines become a single `Directive` token each,
//! since the call-graph builder re-emits `#include`/`#define` lines verbatim.

use crate::domain::error::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    CharLit,
    StrLit,
    Punct,
    Directive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte range in the source.
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_word(&self, w: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == w
    }
}

/// Longest punctuators first.
const PUNCTUATORS: [&str; 48] = [
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "##", "+", "-", "*", "/", "%", "<", ">", "=", "!", "&", "|", "^", "~", "?",
    ":", ";", ",", ".", "(", ")", "{", "}", "[", "]", "#",
];

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    position: usize,
    line: usize,
    /// True until a non-blank character is seen on the current line.
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            position: 0,
            line: 1,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SourceError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.is_at_end() {
                break;
            }
            let token = if self.at_line_start && self.peek() == Some(b'#') {
                self.directive()
            } else {
                self.next_token()?
            };
            self.at_line_start = false;
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.position += 1;
        if b == b'\n' {
            self.line += 1;
            self.at_line_start = true;
        }
        Some(b)
    }

    fn error(&self, message: impl Into<String>) -> SourceError {
        SourceError::Lex {
            line: self.line,
            message: message.into(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), SourceError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                // Line splice outside a directive.
                (Some(b'\\'), Some(b'\n')) => {
                    self.advance();
                    self.advance();
                }
                (Some(b'/'), Some(b'/')) => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(SourceError::Lex {
                                    line: start_line,
                                    message: "unterminated block comment".to_string(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, line: usize) -> Token {
        Token {
            kind,
            text: self.src[start..self.position].to_string(),
            start,
            end: self.position,
            line,
        }
    }

    /// A whole preprocessor line, following backslash continuations.
    fn directive(&mut self) -> Token {
        let start = self.position;
        let line = self.line;
        while let Some(b) = self.peek() {
            if b == b'\\' && self.peek_at(1) == Some(b'\n') {
                self.advance();
                self.advance();
                continue;
            }
            if b == b'\n' {
                break;
            }
            self.advance();
        }
        let mut token = self.make(TokenKind::Directive, start, line);
        token.text = token.text.trim_end().to_string();
        token
    }

    fn next_token(&mut self) -> Result<Token, SourceError> {
        let start = self.position;
        let line = self.line;
        let b = self.peek().ok_or_else(|| self.error("unexpected end of file"))?;

        match b {
            b'"' => {
                self.quoted(b'"')?;
                Ok(self.make(TokenKind::StrLit, start, line))
            }
            b'\'' => {
                self.quoted(b'\'')?;
                Ok(self.make(TokenKind::CharLit, start, line))
            }
            b'0'..=b'9' => {
                self.number();
                Ok(self.make(TokenKind::Number, start, line))
            }
            b'.' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => {
                self.number();
                Ok(self.make(TokenKind::Number, start, line))
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                while let Some(b) = self.peek() {
                    if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                // Wide and UTF string/char prefixes: L"..", u8"..", U'..'
                let prefix = &self.src[start..self.position];
                if matches!(prefix, "L" | "u" | "U" | "u8") {
                    if let Some(q @ (b'"' | b'\'')) = self.peek() {
                        self.quoted(q)?;
                        let kind = if q == b'"' { TokenKind::StrLit } else { TokenKind::CharLit };
                        return Ok(self.make(kind, start, line));
                    }
                }
                Ok(self.make(TokenKind::Ident, start, line))
            }
            _ => {
                let rest = &self.src[self.position..];
                let punct = PUNCTUATORS
                    .iter()
                    .find(|p| rest.starts_with(**p))
                    .ok_or_else(|| self.error(format!("unexpected character {:?}", b as char)))?;
                for _ in 0..punct.len() {
                    self.advance();
                }
                Ok(self.make(TokenKind::Punct, start, line))
            }
        }
    }

    fn quoted(&mut self, quote: u8) -> Result<(), SourceError> {
        let line = self.line;
        self.advance();
        while let Some(b) = self.advance() {
            match b {
                b'\\' => {
                    self.advance();
                }
                b'\n' => break,
                _ if b == quote => return Ok(()),
                _ => {}
            }
        }
        Err(SourceError::Lex {
            line,
            message: "unterminated literal".to_string(),
        })
    }

    /// pp-number: digits, letters, `.`, `_` and signed exponents.
    fn number(&mut self) {
        while let Some(b) = self.peek() {
            if matches!(b, b'e' | b'E' | b'p' | b'P') && matches!(self.peek_at(1), Some(b'+' | b'-')) {
                self.advance();
                self.advance();
            } else if b.is_ascii_alphanumeric() || b == b'.' || b == b'_' {
                self.advance();
            } else {
                break;
            }
        }
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, SourceError> {
    Lexer::new(src).tokenize()
}
