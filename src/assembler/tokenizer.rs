//! Streaming character-by-character lexer for assembly source.
//!
//! Bare identifiers always lex as [`TokenKind::Label`]; the assembler
//! reclassifies them to [`TokenKind::Opcode`]/[`TokenKind::Target`] by
//! exact string match via [`classify`] once lexing is done for that token.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    Label(String),
    Opcode(String),
    Target(String),
    Number(i64),
    CharLiteral(u8),
    Str(String),
    Comment,
    Punct(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Label(s) => write!(f, "LABEL \"{s}\""),
            TokenKind::Opcode(s) => write!(f, "OPCODE \"{s}\""),
            TokenKind::Target(s) => write!(f, "TARGET \"{s}\""),
            TokenKind::Number(v) => write!(f, "NUMBER {v}"),
            TokenKind::CharLiteral(c) => write!(f, "CHAR_LITERAL '{}'", *c as char),
            TokenKind::Str(s) => write!(f, "STRING \"{s}\""),
            TokenKind::Comment => write!(f, "COMMENT"),
            TokenKind::Punct(s) => write!(f, "PUNCT \"{s}\""),
        }
    }
}

/// Maximum lexeme length before a token's text is truncated with a warning.
pub const MAX_TOKEN_LEN: usize = 255;

#[derive(Debug)]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

pub struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    _src: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Tokenizer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            _src: src,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' || c == '\r' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Produce the next token, or a [`LexError`] on malformed input.
    pub fn next(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let line = self.line;

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        if c == ';' {
            while !matches!(self.peek(), None | Some('\n')) {
                self.bump();
            }
            return Ok(Token {
                kind: TokenKind::Comment,
                line,
            });
        }

        if c.is_alphabetic() || c == '_' {
            let text = self.lex_identifier();
            // An immediately-following ':' is a label-definition marker;
            // it is consumed here and never surfaces as its own token —
            // whether this token is a definition or a reference is
            // decided positionally by the assembler, not by the lexer.
            if self.peek() == Some(':') {
                self.bump();
            }
            return Ok(Token {
                kind: TokenKind::Label(text),
                line,
            });
        }

        if c.is_ascii_digit() {
            return self.lex_number(line);
        }

        if c == '\'' {
            return self.lex_char_literal(line);
        }

        if c == '"' {
            return self.lex_string(line);
        }

        self.lex_punct(line)
    }

    fn lex_identifier(&mut self) -> String {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            let c = self.bump().unwrap();
            if text.len() < MAX_TOKEN_LEN {
                text.push(c);
            }
        }
        text
    }

    fn lex_number(&mut self, line: u32) -> Result<Token, LexError> {
        let mut text = String::new();
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                text.push(self.bump().unwrap());
            }
            let value = i64::from_str_radix(&text[2..], 16).map_err(|_| LexError {
                line,
                message: format!("malformed hex literal \"{text}\""),
            })?;
            return Ok(Token {
                kind: TokenKind::Number(value),
                line,
            });
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        let value = text.parse::<i64>().map_err(|_| LexError {
            line,
            message: format!("malformed number literal \"{text}\""),
        })?;
        Ok(Token {
            kind: TokenKind::Number(value),
            line,
        })
    }

    fn decode_escape(&mut self, line: u32) -> Result<u8, LexError> {
        let c = self.bump().ok_or(LexError {
            line,
            message: "unterminated escape sequence".into(),
        })?;
        Ok(match c {
            'a' => 0x07,
            'b' => 0x08,
            'e' => 0x1B,
            'f' => 0x0C,
            'n' => b'\n',
            'r' => b'\r',
            't' => b'\t',
            'v' => 0x0B,
            '\\' => b'\\',
            '\'' => b'\'',
            '"' => b'"',
            '?' => b'?',
            other => {
                return Err(LexError {
                    line,
                    message: format!("unknown escape sequence \"\\{other}\""),
                });
            }
        })
    }

    fn lex_char_literal(&mut self, line: u32) -> Result<Token, LexError> {
        self.bump(); // opening '
        let c = self.peek().ok_or(LexError {
            line,
            message: "unterminated char literal".into(),
        })?;
        let byte = if c == '\\' {
            self.bump();
            self.decode_escape(line)?
        } else {
            self.bump();
            if !c.is_ascii() {
                return Err(LexError {
                    line,
                    message: "char literal must be ASCII".into(),
                });
            }
            c as u8
        };
        match self.bump() {
            Some('\'') => Ok(Token {
                kind: TokenKind::CharLiteral(byte),
                line,
            }),
            _ => Err(LexError {
                line,
                message: "unterminated char literal, expected closing '".into(),
            }),
        }
    }

    fn lex_string(&mut self, line: u32) -> Result<Token, LexError> {
        self.bump(); // opening "
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        line,
                        message: "unterminated string literal".into(),
                    });
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    out.push(self.decode_escape(line)? as char);
                }
                Some(c) => {
                    self.bump();
                    out.push(c);
                }
            }
        }
        if out.len() > MAX_TOKEN_LEN {
            out.truncate(MAX_TOKEN_LEN);
        }
        Ok(Token {
            kind: TokenKind::Str(out),
            line,
        })
    }

    fn lex_punct(&mut self, line: u32) -> Result<Token, LexError> {
        let c = self.bump().unwrap();
        let double = match (c, self.peek()) {
            ('<', Some('=')) | ('>', Some('=')) | ('=', Some('=')) | ('!', Some('='))
            | ('+', Some('=')) | ('-', Some('=')) | ('*', Some('=')) | ('/', Some('=')) => {
                let second = self.bump().unwrap();
                Some(format!("{c}{second}"))
            }
            _ => None,
        };
        if let Some(text) = double {
            return Ok(Token {
                kind: TokenKind::Punct(text),
                line,
            });
        }
        match c {
            '.' | ',' | ':' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '-' | '*' | '/'
            | '!' | '@' | '#' | '$' | '%' | '^' | '&' | '?' | '~' | '<' | '>' | '=' => {
                Ok(Token {
                    kind: TokenKind::Punct(c.to_string()),
                    line,
                })
            }
            other => Err(LexError {
                line,
                message: format!("unexpected character '{other}'"),
            }),
        }
    }
}

/// Reclassify a provisional `Label` token into `Opcode`/`Target` by exact
/// string match, the way the assembler does after every lex call.
pub fn classify(token: Token) -> Token {
    match &token.kind {
        TokenKind::Label(name) => {
            if crate::encoding::Opcode::from_name(name).is_some() {
                Token {
                    kind: TokenKind::Opcode(name.clone()),
                    line: token.line,
                }
            } else if crate::encoding::Target::from_name(name).is_some() {
                Token {
                    kind: TokenKind::Target(name.clone()),
                    line: token.line,
                }
            } else {
                token
            }
        }
        _ => token,
    }
}

/// Lex the entire source and render a debug dump, one line per token, in
/// the style printed when assembly fails.
pub fn dump(src: &str) -> String {
    let mut tok = Tokenizer::new(src);
    let mut out = String::new();
    loop {
        let next = match tok.next() {
            Ok(t) => classify(t),
            Err(e) => {
                out.push_str(&format!("line {}: lex error: {}\n", e.line, e.message));
                break;
            }
        };
        let is_eof = matches!(next.kind, TokenKind::Eof);
        out.push_str(&format!("line {}: {}\n", next.line, next));
        if is_eof {
            break;
        }
    }
    out
}
