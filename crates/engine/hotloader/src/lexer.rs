//! Byte scanner for hotloader source
//!
//! The lexer walks a borrowed byte slice by index and produces three kinds of
//! tokens:
//! - **Blocks**: runs of name characters (`A-Z a-z 0-9 _ .`)
//! - **Literals**: double-quoted strings with backslash escapes
//! - **Controls**: single-byte structural symbols and operators
//!
//! Whitespace and `#` comments are consumed silently. Any other byte is an
//! invalid character.

use crate::error::ParseErrorKind;
use crate::expression::Operator;

/// Line/column of a byte in the source (both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A value tagged with the position of its first byte
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub position: Position,
}

/// Structural symbols recognised outside literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// `:` opens a class declaration
    Colon,
    /// `=` starts an assignment
    Assign,
    /// `;` ends an assignment
    Semicolon,
    /// `(`
    OpenScope,
    /// `)`
    CloseScope,
    /// One of the arithmetic/bitwise operator symbols
    Operator(Operator),
}

impl Control {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b':' => Some(Control::Colon),
            b'=' => Some(Control::Assign),
            b';' => Some(Control::Semicolon),
            b'(' => Some(Control::OpenScope),
            b')' => Some(Control::CloseScope),
            _ => Operator::from_byte(byte).map(Control::Operator),
        }
    }
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Contiguous name characters
    Block(&'a str),
    /// Contents of a string literal with escapes removed
    Literal(String),
    Control(Control),
}

pub type LexResult<T> = std::result::Result<T, Spanned<ParseErrorKind>>;

/// Whether `byte` may appear in a block
pub fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Whether every byte of `name` is a name character
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_name_byte)
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

/// Index-based scanner over a byte slice
pub struct Lexer<'a> {
    bytes: &'a [u8],
    index: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            index: 0,
            line: 1,
            column: 0,
        }
    }

    /// Position the next consumed byte will report
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.index += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> LexResult<Option<Spanned<Token<'a>>>> {
        while let Some(byte) = self.peek() {
            let position = self.position();

            if is_whitespace(byte) {
                self.bump();
                continue;
            }

            if is_name_byte(byte) {
                let block = self.read_block(position)?;
                return Ok(Some(Spanned {
                    value: Token::Block(block),
                    position,
                }));
            }

            match byte {
                b'#' => self.skip_comment(),
                b'"' => {
                    let literal = self.read_literal(position)?;
                    return Ok(Some(Spanned {
                        value: Token::Literal(literal),
                        position,
                    }));
                }
                _ => {
                    let Some(control) = Control::from_byte(byte) else {
                        return Err(Spanned {
                            value: ParseErrorKind::InvalidCharacter(byte),
                            position,
                        });
                    };
                    self.bump();
                    return Ok(Some(Spanned {
                        value: Token::Control(control),
                        position,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn read_block(&mut self, position: Position) -> LexResult<&'a str> {
        let start = self.index;
        while self.peek().is_some_and(is_name_byte) {
            self.bump();
        }
        // name bytes are ASCII so this only fails if the scanner is broken
        std::str::from_utf8(&self.bytes[start..self.index]).map_err(|_| Spanned {
            value: ParseErrorKind::InvalidUtf8,
            position,
        })
    }

    /// Consume up to, but not including, the next line terminator
    fn skip_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn read_literal(&mut self, position: Position) -> LexResult<String> {
        let unterminated = || Spanned {
            value: ParseErrorKind::UnterminatedString,
            position,
        };

        // opening quote
        self.bump();

        let mut buffer = Vec::new();
        loop {
            match self.bump() {
                None => return Err(unterminated()),
                Some(b'\\') => buffer.push(self.bump().ok_or_else(unterminated)?),
                Some(b'"') => break,
                Some(byte) => buffer.push(byte),
            }
        }

        String::from_utf8(buffer).map_err(|_| Spanned {
            value: ParseErrorKind::InvalidUtf8,
            position,
        })
    }
}
