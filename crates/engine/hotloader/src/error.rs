//! Error types for the hotloader runtime

use crate::expression::Operator;
use crate::lexer::Position;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for hotloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the hotloader
#[derive(Error, Debug)]
pub enum Error {
    /// Source text was rejected by the parser
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A committed expression could not be evaluated
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dotted path did not name a variable
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Type conversion error
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },

    /// Host tried to write a CONST variable
    #[error("Cannot assign to const variable \"{0}\"")]
    ConstAssignment(String),
}

/// Where in a source file something happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Path of the file being parsed
    pub file: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, bytes)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(file: impl Into<PathBuf>, position: Position) -> Self {
        Self {
            file: file.into(),
            line: position.line,
            column: position.column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// A positioned parse failure. The first one aborts the pass.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{location}: {kind}")]
pub struct ParseError {
    pub location: SourceLocation,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(file: &Path, position: Position, kind: ParseErrorKind) -> Self {
        Self {
            location: SourceLocation::new(file, position),
            kind,
        }
    }
}

/// What went wrong while parsing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A token that is not valid in the current parser mode
    #[error("Unexpected {0}")]
    UnexpectedToken(String),

    #[error("Unexpected use of symbol \"{0}\"")]
    ReservedWord(String),

    #[error("String literal did not terminate")]
    UnterminatedString,

    #[error("String literal is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid character {}", describe_byte(.0))]
    InvalidCharacter(u8),

    #[error("Cannot declare \"{0}\". Name already used elsewhere.")]
    DuplicateName(String),

    #[error("Unexpected end of expression scope")]
    UnbalancedScope,

    #[error("Expression scopes nested deeper than {0}")]
    ScopeTooDeep(usize),

    #[error("Incomplete expression")]
    IncompleteExpression,

    #[error("Class \"{0}\" not terminated")]
    UnterminatedClass(String),

    #[error("Unexpected end of class token")]
    UnexpectedEndOfClass,

    #[error("Cannot include file \"{}\". Does not exist.", .0.display())]
    MissingInclude(PathBuf),

    #[error("Unable to convert {digits} from base {base}")]
    BaseConversion { digits: String, base: u32 },

    #[error("Invalid variable name \"{0}\"")]
    InvalidVariableName(String),

    #[error("Literal {0} is too large")]
    LiteralTooLarge(String),

    #[error("Accessors must precede a variable declaration")]
    MisplacedAccessor,

    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,
}

fn describe_byte(byte: &u8) -> String {
    let byte = *byte;
    if byte.is_ascii_graphic() {
        format!("'{}'", byte as char)
    } else {
        format!("0x{byte:02X}")
    }
}

/// Failures raised while evaluating a committed expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Cannot resolve variable \"{0}\"")]
    Unresolved(String),

    #[error("Expression has no operands")]
    EmptyExpression,

    #[error("Variable \"{0}\" has no value")]
    Unassigned(String),

    #[error("Reference cycle through \"{0}\"")]
    Cycle(String),

    #[error("Evaluation exceeded depth {0}")]
    DepthExceeded(usize),

    #[error("Operator {op} cannot combine {left} and {right}")]
    TypeMismatch {
        op: Operator,
        left: &'static str,
        right: &'static str,
    },

    #[error("Operator {op} cannot be applied to {operand}")]
    UnaryTypeMismatch { op: Operator, operand: &'static str },

    #[error("Integer overflow in {0}")]
    Overflow(Operator),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Shift amount {0} out of range")]
    InvalidShift(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            Path::new("config/app.hl"),
            Position { line: 3, column: 7 },
            ParseErrorKind::UnbalancedScope,
        );
        assert_eq!(
            err.to_string(),
            "config/app.hl:3:7: Unexpected end of expression scope"
        );
    }

    #[test]
    fn test_invalid_character_display() {
        assert_eq!(
            ParseErrorKind::InvalidCharacter(b'$').to_string(),
            "Invalid character '$'"
        );
        assert_eq!(
            ParseErrorKind::InvalidCharacter(0xC3).to_string(),
            "Invalid character 0xC3"
        );
    }

    #[test]
    fn test_error_wraps_parse_error() {
        let err: Error = ParseError::new(
            Path::new("a.hl"),
            Position { line: 1, column: 1 },
            ParseErrorKind::UnexpectedEndOfClass,
        )
        .into();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.to_string(), "a.hl:1:1: Unexpected end of class token");
    }
}
