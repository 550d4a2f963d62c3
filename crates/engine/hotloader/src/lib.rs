//! Hot-reloadable configuration language for Crossworld
//!
//! This crate provides:
//! - **Lexer/Parser**: A byte scanner and mode-driven parser for the
//!   `.hl` configuration language
//! - **Class graph**: Nested namespaces of variables holding lazily
//!   evaluated expressions
//! - **Hotloader**: A file registry that reconciles the graph on every
//!   reload, pruning declarations and includes that disappeared
//!
//! # Example
//!
//! ```rust,ignore
//! use hotloader::Hotloader;
//!
//! let mut loader = Hotloader::new();
//! let main = loader.add_file("config/main.hl");
//! let report = loader.load(&main, &std::fs::read("config/main.hl")?)?;
//!
//! // Included files are registered but loaded by the host
//! for file in report.included {
//!     loader.load(&file, &std::fs::read(file.path())?)?;
//! }
//!
//! // Variable handles stay valid across reloads
//! let seed = loader.lookup("World.Terrain.seed").unwrap();
//! seed.on_change(|v| println!("{} changed", v.path()));
//! let value = seed.evaluate()?.as_i64()?;
//! ```

mod class;
mod config;
mod error;
mod expression;
mod file;
mod hotloader;
mod lexer;
mod parser;
mod value;
mod variable;

pub use class::{Class, ClassRef, Member, GLOBAL_CLASS_NAME};
pub use config::{HotloaderConfig, DEFAULT_MAX_EVAL_DEPTH, DEFAULT_MAX_SCOPE_DEPTH};
pub use error::{Error, EvalError, ParseError, ParseErrorKind, Result, SourceLocation};
pub use expression::{Expression, Operand, OperandKind, Operator};
pub use file::{File, FileRef};
pub use hotloader::{Hotloader, LoadReport, Removed};
pub use lexer::{is_valid_name, Control, Lexer, Position, Spanned, Token};
pub use value::Value;
pub use variable::{Accessor, ChangeListener, Variable, VariableRef};
