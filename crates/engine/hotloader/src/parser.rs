//! Parser state machine
//!
//! Consumes lexer tokens and applies them to the class graph as it goes.
//! The parser is always in exactly one [`Mode`]; accessor keywords are
//! collected separately until the variable they modify is declared.
//!
//! | Token              | Mode       | Effect                                  |
//! |--------------------|------------|-----------------------------------------|
//! | `:`                | None       | expect a class name                     |
//! | name               | Class      | open (or reopen) the class              |
//! | name               | None       | declare the variable                    |
//! | `=`                | Variable   | start the expression                    |
//! | operand / operator | Assignment | extend the expression                   |
//! | `(` / `)`          | Assignment | push / pop a nested scope               |
//! | `;`                | Assignment | commit the expression                   |
//! | `end`              | None       | close the current class                 |
//! | `static` / `const` | None       | collect an accessor                     |
//! | `include "path"`   | None       | record the include                      |
//!
//! The first error aborts the pass. Graph changes made before the error are
//! kept; only the file's reconciliation lists are left untouched.

use crate::class::ClassRef;
use crate::error::{ParseError, ParseErrorKind};
use crate::expression::{Expression, OperandKind};
use crate::file::FileRef;
use crate::hotloader::Hotloader;
use crate::lexer::{Control, Lexer, Position, Spanned, Token};
use crate::variable::{Accessor, Variable, VariableRef};
use std::rc::Rc;

type StepResult = std::result::Result<(), ParseErrorKind>;

/// What the parser expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    Class,
    Variable,
    Assignment,
    Include,
}

/// Reserved words, matched exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Include,
    Static,
    Const,
    End,
    True,
    False,
}

impl Keyword {
    fn from_block(block: &str) -> Option<Self> {
        match block {
            "include" => Some(Keyword::Include),
            "static" => Some(Keyword::Static),
            "const" => Some(Keyword::Const),
            "end" => Some(Keyword::End),
            "true" => Some(Keyword::True),
            "false" => Some(Keyword::False),
            _ => None,
        }
    }
}

/// Everything a successful pass produced for its file
#[derive(Debug, Default)]
pub(crate) struct Pass {
    /// Live variables declared by the file, in declaration order
    pub variables: Vec<VariableRef>,
    /// Files included by the file, in include order
    pub includes: Vec<FileRef>,
    /// Files that did not exist before this pass
    pub created: Vec<FileRef>,
}

pub(crate) struct Parser<'h> {
    loader: &'h mut Hotloader,
    file: FileRef,
    mode: Mode,
    accessors: Accessor,
    class: ClassRef,
    variable: Option<VariableRef>,
    /// In-progress expressions; the root assignment is at the bottom
    scopes: Vec<Expression>,
    /// An include path was just read, so a `;` may close the statement
    include_closed: bool,
    pass: Pass,
}

impl<'h> Parser<'h> {
    pub(crate) fn new(loader: &'h mut Hotloader, file: FileRef) -> Self {
        let class = loader.global();
        Self {
            loader,
            file,
            mode: Mode::None,
            accessors: Accessor::NONE,
            class,
            variable: None,
            scopes: Vec::new(),
            include_closed: false,
            pass: Pass::default(),
        }
    }

    pub(crate) fn parse(mut self, bytes: &[u8]) -> std::result::Result<Pass, ParseError> {
        let mut lexer = Lexer::new(bytes);
        loop {
            let token = match lexer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => break,
                Err(err) => return Err(self.error(err.position, err.value)),
            };
            let position = token.position;
            self.handle(token)
                .map_err(|kind| self.error(position, kind))?;
        }
        let end = lexer.position();
        self.finish().map_err(|kind| self.error(end, kind))?;
        Ok(self.pass)
    }

    fn error(&self, position: Position, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.file.path(), position, kind)
    }

    fn handle(&mut self, token: Spanned<Token<'_>>) -> StepResult {
        let position = token.position;
        let include_closed = std::mem::take(&mut self.include_closed);
        match token.value {
            Token::Block(block) => self.handle_block(block, position),
            Token::Literal(text) => self.handle_literal(text, position),
            Token::Control(Control::Semicolon) if include_closed && self.mode == Mode::None => {
                Ok(())
            }
            Token::Control(control) => self.handle_control(control, position),
        }
    }

    fn expect_mode(&self, mode: Mode, what: &str) -> StepResult {
        if self.mode == mode {
            Ok(())
        } else {
            Err(ParseErrorKind::UnexpectedToken(what.to_string()))
        }
    }

    fn reject_accessors(&self) -> StepResult {
        if self.accessors.is_empty() {
            Ok(())
        } else {
            Err(ParseErrorKind::MisplacedAccessor)
        }
    }

    fn current(&mut self) -> std::result::Result<&mut Expression, ParseErrorKind> {
        self.scopes
            .last_mut()
            .ok_or(ParseErrorKind::UnbalancedScope)
    }

    fn handle_block(&mut self, block: &str, position: Position) -> StepResult {
        match Keyword::from_block(block) {
            Some(Keyword::Include) => {
                self.expect_mode(Mode::None, "include")?;
                self.reject_accessors()?;
                self.mode = Mode::Include;
                Ok(())
            }
            Some(keyword @ (Keyword::Static | Keyword::Const)) => {
                self.expect_mode(Mode::None, "accessor")?;
                self.accessors |= if keyword == Keyword::Static {
                    Accessor::STATIC
                } else {
                    Accessor::CONST
                };
                Ok(())
            }
            Some(Keyword::End) => {
                if self.mode != Mode::None {
                    return Err(ParseErrorKind::UnexpectedEndOfClass);
                }
                self.reject_accessors()?;
                self.class = self
                    .class
                    .parent()
                    .ok_or(ParseErrorKind::UnexpectedEndOfClass)?;
                Ok(())
            }
            Some(Keyword::True | Keyword::False) if self.mode != Mode::Assignment => {
                Err(ParseErrorKind::ReservedWord(block.to_string()))
            }
            _ => match self.mode {
                Mode::Class => self.declare_class(block),
                Mode::None => self.declare_variable(block),
                Mode::Assignment => {
                    let kind = OperandKind::from_block(block)?;
                    self.current()?.push_operand(kind, position)
                }
                Mode::Variable => Err(ParseErrorKind::UnexpectedToken(format!(
                    "variable declaration \"{block}\""
                ))),
                Mode::Include => Err(ParseErrorKind::UnexpectedToken(format!(
                    "\"{block}\", expected an include path"
                ))),
            },
        }
    }

    fn handle_literal(&mut self, text: String, position: Position) -> StepResult {
        match self.mode {
            Mode::Assignment => self
                .current()?
                .push_operand(OperandKind::String(text), position),
            Mode::Include => self.include(&text),
            _ => Err(ParseErrorKind::UnexpectedToken("string literal".to_string())),
        }
    }

    fn handle_control(&mut self, control: Control, position: Position) -> StepResult {
        match control {
            Control::Colon => {
                self.expect_mode(Mode::None, "class symbol")?;
                // classes cannot carry accessors
                self.reject_accessors()?;
                self.mode = Mode::Class;
                Ok(())
            }
            Control::Assign => {
                self.expect_mode(Mode::Variable, "assignment operator")?;
                self.mode = Mode::Assignment;
                self.scopes = vec![Expression::new()];
                Ok(())
            }
            Control::Semicolon => self.finish_assignment(),
            Control::OpenScope => {
                self.expect_mode(Mode::Assignment, "expression scope")?;
                if !self.current()?.expects_operand() {
                    return Err(ParseErrorKind::UnexpectedToken(
                        "expression scope".to_string(),
                    ));
                }
                // the bottom entry is the assignment itself, not a scope
                let limit = self.loader.config().max_scope_depth;
                if self.scopes.len() > limit {
                    return Err(ParseErrorKind::ScopeTooDeep(limit));
                }
                self.scopes.push(Expression::new());
                Ok(())
            }
            Control::CloseScope => {
                self.expect_mode(Mode::Assignment, "end of expression scope")?;
                if self.scopes.len() < 2 {
                    return Err(ParseErrorKind::UnbalancedScope);
                }
                let inner = self.scopes.pop().ok_or(ParseErrorKind::UnbalancedScope)?;
                if !inner.is_complete() {
                    return Err(ParseErrorKind::IncompleteExpression);
                }
                self.current()?
                    .push_operand(OperandKind::NestedEvaluation(Box::new(inner)), position)
            }
            Control::Operator(op) => {
                self.expect_mode(Mode::Assignment, &format!("operator {op}"))?;
                self.current()?.push_operator(op)
            }
        }
    }

    fn finish_assignment(&mut self) -> StepResult {
        self.expect_mode(Mode::Assignment, "end-of-expression character")?;
        if self.scopes.len() != 1 {
            return Err(ParseErrorKind::UnbalancedScope);
        }
        let expression = self.scopes.pop().ok_or(ParseErrorKind::UnbalancedScope)?;
        if !expression.is_complete() {
            return Err(ParseErrorKind::IncompleteExpression);
        }
        let variable = self.variable.take().ok_or_else(|| {
            ParseErrorKind::UnexpectedToken("end-of-expression character".to_string())
        })?;
        variable.commit(expression);
        self.mode = Mode::None;
        Ok(())
    }

    fn declare_class(&mut self, name: &str) -> StepResult {
        let class = match self.class.get_class(name) {
            Some(existing) => existing,
            None => self
                .class
                .add_class(name)
                .ok_or_else(|| ParseErrorKind::DuplicateName(name.to_string()))?,
        };
        self.class = class;
        self.mode = Mode::None;
        Ok(())
    }

    fn declare_variable(&mut self, name: &str) -> StepResult {
        let duplicate = || ParseErrorKind::DuplicateName(name.to_string());
        let variable = match self.class.get_variable(name) {
            Some(existing)
                if self
                    .pass
                    .variables
                    .iter()
                    .any(|declared| Rc::ptr_eq(declared, &existing)) =>
            {
                return Err(duplicate());
            }
            Some(existing) => existing,
            None => self.class.add_variable(name).ok_or_else(duplicate)?,
        };
        self.pass.variables.push(variable.clone());

        let accessors = std::mem::take(&mut self.accessors);
        let target = if variable.is_static() && variable.is_assigned() {
            tracing::debug!("{} is static, ignoring redeclaration", variable.path());
            Variable::placeholder(name, &self.class)
        } else {
            variable
        };
        target.set_accessors(accessors);

        self.variable = Some(target);
        self.mode = Mode::Variable;
        Ok(())
    }

    fn include(&mut self, requested: &str) -> StepResult {
        let target = self
            .loader
            .resolve_include_path(self.file.path(), requested);
        if !target.exists() {
            return Err(ParseErrorKind::MissingInclude(target));
        }

        let file = match self.loader.get_file(&target) {
            Some(existing) => existing,
            None => {
                let created = self.loader.insert_file(target, false);
                self.pass.created.push(created.clone());
                created
            }
        };
        if !self
            .pass
            .includes
            .iter()
            .any(|included| Rc::ptr_eq(included, &file))
        {
            self.pass.includes.push(file);
        }

        self.mode = Mode::None;
        self.include_closed = true;
        Ok(())
    }

    fn finish(&self) -> StepResult {
        if self.mode != Mode::None {
            return Err(ParseErrorKind::UnexpectedEndOfInput);
        }
        self.reject_accessors()?;
        if !self.class.is_root() {
            return Err(ParseErrorKind::UnterminatedClass(self.class.path()));
        }
        Ok(())
    }
}
