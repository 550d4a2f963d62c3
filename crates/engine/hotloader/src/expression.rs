//! Operand/operator expressions
//!
//! An [`Expression`] is built incrementally by the parser: operands and
//! operators are appended in source order and nested `( ... )` scopes become
//! [`OperandKind::NestedEvaluation`] operands of their parent. Evaluation is
//! lazy; variable references are resolved only when a value is requested.

use crate::error::{EvalError, ParseErrorKind};
use crate::lexer::{is_valid_name, Position};
use crate::value::Value;

/// Operators understood inside an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulus,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
    Not,
}

impl Operator {
    /// Map a source byte to its operator
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            b'+' => Operator::Add,
            b'-' => Operator::Subtract,
            b'*' => Operator::Multiply,
            b'/' => Operator::Divide,
            b'^' => Operator::Power,
            b'%' => Operator::Modulus,
            b'&' => Operator::And,
            b'|' => Operator::Or,
            b'?' => Operator::Xor,
            b'<' => Operator::ShiftLeft,
            b'>' => Operator::ShiftRight,
            b'!' => Operator::Not,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
            Operator::Power => '^',
            Operator::Modulus => '%',
            Operator::And => '&',
            Operator::Or => '|',
            Operator::Xor => '?',
            Operator::ShiftLeft => '<',
            Operator::ShiftRight => '>',
            Operator::Not => '!',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Operator::Not => 8,
            Operator::Power => 7,
            Operator::Multiply | Operator::Divide | Operator::Modulus => 6,
            Operator::Add | Operator::Subtract => 5,
            Operator::ShiftLeft | Operator::ShiftRight => 4,
            Operator::And => 3,
            Operator::Xor => 2,
            Operator::Or => 1,
        }
    }

    /// Whether an operator already on the stack must be applied before `next`
    fn binds_before(self, next: Operator) -> bool {
        let (current, incoming) = (self.precedence(), next.precedence());
        current > incoming || (current == incoming && next != Operator::Power)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The typed payload of an operand
#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Boolean(bool),
    Numerical(i64),
    Decimal(f64),
    String(String),
    /// Name resolved against the class scope at evaluation time
    VariableReference(String),
    NestedEvaluation(Box<Expression>),
}

impl OperandKind {
    /// Classify a block found on the right-hand side of an assignment
    pub fn from_block(block: &str) -> Result<Self, ParseErrorKind> {
        if block.eq_ignore_ascii_case("true") {
            return Ok(OperandKind::Boolean(true));
        }
        if block.eq_ignore_ascii_case("false") {
            return Ok(OperandKind::Boolean(false));
        }

        if let Some(kind) = parse_decimal_literal(block)? {
            return Ok(kind);
        }

        if block.len() > 2 {
            let radix = match (block.strip_prefix("0x"), block.strip_prefix("0b")) {
                (Some(digits), _) => Some((16, digits)),
                (_, Some(digits)) => Some((2, digits)),
                _ => None,
            };
            if let Some((base, digits)) = radix {
                // parsed unsigned so 0xFFFFFFFFFFFFFFFF wraps to -1
                return u64::from_str_radix(digits, base)
                    .map(|v| OperandKind::Numerical(v as i64))
                    .map_err(|_| ParseErrorKind::BaseConversion {
                        digits: digits.to_string(),
                        base,
                    });
            }
        }

        if !is_valid_name(block) {
            return Err(ParseErrorKind::InvalidVariableName(block.to_string()));
        }
        Ok(OperandKind::VariableReference(block.to_string()))
    }

    fn negated(&self) -> Option<Result<Self, ParseErrorKind>> {
        match self {
            OperandKind::Numerical(i) => Some(
                i.checked_neg()
                    .map(OperandKind::Numerical)
                    .ok_or_else(|| ParseErrorKind::LiteralTooLarge(format!("-{i}"))),
            ),
            OperandKind::Decimal(f) => Some(Ok(OperandKind::Decimal(-f))),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            OperandKind::Boolean(_) => "boolean",
            OperandKind::Numerical(_) | OperandKind::Decimal(_) => "number",
            OperandKind::String(_) => "string literal",
            OperandKind::VariableReference(_) => "variable reference",
            OperandKind::NestedEvaluation(_) => "expression scope",
        }
    }
}

/// Base-10 literal. `None` when the block is not a number at all.
fn parse_decimal_literal(block: &str) -> Result<Option<OperandKind>, ParseErrorKind> {
    let bytes = block.as_bytes();
    let starts_numeric = match bytes {
        [first, ..] if first.is_ascii_digit() => true,
        [b'.', second, ..] => second.is_ascii_digit(),
        _ => false,
    };
    if !starts_numeric {
        return Ok(None);
    }
    let Ok(value) = block.parse::<f64>() else {
        return Ok(None);
    };

    if !value.is_finite() {
        return Err(ParseErrorKind::LiteralTooLarge(block.to_string()));
    }

    if block.contains('.') {
        return Ok(Some(OperandKind::Decimal(value)));
    }
    if let Ok(integer) = block.parse::<i64>() {
        return Ok(Some(OperandKind::Numerical(integer)));
    }
    // exponent forms such as 1e3
    if value.fract() != 0.0 {
        return Ok(Some(OperandKind::Decimal(value)));
    }
    if value.abs() < i64::MAX as f64 {
        return Ok(Some(OperandKind::Numerical(value as i64)));
    }
    Err(ParseErrorKind::LiteralTooLarge(block.to_string()))
}

/// A leaf (or nested scope) of an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    /// Prefix operators (`Subtract` as negate, `Not`), outermost first
    pub prefix: Vec<Operator>,
    pub position: Position,
}

impl Operand {
    fn evaluate_with<F>(&self, resolve: &mut F) -> Result<Value, EvalError>
    where
        F: FnMut(&str) -> Result<Value, EvalError>,
    {
        let mut value = match &self.kind {
            OperandKind::Boolean(b) => Value::Boolean(*b),
            OperandKind::Numerical(i) => Value::Numerical(*i),
            OperandKind::Decimal(d) => Value::Decimal(*d),
            OperandKind::String(s) => Value::String(s.clone()),
            OperandKind::VariableReference(name) => resolve(name)?,
            OperandKind::NestedEvaluation(expression) => expression.evaluate_with(resolve)?,
        };
        for op in self.prefix.iter().rev() {
            value = value.apply_unary(*op)?;
        }
        Ok(value)
    }
}

/// Right-hand side of one assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    operands: Vec<Operand>,
    operators: Vec<Operator>,
    /// Prefix operators seen since the last operand
    pending: Vec<Operator>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-operand expression holding `value`
    pub fn literal(value: Value) -> Self {
        let kind = match value {
            Value::Boolean(b) => OperandKind::Boolean(b),
            Value::Numerical(i) => OperandKind::Numerical(i),
            Value::Decimal(d) => OperandKind::Decimal(d),
            Value::String(s) => OperandKind::String(s),
        };
        Self {
            operands: vec![Operand {
                kind,
                prefix: Vec::new(),
                position: Position::default(),
            }],
            ..Self::default()
        }
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// True when the next token must be an operand
    pub fn expects_operand(&self) -> bool {
        self.operands.len() == self.operators.len()
    }

    /// A `-` was read where an operand was expected
    pub fn negate_pending(&self) -> bool {
        self.pending.last() == Some(&Operator::Subtract)
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty() && self.pending.is_empty()
    }

    /// Every operator has both operands and no prefix is dangling
    pub fn is_complete(&self) -> bool {
        !self.operands.is_empty()
            && self.operands.len() == self.operators.len() + 1
            && self.pending.is_empty()
    }

    /// Append an operand, folding a pending negate into numeric literals
    pub fn push_operand(
        &mut self,
        mut kind: OperandKind,
        position: Position,
    ) -> Result<(), ParseErrorKind> {
        if !self.expects_operand() {
            return Err(ParseErrorKind::UnexpectedToken(kind.describe().to_string()));
        }
        if self.negate_pending() {
            if let Some(negated) = kind.negated() {
                kind = negated?;
                self.pending.pop();
            }
        }
        self.operands.push(Operand {
            kind,
            prefix: std::mem::take(&mut self.pending),
            position,
        });
        Ok(())
    }

    /// Append an operator. `-` and `!` where an operand is expected become
    /// prefixes of the following operand.
    pub fn push_operator(&mut self, op: Operator) -> Result<(), ParseErrorKind> {
        let expects_operand = self.expects_operand();
        match op {
            Operator::Subtract | Operator::Not if expects_operand => self.pending.push(op),
            Operator::Not => return Err(ParseErrorKind::UnexpectedToken(format!("operator {op}"))),
            _ if expects_operand => {
                return Err(ParseErrorKind::UnexpectedToken(format!("operator {op}")))
            }
            _ => self.operators.push(op),
        }
        Ok(())
    }

    /// Evaluate with a resolver for variable references
    pub fn evaluate_with<F>(&self, resolve: &mut F) -> Result<Value, EvalError>
    where
        F: FnMut(&str) -> Result<Value, EvalError>,
    {
        let mut operands = self.operands.iter();
        let first = operands.next().ok_or(EvalError::EmptyExpression)?;

        let mut values = vec![first.evaluate_with(resolve)?];
        let mut stack: Vec<Operator> = Vec::new();

        for (&op, operand) in self.operators.iter().zip(operands) {
            while let Some(&top) = stack.last() {
                if !top.binds_before(op) {
                    break;
                }
                stack.pop();
                reduce(&mut values, top)?;
            }
            stack.push(op);
            values.push(operand.evaluate_with(resolve)?);
        }
        while let Some(op) = stack.pop() {
            reduce(&mut values, op)?;
        }

        values.pop().ok_or(EvalError::EmptyExpression)
    }

    /// Evaluate an expression that must not reference variables
    pub fn evaluate_constant(&self) -> Result<Value, EvalError> {
        self.evaluate_with(&mut |name: &str| Err(EvalError::Unresolved(name.to_string())))
    }
}

fn reduce(values: &mut Vec<Value>, op: Operator) -> Result<(), EvalError> {
    let rhs = values.pop().ok_or(EvalError::EmptyExpression)?;
    let lhs = values.pop().ok_or(EvalError::EmptyExpression)?;
    values.push(lhs.apply_binary(op, rhs)?);
    Ok(())
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, operand) in self.operands.iter().enumerate() {
            if index > 0 {
                if let Some(op) = self.operators.get(index - 1) {
                    write!(f, " {op} ")?;
                }
            }
            for op in &operand.prefix {
                write!(f, "{op}")?;
            }
            match &operand.kind {
                OperandKind::Boolean(b) => write!(f, "{b}")?,
                OperandKind::Numerical(i) => write!(f, "{i}")?,
                OperandKind::Decimal(d) => write!(f, "{d:?}")?,
                OperandKind::String(s) => {
                    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))?
                }
                OperandKind::VariableReference(name) => write!(f, "{name}")?,
                OperandKind::NestedEvaluation(inner) => write!(f, "({inner})")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Position {
        Position { line: 1, column: 1 }
    }

    /// Feed a whitespace separated list of blocks, operators and parens
    fn build(source: &str) -> Result<Expression, ParseErrorKind> {
        let mut stack = vec![Expression::new()];
        for part in source.split_whitespace() {
            let current = stack.last_mut().expect("scope");
            match part {
                "(" => stack.push(Expression::new()),
                ")" => {
                    let inner = stack.pop().expect("scope");
                    let parent = stack.last_mut().ok_or(ParseErrorKind::UnbalancedScope)?;
                    parent.push_operand(OperandKind::NestedEvaluation(Box::new(inner)), at())?;
                }
                _ if part.len() == 1 && Operator::from_byte(part.as_bytes()[0]).is_some() => {
                    current.push_operator(Operator::from_byte(part.as_bytes()[0]).unwrap())?
                }
                _ => current.push_operand(OperandKind::from_block(part)?, at())?,
            }
        }
        assert_eq!(stack.len(), 1);
        Ok(stack.pop().unwrap())
    }

    fn eval(source: &str) -> Value {
        let expression = build(source).unwrap();
        assert!(expression.is_complete(), "incomplete: {source}");
        expression.evaluate_constant().unwrap()
    }

    #[test]
    fn test_literal_classification() {
        assert_eq!(OperandKind::from_block("TRUE"), Ok(OperandKind::Boolean(true)));
        assert_eq!(OperandKind::from_block("False"), Ok(OperandKind::Boolean(false)));
        assert_eq!(OperandKind::from_block("42"), Ok(OperandKind::Numerical(42)));
        assert_eq!(OperandKind::from_block("4.5"), Ok(OperandKind::Decimal(4.5)));
        assert_eq!(OperandKind::from_block(".5"), Ok(OperandKind::Decimal(0.5)));
        assert_eq!(OperandKind::from_block("1e3"), Ok(OperandKind::Numerical(1000)));
        assert_eq!(OperandKind::from_block("0xFF"), Ok(OperandKind::Numerical(255)));
        assert_eq!(OperandKind::from_block("0b101"), Ok(OperandKind::Numerical(5)));
        assert_eq!(
            OperandKind::from_block("inf"),
            Ok(OperandKind::VariableReference("inf".to_string()))
        );
        assert_eq!(
            OperandKind::from_block("World.seed"),
            Ok(OperandKind::VariableReference("World.seed".to_string()))
        );
    }

    #[test]
    fn test_base_conversion_error() {
        assert_eq!(
            OperandKind::from_block("0xZZ"),
            Err(ParseErrorKind::BaseConversion {
                digits: "ZZ".to_string(),
                base: 16
            })
        );
        assert!(OperandKind::from_block("0b102").is_err());
    }

    #[test]
    fn test_literal_too_large() {
        assert!(matches!(
            OperandKind::from_block("99999999999999999999"),
            Err(ParseErrorKind::LiteralTooLarge(_))
        ));
        assert_eq!(
            OperandKind::from_block("1e400"),
            Err(ParseErrorKind::LiteralTooLarge("1e400".to_string()))
        );
        assert!(matches!(
            OperandKind::from_block("1.5e400"),
            Err(ParseErrorKind::LiteralTooLarge(_))
        ));
        assert_eq!(
            OperandKind::from_block("1e18"),
            Ok(OperandKind::Numerical(1_000_000_000_000_000_000))
        );
    }

    #[test]
    fn test_binary_subtract() {
        assert_eq!(eval("5 - 2"), Value::Numerical(3));
    }

    #[test]
    fn test_unary_negate() {
        let expression = build("- 5").unwrap();
        assert_eq!(expression.operators().len(), 0);
        assert_eq!(expression.operands()[0].kind, OperandKind::Numerical(-5));
        assert_eq!(eval("- 5"), Value::Numerical(-5));
    }

    #[test]
    fn test_negate_scoped_to_following_literal() {
        assert_eq!(eval("5 + - 2"), Value::Numerical(3));
        assert_eq!(eval("- 2 * 3 - - 1"), Value::Numerical(-5));
    }

    #[test]
    fn test_negate_on_nested_scope() {
        assert_eq!(eval("- ( 1 + 2 )"), Value::Numerical(-3));
        assert_eq!(eval("- 0x10"), Value::Numerical(-16));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Numerical(7));
        assert_eq!(eval("( 1 + 2 ) * 3"), Value::Numerical(9));
        assert_eq!(eval("2 ^ 3 ^ 2"), Value::Numerical(512));
        assert_eq!(eval("10 - 4 - 3"), Value::Numerical(3));
        assert_eq!(eval("1 < 2 + 1"), Value::Numerical(8));
        assert_eq!(eval("6 & 3 | 8"), Value::Numerical(10));
        assert_eq!(eval("1.5 * 2"), Value::Decimal(3.0));
    }

    #[test]
    fn test_not_prefix() {
        assert_eq!(eval("! true | false"), Value::Boolean(false));
        assert_eq!(eval("! 0"), Value::Numerical(-1));
        assert_eq!(
            build("1 !"),
            Err(ParseErrorKind::UnexpectedToken("operator !".to_string()))
        );
    }

    #[test]
    fn test_operand_order_errors() {
        assert_eq!(
            build("1 2"),
            Err(ParseErrorKind::UnexpectedToken("number".to_string()))
        );
        assert_eq!(
            build("* 2"),
            Err(ParseErrorKind::UnexpectedToken("operator *".to_string()))
        );
    }

    #[test]
    fn test_completeness() {
        assert!(build("").unwrap().is_empty());
        assert!(!build("1 +").unwrap().is_complete());
        assert!(!build("-").unwrap().is_complete());
        assert!(build("1 + 1").unwrap().is_complete());
    }

    #[test]
    fn test_unresolved_reference() {
        let expression = build("a + 1").unwrap();
        assert_eq!(
            expression.evaluate_constant(),
            Err(EvalError::Unresolved("a".to_string()))
        );
    }

    #[test]
    fn test_resolver() {
        let expression = build("- speed * 2").unwrap();
        let value = expression
            .evaluate_with(&mut |name: &str| {
                assert_eq!(name, "speed");
                Ok(Value::Decimal(1.25))
            })
            .unwrap();
        assert_eq!(value, Value::Decimal(-2.5));
    }

    #[test]
    fn test_display_round_trips_source_shape() {
        let mut expression = build("- a + ( 2 * 0.5 )").unwrap();
        expression
            .push_operator(Operator::Add)
            .and_then(|_| expression.push_operand(OperandKind::String("q\"".to_string()), at()))
            .unwrap();
        assert_eq!(expression.to_string(), r#"-a + (2 * 0.5) + "q\"""#);
    }
}
