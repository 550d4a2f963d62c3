//! Evaluated values and the arithmetic between them

use crate::error::EvalError;
use crate::expression::Operator;
use crate::{Error, Result};

/// The result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    /// Integer value
    Numerical(i64),
    /// Floating point value
    Decimal(f64),
    String(String),
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Numerical(_) => "numerical",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
        }
    }

    fn type_error(&self, expected: &str) -> Error {
        Error::TypeError {
            expected: expected.to_string(),
            actual: self.type_name().to_string(),
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.type_error("boolean")),
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Numerical(i) => Ok(*i),
            _ => Err(self.type_error("numerical")),
        }
    }

    /// Try to get as f64, widening integers
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Decimal(f) => Ok(*f),
            Value::Numerical(i) => Ok(*i as f64),
            _ => Err(self.type_error("decimal")),
        }
    }

    /// Try to get as f32
    pub fn as_f32(&self) -> Result<f32> {
        self.as_f64().map(|f| f as f32)
    }

    /// Try to get as u32
    pub fn as_u32(&self) -> Result<u32> {
        let i = self.as_i64()?;
        u32::try_from(i).map_err(|_| Error::TypeError {
            expected: "u32".to_string(),
            actual: format!("numerical {i}"),
        })
    }

    /// Try to get as string
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            _ => Err(self.type_error("string")),
        }
    }

    /// Apply a prefix operator (`Not`, or `Subtract` meaning negate)
    pub fn apply_unary(self, op: Operator) -> std::result::Result<Value, EvalError> {
        match (op, self) {
            (Operator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (Operator::Not, Value::Numerical(i)) => Ok(Value::Numerical(!i)),
            (Operator::Subtract, Value::Numerical(i)) => i
                .checked_neg()
                .map(Value::Numerical)
                .ok_or(EvalError::Overflow(op)),
            (Operator::Subtract, Value::Decimal(f)) => Ok(Value::Decimal(-f)),
            (op, value) => Err(EvalError::UnaryTypeMismatch {
                op,
                operand: value.type_name(),
            }),
        }
    }

    /// Combine two values with a binary operator
    pub fn apply_binary(self, op: Operator, rhs: Value) -> std::result::Result<Value, EvalError> {
        use Value::{Boolean, Decimal, Numerical};

        let mismatch = |lhs: &Value, rhs: &Value| EvalError::TypeMismatch {
            op,
            left: lhs.type_name(),
            right: rhs.type_name(),
        };

        match (op, self, rhs) {
            (Operator::Add, Value::String(s), rhs) => Ok(Value::String(format!("{s}{rhs}"))),
            (Operator::Add, lhs, Value::String(s)) => Ok(Value::String(format!("{lhs}{s}"))),

            (_, Numerical(a), Numerical(b)) => integer_op(op, a, b),
            (_, lhs @ (Numerical(_) | Decimal(_)), rhs @ (Numerical(_) | Decimal(_))) => {
                match (lhs.as_f64(), rhs.as_f64()) {
                    (Ok(a), Ok(b)) => decimal_op(op, a, b).ok_or_else(|| mismatch(&lhs, &rhs)),
                    _ => Err(mismatch(&lhs, &rhs)),
                }
            }

            (Operator::And, Boolean(a), Boolean(b)) => Ok(Boolean(a && b)),
            (Operator::Or, Boolean(a), Boolean(b)) => Ok(Boolean(a || b)),
            (Operator::Xor, Boolean(a), Boolean(b)) => Ok(Boolean(a ^ b)),

            (_, lhs, rhs) => Err(mismatch(&lhs, &rhs)),
        }
    }
}

fn integer_op(op: Operator, a: i64, b: i64) -> std::result::Result<Value, EvalError> {
    let overflow = EvalError::Overflow(op);
    let result = match op {
        Operator::Add => a.checked_add(b).ok_or(overflow)?,
        Operator::Subtract => a.checked_sub(b).ok_or(overflow)?,
        Operator::Multiply => a.checked_mul(b).ok_or(overflow)?,
        Operator::Divide | Operator::Modulus if b == 0 => return Err(EvalError::DivisionByZero),
        Operator::Divide => a.checked_div(b).ok_or(overflow)?,
        Operator::Modulus => a.checked_rem(b).ok_or(overflow)?,
        Operator::Power => {
            if b < 0 {
                return Ok(Value::Decimal((a as f64).powf(b as f64)));
            }
            let exponent = u32::try_from(b).map_err(|_| overflow.clone())?;
            a.checked_pow(exponent).ok_or(overflow)?
        }
        Operator::And => a & b,
        Operator::Or => a | b,
        Operator::Xor => a ^ b,
        Operator::ShiftLeft | Operator::ShiftRight => {
            if !(0..64).contains(&b) {
                return Err(EvalError::InvalidShift(b));
            }
            if op == Operator::ShiftLeft {
                a << b
            } else {
                a >> b
            }
        }
        Operator::Not => {
            return Err(EvalError::TypeMismatch {
                op,
                left: "numerical",
                right: "numerical",
            })
        }
    };
    Ok(Value::Numerical(result))
}

fn decimal_op(op: Operator, a: f64, b: f64) -> Option<Value> {
    let result = match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => a / b,
        Operator::Modulus => a % b,
        Operator::Power => a.powf(b),
        _ => return None,
    };
    Some(Value::Decimal(result))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Numerical(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" on whole decimals
            Value::Decimal(d) => write!(f, "{d:?}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Numerical(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Numerical(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Decimal(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        let v = Value::from(42i32);
        assert_eq!(v.as_i64().unwrap(), 42);
        assert_eq!(v.as_u32().unwrap(), 42);
        assert_eq!(v.as_f64().unwrap(), 42.0);

        let v = Value::from(3.14f64);
        assert!((v.as_f64().unwrap() - 3.14).abs() < 0.001);
        assert!(v.as_i64().is_err());

        let v = Value::from("hello");
        assert_eq!(v.as_str().unwrap(), "hello");

        let v = Value::from(true);
        assert!(v.as_bool().unwrap());
    }

    #[test]
    fn test_type_errors() {
        let v = Value::from("string");
        assert!(v.as_i64().is_err());
        assert!(v.as_bool().is_err());
        assert!(Value::from(-1).as_u32().is_err());
    }

    #[test]
    fn test_integer_arithmetic() {
        let eval = |a: i64, op, b: i64| Value::from(a).apply_binary(op, Value::from(b));
        assert_eq!(eval(5, Operator::Subtract, 2), Ok(Value::Numerical(3)));
        assert_eq!(eval(7, Operator::Divide, 2), Ok(Value::Numerical(3)));
        assert_eq!(eval(7, Operator::Modulus, 4), Ok(Value::Numerical(3)));
        assert_eq!(eval(2, Operator::Power, 10), Ok(Value::Numerical(1024)));
        assert_eq!(eval(2, Operator::Power, -1), Ok(Value::Decimal(0.5)));
        assert_eq!(eval(1, Operator::ShiftLeft, 4), Ok(Value::Numerical(16)));
        assert_eq!(eval(0b1100, Operator::Xor, 0b1010), Ok(Value::Numerical(0b0110)));
        assert_eq!(eval(1, Operator::Divide, 0), Err(EvalError::DivisionByZero));
        assert_eq!(eval(1, Operator::ShiftRight, 64), Err(EvalError::InvalidShift(64)));
        assert_eq!(
            eval(i64::MAX, Operator::Add, 1),
            Err(EvalError::Overflow(Operator::Add))
        );
    }

    #[test]
    fn test_decimal_promotion() {
        let v = Value::from(1).apply_binary(Operator::Add, Value::from(0.5));
        assert_eq!(v, Ok(Value::Decimal(1.5)));

        let v = Value::from(1.0).apply_binary(Operator::ShiftLeft, Value::from(2));
        assert!(matches!(v, Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_string_concatenation() {
        let v = Value::from("level").apply_binary(Operator::Add, Value::from(3));
        assert_eq!(v, Ok(Value::from("level3")));

        let v = Value::from(2.5).apply_binary(Operator::Add, Value::from("x"));
        assert_eq!(v, Ok(Value::from("2.5x")));

        let v = Value::from("a").apply_binary(Operator::Multiply, Value::from(2));
        assert!(v.is_err());
    }

    #[test]
    fn test_boolean_logic() {
        let v = Value::from(true).apply_binary(Operator::And, Value::from(false));
        assert_eq!(v, Ok(Value::Boolean(false)));
        let v = Value::from(true).apply_binary(Operator::Xor, Value::from(false));
        assert_eq!(v, Ok(Value::Boolean(true)));
        let v = Value::from(true).apply_binary(Operator::Add, Value::from(1));
        assert!(v.is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(Value::from(true).apply_unary(Operator::Not), Ok(Value::Boolean(false)));
        assert_eq!(Value::from(0).apply_unary(Operator::Not), Ok(Value::Numerical(-1)));
        assert_eq!(Value::from(2.5).apply_unary(Operator::Subtract), Ok(Value::Decimal(-2.5)));
        assert!(Value::from("s").apply_unary(Operator::Subtract).is_err());
        assert_eq!(
            Value::from(i64::MIN).apply_unary(Operator::Subtract),
            Err(EvalError::Overflow(Operator::Subtract))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Decimal(2.0).to_string(), "2.0");
        assert_eq!(Value::Numerical(-7).to_string(), "-7");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }
}
