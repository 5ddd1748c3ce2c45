use crate::lib::ast::LiteralValue;
use crate::lib::function::Callable;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Numeric value with its dynamic kind kept explicit.
///
/// Integer op Integer stays Integer; a Float on either side promotes the
/// whole operation. Integer overflow also promotes to Float.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, other) {
            (Number::Integer(l), Number::Integer(r)) => match int_op(l, r) {
                Some(v) => Number::Integer(v),
                None => Number::Float(float_op(l as f64, r as f64)),
            },
            (l, r) => Number::Float(float_op(l.as_f64(), r.as_f64())),
        }
    }

    pub fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |l, r| l + r)
    }

    pub fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |l, r| l - r)
    }

    pub fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |l, r| l * r)
    }

    /// Integer division floors. `None` only for an integer division by zero;
    /// float division follows IEEE-754.
    pub fn div(self, other: Number) -> Option<Number> {
        if let (Number::Integer(_), Number::Integer(0)) = (self, other) {
            return None;
        }
        Some(self.combine(other, floor_div, |l, r| l / r))
    }

    /// Negation always yields a Float.
    pub fn neg(self) -> Number {
        Number::Float(-self.as_f64())
    }
}

fn floor_div(l: i64, r: i64) -> Option<i64> {
    let q = l.checked_div(r)?;
    if l % r != 0 && ((l < 0) != (r < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(l), Number::Integer(r)) => l == r,
            (l, r) => l.as_f64() == r.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(l), Number::Integer(r)) => l.partial_cmp(r),
            (l, r) => l.as_f64().partial_cmp(&r.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(v) => write!(f, "{}", v),
            Number::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{:.0}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Object {
    Boolean(bool),
    Callable(Rc<Callable>),
    Nil,
    Number(Number),
    String(String),
}

impl Object {
    /// Everything except `false` and `nil` is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Boolean(v) => *v,
            Object::Nil => false,
            _ => true,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Boolean(l), Object::Boolean(r)) => l == r,
            (Object::Callable(l), Object::Callable(r)) => Rc::ptr_eq(l, r),
            (Object::Nil, Object::Nil) => true,
            (Object::Number(l), Object::Number(r)) => l == r,
            (Object::String(l), Object::String(r)) => l == r,
            _ => false,
        }
    }
}

impl From<&LiteralValue> for Object {
    fn from(value: &LiteralValue) -> Self {
        match value {
            LiteralValue::Boolean(v) => Object::Boolean(*v),
            LiteralValue::Nil => Object::Nil,
            LiteralValue::Number(v) => Object::Number(*v),
            LiteralValue::String(v) => Object::String(v.clone()),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Boolean(v) => write!(f, "{}", v),
            Object::Callable(v) => write!(f, "{}", v),
            Object::Nil => write!(f, "nil"),
            Object::Number(v) => write!(f, "{}", v),
            Object::String(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let sum = Number::Integer(1).add(Number::Integer(2));
        assert!(matches!(sum, Number::Integer(3)));
        let product = Number::Integer(4).mul(Number::Integer(5));
        assert!(matches!(product, Number::Integer(20)));
    }

    #[test]
    fn test_float_operand_promotes() {
        let sum = Number::Integer(1).add(Number::Float(2.0));
        assert!(matches!(sum, Number::Float(v) if v == 3.0));
    }

    #[test]
    fn test_integer_overflow_promotes() {
        let sum = Number::Integer(i64::MAX).add(Number::Integer(1));
        assert!(matches!(sum, Number::Float(_)));
    }

    #[test]
    fn test_integer_division_floors() {
        assert_eq!(Number::Integer(7).div(Number::Integer(2)), Some(Number::Integer(3)));
        assert_eq!(Number::Integer(-7).div(Number::Integer(2)), Some(Number::Integer(-4)));
        assert_eq!(Number::Integer(7).div(Number::Integer(-2)), Some(Number::Integer(-4)));
        assert_eq!(Number::Integer(1).div(Number::Integer(0)), None);
        assert_eq!(Number::Float(1.0).div(Number::Integer(0)), Some(Number::Float(f64::INFINITY)));
    }

    #[test]
    fn test_negation_is_float() {
        assert!(matches!(Number::Integer(3).neg(), Number::Float(v) if v == -3.0));
    }

    #[test]
    fn test_display_drops_zero_fraction() {
        assert_eq!(Object::Number(Number::Float(3.0)).to_string(), "3");
        assert_eq!(Object::Number(Number::Float(2.5)).to_string(), "2.5");
        assert_eq!(Object::Number(Number::Float(-1.5)).to_string(), "-1.5");
        assert_eq!(Object::Number(Number::Integer(42)).to_string(), "42");
        assert_eq!(Object::Nil.to_string(), "nil");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Object::Nil.is_truthy());
        assert!(!Object::Boolean(false).is_truthy());
        assert!(Object::Number(Number::Integer(0)).is_truthy());
        assert!(Object::String(String::new()).is_truthy());
    }

    #[test]
    fn test_equality_has_no_cross_kind_coercion() {
        assert_eq!(Object::Number(Number::Integer(1)), Object::Number(Number::Float(1.0)));
        assert_ne!(Object::Number(Number::Integer(0)), Object::Boolean(false));
        assert_ne!(Object::String("1".to_owned()), Object::Number(Number::Integer(1)));
        assert_ne!(Object::Nil, Object::Boolean(false));
    }
}
