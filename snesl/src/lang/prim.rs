//! Primitive scalar types, constants, and the operators over them.
//!
//! Both the [reference interpreter] and the [streaming runtime] evaluate
//! scalars through this module, so the two always agree on primitive results.
//!
//! [reference interpreter]: crate::lang::core::semantics
//! [streaming runtime]: crate::runtime

use num_traits::ToPrimitive;
use std::cmp::Ordering;
use std::fmt;

/// Primitive scalar types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimType {
    /// Double precision numbers.
    Num,
    /// Booleans.
    Bool,
    /// Unicode scalar values.
    Char,
}

impl PrimType {
    pub fn name(self) -> &'static str {
        match self {
            PrimType::Num => "num",
            PrimType::Bool => "bool",
            PrimType::Char => "char",
        }
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar constants.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Constant {
    Num(f64),
    Bool(bool),
    Char(char),
}

impl Constant {
    pub fn prim_type(&self) -> PrimType {
        match self {
            Constant::Num(_) => PrimType::Num,
            Constant::Bool(_) => PrimType::Bool,
            Constant::Char(_) => PrimType::Char,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Constant::Num(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Compare two constants of the same primitive type.
    ///
    /// Returns `Err(())` if the constants have different types, and `Ok(None)`
    /// if they are unordered (ie. one of them is `NaN`).
    fn compare(&self, other: &Constant) -> Result<Option<Ordering>, ()> {
        match (self, other) {
            (Constant::Num(x), Constant::Num(y)) => Ok(x.partial_cmp(y)),
            (Constant::Bool(x), Constant::Bool(y)) => Ok(Some(x.cmp(y))),
            (Constant::Char(x), Constant::Char(y)) => Ok(Some(x.cmp(y))),
            (_, _) => Err(()),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Num(value) => write!(f, "{}", value),
            Constant::Bool(value) => write!(f, "{}", value),
            Constant::Char(value) => write!(f, "{:?}", value),
        }
    }
}

/// Convert a number to a count, if it is a non-negative integer.
pub fn natural(value: f64) -> Option<usize> {
    if value.fract() == 0.0 {
        value.to_usize()
    } else {
        None
    }
}

/// Errors produced when evaluating primitive operators.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PrimError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("remainder with a divisor of zero")]
    RemainderByZero,
    #[error("`{op}` expects {expected} operands, found {found}")]
    ArityMismatch {
        op: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("`{op}` cannot be applied to `{found}`")]
    InvalidOperand { op: &'static str, found: Constant },
    #[error("`{op}` of an empty segment")]
    EmptyReduction { op: &'static str },
}

/// Element-wise scalar operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Negate,
    Log,
    Sqrt,
    Sin,
    Cos,
    And,
    Or,
    Not,
    Eq(PrimType),
    Neq(PrimType),
    Lt(PrimType),
    Gt(PrimType),
    Leq(PrimType),
    Geq(PrimType),
}

impl ScalarOp {
    pub fn name(self) -> &'static str {
        match self {
            ScalarOp::Add => "plus",
            ScalarOp::Sub => "minus",
            ScalarOp::Mul => "times",
            ScalarOp::Div => "div",
            ScalarOp::Mod => "mod",
            ScalarOp::Pow => "pow",
            ScalarOp::Negate => "uminus",
            ScalarOp::Log => "log",
            ScalarOp::Sqrt => "sqrt",
            ScalarOp::Sin => "sin",
            ScalarOp::Cos => "cos",
            ScalarOp::And => "and",
            ScalarOp::Or => "or",
            ScalarOp::Not => "not",
            ScalarOp::Eq(_) => "eq",
            ScalarOp::Neq(_) => "neq",
            ScalarOp::Lt(_) => "lt",
            ScalarOp::Gt(_) => "gt",
            ScalarOp::Leq(_) => "leq",
            ScalarOp::Geq(_) => "geq",
        }
    }

    /// The operand type of comparisons, if this is one.
    pub fn comparison_type(self) -> Option<PrimType> {
        match self {
            ScalarOp::Eq(t)
            | ScalarOp::Neq(t)
            | ScalarOp::Lt(t)
            | ScalarOp::Gt(t)
            | ScalarOp::Leq(t)
            | ScalarOp::Geq(t) => Some(t),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            ScalarOp::Negate
            | ScalarOp::Log
            | ScalarOp::Sqrt
            | ScalarOp::Sin
            | ScalarOp::Cos
            | ScalarOp::Not => 1,
            _ => 2,
        }
    }

    /// The type of every operand.
    pub fn input_type(self) -> PrimType {
        match self {
            ScalarOp::And | ScalarOp::Or | ScalarOp::Not => PrimType::Bool,
            op => op.comparison_type().unwrap_or(PrimType::Num),
        }
    }

    pub fn output_type(self) -> PrimType {
        match self {
            ScalarOp::Add
            | ScalarOp::Sub
            | ScalarOp::Mul
            | ScalarOp::Div
            | ScalarOp::Mod
            | ScalarOp::Pow
            | ScalarOp::Negate
            | ScalarOp::Log
            | ScalarOp::Sqrt
            | ScalarOp::Sin
            | ScalarOp::Cos => PrimType::Num,
            _ => PrimType::Bool,
        }
    }

    /// Apply the operator to some operands.
    pub fn apply(self, args: &[Constant]) -> Result<Constant, PrimError> {
        if args.len() != self.arity() {
            return Err(PrimError::ArityMismatch {
                op: self.name(),
                expected: self.arity(),
                found: args.len(),
            });
        }

        match self {
            ScalarOp::Add => self.num2(args, |x, y| Ok(x + y)),
            ScalarOp::Sub => self.num2(args, |x, y| Ok(x - y)),
            ScalarOp::Mul => self.num2(args, |x, y| Ok(x * y)),
            ScalarOp::Div => self.num2(args, |x, y| match y {
                y if y == 0.0 => Err(PrimError::DivisionByZero),
                y => Ok(x / y),
            }),
            ScalarOp::Mod => self.num2(args, |x, y| match y {
                y if y == 0.0 => Err(PrimError::RemainderByZero),
                y => Ok(x % y),
            }),
            ScalarOp::Pow => self.num2(args, |x, y| Ok(x.powf(y))),
            ScalarOp::Negate => self.num1(args, |x| -x),
            ScalarOp::Log => self.num1(args, f64::ln),
            ScalarOp::Sqrt => self.num1(args, f64::sqrt),
            ScalarOp::Sin => self.num1(args, f64::sin),
            ScalarOp::Cos => self.num1(args, f64::cos),
            ScalarOp::And => self.bool2(args, |x, y| x && y),
            ScalarOp::Or => self.bool2(args, |x, y| x || y),
            ScalarOp::Not => match args[0] {
                Constant::Bool(x) => Ok(Constant::Bool(!x)),
                found => Err(self.invalid(found)),
            },
            ScalarOp::Eq(_) => self.compare(args, |o| o == Some(Ordering::Equal)),
            ScalarOp::Neq(_) => self.compare(args, |o| o != Some(Ordering::Equal)),
            ScalarOp::Lt(_) => self.compare(args, |o| o == Some(Ordering::Less)),
            ScalarOp::Gt(_) => self.compare(args, |o| o == Some(Ordering::Greater)),
            ScalarOp::Leq(_) => self.compare(args, |o| {
                matches!(o, Some(Ordering::Less) | Some(Ordering::Equal))
            }),
            ScalarOp::Geq(_) => self.compare(args, |o| {
                matches!(o, Some(Ordering::Greater) | Some(Ordering::Equal))
            }),
        }
    }

    fn invalid(self, found: Constant) -> PrimError {
        PrimError::InvalidOperand {
            op: self.name(),
            found,
        }
    }

    fn num1(self, args: &[Constant], f: impl FnOnce(f64) -> f64) -> Result<Constant, PrimError> {
        match args[0] {
            Constant::Num(x) => Ok(Constant::Num(f(x))),
            found => Err(self.invalid(found)),
        }
    }

    fn num2(
        self,
        args: &[Constant],
        f: impl FnOnce(f64, f64) -> Result<f64, PrimError>,
    ) -> Result<Constant, PrimError> {
        match (args[0], args[1]) {
            (Constant::Num(x), Constant::Num(y)) => f(x, y).map(Constant::Num),
            (Constant::Num(_), found) | (found, _) => Err(self.invalid(found)),
        }
    }

    fn bool2(self, args: &[Constant], f: impl FnOnce(bool, bool) -> bool) -> Result<Constant, PrimError> {
        match (args[0], args[1]) {
            (Constant::Bool(x), Constant::Bool(y)) => Ok(Constant::Bool(f(x, y))),
            (Constant::Bool(_), found) | (found, _) => Err(self.invalid(found)),
        }
    }

    fn compare(
        self,
        args: &[Constant],
        f: impl FnOnce(Option<Ordering>) -> bool,
    ) -> Result<Constant, PrimError> {
        match args[0].compare(&args[1]) {
            Ok(ordering) => Ok(Constant::Bool(f(ordering))),
            Err(()) => Err(self.invalid(args[1])),
        }
    }
}

/// Associative operators used for reductions and scans.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Prod,
    /// Conjunction, written `every`.
    All,
    /// Disjunction, written `some`.
    Any,
    Max(PrimType),
    Min(PrimType),
}

impl ReduceOp {
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::All => "every",
            ReduceOp::Any => "some",
            ReduceOp::Max(_) => "max",
            ReduceOp::Min(_) => "min",
        }
    }

    /// The type of the elements being combined, which is also the type of the
    /// result.
    pub fn element_type(self) -> PrimType {
        match self {
            ReduceOp::Sum | ReduceOp::Prod => PrimType::Num,
            ReduceOp::All | ReduceOp::Any => PrimType::Bool,
            ReduceOp::Max(t) | ReduceOp::Min(t) => t,
        }
    }

    /// The result of reducing an empty segment, if there is one.
    pub fn identity(self) -> Option<Constant> {
        match self {
            ReduceOp::Sum => Some(Constant::Num(0.0)),
            ReduceOp::Prod => Some(Constant::Num(1.0)),
            ReduceOp::All => Some(Constant::Bool(true)),
            ReduceOp::Any => Some(Constant::Bool(false)),
            ReduceOp::Max(_) | ReduceOp::Min(_) => None,
        }
    }

    /// Combine an accumulated value with the next element.
    pub fn combine(self, acc: Constant, next: Constant) -> Result<Constant, PrimError> {
        let invalid = |found| PrimError::InvalidOperand {
            op: self.name(),
            found,
        };

        match self {
            ReduceOp::Sum => ScalarOp::Add.apply(&[acc, next]),
            ReduceOp::Prod => ScalarOp::Mul.apply(&[acc, next]),
            ReduceOp::All => ScalarOp::And.apply(&[acc, next]),
            ReduceOp::Any => ScalarOp::Or.apply(&[acc, next]),
            ReduceOp::Max(_) => match acc.compare(&next) {
                Ok(Some(Ordering::Less)) => Ok(next),
                Ok(_) => Ok(acc),
                Err(()) => Err(invalid(next)),
            },
            ReduceOp::Min(_) => match acc.compare(&next) {
                Ok(Some(Ordering::Greater)) => Ok(next),
                Ok(_) => Ok(acc),
                Err(()) => Err(invalid(next)),
            },
        }
    }

    /// Reduce a whole segment.
    pub fn fold(self, items: impl IntoIterator<Item = Constant>) -> Result<Constant, PrimError> {
        let mut acc = None;
        for item in items {
            acc = Some(match acc {
                None => item,
                Some(acc) => self.combine(acc, item)?,
            });
        }

        acc.or_else(|| self.identity())
            .ok_or(PrimError::EmptyReduction { op: self.name() })
    }

    /// Inclusive prefix reduction of a whole segment.
    pub fn scan(self, items: impl IntoIterator<Item = Constant>) -> Result<Vec<Constant>, PrimError> {
        let mut acc = None;
        let mut output = Vec::new();
        for item in items {
            let next = match acc {
                None => item,
                Some(acc) => self.combine(acc, item)?,
            };
            output.push(next);
            acc = Some(next);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Constant> {
        values.iter().copied().map(Constant::Num).collect()
    }

    #[test]
    fn arithmetic() {
        let apply = |op: ScalarOp, x, y| op.apply(&[Constant::Num(x), Constant::Num(y)]);

        assert_eq!(apply(ScalarOp::Add, 1.0, 2.0), Ok(Constant::Num(3.0)));
        assert_eq!(apply(ScalarOp::Pow, 2.0, 10.0), Ok(Constant::Num(1024.0)));
        assert_eq!(apply(ScalarOp::Mod, 7.0, 3.0), Ok(Constant::Num(1.0)));
        assert_eq!(apply(ScalarOp::Div, 1.0, 0.0), Err(PrimError::DivisionByZero));
        assert_eq!(apply(ScalarOp::Mod, 1.0, 0.0), Err(PrimError::RemainderByZero));
    }

    #[test]
    fn comparisons_on_chars() {
        let lt = ScalarOp::Lt(PrimType::Char).apply(&[Constant::Char('a'), Constant::Char('b')]);
        assert_eq!(lt, Ok(Constant::Bool(true)));

        let mismatched = ScalarOp::Eq(PrimType::Num).apply(&[Constant::Num(1.0), Constant::Bool(true)]);
        assert!(mismatched.is_err());
    }

    #[test]
    fn nan_is_unordered() {
        let nan = Constant::Num(f64::NAN);
        assert_eq!(ScalarOp::Eq(PrimType::Num).apply(&[nan, nan]), Ok(Constant::Bool(false)));
        assert_eq!(ScalarOp::Neq(PrimType::Num).apply(&[nan, nan]), Ok(Constant::Bool(true)));
    }

    #[test]
    fn wrong_arity() {
        assert_eq!(
            ScalarOp::Not.apply(&[]),
            Err(PrimError::ArityMismatch {
                op: "not",
                expected: 1,
                found: 0,
            }),
        );
    }

    #[test]
    fn empty_reductions() {
        assert_eq!(ReduceOp::Sum.fold(vec![]), Ok(Constant::Num(0.0)));
        assert_eq!(ReduceOp::Prod.fold(vec![]), Ok(Constant::Num(1.0)));
        assert_eq!(ReduceOp::All.fold(vec![]), Ok(Constant::Bool(true)));
        assert_eq!(ReduceOp::Any.fold(vec![]), Ok(Constant::Bool(false)));
        assert_eq!(
            ReduceOp::Max(PrimType::Num).fold(vec![]),
            Err(PrimError::EmptyReduction { op: "max" }),
        );
    }

    #[test]
    fn scans_are_inclusive() {
        let scanned = ReduceOp::Sum.scan(nums(&[1.0, 2.0, 3.0]));
        assert_eq!(scanned, Ok(nums(&[1.0, 3.0, 6.0])));

        let maxes = ReduceOp::Max(PrimType::Num).scan(nums(&[2.0, 1.0, 5.0]));
        assert_eq!(maxes, Ok(nums(&[2.0, 2.0, 5.0])));
    }

    #[test]
    fn naturals() {
        assert_eq!(natural(3.0), Some(3));
        assert_eq!(natural(0.0), Some(0));
        assert_eq!(natural(-1.0), None);
        assert_eq!(natural(1.5), None);
        assert_eq!(natural(f64::NAN), None);
    }
}
