//! The reference semantics of the core language.
//!
//! Terms are evaluated directly over nested values, without any flattening.
//! This is slow, but obviously correct, which makes it a useful oracle for
//! checking the output of the [streaming runtime].
//!
//! [streaming runtime]: crate::runtime

use std::fmt;

use crate::lang::core::{Op, Program, Term};
use crate::lang::prim::{self, Constant, PrimError};

/// Nested values.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Constant(Constant),
    Tuple(Vec<Value>),
    Sequence(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn num(value: f64) -> Value {
        Value::Constant(Constant::Num(value))
    }

    pub fn bool(value: bool) -> Value {
        Value::Constant(Constant::Bool(value))
    }

    pub fn char(value: char) -> Value {
        Value::Constant(Constant::Char(value))
    }

    pub fn as_constant(&self) -> Option<Constant> {
        match self {
            Value::Constant(constant) => Some(*constant),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alloc = pretty::BoxAllocator;
        let doc = crate::pass::core_to_pretty::from_value(&alloc, self);
        write!(f, "{}", doc.1.pretty(std::usize::MAX))
    }
}

/// Errors produced during evaluation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Prim(#[from] PrimError),
    #[error("`iota` expects a non-negative integer, found `{0}`")]
    InvalidIota(f64),
    #[error("`the` expects exactly one element, found {0}")]
    NotSingleton(usize),
    #[error("index `{index}` is out of bounds for an array of length {len}")]
    IndexOutOfBounds { index: f64, len: usize },
    #[error("`{op}` expects sequences of equal length, found lengths {expected} and {found}")]
    LengthMismatch {
        op: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("cannot find `{0}` in this scope")]
    UnboundName(String),
    #[error("cannot find function `{0}`")]
    UnboundFunction(String),
    #[error("`{op}` was applied to an ill-typed operand")]
    IllTyped { op: &'static str },
    #[error("attempted to evaluate an erroneous term")]
    ErrorTerm,
}

/// Local value environment.
pub type Locals = im::HashMap<String, Value>;

/// Evaluate the main term of a program.
pub fn eval_program(program: &Program) -> Result<Value, EvalError> {
    eval_term(program, &Locals::new(), &program.main)
}

/// Evaluate a term in a local environment.
pub fn eval_term(program: &Program, locals: &Locals, term: &Term) -> Result<Value, EvalError> {
    match term {
        Term::Name(name) => locals
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundName(name.clone())),
        Term::Constant(constant) => Ok(Value::Constant(*constant)),
        Term::Tuple(terms) => Ok(Value::Tuple(eval_terms(program, locals, terms)?)),
        Term::TupleElim(head, index) => match eval_term(program, locals, head)? {
            Value::Tuple(mut values) if *index < values.len() => Ok(values.swap_remove(*index)),
            _ => Err(EvalError::IllTyped { op: "projection" }),
        },
        Term::Let(name, def, body) => {
            let value = eval_term(program, locals, def)?;
            eval_term(program, &locals.update(name.clone(), value), body)
        }
        Term::FunctionElim(name, args) => {
            let def = program
                .definition(name)
                .ok_or_else(|| EvalError::UnboundFunction(name.clone()))?;
            let args = eval_terms(program, locals, args)?;
            let params = def.params.iter().map(|(name, _)| name.clone());
            eval_term(program, &params.zip(args).collect(), &def.body)
        }
        Term::Comprehension {
            name,
            source,
            body,
            captures,
        } => {
            let elems = into_sequence(eval_term(program, locals, source)?, "comprehension")?;
            let captured = capture(locals, captures.iter().map(|c| &c.name))?;

            elems
                .into_iter()
                .map(|elem| {
                    let locals = captured.update(name.clone(), elem);
                    eval_term(program, &locals, body)
                })
                .collect::<Result<_, _>>()
                .map(Value::Sequence)
        }
        Term::Filter {
            condition,
            body,
            captures,
        } => match eval_term(program, locals, condition)?.as_constant() {
            Some(Constant::Bool(true)) => {
                let captured = capture(locals, captures.iter().map(|c| &c.name))?;
                Ok(Value::Sequence(vec![eval_term(program, &captured, body)?]))
            }
            Some(Constant::Bool(false)) => Ok(Value::Sequence(Vec::new())),
            _ => Err(EvalError::IllTyped { op: "filter" }),
        },
        Term::Op(op, args) => eval_op(op, eval_terms(program, locals, args)?),
        Term::Error => Err(EvalError::ErrorTerm),
    }
}

fn eval_terms(program: &Program, locals: &Locals, terms: &[Term]) -> Result<Vec<Value>, EvalError> {
    terms
        .iter()
        .map(|term| eval_term(program, locals, term))
        .collect()
}

/// Restrict the environment to the captured names.
fn capture<'a>(
    locals: &Locals,
    names: impl Iterator<Item = &'a String>,
) -> Result<Locals, EvalError> {
    names
        .map(|name| match locals.get(name) {
            Some(value) => Ok((name.clone(), value.clone())),
            None => Err(EvalError::UnboundName(name.clone())),
        })
        .collect()
}

fn next_arg(args: &mut std::vec::IntoIter<Value>, op: &'static str) -> Result<Value, EvalError> {
    args.next().ok_or(EvalError::IllTyped { op })
}

fn into_sequence(value: Value, op: &'static str) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Sequence(elems) => Ok(elems),
        _ => Err(EvalError::IllTyped { op }),
    }
}

fn into_array(value: Value, op: &'static str) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Array(elems) => Ok(elems),
        _ => Err(EvalError::IllTyped { op }),
    }
}

fn into_constants(values: Vec<Value>, op: &'static str) -> Result<Vec<Constant>, EvalError> {
    values
        .iter()
        .map(|value| value.as_constant().ok_or(EvalError::IllTyped { op }))
        .collect()
}

fn into_num(value: Value, op: &'static str) -> Result<f64, EvalError> {
    value
        .as_constant()
        .and_then(|constant| constant.as_num())
        .ok_or(EvalError::IllTyped { op })
}

/// Evaluate a primitive operation.
pub fn eval_op(op: &Op, args: Vec<Value>) -> Result<Value, EvalError> {
    let name = op.name();
    let mut args = args.into_iter();

    match op {
        Op::Scalar(op) => {
            let operands = (0..op.arity())
                .map(|_| next_arg(&mut args, name))
                .collect::<Result<Vec<_>, _>>()?;
            let operands = into_constants(operands, name)?;
            Ok(Value::Constant(op.apply(&operands)?))
        }
        Op::Iota => {
            let n = into_num(next_arg(&mut args, name)?, name)?;
            let n = prim::natural(n).ok_or(EvalError::InvalidIota(n))?;
            Ok(Value::Sequence((0..n).map(|i| Value::num(i as f64)).collect()))
        }
        Op::MakeSequence(_) => Ok(Value::Sequence(args.collect())),
        Op::Empty => {
            let elems = into_sequence(next_arg(&mut args, name)?, name)?;
            Ok(Value::bool(elems.is_empty()))
        }
        Op::The => {
            let mut elems = into_sequence(next_arg(&mut args, name)?, name)?;
            match elems.len() {
                1 => Ok(elems.swap_remove(0)),
                len => Err(EvalError::NotSingleton(len)),
            }
        }
        Op::Append(_) => {
            let mut elems = into_sequence(next_arg(&mut args, name)?, name)?;
            elems.extend(into_sequence(next_arg(&mut args, name)?, name)?);
            Ok(Value::Sequence(elems))
        }
        Op::Concat => {
            let mut elems = Vec::new();
            for inner in into_sequence(next_arg(&mut args, name)?, name)? {
                elems.extend(into_sequence(inner, name)?);
            }
            Ok(Value::Sequence(elems))
        }
        Op::Zip => {
            let columns = args
                .map(|arg| into_sequence(arg, name))
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.first().map_or(0, Vec::len);
            if let Some(column) = columns.iter().find(|column| column.len() != len) {
                return Err(EvalError::LengthMismatch {
                    op: name,
                    expected: len,
                    found: column.len(),
                });
            }

            let mut columns = columns.into_iter().map(Vec::into_iter).collect::<Vec<_>>();
            let rows = (0..len)
                .map(|_| Value::Tuple(columns.iter_mut().filter_map(|column| column.next()).collect()))
                .collect();
            Ok(Value::Sequence(rows))
        }
        Op::Split => {
            let elems = into_sequence(next_arg(&mut args, name)?, name)?;
            let flags = into_constants(into_sequence(next_arg(&mut args, name)?, name)?, name)?;
            if elems.len() != flags.len() {
                return Err(EvalError::LengthMismatch {
                    op: name,
                    expected: elems.len(),
                    found: flags.len(),
                });
            }

            let mut groups = Vec::new();
            let mut group = Vec::new();
            for (elem, flag) in elems.into_iter().zip(flags) {
                group.push(elem);
                match flag {
                    Constant::Bool(true) => groups.push(Value::Sequence(std::mem::take(&mut group))),
                    Constant::Bool(false) => {}
                    _ => return Err(EvalError::IllTyped { op: name }),
                }
            }
            groups.push(Value::Sequence(group));
            Ok(Value::Sequence(groups))
        }
        Op::Tabulate => Ok(Value::Array(into_sequence(next_arg(&mut args, name)?, name)?)),
        Op::Sequence => Ok(Value::Sequence(into_array(next_arg(&mut args, name)?, name)?)),
        Op::Length => Ok(Value::num(into_array(next_arg(&mut args, name)?, name)?.len() as f64)),
        Op::Element => {
            let mut elems = into_array(next_arg(&mut args, name)?, name)?;
            let index = into_num(next_arg(&mut args, name)?, name)?;
            match prim::natural(index) {
                Some(i) if i < elems.len() => Ok(elems.swap_remove(i)),
                _ => Err(EvalError::IndexOutOfBounds {
                    index,
                    len: elems.len(),
                }),
            }
        }
        Op::Reduce(op) => {
            let elems = into_constants(into_sequence(next_arg(&mut args, name)?, name)?, name)?;
            Ok(Value::Constant(op.fold(elems)?))
        }
        Op::Scan(op) => {
            let elems = into_constants(into_sequence(next_arg(&mut args, name)?, name)?, name)?;
            let scanned = op.scan(elems)?;
            Ok(Value::Sequence(scanned.into_iter().map(Value::Constant).collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::core::Type;
    use crate::lang::prim::{PrimType, ReduceOp};

    fn nums(values: &[f64]) -> Value {
        Value::Sequence(values.iter().copied().map(Value::num).collect())
    }

    fn bools(values: &[bool]) -> Value {
        Value::Sequence(values.iter().copied().map(Value::bool).collect())
    }

    #[test]
    fn split_after_true_flags() {
        let groups = eval_op(
            &Op::Split,
            vec![nums(&[1.0, 2.0, 3.0, 4.0]), bools(&[false, true, false, false])],
        );
        assert_eq!(
            groups,
            Ok(Value::Sequence(vec![nums(&[1.0, 2.0]), nums(&[3.0, 4.0])])),
        );
    }

    #[test]
    fn split_with_trailing_flag_produces_empty_group() {
        let groups = eval_op(&Op::Split, vec![nums(&[1.0]), bools(&[true])]);
        assert_eq!(groups, Ok(Value::Sequence(vec![nums(&[1.0]), nums(&[])])));
    }

    #[test]
    fn zip_mismatched_lengths() {
        let zipped = eval_op(&Op::Zip, vec![nums(&[1.0]), nums(&[1.0, 2.0])]);
        assert_eq!(
            zipped,
            Err(EvalError::LengthMismatch {
                op: "zip",
                expected: 1,
                found: 2,
            }),
        );
    }

    #[test]
    fn iota_rejects_fractions() {
        assert_eq!(
            eval_op(&Op::Iota, vec![Value::num(1.5)]),
            Err(EvalError::InvalidIota(1.5)),
        );
        assert_eq!(eval_op(&Op::Iota, vec![Value::num(3.0)]), Ok(nums(&[0.0, 1.0, 2.0])));
    }

    #[test]
    fn the_requires_singletons() {
        assert_eq!(eval_op(&Op::The, vec![nums(&[4.0])]), Ok(Value::num(4.0)));
        assert_eq!(
            eval_op(&Op::The, vec![nums(&[])]),
            Err(EvalError::NotSingleton(0)),
        );
    }

    #[test]
    fn empty_max_is_an_error() {
        let max = eval_op(&Op::Reduce(ReduceOp::Max(PrimType::Num)), vec![nums(&[])]);
        assert!(matches!(max, Err(EvalError::Prim(PrimError::EmptyReduction { .. }))));
    }

    #[test]
    fn comprehension_over_captures() {
        // { x * k : x in [1, 2] using k } where k = 10
        let program = Program {
            definitions: Vec::new(),
            main: Term::Let(
                "k".to_owned(),
                Box::new(Term::Constant(Constant::Num(10.0))),
                Box::new(Term::Comprehension {
                    name: "x".to_owned(),
                    source: Box::new(Term::Op(
                        Op::MakeSequence(Type::num()),
                        vec![
                            Term::Constant(Constant::Num(1.0)),
                            Term::Constant(Constant::Num(2.0)),
                        ],
                    )),
                    body: Box::new(Term::Op(
                        Op::Scalar(crate::lang::prim::ScalarOp::Mul),
                        vec![Term::Name("x".to_owned()), Term::Name("k".to_owned())],
                    )),
                    captures: vec![crate::lang::core::Capture {
                        name: "k".to_owned(),
                        r#type: Type::num(),
                    }],
                }),
            ),
            main_type: Type::sequence(Type::num()),
        };

        assert_eq!(eval_program(&program), Ok(nums(&[10.0, 20.0])));
    }
}
