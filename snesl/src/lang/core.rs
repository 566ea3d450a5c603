//! The core language.
//!
//! This is the explicitly typed language produced by [elaborating] the
//! surface language. Every name, comparison, and sequence constructor carries
//! the type information needed by the [flattening compiler].
//!
//! [elaborating]: crate::pass::surface_to_core
//! [flattening compiler]: crate::pass::core_to_svcode

use std::fmt;
use std::sync::Arc;

use crate::lang::prim::{Constant, PrimType, ReduceOp, ScalarOp};

pub mod semantics;

/// Types in the core language.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Primitive scalar types.
    Prim(PrimType),
    /// Tuple types.
    Tuple(Vec<Type>),
    /// Flat arrays of concrete types.
    Array(Arc<Type>),
    /// Nested-parallel sequences.
    Sequence(Arc<Type>),
}

impl Type {
    pub fn num() -> Type {
        Type::Prim(PrimType::Num)
    }

    pub fn bool() -> Type {
        Type::Prim(PrimType::Bool)
    }

    pub fn char() -> Type {
        Type::Prim(PrimType::Char)
    }

    pub fn array(elem_type: Type) -> Type {
        Type::Array(Arc::new(elem_type))
    }

    pub fn sequence(elem_type: Type) -> Type {
        Type::Sequence(Arc::new(elem_type))
    }

    /// Returns `true` if the type contains no sequences.
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Prim(_) => true,
            Type::Tuple(types) => types.iter().all(Type::is_concrete),
            Type::Array(elem_type) => elem_type.is_concrete(),
            Type::Sequence(_) => false,
        }
    }

    /// Returns `true` if every array in the type has a concrete element type.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Type::Prim(_) => true,
            Type::Tuple(types) => types.iter().all(Type::is_well_formed),
            Type::Array(elem_type) => elem_type.is_concrete(),
            Type::Sequence(elem_type) => elem_type.is_well_formed(),
        }
    }

    pub fn as_sequence(&self) -> Option<&Type> {
        match self {
            Type::Sequence(elem_type) => Some(elem_type),
            _ => None,
        }
    }

    pub fn as_prim(&self) -> Option<PrimType> {
        match self {
            Type::Prim(prim_type) => Some(*prim_type),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alloc = pretty::BoxAllocator;
        let doc = crate::pass::core_to_pretty::from_type(&alloc, self);
        write!(f, "{}", doc.1.pretty(std::usize::MAX))
    }
}

/// Primitive operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Element-wise scalar operators.
    Scalar(ScalarOp),
    /// `iota(n)`: the sequence `0, 1, ..., n - 1`.
    Iota,
    /// Sequence literals, annotated with their element type.
    MakeSequence(Type),
    /// `empty(xs)`: does the sequence contain no elements?
    Empty,
    /// `the(xs)`: the only element of a singleton sequence.
    The,
    /// `append(xs, ys)`, annotated with the element type.
    Append(Type),
    /// `concat(xss)`: flatten one level of nesting.
    Concat,
    /// `zip(xs, ys, ...)`: pair up the elements of equally long sequences.
    Zip,
    /// `split(xs, flags)`: start a new group after every true flag.
    Split,
    /// `tab(xs)`: sequence to array.
    Tabulate,
    /// `seq(a)`: array to sequence.
    Sequence,
    /// `len(a)`: length of an array.
    Length,
    /// `elt(a, i)`: array indexing.
    Element,
    /// Segmented reductions.
    Reduce(ReduceOp),
    /// Inclusive segmented scans.
    Scan(ReduceOp),
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Scalar(op) => op.name(),
            Op::Iota => "iota",
            Op::MakeSequence(_) => "mkseq",
            Op::Empty => "empty",
            Op::The => "the",
            Op::Append(_) => "append",
            Op::Concat => "concat",
            Op::Zip => "zip",
            Op::Split => "split",
            Op::Tabulate => "tab",
            Op::Sequence => "seq",
            Op::Length => "len",
            Op::Element => "elt",
            Op::Reduce(op) => op.name(),
            Op::Scan(_) => "scan",
        }
    }
}

/// A name captured by a comprehension or a filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub name: String,
    pub r#type: Type,
}

/// Terms in the core language.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// Variables.
    Name(String),
    /// Constants.
    Constant(Constant),
    /// Tuple terms.
    Tuple(Vec<Term>),
    /// Tuple eliminations.
    ///
    /// Also known as: tuple projections.
    TupleElim(Box<Term>, usize),
    /// Local definitions.
    Let(String, Box<Term>, Box<Term>),
    /// Function eliminations.
    ///
    /// Also known as: function application. Functions are always named
    /// globals, and are compiled by inlining.
    FunctionElim(String, Vec<Term>),
    /// General comprehensions: evaluate `body` once for each element of
    /// `source`, with `name` bound to that element.
    Comprehension {
        name: String,
        source: Box<Term>,
        body: Box<Term>,
        captures: Vec<Capture>,
    },
    /// Filters: a sequence containing `body` if `condition` holds, and nothing
    /// otherwise.
    Filter {
        condition: Box<Term>,
        body: Box<Term>,
        captures: Vec<Capture>,
    },
    /// Primitive operations.
    Op(Op, Vec<Term>),
    /// Error sentinel.
    Error,
}

/// Top-level function definitions.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub output_type: Type,
    pub body: Term,
}

/// Whole programs.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub definitions: Vec<FunctionDef>,
    pub main: Term,
    pub main_type: Type,
}

impl Program {
    pub fn definition(&self, name: &str) -> Option<&FunctionDef> {
        self.definitions.iter().find(|def| def.name == name)
    }
}
