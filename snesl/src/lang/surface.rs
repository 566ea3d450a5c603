//! The surface language.
//!
//! This is a user-friendly concrete syntax for the language.

use crate::lang::Ranged;
use crate::reporting::LexerError;

mod lexer;

#[allow(clippy::all, unused_parens)]
mod grammar {
    include!(concat!(env!("OUT_DIR"), "/lang/surface/grammar.rs"));
}

/// Literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literals.
    Number(f64),
    /// Character literals.
    Char(char),
    /// String literals, which denote sequences of characters.
    String(String),
    /// Boolean literals.
    Bool(bool),
}

/// Prefix operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-e`
    Negate,
    /// `!e`
    Not,
    /// `&e`, the same as `iota(e)`.
    Iota,
    /// `#e`, the same as `len(e)`.
    Length,
}

/// Infix operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Leq => "<=",
            BinaryOp::Geq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }
}

pub type Type = Ranged<TypeData>;

/// Types in the surface language.
#[derive(Debug, Clone)]
pub enum TypeData {
    Num,
    Bool,
    Char,
    Tuple(Vec<Type>),
    /// `[T]`
    Array(Box<Type>),
    /// `{T}`
    Sequence(Box<Type>),
}

pub type Term<S> = Ranged<TermData<S>>;

/// Terms in the surface language.
#[derive(Debug, Clone)]
pub enum TermData<S> {
    /// Names.
    Name(S),

    /// Annotated terms.
    Ann(Box<Term<S>>, Type),

    /// Literals.
    Literal(Literal),

    /// Local definitions.
    Let(Ranged<S>, Box<Term<S>>, Box<Term<S>>),

    /// Tuple terms.
    Tuple(Vec<Term<S>>),
    /// Tuple eliminations.
    ///
    /// Also known as: tuple projections.
    TupleElim(Box<Term<S>>, usize),

    /// Calls to user-defined functions and builtins.
    FunctionElim(Ranged<S>, Vec<Term<S>>),

    /// Sequence literals.
    Sequence(Vec<Term<S>>),
    /// Array indexing, `xs[i]`.
    Index(Box<Term<S>>, Box<Term<S>>),

    /// Comprehensions, `{ body : name in source | guard using captures }`.
    Comprehension {
        body: Box<Term<S>>,
        name: Ranged<S>,
        source: Box<Term<S>>,
        guard: Option<Box<Term<S>>>,
        captures: Option<Vec<Ranged<S>>>,
    },
    /// Filters, `{ body | condition using captures }`.
    Filter {
        body: Box<Term<S>>,
        condition: Box<Term<S>>,
        captures: Option<Vec<Ranged<S>>>,
    },

    /// Prefix operators.
    Unary(Ranged<UnaryOp>, Box<Term<S>>),
    /// Infix operators.
    Binary(Box<Term<S>>, Ranged<BinaryOp>, Box<Term<S>>),

    /// Error sentinel.
    Error,
}

/// Top-level function definitions.
#[derive(Debug, Clone)]
pub struct FunctionDef<S> {
    pub name: Ranged<S>,
    pub params: Vec<(Ranged<S>, Type)>,
    pub output_type: Type,
    pub body: Term<S>,
}

/// Whole programs.
#[derive(Debug, Clone)]
pub struct Program<S> {
    pub definitions: Vec<FunctionDef<S>>,
    pub main: Term<S>,
}

fn binary<S>(lhs: Term<S>, op: Ranged<BinaryOp>, rhs: Term<S>) -> Term<S> {
    Ranged::new(
        lhs.range.merge(rhs.range),
        TermData::Binary(Box::new(lhs), op, Box::new(rhs)),
    )
}

type ParseError<'input> = lalrpop_util::ParseError<usize, lexer::Token<'input>, LexerError>;

impl<'input> Term<&'input str> {
    /// Parse a term from an input string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'input str) -> Result<Term<&'input str>, ParseError<'input>> {
        let tokens = lexer::tokens(input);
        grammar::TermParser::new().parse(tokens)
    }
}

impl<'input> Program<&'input str> {
    /// Parse a program from an input string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'input str) -> Result<Program<&'input str>, ParseError<'input>> {
        let tokens = lexer::tokens(input);
        grammar::ProgramParser::new().parse(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Term<&str> {
        Term::from_str(input).unwrap()
    }

    #[test]
    fn precedence() {
        match parse("1 + 2 * 3 == 7 && true").data {
            TermData::Binary(lhs, op, _) => {
                assert_eq!(op.data, BinaryOp::And);
                match lhs.data {
                    TermData::Binary(lhs, op, _) => {
                        assert_eq!(op.data, BinaryOp::Eq);
                        assert!(matches!(lhs.data, TermData::Binary(_, op, _) if op.data == BinaryOp::Add));
                    }
                    data => panic!("unexpected term: {:?}", data),
                }
            }
            data => panic!("unexpected term: {:?}", data),
        }
    }

    #[test]
    fn power_is_right_associative() {
        match parse("2 ^ 3 ^ 2").data {
            TermData::Binary(lhs, op, rhs) => {
                assert_eq!(op.data, BinaryOp::Pow);
                assert!(matches!(lhs.data, TermData::Literal(Literal::Number(_))));
                assert!(matches!(rhs.data, TermData::Binary(..)));
            }
            data => panic!("unexpected term: {:?}", data),
        }
    }

    #[test]
    fn comparisons_do_not_chain() {
        assert!(Term::from_str("1 < 2 < 3").is_err());
    }

    #[test]
    fn comprehension_with_guard_and_captures() {
        match parse("{x + k : x in xs | x > 0 using k}").data {
            TermData::Comprehension {
                name,
                guard,
                captures,
                ..
            } => {
                assert_eq!(name.data, "x");
                assert!(guard.is_some());
                let captures = captures.unwrap();
                assert_eq!(captures.iter().map(|c| c.data).collect::<Vec<_>>(), vec!["k"]);
            }
            data => panic!("unexpected term: {:?}", data),
        }
    }

    #[test]
    fn filter_with_empty_captures() {
        assert!(matches!(
            parse("{1 | true using}").data,
            TermData::Filter { captures: Some(captures), .. } if captures.is_empty()
        ));
    }

    #[test]
    fn postfix_operators() {
        match parse("t.1[0]").data {
            TermData::Index(head, _) => {
                assert!(matches!(head.data, TermData::TupleElim(_, 1)));
            }
            data => panic!("unexpected term: {:?}", data),
        }
    }

    #[test]
    fn programs() {
        let program = Program::from_str("num sq(num x) { x * x } main = {sq(y) : y in [1, 2, 3]}")
            .unwrap();
        assert_eq!(program.definitions.len(), 1);
        assert_eq!(program.definitions[0].name.data, "sq");
        assert_eq!(program.definitions[0].params.len(), 1);
        assert!(matches!(program.main.data, TermData::Comprehension { .. }));
    }

    #[test]
    fn invalid_projection() {
        assert!(matches!(
            Term::from_str("t.99999999999999999999"),
            Err(lalrpop_util::ParseError::User {
                error: LexerError::InvalidProjection { .. },
            }),
        ));
    }
}
