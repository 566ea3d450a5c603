//! Reporting diagnostic messages.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use pretty::DocAllocator;
use std::ops::Range;

use crate::lang::core::Type;
use crate::lang::prim::PrimError;
use crate::lang::svcode::{Elem, StreamId, SvcodeError};

/// Global diagnostic messages
#[derive(Clone, Debug)]
pub enum Message {
    /// Errors produced during lexing.
    Lexer(LexerError),
    /// Errors produced during parsing.
    Parse(ParseError),
    /// Messages produced from [`pass::surface_to_core`].
    ///
    /// [`pass::surface_to_core`]: crate::pass::surface_to_core
    SurfaceToCore(SurfaceToCoreMessage),
}

impl From<LexerError> for Message {
    fn from(error: LexerError) -> Self {
        Message::Lexer(error)
    }
}

impl From<ParseError> for Message {
    fn from(error: ParseError) -> Self {
        Message::Parse(error)
    }
}

impl From<SurfaceToCoreMessage> for Message {
    fn from(message: SurfaceToCoreMessage) -> Self {
        Message::SurfaceToCore(message)
    }
}

impl<T: std::fmt::Display> From<lalrpop_util::ParseError<usize, T, LexerError>> for Message {
    fn from(error: lalrpop_util::ParseError<usize, T, LexerError>) -> Self {
        Message::from_lalrpop(error)
    }
}

impl Message {
    pub fn from_lalrpop<T: std::fmt::Display>(
        error: lalrpop_util::ParseError<usize, T, LexerError>,
    ) -> Message {
        use lalrpop_util::ParseError::*;

        match error {
            InvalidToken { location } => Message::from(LexerError::InvalidToken {
                range: location..location,
            }),
            UnrecognizedEOF { location, expected } => Message::from(ParseError::UnrecognizedEOF {
                range: location..location,
                expected,
            }),
            UnrecognizedToken {
                token: (start, token, end),
                expected,
            } => Message::from(ParseError::UnrecognizedToken {
                range: start..end,
                token: token.to_string(),
                expected,
            }),
            ExtraToken {
                token: (start, token, end),
            } => Message::from(ParseError::ExtraToken {
                range: start..end,
                token: token.to_string(),
            }),
            User { error } => Message::from(error),
        }
    }

    pub fn to_diagnostic<'a, D>(&'a self, pretty_alloc: &'a D) -> Diagnostic<()>
    where
        D: DocAllocator<'a>,
        D::Doc: Clone,
    {
        match self {
            Message::Lexer(error) => error.to_diagnostic(),
            Message::Parse(error) => error.to_diagnostic(),
            Message::SurfaceToCore(message) => message.to_diagnostic(pretty_alloc),
        }
    }
}

/// Lexer errors
#[derive(Debug, Clone)]
pub enum LexerError {
    InvalidToken { range: Range<usize> },
    InvalidProjection { range: Range<usize> },
}

impl LexerError {
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            LexerError::InvalidToken { range } => Diagnostic::error()
                .with_message("invalid token")
                .with_labels(vec![Label::primary((), range.clone())]),
            LexerError::InvalidProjection { range } => Diagnostic::error()
                .with_message("invalid tuple projection")
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("index is too large")
                ]),
        }
    }
}

/// Parse errors
#[derive(Clone, Debug)]
pub enum ParseError {
    UnrecognizedEOF {
        range: Range<usize>,
        expected: Vec<String>,
    },
    UnrecognizedToken {
        range: Range<usize>,
        token: String,
        expected: Vec<String>,
    },
    ExtraToken {
        range: Range<usize>,
        token: String,
    },
}

impl ParseError {
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            ParseError::UnrecognizedEOF { range, expected } => Diagnostic::error()
                .with_message("unexpected end of file")
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("unexpected end of file")
                ])
                .with_notes(format_expected(expected).map_or(Vec::new(), |message| vec![message])),
            ParseError::UnrecognizedToken {
                range,
                token,
                expected,
            } => Diagnostic::error()
                .with_message(format!("unexpected token {}", token))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("unexpected token")
                ])
                .with_notes(format_expected(expected).map_or(Vec::new(), |message| vec![message])),
            ParseError::ExtraToken { range, token } => Diagnostic::error()
                .with_message(format!("extra token {}", token))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("extra token")
                ]),
        }
    }
}

fn format_expected(expected: &[String]) -> Option<String> {
    use itertools::Itertools;

    expected.split_last().map(|items| match items {
        (last, []) => format!("expected {}", last),
        (last, expected) => format!("expected {} or {}", expected.iter().format(", "), last),
    })
}

#[derive(Clone, Debug)]
pub enum AmbiguousTerm {
    Sequence,
}

impl AmbiguousTerm {
    fn description(&self) -> &'static str {
        match self {
            AmbiguousTerm::Sequence => "sequence",
        }
    }
}

/// What the elaborator was expecting to find.
#[derive(Clone, Debug)]
pub enum ExpectedType {
    Type(Type),
    Sequence,
    Array,
    Tuple,
    Prim,
}

/// Message produced from [pass::surface_to_core]
#[derive(Clone, Debug)]
pub enum SurfaceToCoreMessage {
    UnboundName {
        range: Range<usize>,
        name: String,
    },
    UnboundFunction {
        range: Range<usize>,
        name: String,
    },
    RecursiveFunction {
        range: Range<usize>,
        name: String,
    },
    DuplicateFunction {
        range: Range<usize>,
        original_range: Range<usize>,
        name: String,
    },
    ReservedFunctionName {
        range: Range<usize>,
        name: String,
    },
    MismatchedArity {
        range: Range<usize>,
        name: String,
        expected_arity: usize,
        found_arity: usize,
    },
    ProjectionOutOfRange {
        range: Range<usize>,
        index: usize,
        head_type: Type,
    },
    NonConcreteCapture {
        range: Range<usize>,
        name: String,
        found_type: Type,
    },
    IllFormedType {
        range: Range<usize>,
        found_type: Type,
    },
    AmbiguousTerm {
        range: Range<usize>,
        term: AmbiguousTerm,
    },
    MismatchedTypes {
        range: Range<usize>,
        found_type: Type,
        expected_type: ExpectedType,
    },
}

impl SurfaceToCoreMessage {
    pub fn to_diagnostic<'a, D>(&'a self, pretty_alloc: &'a D) -> Diagnostic<()>
    where
        D: DocAllocator<'a>,
        D::Doc: Clone,
    {
        use crate::pass::core_to_pretty;

        let to_doc = |r#type| core_to_pretty::from_type(pretty_alloc, r#type).1;

        match self {
            SurfaceToCoreMessage::UnboundName { range, name } => Diagnostic::error()
                .with_message(format!("cannot find `{}` in this scope", name))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("not found in this scope")
                ]),

            SurfaceToCoreMessage::UnboundFunction { range, name } => Diagnostic::error()
                .with_message(format!("cannot find function `{}`", name))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("not a defined function")
                ])
                .with_notes(vec![
                    "functions must be defined before they are used".to_owned()
                ]),

            SurfaceToCoreMessage::RecursiveFunction { range, name } => Diagnostic::error()
                .with_message(format!("function `{}` refers to itself", name))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("recursive call")
                ])
                .with_notes(vec!["recursive functions are not supported".to_owned()]),

            SurfaceToCoreMessage::DuplicateFunction {
                range,
                original_range,
                name,
            } => Diagnostic::error()
                .with_message(format!("function `{}` is defined more than once", name))
                .with_labels(vec![
                    Label::secondary((), original_range.clone())
                        .with_message(format!("first definition of `{}`", name)),
                    Label::primary((), range.clone()).with_message("redefined here"),
                ]),

            SurfaceToCoreMessage::ReservedFunctionName { range, name } => Diagnostic::error()
                .with_message(format!("cannot redefine the builtin `{}`", name))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("reserved name")
                ]),

            SurfaceToCoreMessage::MismatchedArity {
                range,
                name,
                expected_arity,
                found_arity,
            } => Diagnostic::error()
                .with_message(format!(
                    "`{}` expects {} arguments, but was given {}",
                    name, expected_arity, found_arity,
                ))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("wrong number of arguments")
                ]),

            SurfaceToCoreMessage::ProjectionOutOfRange {
                range,
                index,
                head_type,
            } => Diagnostic::error()
                .with_message(format!("no element `{}` in tuple", index))
                .with_labels(vec![Label::primary((), range.clone()).with_message(format!(
                    "the type here is `{}`",
                    to_doc(head_type).pretty(std::usize::MAX),
                ))]),

            SurfaceToCoreMessage::NonConcreteCapture {
                range,
                name,
                found_type,
            } => Diagnostic::error()
                .with_message(format!("cannot use `{}` inside a comprehension", name))
                .with_labels(vec![Label::primary((), range.clone()).with_message(format!(
                    "`{}` has the type `{}`",
                    name,
                    to_doc(found_type).pretty(std::usize::MAX),
                ))])
                .with_notes(vec![
                    "variables used by a comprehension body must not contain sequences".to_owned(),
                ]),

            SurfaceToCoreMessage::IllFormedType { range, found_type } => Diagnostic::error()
                .with_message("ill-formed type")
                .with_labels(vec![Label::primary((), range.clone()).with_message(format!(
                    "the type `{}` has an array of sequences",
                    to_doc(found_type).pretty(std::usize::MAX),
                ))])
                .with_notes(vec!["array elements must not contain sequences".to_owned()]),

            SurfaceToCoreMessage::AmbiguousTerm { range, term } => Diagnostic::error()
                .with_message(format!("ambiguous {}", term.description()))
                .with_labels(vec![
                    Label::primary((), range.clone()).with_message("type annotations needed")
                ]),

            SurfaceToCoreMessage::MismatchedTypes {
                range,
                found_type,
                expected_type,
            } => Diagnostic::error()
                .with_message("mismatched types")
                .with_labels(vec![Label::primary((), range.clone()).with_message(
                    match expected_type {
                        ExpectedType::Type(expected_type) => format!(
                            "expected `{}`, found `{}`",
                            to_doc(expected_type).pretty(std::usize::MAX),
                            to_doc(found_type).pretty(std::usize::MAX),
                        ),
                        ExpectedType::Sequence => format!(
                            "expected a sequence, found `{}`",
                            to_doc(found_type).pretty(std::usize::MAX),
                        ),
                        ExpectedType::Array => format!(
                            "expected an array, found `{}`",
                            to_doc(found_type).pretty(std::usize::MAX),
                        ),
                        ExpectedType::Tuple => format!(
                            "expected a tuple, found `{}`",
                            to_doc(found_type).pretty(std::usize::MAX),
                        ),
                        ExpectedType::Prim => format!(
                            "expected a primitive type, found `{}`",
                            to_doc(found_type).pretty(std::usize::MAX),
                        ),
                    },
                )]),
        }
    }
}

/// Errors produced when compiling the core language to vector code.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("`{construct}` is not supported by the streaming backend")]
    Unsupported { construct: &'static str },
    #[error("inlining `{function}` exceeded the maximum inlining depth of {limit}")]
    InlineDepthExceeded { function: String, limit: usize },
    #[error("generated invalid vector code: {0}")]
    InvalidCode(#[from] SvcodeError),
}

impl CompileError {
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        match self {
            CompileError::Unsupported { .. } => Diagnostic::error()
                .with_message(self.to_string())
                .with_notes(vec![
                    "array operations can only be evaluated by the reference interpreter"
                        .to_owned(),
                ]),
            CompileError::InlineDepthExceeded { .. } => {
                Diagnostic::error().with_message(self.to_string())
            }
            CompileError::InvalidCode(_) => Diagnostic::bug().with_message(self.to_string()),
        }
    }
}

/// Faults raised by individual instructions at runtime.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Prim(#[from] PrimError),
    #[error("`{op}` expected a segment descriptor token, found `{found}`")]
    ExpectedSegment { op: &'static str, found: Elem },
    #[error("`{op}` expected a scalar, found `{found}`")]
    ExpectedScalar { op: &'static str, found: Elem },
    #[error("`{op}` expected a control pulse, found `{found}`")]
    ExpectedPulse { op: &'static str, found: Elem },
    #[error("`{op}` ran out of elements in the middle of a segment")]
    UnexpectedEnd { op: &'static str },
    #[error("segment lengths must be non-negative integers, found `{0}`")]
    InvalidCount(f64),
    #[error("expected a sequence with a single element, found {len} elements")]
    NotSingleton { len: usize },
    #[error("input `{0}` faulted")]
    Upstream(StreamId),
}

/// Errors produced when running vector code.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("stream `{stream}` faulted: {fault}")]
    Fault { stream: StreamId, fault: Fault },
    #[error("execution stalled with {} result streams unfinished", .waiting.len())]
    Deadlock { waiting: Vec<StreamId> },
    #[error("execution exceeded the limit of {0} scheduler passes")]
    PassLimitExceeded(u64),
    #[error("stream `{0}` is not defined")]
    UnknownStream(StreamId),
    #[error("invalid vector code: {0}")]
    InvalidCode(#[from] SvcodeError),
}

impl RuntimeError {
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        use itertools::Itertools;

        match self {
            RuntimeError::Deadlock { waiting } => Diagnostic::error()
                .with_message(self.to_string())
                .with_notes(vec![
                    format!("waiting on {}", waiting.iter().format(", ")),
                    "a stream buffers a single element, so every reader must consume it \
                     before the producer can continue"
                        .to_owned(),
                ]),
            RuntimeError::UnknownStream(_) | RuntimeError::InvalidCode(_) => {
                Diagnostic::bug().with_message(self.to_string())
            }
            _ => Diagnostic::error().with_message(self.to_string()),
        }
    }
}
