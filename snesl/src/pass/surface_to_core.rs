//! Elaborates the [surface language] into the [core language].
//!
//! This translation pass is the main place where user-facing type errors will be returned.
//! Along the way it works out which names each comprehension and filter
//! captures, and desugars guarded comprehensions into filters.
//!
//! [surface language]: crate::lang::surface
//! [core language]: crate::lang::core

use contracts::debug_ensures;
use crossbeam_channel::Sender;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::lang::core::{self, Capture, Op, Type};
use crate::lang::prim::{Constant, PrimType, ReduceOp, ScalarOp};
use crate::lang::surface::{self, BinaryOp, Literal, Term, TermData, TypeData, UnaryOp};
use crate::lang::{Range, Ranged};
use crate::reporting::{AmbiguousTerm, ExpectedType, Message, SurfaceToCoreMessage};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Reduction {
    Sum,
    Prod,
    All,
    Any,
    Max,
    Min,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Builtin {
    Iota,
    Length,
    Tabulate,
    Sequence,
    Element,
    Empty,
    The,
    Append,
    Concat,
    Zip,
    Split,
    Scalar(ScalarOp),
    Reduce(Reduction),
    Scan(Reduction),
}

impl Builtin {
    /// The number of arguments, or `None` if the builtin is variadic.
    fn arity(self) -> Option<usize> {
        match self {
            Builtin::Zip => None,
            Builtin::Element | Builtin::Append | Builtin::Split => Some(2),
            Builtin::Scalar(op) => Some(op.arity()),
            _ => Some(1),
        }
    }
}

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    use self::Builtin::*;

    vec![
        ("iota", Iota),
        ("len", Length),
        ("tab", Tabulate),
        ("seq", Sequence),
        ("elt", Element),
        ("empty", Empty),
        ("the", The),
        ("append", Append),
        ("concat", Concat),
        ("zip", Zip),
        ("split", Split),
        ("log", Scalar(ScalarOp::Log)),
        ("sqrt", Scalar(ScalarOp::Sqrt)),
        ("sin", Scalar(ScalarOp::Sin)),
        ("cos", Scalar(ScalarOp::Cos)),
        ("sum", Reduce(Reduction::Sum)),
        ("prod", Reduce(Reduction::Prod)),
        ("every", Reduce(Reduction::All)),
        ("some", Reduce(Reduction::Any)),
        ("max", Reduce(Reduction::Max)),
        ("min", Reduce(Reduction::Min)),
        ("sum_scan", Scan(Reduction::Sum)),
        ("prod_scan", Scan(Reduction::Prod)),
        ("every_scan", Scan(Reduction::All)),
        ("some_scan", Scan(Reduction::Any)),
        ("max_scan", Scan(Reduction::Max)),
        ("min_scan", Scan(Reduction::Min)),
    ]
    .into_iter()
    .collect()
});

/// Returns `true` if the name refers to a builtin operation.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

/// The type of a previously defined function.
#[derive(Clone, Debug)]
struct Signature {
    range: Range,
    params: Vec<Type>,
    output_type: Type,
}

/// The state of the elaborator.
pub struct State {
    /// Functions defined so far, which are the only ones that can be called.
    functions: HashMap<String, Signature>,
    /// The function whose body is currently being elaborated.
    current_function: Option<String>,
    /// Local type environment.
    locals: Vec<(String, Type)>,
    /// The diagnostic messages accumulated during elaboration.
    message_tx: Sender<Message>,
}

impl State {
    /// Construct a new elaborator state.
    pub fn new(message_tx: Sender<Message>) -> State {
        State {
            functions: HashMap::new(),
            current_function: None,
            locals: Vec::new(),
            message_tx,
        }
    }

    /// Get the type of a local variable.
    fn get_local(&self, name: &str) -> Option<&Type> {
        let (_, r#type) = self.locals.iter().rev().find(|(n, _)| n == name)?;
        Some(r#type)
    }

    /// Push a local entry.
    fn push_local(&mut self, name: &str, r#type: Type) {
        self.locals.push((name.to_owned(), r#type));
    }

    /// Pop a local entry.
    fn pop_local(&mut self) {
        self.locals.pop();
    }

    /// Replace the local environment, returning the previous one.
    fn replace_locals(&mut self, locals: Vec<(String, Type)>) -> Vec<(String, Type)> {
        std::mem::replace(&mut self.locals, locals)
    }

    /// Report a diagnostic message.
    fn report(&self, message: SurfaceToCoreMessage) {
        self.message_tx.send(message.into()).unwrap();
    }

    fn report_mismatch(&self, range: Range, found_type: Type, expected_type: ExpectedType) {
        self.report(SurfaceToCoreMessage::MismatchedTypes {
            range: range.into(),
            found_type,
            expected_type,
        });
    }

    /// Elaborate a whole program. Functions can only call functions that are
    /// defined before them.
    pub fn from_program<S: AsRef<str>>(&mut self, program: &surface::Program<S>) -> core::Program {
        let definitions = (program.definitions.iter())
            .filter_map(|def| self.from_function_def(def))
            .collect();
        let (main, main_type) = self.synth_type(&program.main);

        core::Program {
            definitions,
            main,
            main_type: main_type.unwrap_or_else(|| Type::Tuple(Vec::new())),
        }
    }

    fn from_function_def<S: AsRef<str>>(
        &mut self,
        def: &surface::FunctionDef<S>,
    ) -> Option<core::FunctionDef> {
        let name = def.name.data.as_ref();

        if is_builtin(name) {
            self.report(SurfaceToCoreMessage::ReservedFunctionName {
                range: def.name.range.into(),
                name: name.to_owned(),
            });
            return None;
        }
        if let Some(original) = self.functions.get(name) {
            self.report(SurfaceToCoreMessage::DuplicateFunction {
                range: def.name.range.into(),
                original_range: original.range.into(),
                name: name.to_owned(),
            });
            return None;
        }

        let params = (def.params.iter())
            .map(|(name, r#type)| (name.data.as_ref().to_owned(), self.from_type(r#type)))
            .collect::<Vec<_>>();
        let output_type = self.from_type(&def.output_type);

        let outer_locals = self.replace_locals(params.clone());
        self.current_function = Some(name.to_owned());
        let body = self.check_type(&def.body, &output_type);
        self.current_function = None;
        self.replace_locals(outer_locals);

        self.functions.insert(
            name.to_owned(),
            Signature {
                range: def.name.range,
                params: params.iter().map(|(_, r#type)| r#type.clone()).collect(),
                output_type: output_type.clone(),
            },
        );

        Some(core::FunctionDef {
            name: name.to_owned(),
            params,
            output_type,
            body,
        })
    }

    /// Translate a type, checking that it is well-formed.
    pub fn from_type(&mut self, r#type: &surface::Type) -> Type {
        let core_type = lower_type(r#type);
        if !core_type.is_well_formed() {
            self.report(SurfaceToCoreMessage::IllFormedType {
                range: r#type.range.into(),
                found_type: core_type.clone(),
            });
        }
        core_type
    }

    /// Check that a term is an element of a type, and return the elaborated term.
    #[debug_ensures(self.locals.len() == old(self.locals.len()))]
    pub fn check_type<S: AsRef<str>>(&mut self, term: &Term<S>, expected_type: &Type) -> core::Term {
        match (&term.data, expected_type) {
            (TermData::Sequence(elem_terms), Type::Sequence(elem_type)) => {
                let elems = (elem_terms.iter())
                    .map(|elem_term| self.check_type(elem_term, elem_type))
                    .collect();
                core::Term::Op(Op::MakeSequence(elem_type.as_ref().clone()), elems)
            }
            (TermData::Tuple(terms), Type::Tuple(types)) if terms.len() == types.len() => {
                let terms = (terms.iter().zip(types))
                    .map(|(term, r#type)| self.check_type(term, r#type))
                    .collect();
                core::Term::Tuple(terms)
            }
            (TermData::Let(name, def, body), _) => {
                let (def, def_type) = self.synth_type(def);
                let def_type = match def_type {
                    Some(def_type) => def_type,
                    None => return core::Term::Error,
                };

                self.push_local(name.data.as_ref(), def_type);
                let body = self.check_type(body, expected_type);
                self.pop_local();

                core::Term::Let(name.data.as_ref().to_owned(), Box::new(def), Box::new(body))
            }

            (_, _) => match self.synth_type(term) {
                (term, Some(found_type)) if found_type == *expected_type => term,
                (_, Some(found_type)) => {
                    self.report_mismatch(
                        term.range,
                        found_type,
                        ExpectedType::Type(expected_type.clone()),
                    );
                    core::Term::Error
                }
                (_, None) => core::Term::Error,
            },
        }
    }

    /// Synthesize the type of a term, returning the elaborated term and its
    /// type. The type is `None` if an error has already been reported.
    #[debug_ensures(self.locals.len() == old(self.locals.len()))]
    pub fn synth_type<S: AsRef<str>>(&mut self, term: &Term<S>) -> (core::Term, Option<Type>) {
        match &term.data {
            TermData::Name(name) => match self.get_local(name.as_ref()) {
                Some(r#type) => {
                    let r#type = r#type.clone();
                    (core::Term::Name(name.as_ref().to_owned()), Some(r#type))
                }
                None => {
                    self.report(SurfaceToCoreMessage::UnboundName {
                        range: term.range.into(),
                        name: name.as_ref().to_owned(),
                    });
                    (core::Term::Error, None)
                }
            },
            TermData::Ann(term, r#type) => {
                let r#type = self.from_type(r#type);
                (self.check_type(term, &r#type), Some(r#type))
            }
            TermData::Literal(literal) => {
                let (term, r#type) = synth_literal(literal);
                (term, Some(r#type))
            }
            TermData::Let(name, def, body) => {
                let (def, def_type) = self.synth_type(def);
                let def_type = match def_type {
                    Some(def_type) => def_type,
                    None => return (core::Term::Error, None),
                };

                self.push_local(name.data.as_ref(), def_type);
                let (body, body_type) = self.synth_type(body);
                self.pop_local();

                let name = name.data.as_ref().to_owned();
                (core::Term::Let(name, Box::new(def), Box::new(body)), body_type)
            }
            TermData::Tuple(terms) => {
                let (terms, types): (Vec<_>, Vec<_>) =
                    terms.iter().map(|term| self.synth_type(term)).unzip();
                let types = types.into_iter().collect::<Option<Vec<_>>>();
                (core::Term::Tuple(terms), types.map(Type::Tuple))
            }
            TermData::TupleElim(head, index) => {
                let index = *index;
                let (head_term, head_type) = self.synth_type(head);
                match head_type {
                    Some(Type::Tuple(mut types)) if index < types.len() => {
                        let r#type = types.swap_remove(index);
                        (core::Term::TupleElim(Box::new(head_term), index), Some(r#type))
                    }
                    Some(head_type @ Type::Tuple(_)) => {
                        self.report(SurfaceToCoreMessage::ProjectionOutOfRange {
                            range: term.range.into(),
                            index,
                            head_type,
                        });
                        (core::Term::Error, None)
                    }
                    Some(found_type) => {
                        self.report_mismatch(head.range, found_type, ExpectedType::Tuple);
                        (core::Term::Error, None)
                    }
                    None => (core::Term::Error, None),
                }
            }
            TermData::FunctionElim(name, args) => self.synth_call(term.range, name, args),
            TermData::Sequence(elem_terms) => match elem_terms.split_first() {
                None => {
                    self.report(SurfaceToCoreMessage::AmbiguousTerm {
                        range: term.range.into(),
                        term: AmbiguousTerm::Sequence,
                    });
                    (core::Term::Error, None)
                }
                Some((first, rest)) => match self.synth_type(first) {
                    (first, Some(elem_type)) => {
                        let elems = std::iter::once(first)
                            .chain(rest.iter().map(|term| self.check_type(term, &elem_type)))
                            .collect();
                        let r#type = Type::sequence(elem_type.clone());
                        (core::Term::Op(Op::MakeSequence(elem_type), elems), Some(r#type))
                    }
                    (_, None) => (core::Term::Error, None),
                },
            },
            TermData::Index(array, index) => {
                self.synth_builtin(term.range, "elt", Builtin::Element, &[&**array, &**index])
            }
            TermData::Comprehension {
                body,
                name,
                source,
                guard,
                captures,
            } => {
                let (source_term, source_type) = self.synth_type(source);
                let elem_type = match self.expect_sequence(source.range, source_type) {
                    Some(elem_type) => elem_type.as_ref().clone(),
                    None => return (core::Term::Error, None),
                };
                let name = name.data.as_ref();
                let source_term = match guard {
                    Some(guard) => self.desugar_guard(name, &elem_type, source_term, guard),
                    None => source_term,
                };

                let bound = Some((name, elem_type));
                let (body, body_type, captures) =
                    self.synth_scoped(term.range, body, captures.as_deref(), bound, true);

                let term = core::Term::Comprehension {
                    name: name.to_owned(),
                    source: Box::new(source_term),
                    body: Box::new(body),
                    captures,
                };
                (term, body_type.map(Type::sequence))
            }
            TermData::Filter {
                body,
                condition,
                captures,
            } => {
                let condition = self.check_type(condition, &Type::bool());
                let (body, body_type, captures) =
                    self.synth_scoped(term.range, body, captures.as_deref(), None, false);

                let term = core::Term::Filter {
                    condition: Box::new(condition),
                    body: Box::new(body),
                    captures,
                };
                (term, body_type.map(Type::sequence))
            }
            TermData::Unary(op, operand) => match op.data {
                UnaryOp::Negate => self.synth_scalar(ScalarOp::Negate, &[&**operand]),
                UnaryOp::Not => self.synth_scalar(ScalarOp::Not, &[&**operand]),
                UnaryOp::Iota => self.synth_builtin(term.range, "iota", Builtin::Iota, &[&**operand]),
                UnaryOp::Length => {
                    self.synth_builtin(term.range, "len", Builtin::Length, &[&**operand])
                }
            },
            TermData::Binary(lhs, op, rhs) => self.synth_binary(lhs, op.data, rhs),
            TermData::Error => (core::Term::Error, None),
        }
    }

    fn expect_sequence(&self, range: Range, found_type: Option<Type>) -> Option<Arc<Type>> {
        match found_type? {
            Type::Sequence(elem_type) => Some(elem_type),
            found_type => {
                self.report_mismatch(range, found_type, ExpectedType::Sequence);
                None
            }
        }
    }

    fn expect_array(&self, range: Range, found_type: Option<Type>) -> Option<Arc<Type>> {
        match found_type? {
            Type::Array(elem_type) => Some(elem_type),
            found_type => {
                self.report_mismatch(range, found_type, ExpectedType::Array);
                None
            }
        }
    }

    /// `{e : x in xs | p}` becomes `{e : x in concat({{x | p} : x in xs})}`.
    fn desugar_guard<S: AsRef<str>>(
        &mut self,
        name: &str,
        elem_type: &Type,
        source: core::Term,
        guard: &Term<S>,
    ) -> core::Term {
        self.push_local(name, elem_type.clone());
        let condition = self.check_type(guard, &Type::bool());
        self.pop_local();

        let guard_captures = (free_names(&condition).into_iter())
            .filter(|free_name| free_name != name)
            .filter_map(|free_name| {
                let r#type = self.get_local(&free_name)?.clone();
                Some(Capture {
                    name: free_name,
                    r#type,
                })
            })
            .collect::<Vec<_>>();
        self.check_concrete(guard.range, &guard_captures);

        let filter_captures = std::iter::once(Capture {
            name: name.to_owned(),
            r#type: elem_type.clone(),
        })
        .chain(guard_captures.iter().cloned())
        .collect();

        let filter = core::Term::Filter {
            condition: Box::new(condition),
            body: Box::new(core::Term::Name(name.to_owned())),
            captures: filter_captures,
        };
        let groups = core::Term::Comprehension {
            name: name.to_owned(),
            source: Box::new(source),
            body: Box::new(filter),
            captures: guard_captures,
        };
        core::Term::Op(Op::Concat, vec![groups])
    }

    /// Elaborate the body of a comprehension or a filter, which can only see
    /// the names it captures and the name bound for each element.
    fn synth_scoped<S: AsRef<str>>(
        &mut self,
        range: Range,
        body: &Term<S>,
        explicit_captures: Option<&[Ranged<S>]>,
        bound: Option<(&str, Type)>,
        concrete: bool,
    ) -> (core::Term, Option<Type>, Vec<Capture>) {
        let bound_name = bound.as_ref().map(|(name, _)| *name);

        match explicit_captures {
            Some(names) => {
                let mut captures = Vec::<Capture>::with_capacity(names.len());
                for name in names {
                    let name_str = name.data.as_ref();
                    if captures.iter().any(|capture| capture.name == name_str) {
                        continue;
                    }
                    match self.get_local(name_str) {
                        Some(r#type) => captures.push(Capture {
                            name: name_str.to_owned(),
                            r#type: r#type.clone(),
                        }),
                        None => self.report(SurfaceToCoreMessage::UnboundName {
                            range: name.range.into(),
                            name: name_str.to_owned(),
                        }),
                    }
                }
                if concrete {
                    self.check_concrete(range, &captures);
                }

                let scope = (captures.iter())
                    .map(|capture| (capture.name.clone(), capture.r#type.clone()))
                    .chain(bound.map(|(name, r#type)| (name.to_owned(), r#type)))
                    .collect();
                let outer_locals = self.replace_locals(scope);
                let (body, body_type) = self.synth_type(body);
                self.replace_locals(outer_locals);

                (body, body_type, captures)
            }
            None => {
                let bound_count = bound.iter().count();
                if let Some((name, r#type)) = bound {
                    self.push_local(name, r#type);
                }
                let (body, body_type) = self.synth_type(body);
                for _ in 0..bound_count {
                    self.pop_local();
                }

                let captures = (free_names(&body).into_iter())
                    .filter(|name| Some(name.as_str()) != bound_name)
                    .filter_map(|name| {
                        let r#type = self.get_local(&name)?.clone();
                        Some(Capture { name, r#type })
                    })
                    .collect::<Vec<_>>();
                if concrete {
                    self.check_concrete(range, &captures);
                }

                (body, body_type, captures)
            }
        }
    }

    /// Values can only be distributed over the elements of a sequence if
    /// they contain no sequences themselves.
    fn check_concrete(&self, range: Range, captures: &[Capture]) {
        for capture in captures.iter().filter(|c| !c.r#type.is_concrete()) {
            self.report(SurfaceToCoreMessage::NonConcreteCapture {
                range: range.into(),
                name: capture.name.clone(),
                found_type: capture.r#type.clone(),
            });
        }
    }

    fn synth_call<S: AsRef<str>>(
        &mut self,
        range: Range,
        name: &Ranged<S>,
        args: &[Term<S>],
    ) -> (core::Term, Option<Type>) {
        let name_str = name.data.as_ref();

        if let Some(builtin) = BUILTINS.get(name_str) {
            let args = args.iter().collect::<Vec<_>>();
            return self.synth_builtin(range, name_str, *builtin, &args);
        }
        if self.current_function.as_deref() == Some(name_str) {
            self.report(SurfaceToCoreMessage::RecursiveFunction {
                range: name.range.into(),
                name: name_str.to_owned(),
            });
            return (core::Term::Error, None);
        }

        let signature = match self.functions.get(name_str) {
            Some(signature) => signature.clone(),
            None => {
                self.report(SurfaceToCoreMessage::UnboundFunction {
                    range: name.range.into(),
                    name: name_str.to_owned(),
                });
                return (core::Term::Error, None);
            }
        };
        if signature.params.len() != args.len() {
            self.report(SurfaceToCoreMessage::MismatchedArity {
                range: range.into(),
                name: name_str.to_owned(),
                expected_arity: signature.params.len(),
                found_arity: args.len(),
            });
            return (core::Term::Error, None);
        }

        let args = (args.iter().zip(&signature.params))
            .map(|(arg, param_type)| self.check_type(arg, param_type))
            .collect();
        let term = core::Term::FunctionElim(name_str.to_owned(), args);
        (term, Some(signature.output_type))
    }

    fn synth_builtin<S: AsRef<str>>(
        &mut self,
        range: Range,
        name: &str,
        builtin: Builtin,
        args: &[&Term<S>],
    ) -> (core::Term, Option<Type>) {
        let expected_arity = builtin.arity().unwrap_or(2);
        let arity_matches = match builtin.arity() {
            Some(arity) => args.len() == arity,
            None => args.len() >= expected_arity,
        };
        if !arity_matches {
            self.report(SurfaceToCoreMessage::MismatchedArity {
                range: range.into(),
                name: name.to_owned(),
                expected_arity,
                found_arity: args.len(),
            });
            return (core::Term::Error, None);
        }

        let op = |op, args| core::Term::Op(op, args);

        match builtin {
            Builtin::Iota => {
                let n = self.check_type(args[0], &Type::num());
                (op(Op::Iota, vec![n]), Some(Type::sequence(Type::num())))
            }
            Builtin::Length => {
                let (array, array_type) = self.synth_type(args[0]);
                match self.expect_array(args[0].range, array_type) {
                    Some(_) => (op(Op::Length, vec![array]), Some(Type::num())),
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Tabulate => {
                let (elems, seq_type) = self.synth_type(args[0]);
                let elem_type = match self.expect_sequence(args[0].range, seq_type) {
                    Some(elem_type) => elem_type,
                    None => return (core::Term::Error, None),
                };
                let array_type = Type::Array(elem_type);
                if !array_type.is_well_formed() {
                    self.report(SurfaceToCoreMessage::IllFormedType {
                        range: range.into(),
                        found_type: array_type,
                    });
                    return (core::Term::Error, None);
                }
                (op(Op::Tabulate, vec![elems]), Some(array_type))
            }
            Builtin::Sequence => {
                let (array, array_type) = self.synth_type(args[0]);
                match self.expect_array(args[0].range, array_type) {
                    Some(elem_type) => (op(Op::Sequence, vec![array]), Some(Type::Sequence(elem_type))),
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Element => {
                let (array, array_type) = self.synth_type(args[0]);
                let index = self.check_type(args[1], &Type::num());
                match self.expect_array(args[0].range, array_type) {
                    Some(elem_type) => {
                        let elem_type = elem_type.as_ref().clone();
                        (op(Op::Element, vec![array, index]), Some(elem_type))
                    }
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Empty => {
                let (elems, seq_type) = self.synth_type(args[0]);
                match self.expect_sequence(args[0].range, seq_type) {
                    Some(_) => (op(Op::Empty, vec![elems]), Some(Type::bool())),
                    None => (core::Term::Error, None),
                }
            }
            Builtin::The => {
                let (elems, seq_type) = self.synth_type(args[0]);
                match self.expect_sequence(args[0].range, seq_type) {
                    Some(elem_type) => (op(Op::The, vec![elems]), Some(elem_type.as_ref().clone())),
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Append => {
                let (xs, seq_type) = self.synth_type(args[0]);
                let elem_type = match self.expect_sequence(args[0].range, seq_type) {
                    Some(elem_type) => elem_type,
                    None => return (core::Term::Error, None),
                };
                let seq_type = Type::Sequence(elem_type.clone());
                let ys = self.check_type(args[1], &seq_type);
                let elem_type = elem_type.as_ref().clone();
                (op(Op::Append(elem_type), vec![xs, ys]), Some(seq_type))
            }
            Builtin::Concat => {
                let (xss, seq_type) = self.synth_type(args[0]);
                let inner_type = self.expect_sequence(args[0].range, seq_type);
                let inner_type = inner_type.map(|inner_type| inner_type.as_ref().clone());
                match self.expect_sequence(args[0].range, inner_type) {
                    Some(elem_type) => (op(Op::Concat, vec![xss]), Some(Type::Sequence(elem_type))),
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Zip => {
                let mut terms = Vec::with_capacity(args.len());
                let mut elem_types = Some(Vec::with_capacity(args.len()));
                for arg in args {
                    let (term, seq_type) = self.synth_type(arg);
                    terms.push(term);
                    let elem_type = self.expect_sequence(arg.range, seq_type);
                    elem_types = elem_types.and_then(|mut elem_types| {
                        elem_types.push(elem_type?.as_ref().clone());
                        Some(elem_types)
                    });
                }
                let r#type = elem_types.map(|types| Type::sequence(Type::Tuple(types)));
                (op(Op::Zip, terms), r#type)
            }
            Builtin::Split => {
                let (xs, seq_type) = self.synth_type(args[0]);
                let flags = self.check_type(args[1], &Type::sequence(Type::bool()));
                match self.expect_sequence(args[0].range, seq_type) {
                    Some(elem_type) => {
                        let r#type = Type::sequence(Type::Sequence(elem_type));
                        (op(Op::Split, vec![xs, flags]), Some(r#type))
                    }
                    None => (core::Term::Error, None),
                }
            }
            Builtin::Scalar(scalar_op) => self.synth_scalar(scalar_op, args),
            Builtin::Reduce(reduction) => match self.synth_reduction(reduction, args[0]) {
                Some((reduce_op, elems)) => {
                    let r#type = Type::Prim(reduce_op.element_type());
                    (op(Op::Reduce(reduce_op), vec![elems]), Some(r#type))
                }
                None => (core::Term::Error, None),
            },
            Builtin::Scan(reduction) => match self.synth_reduction(reduction, args[0]) {
                Some((reduce_op, elems)) => {
                    let r#type = Type::sequence(Type::Prim(reduce_op.element_type()));
                    (op(Op::Scan(reduce_op), vec![elems]), Some(r#type))
                }
                None => (core::Term::Error, None),
            },
        }
    }

    /// Elaborate the operand of a reduction or a scan, choosing the operator
    /// for the element type.
    fn synth_reduction<S: AsRef<str>>(
        &mut self,
        reduction: Reduction,
        elems: &Term<S>,
    ) -> Option<(ReduceOp, core::Term)> {
        let checked = |state: &mut State, reduce_op: ReduceOp| {
            let elem_type = Type::Prim(reduce_op.element_type());
            let term = state.check_type(elems, &Type::sequence(elem_type));
            Some((reduce_op, term))
        };

        match reduction {
            Reduction::Sum => checked(self, ReduceOp::Sum),
            Reduction::Prod => checked(self, ReduceOp::Prod),
            Reduction::All => checked(self, ReduceOp::All),
            Reduction::Any => checked(self, ReduceOp::Any),
            Reduction::Max | Reduction::Min => {
                let (term, seq_type) = self.synth_type(elems);
                let elem_type = self.expect_sequence(elems.range, seq_type)?;
                let prim_type = match elem_type.as_ref() {
                    Type::Prim(prim_type) => *prim_type,
                    elem_type => {
                        self.report_mismatch(elems.range, elem_type.clone(), ExpectedType::Prim);
                        return None;
                    }
                };
                match reduction {
                    Reduction::Max => Some((ReduceOp::Max(prim_type), term)),
                    _ => Some((ReduceOp::Min(prim_type), term)),
                }
            }
        }
    }

    fn synth_scalar<S: AsRef<str>>(
        &mut self,
        scalar_op: ScalarOp,
        args: &[&Term<S>],
    ) -> (core::Term, Option<Type>) {
        let input_type = Type::Prim(scalar_op.input_type());
        let args = (args.iter())
            .map(|arg| self.check_type(arg, &input_type))
            .collect();
        let output_type = Type::Prim(scalar_op.output_type());
        (core::Term::Op(Op::Scalar(scalar_op), args), Some(output_type))
    }

    fn synth_binary<S: AsRef<str>>(
        &mut self,
        lhs: &Term<S>,
        op: BinaryOp,
        rhs: &Term<S>,
    ) -> (core::Term, Option<Type>) {
        let arithmetic = match op {
            BinaryOp::Or => Some(ScalarOp::Or),
            BinaryOp::And => Some(ScalarOp::And),
            BinaryOp::Add => Some(ScalarOp::Add),
            BinaryOp::Sub => Some(ScalarOp::Sub),
            BinaryOp::Mul => Some(ScalarOp::Mul),
            BinaryOp::Div => Some(ScalarOp::Div),
            BinaryOp::Mod => Some(ScalarOp::Mod),
            BinaryOp::Pow => Some(ScalarOp::Pow),
            _ => None,
        };
        if let Some(scalar_op) = arithmetic {
            return self.synth_scalar(scalar_op, &[lhs, rhs]);
        }

        // Comparisons take the type of their left operand
        let (lhs_term, lhs_type) = self.synth_type(lhs);
        let prim_type = match lhs_type {
            Some(Type::Prim(prim_type)) => prim_type,
            Some(found_type) => {
                self.report_mismatch(lhs.range, found_type, ExpectedType::Prim);
                return (core::Term::Error, None);
            }
            None => return (core::Term::Error, None),
        };
        let rhs_term = self.check_type(rhs, &Type::Prim(prim_type));

        let scalar_op = match op {
            BinaryOp::Eq => ScalarOp::Eq(prim_type),
            BinaryOp::Neq => ScalarOp::Neq(prim_type),
            BinaryOp::Lt => ScalarOp::Lt(prim_type),
            BinaryOp::Gt => ScalarOp::Gt(prim_type),
            BinaryOp::Leq => ScalarOp::Leq(prim_type),
            _ => ScalarOp::Geq(prim_type),
        };
        let term = core::Term::Op(Op::Scalar(scalar_op), vec![lhs_term, rhs_term]);
        (term, Some(Type::bool()))
    }
}

fn lower_type(r#type: &surface::Type) -> Type {
    match &r#type.data {
        TypeData::Num => Type::num(),
        TypeData::Bool => Type::bool(),
        TypeData::Char => Type::char(),
        TypeData::Tuple(types) => Type::Tuple(types.iter().map(lower_type).collect()),
        TypeData::Array(elem_type) => Type::array(lower_type(elem_type)),
        TypeData::Sequence(elem_type) => Type::sequence(lower_type(elem_type)),
    }
}

fn synth_literal(literal: &Literal) -> (core::Term, Type) {
    match literal {
        Literal::Number(value) => (core::Term::Constant(Constant::Num(*value)), Type::num()),
        Literal::Char(c) => (core::Term::Constant(Constant::Char(*c)), Type::char()),
        Literal::Bool(b) => (core::Term::Constant(Constant::Bool(*b)), Type::bool()),
        Literal::String(s) => {
            let chars = s.chars().map(|c| core::Term::Constant(Constant::Char(c)));
            let term = core::Term::Op(Op::MakeSequence(Type::char()), chars.collect());
            (term, Type::sequence(Type::Prim(PrimType::Char)))
        }
    }
}

/// The names a term refers to from its enclosing scope, in order of first
/// occurrence.
pub fn free_names(term: &core::Term) -> Vec<String> {
    let mut names = Vec::new();
    collect_free_names(term, &mut Vec::new(), &mut names);
    names
}

fn record_free_name(name: &str, bound: &[String], names: &mut Vec<String>) {
    if bound.iter().all(|bound| bound != name) && names.iter().all(|n| n != name) {
        names.push(name.to_owned());
    }
}

fn collect_free_names(term: &core::Term, bound: &mut Vec<String>, names: &mut Vec<String>) {
    match term {
        core::Term::Name(name) => record_free_name(name, bound, names),
        core::Term::Constant(_) | core::Term::Error => {}
        core::Term::Tuple(terms) | core::Term::FunctionElim(_, terms) | core::Term::Op(_, terms) => {
            for term in terms {
                collect_free_names(term, bound, names);
            }
        }
        core::Term::TupleElim(head, _) => collect_free_names(head, bound, names),
        core::Term::Let(name, def, body) => {
            collect_free_names(def, bound, names);
            bound.push(name.clone());
            collect_free_names(body, bound, names);
            bound.pop();
        }
        core::Term::Comprehension {
            source, captures, ..
        } => {
            collect_free_names(source, bound, names);
            for capture in captures {
                record_free_name(&capture.name, bound, names);
            }
        }
        core::Term::Filter {
            condition,
            captures,
            ..
        } => {
            collect_free_names(condition, bound, names);
            for capture in captures {
                record_free_name(&capture.name, bound, names);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::core::semantics::{self, Value};

    fn elaborate(source: &str) -> (core::Program, Vec<Message>) {
        let (message_tx, message_rx) = crossbeam_channel::unbounded();
        let surface_program = surface::Program::from_str(source).unwrap();
        let program = State::new(message_tx).from_program(&surface_program);
        (program, message_rx.try_iter().collect())
    }

    fn elaborate_ok(source: &str) -> core::Program {
        let (program, messages) = elaborate(source);
        assert!(messages.is_empty(), "unexpected messages: {:?}", messages);
        program
    }

    fn single_message(source: &str) -> SurfaceToCoreMessage {
        let (_, mut messages) = elaborate(source);
        assert_eq!(messages.len(), 1, "expected one message: {:?}", messages);
        match messages.remove(0) {
            Message::SurfaceToCore(message) => message,
            message => panic!("unexpected message: {:?}", message),
        }
    }

    #[test]
    fn function_calls() {
        let program = elaborate_ok("num sq(num x) { x * x } main = {sq(y) : y in [1, 2, 3]}");
        assert_eq!(program.main_type, Type::sequence(Type::num()));
        assert_eq!(
            semantics::eval_program(&program),
            Ok(Value::Sequence(vec![Value::num(1.0), Value::num(4.0), Value::num(9.0)])),
        );
    }

    #[test]
    fn captures_are_inferred() {
        let program = elaborate_ok("let k = 2 in let unused = 3 in {x * k : x in &3}");
        match program.main {
            core::Term::Let(_, _, body) => match *body {
                core::Term::Let(_, _, body) => match *body {
                    core::Term::Comprehension { captures, .. } => {
                        assert_eq!(
                            captures,
                            vec![Capture {
                                name: "k".to_owned(),
                                r#type: Type::num(),
                            }],
                        );
                    }
                    term => panic!("unexpected term: {:?}", term),
                },
                term => panic!("unexpected term: {:?}", term),
            },
            term => panic!("unexpected term: {:?}", term),
        }
    }

    #[test]
    fn explicit_captures_restrict_scope() {
        assert!(matches!(
            single_message("let k = 2 in {x * k : x in &3 using}"),
            SurfaceToCoreMessage::UnboundName { name, .. } if name == "k",
        ));
    }

    #[test]
    fn sequence_captures_are_rejected() {
        assert!(matches!(
            single_message("let xs = [1, 2] in {x + sum(xs) : x in xs}"),
            SurfaceToCoreMessage::NonConcreteCapture { name, .. } if name == "xs",
        ));
    }

    #[test]
    fn filters_may_capture_sequences() {
        let program = elaborate_ok("let xs = [1, 2] in {sum(xs) | true}");
        assert_eq!(
            semantics::eval_program(&program),
            Ok(Value::Sequence(vec![Value::num(3.0)])),
        );
    }

    #[test]
    fn guards_are_desugared() {
        let program = elaborate_ok("let k = 2 in {x : x in [1, 2, 3, 4] | x % k == 0}");
        assert_eq!(
            semantics::eval_program(&program),
            Ok(Value::Sequence(vec![Value::num(2.0), Value::num(4.0)])),
        );
    }

    #[test]
    fn recursive_functions() {
        assert!(matches!(
            single_message("num f(num x) { f(x) } main = f(1)"),
            SurfaceToCoreMessage::RecursiveFunction { name, .. } if name == "f",
        ));
    }

    #[test]
    fn forward_references() {
        assert!(matches!(
            single_message("num f(num x) { g(x) } num g(num x) { x } main = f(1)"),
            SurfaceToCoreMessage::UnboundFunction { name, .. } if name == "g",
        ));
    }

    #[test]
    fn builtins_are_reserved() {
        assert!(matches!(
            single_message("num sum(num x) { x } main = 1"),
            SurfaceToCoreMessage::ReservedFunctionName { name, .. } if name == "sum",
        ));
    }

    #[test]
    fn duplicate_functions() {
        assert!(matches!(
            single_message("num f(num x) { x } num f(num y) { y } main = f(1)"),
            SurfaceToCoreMessage::DuplicateFunction { name, .. } if name == "f",
        ));
    }

    #[test]
    fn empty_sequences_need_annotations() {
        assert!(matches!(
            single_message("main = []"),
            SurfaceToCoreMessage::AmbiguousTerm { .. },
        ));
        let program = elaborate_ok("main = ([] : {num})");
        assert_eq!(program.main_type, Type::sequence(Type::num()));
    }

    #[test]
    fn mismatched_types() {
        assert!(matches!(
            single_message("main = 1 + true"),
            SurfaceToCoreMessage::MismatchedTypes { .. },
        ));
    }

    #[test]
    fn mismatched_arity() {
        assert!(matches!(
            single_message("main = iota(1, 2)"),
            SurfaceToCoreMessage::MismatchedArity { expected_arity: 1, found_arity: 2, .. },
        ));
    }

    #[test]
    fn arrays_of_sequences_are_ill_formed() {
        assert!(matches!(
            single_message("main = ([] : {[{num}]})"),
            SurfaceToCoreMessage::IllFormedType { .. },
        ));
    }

    #[test]
    fn comparisons_are_typed_by_their_operands() {
        let program = elaborate_ok("main = 'a' < 'b'");
        assert_eq!(
            program.main,
            core::Term::Op(
                Op::Scalar(ScalarOp::Lt(PrimType::Char)),
                vec![
                    core::Term::Constant(Constant::Char('a')),
                    core::Term::Constant(Constant::Char('b')),
                ],
            ),
        );
    }

    #[test]
    fn max_is_typed_by_its_elements() {
        let program = elaborate_ok("main = max(\"snesl\")");
        assert_eq!(program.main_type, Type::char());
    }
}
