//! Flattens the [core language] into [vector code].
//!
//! Every term is compiled relative to a control stream, which carries one
//! pulse for each lane that the term is evaluated in. Comprehensions and
//! filters compile their bodies under a new control stream derived from a
//! segment descriptor, so nested parallelism becomes a flat set of segmented
//! instructions regardless of nesting depth. Function calls are inlined.
//!
//! [core language]: crate::lang::core
//! [vector code]: crate::lang::svcode

use crate::lang::core::{Capture, Op, Program, Term, Type};
use crate::lang::prim::Constant;
use crate::lang::svcode::gen::{emit, sequence, Gen};
use crate::lang::svcode::{self, Kind, Reducer, StreamId, StreamTree, Svcode, ValueTree};
use crate::reporting::CompileError;

/// The maximum depth of nested function calls.
pub const MAX_INLINE_DEPTH: usize = 256;

/// The value trees of the names in scope.
pub type Locals = im::HashMap<String, ValueTree>;

/// A compiled program.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub code: Svcode,
    /// The layout of the program's result over the streams defined by `code`.
    pub value: ValueTree,
}

/// Compile the main term of a program.
pub fn compile_program(program: &Program) -> Result<Compiled, CompileError> {
    let scope = Scope {
        program,
        ctrl: StreamId::Ctrl,
        depth: 0,
    };
    let generated = compile_term(scope, &Locals::new(), &program.main).run(0)?;

    let code = Svcode::new(generated.instructions);
    code.validate()?;
    log::debug!(
        "compiled {} instructions, with {} result streams",
        code.len(),
        generated.value.streams().len(),
    );

    Ok(Compiled {
        code,
        value: generated.value,
    })
}

#[derive(Copy, Clone)]
struct Scope<'a> {
    program: &'a Program,
    /// The control stream of the current lanes.
    ctrl: StreamId,
    /// The number of enclosing function calls.
    depth: usize,
}

/// Report a value tree that does not match the type of its term.
fn unexpected_tree(context: &str, tree: &ValueTree) -> ! {
    panic!(
        "{}: unexpected value tree `{:?}` (unreachable for well-typed term)",
        context, tree,
    )
}

fn lookup(locals: &Locals, name: &str) -> ValueTree {
    match locals.get(name) {
        Some(tree) => tree.clone(),
        None => panic!("unbound name `{}` (unreachable for well-typed term)", name),
    }
}

fn into_sid(context: &str, tree: ValueTree) -> StreamId {
    match tree {
        StreamTree::Sid(name, _) => name,
        tree => unexpected_tree(context, &tree),
    }
}

fn into_seq(context: &str, tree: ValueTree) -> (StreamId, ValueTree) {
    match tree {
        StreamTree::Seq(ssd, elems) => (ssd, *elems),
        tree => unexpected_tree(context, &tree),
    }
}

fn next_tree(context: &str, trees: &mut impl Iterator<Item = ValueTree>) -> ValueTree {
    match trees.next() {
        Some(tree) => tree,
        None => panic!("{}: missing operand (unreachable for well-typed term)", context),
    }
}

fn compile_term<'a>(scope: Scope<'a>, locals: &Locals, term: &'a Term) -> Gen<'a, ValueTree> {
    match term {
        Term::Name(name) => Gen::pure(lookup(locals, name)),
        Term::Constant(constant) => {
            let kind = Kind::Prim(constant.prim_type());
            emit(svcode::Op::Rep(*constant), vec![scope.ctrl])
                .map(move |name| StreamTree::Sid(name, kind))
        }
        Term::Tuple(terms) => compile_terms(scope, locals, terms).map(StreamTree::Tuple),
        Term::TupleElim(head, index) => {
            let index = *index;
            compile_term(scope, locals, head).map(move |tree| match tree {
                StreamTree::Tuple(mut trees) if index < trees.len() => trees.swap_remove(index),
                tree => unexpected_tree("projection", &tree),
            })
        }
        Term::Let(name, def, body) => {
            let locals = locals.clone();
            compile_term(scope, &locals, def).bind(move |tree| {
                compile_term(scope, &locals.update(name.clone(), tree), body)
            })
        }
        Term::FunctionElim(name, args) => {
            let def = match scope.program.definition(name) {
                Some(def) => def,
                None => panic!("unbound function `{}` (unreachable for well-typed term)", name),
            };
            if scope.depth >= MAX_INLINE_DEPTH {
                return Gen::fail(CompileError::InlineDepthExceeded {
                    function: name.clone(),
                    limit: MAX_INLINE_DEPTH,
                });
            }

            compile_terms(scope, locals, args).bind(move |trees| {
                let params = def.params.iter().map(|(name, _)| name.clone());
                let scope = Scope {
                    depth: scope.depth + 1,
                    ..scope
                };
                compile_term(scope, &params.zip(trees).collect(), &def.body)
            })
        }
        Term::Comprehension {
            name,
            source,
            body,
            captures,
        } => {
            let locals = locals.clone();
            compile_term(scope, &locals, source).bind(move |tree| {
                let (ssd, elems) = into_seq("comprehension", tree);
                emit(svcode::Op::SsdToCtrl, vec![ssd]).bind(move |ctrl| {
                    let dists = (captures.iter())
                        .map(|capture| dist(ssd, lookup(&locals, &capture.name)))
                        .collect();
                    sequence(dists).bind(move |trees| {
                        let locals = bind_captures(captures, trees).update(name.clone(), elems);
                        compile_term(Scope { ctrl, ..scope }, &locals, body)
                            .map(move |elems| StreamTree::seq(ssd, elems))
                    })
                })
            })
        }
        Term::Filter {
            condition,
            body,
            captures,
        } => {
            let locals = locals.clone();
            compile_term(scope, &locals, condition).bind(move |tree| {
                let flags = into_sid("filter", tree);
                emit(svcode::Op::BoolToSsd, vec![flags]).bind(move |ssd| {
                    emit(svcode::Op::SsdToCtrl, vec![ssd]).bind(move |ctrl| {
                        let packs = (captures.iter())
                            .map(|capture| pack(flags, lookup(&locals, &capture.name)))
                            .collect();
                        sequence(packs).bind(move |trees| {
                            let locals = bind_captures(captures, trees);
                            compile_term(Scope { ctrl, ..scope }, &locals, body)
                                .map(move |elems| StreamTree::seq(ssd, elems))
                        })
                    })
                })
            })
        }
        Term::Op(op, args) => {
            compile_terms(scope, locals, args).bind(move |trees| compile_op(scope.ctrl, op, trees))
        }
        Term::Error => panic!("error sentinel (unreachable for well-typed term)"),
    }
}

fn compile_terms<'a>(
    scope: Scope<'a>,
    locals: &Locals,
    terms: &'a [Term],
) -> Gen<'a, Vec<ValueTree>> {
    sequence(
        terms
            .iter()
            .map(|term| compile_term(scope, locals, term))
            .collect(),
    )
}

fn bind_captures(captures: &[Capture], trees: Vec<ValueTree>) -> Locals {
    (captures.iter())
        .map(|capture| capture.name.clone())
        .zip(trees)
        .collect()
}

fn compile_op<'a>(ctrl: StreamId, op: &'a Op, trees: Vec<ValueTree>) -> Gen<'a, ValueTree> {
    let name = op.name();
    let mut trees = trees.into_iter();

    match op {
        Op::Scalar(op) => {
            let args = trees.map(|tree| into_sid(name, tree)).collect();
            let kind = Kind::Prim(op.output_type());
            emit(svcode::Op::Map(*op), args).map(move |name| StreamTree::Sid(name, kind))
        }
        Op::Iota => {
            let count = into_sid(name, next_tree(name, &mut trees));
            emit(svcode::Op::NumToSsd, vec![count]).bind(|ssd| {
                emit(svcode::Op::Iotas, vec![ssd])
                    .map(move |elems| StreamTree::seq(ssd, StreamTree::Sid(elems, Kind::NUM)))
            })
        }
        Op::MakeSequence(elem_type) => mkseq(ctrl, trees.collect(), move |chunks, trees| {
            interleave(elem_type, chunks, trees)
        }),
        Op::Empty => {
            let (ssd, _) = into_seq(name, next_tree(name, &mut trees));
            emit(svcode::Op::SsdToEmpty, vec![ssd]).map(|name| StreamTree::Sid(name, Kind::BOOL))
        }
        Op::The => {
            let (ssd, elems) = into_seq(name, next_tree(name, &mut trees));
            emit(svcode::Op::CheckSingletons, vec![ssd]).map(move |_| elems)
        }
        Op::Append(elem_type) => mkseq(ctrl, trees.collect(), move |chunks, trees| {
            interleave_sequences(elem_type, chunks, trees)
        })
        .bind(concat),
        Op::Concat => concat(next_tree(name, &mut trees)),
        Op::Zip => {
            let (ssds, elems): (Vec<_>, Vec<_>) = trees.map(|tree| into_seq(name, tree)).unzip();
            match ssds.first() {
                Some(ssd) => Gen::pure(StreamTree::seq(*ssd, StreamTree::Tuple(elems))),
                None => panic!("zip: no operands (unreachable for well-typed term)"),
            }
        }
        Op::Split => {
            let (ssd, elems) = into_seq(name, next_tree(name, &mut trees));
            let (_, flags) = into_seq(name, next_tree(name, &mut trees));
            let flags = into_sid(name, flags);

            emit(svcode::Op::Reduce(Reducer::EndFlagCount), vec![ssd, flags]).bind(move |outer| {
                emit(svcode::Op::EndFlagsToSsd, vec![ssd, flags])
                    .map(move |inner| StreamTree::seq(outer, StreamTree::seq(inner, elems)))
            })
        }
        Op::Tabulate | Op::Sequence | Op::Length | Op::Element => {
            Gen::fail(CompileError::Unsupported { construct: name })
        }
        Op::Reduce(op) => {
            let (ssd, elems) = into_seq(name, next_tree(name, &mut trees));
            let elems = into_sid(name, elems);
            let kind = Kind::Prim(op.element_type());
            emit(svcode::Op::Reduce(Reducer::Fold(*op)), vec![ssd, elems])
                .map(move |name| StreamTree::Sid(name, kind))
        }
        Op::Scan(op) => {
            let (ssd, elems) = into_seq(name, next_tree(name, &mut trees));
            let elems = into_sid(name, elems);
            let kind = Kind::Prim(op.element_type());
            emit(svcode::Op::Scan(*op), vec![ssd, elems])
                .map(move |name| StreamTree::seq(ssd, StreamTree::Sid(name, kind)))
        }
    }
}

/// `ss(outer, ss(inner, elems))` becomes `ss(ssd_concat(outer, inner), elems)`.
fn concat<'a>(tree: ValueTree) -> Gen<'a, ValueTree> {
    let (outer, elems) = into_seq("concat", tree);
    let (inner, elems) = into_seq("concat", elems);
    emit(svcode::Op::SsdConcat, vec![outer, inner]).map(move |ssd| StreamTree::seq(ssd, elems))
}

/// Build a sequence from the values of each lane's elements.
fn mkseq<'a>(
    ctrl: StreamId,
    trees: Vec<ValueTree>,
    interleave_elems: impl FnOnce(Vec<StreamId>, Vec<ValueTree>) -> Gen<'a, ValueTree> + 'a,
) -> Gen<'a, ValueTree> {
    let len = trees.len();

    emit(svcode::Op::Rep(Constant::Num(len as f64)), vec![ctrl])
        .bind(|len| emit(svcode::Op::NumToSsd, vec![len]))
        .bind(move |outer| {
            // One descriptor per element, so that `il` never waits on itself.
            let chunks = (0..len).map(|_| unit_chunk(ctrl)).collect();
            sequence(chunks)
                .bind(move |chunks| interleave_elems(chunks, trees))
                .map(move |elems| StreamTree::seq(outer, elems))
        })
}

/// A descriptor with one single-item segment for each lane.
fn unit_chunk<'a>(ctrl: StreamId) -> Gen<'a, StreamId> {
    emit(svcode::Op::Rep(Constant::Num(1.0)), vec![ctrl])
        .bind(|one| emit(svcode::Op::NumToSsd, vec![one]))
}

/// Interleave the values of some trees, lane by lane, taking the items
/// described by one segment of each chunk descriptor in turn.
fn interleave<'a>(
    elem_type: &'a Type,
    chunks: Vec<StreamId>,
    trees: Vec<ValueTree>,
) -> Gen<'a, ValueTree> {
    let count = trees.len();

    match elem_type {
        Type::Prim(prim_type) => {
            let kind = Kind::Prim(*prim_type);
            let args = (chunks.into_iter())
                .chain(trees.into_iter().map(|tree| into_sid("il", tree)))
                .collect();
            emit(svcode::Op::Il(kind, count), args).map(move |name| StreamTree::Sid(name, kind))
        }
        Type::Tuple(types) => {
            let mut columns = vec![Vec::with_capacity(count); types.len()];
            for tree in trees {
                match tree {
                    StreamTree::Tuple(components) if components.len() == types.len() => {
                        for (column, component) in columns.iter_mut().zip(components) {
                            column.push(component);
                        }
                    }
                    tree => unexpected_tree("il", &tree),
                }
            }

            let gens = (types.iter().zip(columns))
                .map(|(r#type, column)| interleave(r#type, chunks.clone(), column))
                .collect();
            sequence(gens).map(StreamTree::Tuple)
        }
        Type::Sequence(elem_type) => interleave_sequences(elem_type, chunks, trees),
        Type::Array(_) => Gen::fail(CompileError::Unsupported { construct: "array" }),
    }
}

fn interleave_sequences<'a>(
    elem_type: &'a Type,
    chunks: Vec<StreamId>,
    trees: Vec<ValueTree>,
) -> Gen<'a, ValueTree> {
    let (ssds, elems): (Vec<_>, Vec<_>) =
        trees.into_iter().map(|tree| into_seq("ssd_il", tree)).unzip();
    let args = chunks.iter().chain(&ssds).copied().collect();

    emit(svcode::Op::SsdIl(ssds.len()), args).bind(move |ssd| {
        // The items of each element's segments become the next level's chunks.
        let next_chunks = (chunks.into_iter().zip(ssds))
            .map(|(chunk, ssd)| emit(svcode::Op::SsdConcat, vec![chunk, ssd]))
            .collect();
        sequence(next_chunks)
            .bind(move |chunks| interleave(elem_type, chunks, elems))
            .map(move |elems| StreamTree::seq(ssd, elems))
    })
}

/// Repeat a value for every item of each segment.
fn dist<'a>(ssd: StreamId, tree: ValueTree) -> Gen<'a, ValueTree> {
    match tree {
        StreamTree::Sid(name, kind) => {
            emit(svcode::Op::Dist(kind), vec![ssd, name]).map(move |name| StreamTree::Sid(name, kind))
        }
        StreamTree::Tuple(trees) => {
            sequence(trees.into_iter().map(|tree| dist(ssd, tree)).collect())
                .map(StreamTree::Tuple)
        }
        StreamTree::Array(_, _) => Gen::fail(CompileError::Unsupported { construct: "array" }),
        tree @ StreamTree::Seq(_, _) => unexpected_tree("dist", &tree),
    }
}

/// Keep the lanes of a value whose flag is true.
fn pack<'a>(flags: StreamId, tree: ValueTree) -> Gen<'a, ValueTree> {
    match tree {
        StreamTree::Sid(name, kind) => {
            emit(svcode::Op::Pack(kind), vec![flags, name]).map(move |name| StreamTree::Sid(name, kind))
        }
        StreamTree::Tuple(trees) => {
            sequence(trees.into_iter().map(|tree| pack(flags, tree)).collect())
                .map(StreamTree::Tuple)
        }
        StreamTree::Seq(ssd, elems) => emit(svcode::Op::Dist(Kind::BOOL), vec![ssd, flags])
            .bind(move |elem_flags| pack(elem_flags, *elems))
            .bind(move |elems| {
                emit(svcode::Op::SsdPack, vec![flags, ssd])
                    .map(move |ssd| StreamTree::seq(ssd, elems))
            }),
        StreamTree::Array(_, _) => Gen::fail(CompileError::Unsupported { construct: "array" }),
    }
}
