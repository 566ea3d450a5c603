//! Streaming vector code.
//!
//! A flat, single-assignment list of vector instructions. Nested values are
//! represented as [value trees] whose leaves name streams: each level of
//! sequence nesting pairs a segment descriptor stream with the flattened data
//! of its elements.
//!
//! [value trees]: StreamTree

use std::collections::HashSet;
use std::fmt;

use crate::lang::prim::{Constant, PrimType, ReduceOp, ScalarOp};

pub mod gen;

/// The kind of elements carried by a stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Primitive scalars.
    Prim(PrimType),
    /// Segment descriptors for sequences.
    Ssd,
    /// Segment descriptors for arrays.
    Ssa,
    /// Control streams, carrying one pulse for each lane of computation.
    Ctrl,
}

impl Kind {
    pub const NUM: Kind = Kind::Prim(PrimType::Num);
    pub const BOOL: Kind = Kind::Prim(PrimType::Bool);

    pub fn name(self) -> &'static str {
        match self {
            Kind::Prim(prim_type) => prim_type.name(),
            Kind::Ssd => "ssd",
            Kind::Ssa => "ssa",
            Kind::Ctrl => "ctrl",
        }
    }
}

impl From<PrimType> for Kind {
    fn from(prim_type: PrimType) -> Kind {
        Kind::Prim(prim_type)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamId {
    /// The root control stream.
    Ctrl,
    /// A stream defined by an instruction.
    Output(u32),
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Ctrl => write!(f, "ctrl"),
            StreamId::Output(index) => write!(f, "s{}", index),
        }
    }
}

/// Segmented reductions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reducer {
    /// Fold the elements of each segment with an associative operator.
    Fold(ReduceOp),
    /// Count the true flags of each segment plus one, as a segment descriptor.
    ///
    /// This is the number of groups that [`Op::EndFlagsToSsd`] will produce
    /// for the segment.
    EndFlagCount,
}

impl Reducer {
    pub fn name(self) -> &'static str {
        match self {
            Reducer::Fold(op) => op.name(),
            Reducer::EndFlagCount => "end_flag_count",
        }
    }
}

/// Vector instructions.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// `rep(ctrl)`: the constant once for each control pulse.
    Rep(Constant),
    /// `iotas(ssd)`: count up from zero in each segment.
    Iotas,
    /// `ssd_to_ctrl(ssd)`: one pulse for each counted element.
    SsdToCtrl,
    /// `ssd_to_empty(ssd)`: is each segment empty?
    SsdToEmpty,
    /// `dist(ssd, xs)`: repeat one element of `xs` for each element of a segment.
    Dist(Kind),
    /// `map(xs, ...)`: apply a scalar operator element-wise.
    Map(ScalarOp),
    /// `pack(flags, xs)`: keep the elements whose flag is true.
    Pack(Kind),
    /// `ssd_pack(flags, ssd)`: keep the segments whose flag is true.
    SsdPack,
    /// `bool_to_ssd(flags)`: singleton segments for true flags, empty
    /// segments for false ones.
    BoolToSsd,
    /// `end_flags_to_ssd(ssd, flags)`: split each segment after every true
    /// flag.
    EndFlagsToSsd,
    /// `num_to_ssd(ns)`: one segment of each length.
    NumToSsd,
    /// `reduce(ssd, xs)`: one result for each segment.
    Reduce(Reducer),
    /// `scan(ssd, xs)`: inclusive running reduction within each segment.
    Scan(ReduceOp),
    /// `il(chunks..., xs...)`: interleave the elements of some streams, taking
    /// one chunk segment's worth of elements from each stream in turn.
    Il(Kind, usize),
    /// `ssd_il(chunks..., ssds...)`: interleave the segments of some segment
    /// descriptors, taking one chunk segment's worth of segments from each in
    /// turn.
    SsdIl(usize),
    /// `ssd_concat(outer, inner)`: merge each group of inner segments
    /// described by the outer segment descriptor.
    SsdConcat,
    /// `check_singletons(ssd)`: fault on any segment that does not contain
    /// exactly one element. Produces no output.
    ///
    /// Checks are always run, even if no result depends on them.
    CheckSingletons,
}

impl Op {
    /// The kind of the stream defined by this instruction.
    pub fn output_kind(&self) -> Kind {
        match self {
            Op::Rep(constant) => Kind::Prim(constant.prim_type()),
            Op::Iotas => Kind::NUM,
            Op::SsdToCtrl | Op::CheckSingletons => Kind::Ctrl,
            Op::SsdToEmpty => Kind::BOOL,
            Op::Dist(kind) | Op::Pack(kind) | Op::Il(kind, _) => *kind,
            Op::Map(op) => Kind::Prim(op.output_type()),
            Op::Reduce(Reducer::Fold(op)) | Op::Scan(op) => Kind::Prim(op.element_type()),
            Op::Reduce(Reducer::EndFlagCount)
            | Op::SsdPack
            | Op::BoolToSsd
            | Op::EndFlagsToSsd
            | Op::NumToSsd
            | Op::SsdIl(_)
            | Op::SsdConcat => Kind::Ssd,
        }
    }

    /// The number of operands that the instruction expects.
    pub fn arity(&self) -> usize {
        match self {
            Op::Rep(_)
            | Op::Iotas
            | Op::SsdToCtrl
            | Op::SsdToEmpty
            | Op::BoolToSsd
            | Op::NumToSsd
            | Op::CheckSingletons => 1,
            Op::Map(op) => op.arity(),
            Op::Dist(_)
            | Op::Pack(_)
            | Op::SsdPack
            | Op::EndFlagsToSsd
            | Op::Reduce(_)
            | Op::Scan(_)
            | Op::SsdConcat => 2,
            Op::Il(_, count) | Op::SsdIl(count) => count * 2,
        }
    }

    /// Is this instruction run for its faults rather than its output?
    pub fn is_check(&self) -> bool {
        matches!(self, Op::CheckSingletons)
    }
}

/// Single-assignment instructions.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub name: StreamId,
    pub kind: Kind,
    pub op: Op,
    pub args: Vec<StreamId>,
}

/// Errors found when validating a program.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SvcodeError {
    #[error("stream `{0}` is defined more than once")]
    Redefined(StreamId),
    #[error("stream `{name}` refers to `{arg}` before it is defined")]
    UseBeforeDefinition { name: StreamId, arg: StreamId },
    #[error("stream `{name}` expects {expected} operands, found {found}")]
    ArityMismatch {
        name: StreamId,
        expected: usize,
        found: usize,
    },
    #[error("stream `{name}` is labelled `{found}`, but its instruction produces `{expected}`")]
    KindMismatch {
        name: StreamId,
        expected: Kind,
        found: Kind,
    },
}

/// Ordered lists of instructions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Svcode {
    pub instructions: Vec<Instruction>,
}

impl Svcode {
    pub fn new(instructions: Vec<Instruction>) -> Svcode {
        Svcode { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Check that every stream is defined once, that every operand is defined
    /// before it is used, and that every instruction is labelled with its
    /// output kind.
    pub fn validate(&self) -> Result<(), SvcodeError> {
        let mut defined = HashSet::new();
        defined.insert(StreamId::Ctrl);

        for instruction in &self.instructions {
            if instruction.args.len() != instruction.op.arity() {
                return Err(SvcodeError::ArityMismatch {
                    name: instruction.name,
                    expected: instruction.op.arity(),
                    found: instruction.args.len(),
                });
            }
            if instruction.kind != instruction.op.output_kind() {
                return Err(SvcodeError::KindMismatch {
                    name: instruction.name,
                    expected: instruction.op.output_kind(),
                    found: instruction.kind,
                });
            }
            if let Some(arg) = instruction.args.iter().find(|arg| !defined.contains(arg)) {
                return Err(SvcodeError::UseBeforeDefinition {
                    name: instruction.name,
                    arg: *arg,
                });
            }
            if !defined.insert(instruction.name) {
                return Err(SvcodeError::Redefined(instruction.name));
            }
        }

        Ok(())
    }
}

/// Trees describing how a nested value is laid out over flat streams.
///
/// The shape of the tree mirrors the type of the value it represents.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamTree<T> {
    /// A single stream of scalars.
    Sid(T, Kind),
    /// Tuples of trees.
    Tuple(Vec<StreamTree<T>>),
    /// Sequences, as a segment descriptor paired with the element tree.
    Seq(T, Box<StreamTree<T>>),
    /// Arrays, as an array segment descriptor paired with the element tree.
    Array(T, Box<StreamTree<T>>),
}

impl<T> StreamTree<T> {
    pub fn seq(ssd: T, elems: StreamTree<T>) -> StreamTree<T> {
        StreamTree::Seq(ssd, Box::new(elems))
    }

    pub fn array(asd: T, elems: StreamTree<T>) -> StreamTree<T> {
        StreamTree::Array(asd, Box::new(elems))
    }

    /// Replace every stream in the tree.
    pub fn map<U>(&self, f: &mut impl FnMut(&T) -> U) -> StreamTree<U> {
        match self {
            StreamTree::Sid(id, kind) => StreamTree::Sid(f(id), *kind),
            StreamTree::Tuple(trees) => {
                StreamTree::Tuple(trees.iter().map(|tree| tree.map(&mut *f)).collect())
            }
            StreamTree::Seq(ssd, elems) => {
                let ssd = f(ssd);
                StreamTree::seq(ssd, elems.map(f))
            }
            StreamTree::Array(asd, elems) => {
                let asd = f(asd);
                StreamTree::array(asd, elems.map(f))
            }
        }
    }

    /// Visit every stream in the tree, from the outside in.
    pub fn for_each(&self, f: &mut impl FnMut(&T)) {
        match self {
            StreamTree::Sid(id, _) => f(id),
            StreamTree::Tuple(trees) => trees.iter().for_each(|tree| tree.for_each(&mut *f)),
            StreamTree::Seq(ssd, elems) | StreamTree::Array(ssd, elems) => {
                f(ssd);
                elems.for_each(f);
            }
        }
    }
}

/// Value trees whose leaves are stream names.
pub type ValueTree = StreamTree<StreamId>;

impl ValueTree {
    /// Every stream named in the tree.
    pub fn streams(&self) -> Vec<StreamId> {
        let mut streams = Vec::new();
        self.for_each(&mut |id: &StreamId| streams.push(*id));
        streams
    }
}

/// Segment descriptor tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Seg {
    /// The next `n` elements belong to the current segment. Always positive.
    Count(usize),
    /// The current segment is complete.
    End,
}

/// Elements carried by streams at runtime.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Elem {
    /// Scalars, carried by primitive streams.
    Const(Constant),
    /// Segment descriptor tokens, carried by `ssd` and `ssa` streams.
    Seg(Seg),
    /// Control pulses, carried by `ctrl` streams.
    Pulse,
}

impl Elem {
    pub const END: Elem = Elem::Seg(Seg::End);

    pub fn num(value: f64) -> Elem {
        Elem::Const(Constant::Num(value))
    }

    pub fn bool(value: bool) -> Elem {
        Elem::Const(Constant::Bool(value))
    }

    pub fn count(count: usize) -> Elem {
        Elem::Seg(Seg::Count(count))
    }
}

impl fmt::Display for Elem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Elem::Const(constant) => write!(f, "{}", constant),
            Elem::Seg(Seg::Count(count)) => write!(f, "{}", count),
            Elem::Seg(Seg::End) => write!(f, "|"),
            Elem::Pulse => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(index: u32, op: Op, args: Vec<StreamId>) -> Instruction {
        Instruction {
            name: StreamId::Output(index),
            kind: op.output_kind(),
            op,
            args,
        }
    }

    #[test]
    fn output_kinds() {
        assert_eq!(Op::Rep(Constant::Char('a')).output_kind(), Kind::Prim(PrimType::Char));
        assert_eq!(Op::Map(ScalarOp::Lt(PrimType::Num)).output_kind(), Kind::BOOL);
        assert_eq!(Op::Reduce(Reducer::EndFlagCount).output_kind(), Kind::Ssd);
        assert_eq!(Op::Reduce(Reducer::Fold(ReduceOp::Max(PrimType::Char))).output_kind(), Kind::Prim(PrimType::Char));
        assert_eq!(Op::Dist(Kind::Ssa).output_kind(), Kind::Ssa);
    }

    #[test]
    fn validate_accepts_ordered_code() {
        let code = Svcode::new(vec![
            instruction(0, Op::Rep(Constant::Num(3.0)), vec![StreamId::Ctrl]),
            instruction(1, Op::NumToSsd, vec![StreamId::Output(0)]),
            instruction(2, Op::Iotas, vec![StreamId::Output(1)]),
        ]);
        assert_eq!(code.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_forward_references() {
        let code = Svcode::new(vec![
            instruction(0, Op::NumToSsd, vec![StreamId::Output(1)]),
            instruction(1, Op::Rep(Constant::Num(3.0)), vec![StreamId::Ctrl]),
        ]);
        assert_eq!(
            code.validate(),
            Err(SvcodeError::UseBeforeDefinition {
                name: StreamId::Output(0),
                arg: StreamId::Output(1),
            }),
        );
    }

    #[test]
    fn streams_are_listed_outside_in() {
        let tree = StreamTree::seq(
            StreamId::Output(0),
            StreamTree::Tuple(vec![
                StreamTree::Sid(StreamId::Output(1), Kind::NUM),
                StreamTree::seq(StreamId::Output(2), StreamTree::Sid(StreamId::Output(3), Kind::BOOL)),
            ]),
        );
        assert_eq!(
            tree.streams(),
            vec![
                StreamId::Output(0),
                StreamId::Output(1),
                StreamId::Output(2),
                StreamId::Output(3),
            ],
        );
    }
}
