//! State machines implementing each vector instruction.
//!
//! A kernel is stepped by the scheduler whenever its output channel is empty.
//! Each step either consumes all of the inputs it needs for one transition, or
//! consumes nothing and reports that it is waiting.

use std::task::Poll;

use crate::lang::prim::{self, Constant, ReduceOp, ScalarOp};
use crate::lang::svcode::{Elem, Op, Reducer, Seg};
use crate::reporting::Fault;
use crate::runtime::stream::{Channel, Port};

/// The outcome of stepping a kernel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Step {
    /// Write an element to the output.
    Yield(Elem),
    /// Inputs were consumed, but nothing is ready to be written.
    Continue,
    /// Waiting for input. Nothing was consumed.
    Pending,
    /// The output is complete.
    Done,
}

/// The inputs of a kernel, in operand order.
pub struct Inputs<'a> {
    channels: &'a mut [Channel],
    ports: &'a [Port],
}

impl<'a> Inputs<'a> {
    pub fn new(channels: &'a mut [Channel], ports: &'a [Port]) -> Inputs<'a> {
        Inputs { channels, ports }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Look at the next element of an input without consuming it.
    pub fn peek(&self, index: usize) -> Poll<Option<Elem>> {
        let port = self.ports[index];
        self.channels[port.channel].peek(port.reader)
    }

    pub fn consume(&mut self, index: usize) {
        let port = self.ports[index];
        self.channels[port.channel].consume(port.reader);
    }

    /// Consume the next element of an input, if one is available.
    pub fn take(&mut self, index: usize) -> Poll<Option<Elem>> {
        let next = self.peek(index);
        if let Poll::Ready(Some(_)) = next {
            self.consume(index);
        }
        next
    }
}

/// Take the next element of an input, suspending the kernel if there is none
/// yet. Evaluates to `None` at the end of the input.
macro_rules! take {
    ($inputs:expr, $index:expr) => {
        match $inputs.take($index) {
            Poll::Ready(next) => next,
            Poll::Pending => return Ok(Step::Pending),
        }
    };
}

pub trait Kernel {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault>;
}

/// Create a kernel for an instruction.
pub fn instantiate(op: &Op) -> Box<dyn Kernel> {
    match op {
        Op::Rep(constant) => Box::new(Rep(*constant)),
        Op::Iotas => Box::new(Iotas::default()),
        Op::SsdToCtrl => Box::new(SsdToCtrl::default()),
        Op::SsdToEmpty => Box::new(SsdToEmpty { empty: true }),
        Op::Dist(_) => Box::new(Dist::default()),
        Op::Map(op) => Box::new(Map(*op)),
        Op::Pack(_) => Box::new(Pack),
        Op::SsdPack => Box::new(SsdPack::default()),
        Op::BoolToSsd => Box::new(BoolToSsd::default()),
        Op::EndFlagsToSsd => Box::new(EndFlagsToSsd::default()),
        Op::NumToSsd => Box::new(NumToSsd::default()),
        Op::Reduce(Reducer::Fold(op)) => Box::new(Fold::new(*op)),
        Op::Reduce(Reducer::EndFlagCount) => Box::new(EndFlagCount::default()),
        Op::Scan(op) => Box::new(Scan::new(*op)),
        Op::Il(_, count) => Box::new(Il::new(*count)),
        Op::SsdIl(count) => Box::new(SsdIl::new(*count)),
        Op::SsdConcat => Box::new(SsdConcat::default()),
        Op::CheckSingletons => Box::new(CheckSingletons::default()),
    }
}

fn seg(op: &'static str, elem: Elem) -> Result<Seg, Fault> {
    match elem {
        Elem::Seg(seg) => Ok(seg),
        found => Err(Fault::ExpectedSegment { op, found }),
    }
}

fn scalar(op: &'static str, elem: Elem) -> Result<Constant, Fault> {
    match elem {
        Elem::Const(constant) => Ok(constant),
        found => Err(Fault::ExpectedScalar { op, found }),
    }
}

fn flag(op: &'static str, elem: Elem) -> Result<bool, Fault> {
    let constant = scalar(op, elem)?;
    constant
        .as_bool()
        .ok_or(Fault::Prim(prim::PrimError::InvalidOperand {
            op,
            found: constant,
        }))
}

fn unexpected_end(op: &'static str) -> Fault {
    Fault::UnexpectedEnd { op }
}

/// Replays a fixed list of elements.
pub struct Source(std::vec::IntoIter<Elem>);

impl Source {
    pub fn new(elems: Vec<Elem>) -> Source {
        Source(elems.into_iter())
    }
}

impl Kernel for Source {
    fn step(&mut self, _: &mut Inputs<'_>) -> Result<Step, Fault> {
        Ok(self.0.next().map_or(Step::Done, Step::Yield))
    }
}

struct Rep(Constant);

impl Kernel for Rep {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(Elem::Pulse) => Ok(Step::Yield(Elem::Const(self.0))),
            Some(found) => Err(Fault::ExpectedPulse { op: "rep", found }),
        }
    }
}

#[derive(Default)]
struct Iotas {
    next: usize,
    remaining: usize,
}

impl Kernel for Iotas {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.remaining > 0 {
            let value = self.next as f64;
            self.next += 1;
            self.remaining -= 1;
            return Ok(Step::Yield(Elem::num(value)));
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => {
                match seg("iotas", elem)? {
                    Seg::Count(count) => self.remaining = count,
                    Seg::End => self.next = 0,
                }
                Ok(Step::Continue)
            }
        }
    }
}

#[derive(Default)]
struct SsdToCtrl {
    remaining: usize,
}

impl Kernel for SsdToCtrl {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(Step::Yield(Elem::Pulse));
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => {
                if let Seg::Count(count) = seg("ssd_to_ctrl", elem)? {
                    self.remaining = count;
                }
                Ok(Step::Continue)
            }
        }
    }
}

struct SsdToEmpty {
    empty: bool,
}

impl Kernel for SsdToEmpty {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg("ssd_to_empty", elem)? {
                Seg::Count(count) => {
                    self.empty &= count == 0;
                    Ok(Step::Continue)
                }
                Seg::End => {
                    let empty = std::mem::replace(&mut self.empty, true);
                    Ok(Step::Yield(Elem::bool(empty)))
                }
            },
        }
    }
}

/// Operands: `ssd`, `xs`.
///
/// The element of `xs` for a segment is read the first time it is needed, or
/// at the end of the segment if the segment is empty.
#[derive(Default)]
struct Dist {
    current: Option<Elem>,
    remaining: usize,
}

impl Kernel for Dist {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.remaining > 0 {
            let elem = match self.current {
                Some(elem) => elem,
                None => {
                    let elem = take!(inputs, 1).ok_or_else(|| unexpected_end("dist"))?;
                    self.current = Some(elem);
                    elem
                }
            };
            self.remaining -= 1;
            return Ok(Step::Yield(elem));
        }

        let elem = match inputs.peek(0) {
            Poll::Pending => return Ok(Step::Pending),
            Poll::Ready(None) if self.current.is_some() => return Err(unexpected_end("dist")),
            Poll::Ready(None) => return Ok(Step::Done),
            Poll::Ready(Some(elem)) => elem,
        };

        match seg("dist", elem)? {
            Seg::Count(count) => self.remaining = count,
            Seg::End => {
                if self.current.take().is_none() {
                    match inputs.peek(1) {
                        Poll::Pending => return Ok(Step::Pending),
                        Poll::Ready(None) => return Err(unexpected_end("dist")),
                        Poll::Ready(Some(_)) => inputs.consume(1),
                    }
                }
            }
        }
        inputs.consume(0);
        Ok(Step::Continue)
    }
}

struct Map(ScalarOp);

impl Kernel for Map {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        let mut args = Vec::with_capacity(inputs.len());
        for index in 0..inputs.len() {
            match inputs.peek(index) {
                Poll::Pending => return Ok(Step::Pending),
                Poll::Ready(None) => return Ok(Step::Done),
                Poll::Ready(Some(elem)) => args.push(scalar(self.0.name(), elem)?),
            }
        }
        (0..inputs.len()).for_each(|index| inputs.consume(index));

        Ok(Step::Yield(Elem::Const(self.0.apply(&args)?)))
    }
}

/// Operands: `flags`, `xs`.
struct Pack;

impl Kernel for Pack {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        let keep = match inputs.peek(0) {
            Poll::Pending => return Ok(Step::Pending),
            Poll::Ready(None) => return Ok(Step::Done),
            Poll::Ready(Some(elem)) => flag("pack", elem)?,
        };
        let elem = match inputs.peek(1) {
            Poll::Pending => return Ok(Step::Pending),
            Poll::Ready(None) => return Err(unexpected_end("pack")),
            Poll::Ready(Some(elem)) => elem,
        };
        inputs.consume(0);
        inputs.consume(1);

        Ok(if keep { Step::Yield(elem) } else { Step::Continue })
    }
}

/// Operands: `flags`, `ssd`.
#[derive(Default)]
struct SsdPack {
    /// Whether the current segment is being kept, if one has been started.
    keep: Option<bool>,
}

impl Kernel for SsdPack {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        let keep = match self.keep {
            Some(keep) => keep,
            None => match take!(inputs, 0) {
                None => return Ok(Step::Done),
                Some(elem) => {
                    self.keep = Some(flag("ssd_pack", elem)?);
                    return Ok(Step::Continue);
                }
            },
        };

        let elem = take!(inputs, 1).ok_or_else(|| unexpected_end("ssd_pack"))?;
        if seg("ssd_pack", elem)? == Seg::End {
            self.keep = None;
        }

        Ok(if keep { Step::Yield(elem) } else { Step::Continue })
    }
}

#[derive(Default)]
struct BoolToSsd {
    pending_end: bool,
}

impl Kernel for BoolToSsd {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if std::mem::take(&mut self.pending_end) {
            return Ok(Step::Yield(Elem::END));
        }

        let elem = match take!(inputs, 0) {
            None => return Ok(Step::Done),
            Some(elem) => elem,
        };

        if flag("bool_to_ssd", elem)? {
            self.pending_end = true;
            Ok(Step::Yield(Elem::count(1)))
        } else {
            Ok(Step::Yield(Elem::END))
        }
    }
}

#[derive(Default)]
struct NumToSsd {
    pending_end: bool,
}

impl Kernel for NumToSsd {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if std::mem::take(&mut self.pending_end) {
            return Ok(Step::Yield(Elem::END));
        }

        let elem = match take!(inputs, 0) {
            None => return Ok(Step::Done),
            Some(elem) => elem,
        };
        let constant = scalar("num_to_ssd", elem)?;
        let value = constant.as_num().ok_or(Fault::Prim(prim::PrimError::InvalidOperand {
            op: "num_to_ssd",
            found: constant,
        }))?;

        match prim::natural(value) {
            None => Err(Fault::InvalidCount(value)),
            Some(0) => Ok(Step::Yield(Elem::END)),
            Some(count) => {
                self.pending_end = true;
                Ok(Step::Yield(Elem::count(count)))
            }
        }
    }
}

/// Operands: `ssd`, `flags`.
#[derive(Default)]
struct EndFlagsToSsd {
    remaining: usize,
    pending_end: bool,
}

impl Kernel for EndFlagsToSsd {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if std::mem::take(&mut self.pending_end) {
            return Ok(Step::Yield(Elem::END));
        }

        if self.remaining > 0 {
            let elem = take!(inputs, 1).ok_or_else(|| unexpected_end("end_flags_to_ssd"))?;
            self.pending_end = flag("end_flags_to_ssd", elem)?;
            self.remaining -= 1;
            return Ok(Step::Yield(Elem::count(1)));
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg("end_flags_to_ssd", elem)? {
                Seg::Count(count) => {
                    self.remaining = count;
                    Ok(Step::Continue)
                }
                Seg::End => Ok(Step::Yield(Elem::END)),
            },
        }
    }
}

/// Operands: `ssd`, `xs`.
struct Fold {
    op: ReduceOp,
    acc: Option<Constant>,
    remaining: usize,
}

impl Fold {
    fn new(op: ReduceOp) -> Fold {
        Fold {
            op,
            acc: None,
            remaining: 0,
        }
    }
}

impl Kernel for Fold {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        let name = self.op.name();

        if self.remaining > 0 {
            let elem = take!(inputs, 1).ok_or_else(|| unexpected_end(name))?;
            let next = scalar(name, elem)?;
            self.acc = Some(match self.acc {
                None => next,
                Some(acc) => self.op.combine(acc, next)?,
            });
            self.remaining -= 1;
            return Ok(Step::Continue);
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg(name, elem)? {
                Seg::Count(count) => {
                    self.remaining = count;
                    Ok(Step::Continue)
                }
                Seg::End => {
                    let result = self.acc.take().or_else(|| self.op.identity());
                    let result = result.ok_or(prim::PrimError::EmptyReduction { op: name })?;
                    Ok(Step::Yield(Elem::Const(result)))
                }
            },
        }
    }
}

/// Operands: `ssd`, `flags`.
#[derive(Default)]
struct EndFlagCount {
    trues: usize,
    remaining: usize,
    pending_end: bool,
}

impl Kernel for EndFlagCount {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if std::mem::take(&mut self.pending_end) {
            return Ok(Step::Yield(Elem::END));
        }

        if self.remaining > 0 {
            let elem = take!(inputs, 1).ok_or_else(|| unexpected_end("end_flag_count"))?;
            if flag("end_flag_count", elem)? {
                self.trues += 1;
            }
            self.remaining -= 1;
            return Ok(Step::Continue);
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg("end_flag_count", elem)? {
                Seg::Count(count) => {
                    self.remaining = count;
                    Ok(Step::Continue)
                }
                Seg::End => {
                    self.pending_end = true;
                    let groups = std::mem::take(&mut self.trues) + 1;
                    Ok(Step::Yield(Elem::count(groups)))
                }
            },
        }
    }
}

/// Operands: `ssd`, `xs`.
struct Scan {
    op: ReduceOp,
    acc: Option<Constant>,
    remaining: usize,
}

impl Scan {
    fn new(op: ReduceOp) -> Scan {
        Scan {
            op,
            acc: None,
            remaining: 0,
        }
    }
}

impl Kernel for Scan {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        let name = self.op.name();

        if self.remaining > 0 {
            let elem = take!(inputs, 1).ok_or_else(|| unexpected_end(name))?;
            let next = scalar(name, elem)?;
            let acc = match self.acc {
                None => next,
                Some(acc) => self.op.combine(acc, next)?,
            };
            self.acc = Some(acc);
            self.remaining -= 1;
            return Ok(Step::Yield(Elem::Const(acc)));
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => {
                match seg(name, elem)? {
                    Seg::Count(count) => self.remaining = count,
                    Seg::End => self.acc = None,
                }
                Ok(Step::Continue)
            }
        }
    }
}

/// Operands: `count` chunk descriptors, then `count` data streams.
struct Il {
    count: usize,
    /// The input currently being copied from.
    input: usize,
    /// Elements left to copy in the current chunk.
    remaining: usize,
    /// Has any token of the current chunk segment been read?
    in_chunk: bool,
}

impl Il {
    fn new(count: usize) -> Il {
        Il {
            count,
            input: 0,
            remaining: 0,
            in_chunk: false,
        }
    }
}

impl Kernel for Il {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.count == 0 {
            return Ok(Step::Done);
        }

        if self.remaining > 0 {
            let elem = take!(inputs, self.count + self.input).ok_or_else(|| unexpected_end("il"))?;
            self.remaining -= 1;
            return Ok(Step::Yield(elem));
        }

        match take!(inputs, self.input) {
            None if self.input == 0 && !self.in_chunk => Ok(Step::Done),
            None => Err(unexpected_end("il")),
            Some(elem) => {
                match seg("il", elem)? {
                    Seg::Count(count) => {
                        self.remaining = count;
                        self.in_chunk = true;
                    }
                    Seg::End => {
                        self.input = (self.input + 1) % self.count;
                        self.in_chunk = false;
                    }
                }
                Ok(Step::Continue)
            }
        }
    }
}

/// Operands: `count` chunk descriptors, then `count` segment descriptors.
struct SsdIl {
    count: usize,
    input: usize,
    /// Whole segments left to copy in the current chunk.
    segments: usize,
    in_chunk: bool,
}

impl SsdIl {
    fn new(count: usize) -> SsdIl {
        SsdIl {
            count,
            input: 0,
            segments: 0,
            in_chunk: false,
        }
    }
}

impl Kernel for SsdIl {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.count == 0 {
            return Ok(Step::Done);
        }

        if self.segments > 0 {
            let elem =
                take!(inputs, self.count + self.input).ok_or_else(|| unexpected_end("ssd_il"))?;
            if seg("ssd_il", elem)? == Seg::End {
                self.segments -= 1;
            }
            return Ok(Step::Yield(elem));
        }

        match take!(inputs, self.input) {
            None if self.input == 0 && !self.in_chunk => Ok(Step::Done),
            None => Err(unexpected_end("ssd_il")),
            Some(elem) => {
                match seg("ssd_il", elem)? {
                    Seg::Count(count) => {
                        self.segments = count;
                        self.in_chunk = true;
                    }
                    Seg::End => {
                        self.input = (self.input + 1) % self.count;
                        self.in_chunk = false;
                    }
                }
                Ok(Step::Continue)
            }
        }
    }
}

/// Operands: `outer`, `inner`.
#[derive(Default)]
struct SsdConcat {
    /// Inner segment ends left to merge into the current outer segment.
    pending_ends: usize,
}

impl Kernel for SsdConcat {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        if self.pending_ends > 0 {
            let elem = take!(inputs, 1).ok_or_else(|| unexpected_end("ssd_concat"))?;
            return match seg("ssd_concat", elem)? {
                Seg::Count(_) => Ok(Step::Yield(elem)),
                Seg::End => {
                    self.pending_ends -= 1;
                    Ok(Step::Continue)
                }
            };
        }

        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg("ssd_concat", elem)? {
                Seg::Count(count) => {
                    self.pending_ends = count;
                    Ok(Step::Continue)
                }
                Seg::End => Ok(Step::Yield(Elem::END)),
            },
        }
    }
}

#[derive(Default)]
struct CheckSingletons {
    len: usize,
}

impl Kernel for CheckSingletons {
    fn step(&mut self, inputs: &mut Inputs<'_>) -> Result<Step, Fault> {
        match take!(inputs, 0) {
            None => Ok(Step::Done),
            Some(elem) => match seg("check_singletons", elem)? {
                Seg::Count(count) => {
                    self.len += count;
                    Ok(Step::Continue)
                }
                Seg::End => match std::mem::take(&mut self.len) {
                    1 => Ok(Step::Continue),
                    len => Err(Fault::NotSingleton { len }),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::prim::{PrimError, PrimType};
    use crate::lang::svcode::{Kind, StreamId};
    use crate::reporting::RuntimeError;
    use crate::runtime::eval_op;

    fn nums(values: &[f64]) -> Vec<Elem> {
        values.iter().copied().map(Elem::num).collect()
    }

    fn bools(values: &[bool]) -> Vec<Elem> {
        values.iter().copied().map(Elem::bool).collect()
    }

    /// Segment descriptors, written with `0` standing for the terminator.
    fn ssd(tokens: &[usize]) -> Vec<Elem> {
        tokens
            .iter()
            .map(|&token| match token {
                0 => Elem::END,
                count => Elem::count(count),
            })
            .collect()
    }

    fn fault(result: Result<Vec<Elem>, RuntimeError>) -> Fault {
        match result {
            Err(RuntimeError::Fault { fault, .. }) => fault,
            result => panic!("expected a fault, found {:?}", result),
        }
    }

    #[test]
    fn rep_once_per_pulse() {
        let output = eval_op(&Op::Rep(Constant::Char('a')), vec![vec![Elem::Pulse; 3]]);
        assert_eq!(output, Ok(vec![Elem::Const(Constant::Char('a')); 3]));
    }

    #[test]
    fn iotas_restart_per_segment() {
        let output = eval_op(&Op::Iotas, vec![ssd(&[2, 0, 0, 1, 2, 0])]);
        assert_eq!(output, Ok(nums(&[0.0, 1.0, 0.0, 1.0, 2.0])));
    }

    #[test]
    fn ssd_to_ctrl_counts() {
        let output = eval_op(&Op::SsdToCtrl, vec![ssd(&[2, 0, 0, 1, 0])]);
        assert_eq!(output, Ok(vec![Elem::Pulse; 3]));
    }

    #[test]
    fn ssd_to_empty_per_segment() {
        let output = eval_op(&Op::SsdToEmpty, vec![ssd(&[2, 0, 0, 1, 1, 0])]);
        assert_eq!(output, Ok(bools(&[false, true, false])));
    }

    #[test]
    fn dist_repeats_and_skips_empty_segments() {
        let output = eval_op(
            &Op::Dist(Kind::NUM),
            vec![ssd(&[2, 0, 0, 1, 0]), nums(&[10.0, 20.0, 30.0])],
        );
        assert_eq!(output, Ok(nums(&[10.0, 10.0, 30.0])));
    }

    #[test]
    fn dist_runs_out_of_elements() {
        let output = eval_op(&Op::Dist(Kind::NUM), vec![ssd(&[1, 0, 1, 0]), nums(&[1.0])]);
        assert_eq!(fault(output), Fault::UnexpectedEnd { op: "dist" });
    }

    #[test]
    fn map_binary() {
        let output = eval_op(
            &Op::Map(ScalarOp::Lt(PrimType::Num)),
            vec![nums(&[1.0, 5.0]), nums(&[2.0, 2.0])],
        );
        assert_eq!(output, Ok(bools(&[true, false])));
    }

    #[test]
    fn map_division_by_zero() {
        let output = eval_op(&Op::Map(ScalarOp::Div), vec![nums(&[1.0]), nums(&[0.0])]);
        assert_eq!(fault(output), Fault::Prim(PrimError::DivisionByZero));
    }

    #[test]
    fn pack_keeps_flagged() {
        let output = eval_op(
            &Op::Pack(Kind::NUM),
            vec![bools(&[true, false, true]), nums(&[1.0, 2.0, 3.0])],
        );
        assert_eq!(output, Ok(nums(&[1.0, 3.0])));
    }

    #[test]
    fn ssd_pack_keeps_whole_segments() {
        let output = eval_op(
            &Op::SsdPack,
            vec![bools(&[false, true, true]), ssd(&[2, 0, 1, 1, 0, 0])],
        );
        assert_eq!(output, Ok(ssd(&[1, 1, 0, 0])));
    }

    #[test]
    fn bool_to_ssd_singletons() {
        let output = eval_op(&Op::BoolToSsd, vec![bools(&[true, false])]);
        assert_eq!(output, Ok(ssd(&[1, 0, 0])));
    }

    #[test]
    fn num_to_ssd_lengths() {
        let output = eval_op(&Op::NumToSsd, vec![nums(&[3.0, 0.0])]);
        assert_eq!(output, Ok(ssd(&[3, 0, 0])));

        let output = eval_op(&Op::NumToSsd, vec![nums(&[-1.0])]);
        assert_eq!(fault(output), Fault::InvalidCount(-1.0));
    }

    #[test]
    fn end_flags_split_segments() {
        let output = eval_op(
            &Op::EndFlagsToSsd,
            vec![ssd(&[4, 0]), bools(&[false, true, false, false])],
        );
        assert_eq!(output, Ok(ssd(&[1, 1, 0, 1, 1, 0])));
    }

    #[test]
    fn end_flag_count_includes_last_group() {
        let output = eval_op(
            &Op::Reduce(Reducer::EndFlagCount),
            vec![ssd(&[2, 0, 0]), bools(&[true, false])],
        );
        assert_eq!(output, Ok(ssd(&[2, 0, 1, 0])));
    }

    #[test]
    fn fold_with_split_counts() {
        let output = eval_op(
            &Op::Reduce(Reducer::Fold(ReduceOp::Sum)),
            vec![ssd(&[1, 2, 0, 0]), nums(&[1.0, 2.0, 3.0])],
        );
        assert_eq!(output, Ok(nums(&[6.0, 0.0])));
    }

    #[test]
    fn fold_empty_max() {
        let output = eval_op(
            &Op::Reduce(Reducer::Fold(ReduceOp::Max(PrimType::Num))),
            vec![ssd(&[0]), nums(&[])],
        );
        assert_eq!(fault(output), Fault::Prim(PrimError::EmptyReduction { op: "max" }));
    }

    #[test]
    fn scan_resets_per_segment() {
        let output = eval_op(
            &Op::Scan(ReduceOp::Sum),
            vec![ssd(&[2, 0, 2, 0]), nums(&[1.0, 2.0, 3.0, 4.0])],
        );
        assert_eq!(output, Ok(nums(&[1.0, 3.0, 3.0, 7.0])));
    }

    #[test]
    fn il_takes_chunks_in_turn() {
        let output = eval_op(
            &Op::Il(Kind::NUM, 2),
            vec![
                ssd(&[1, 0, 2, 0]),
                ssd(&[1, 0, 0]),
                nums(&[1.0, 3.0, 4.0]),
                nums(&[2.0]),
            ],
        );
        assert_eq!(output, Ok(nums(&[1.0, 2.0, 3.0, 4.0])));
    }

    #[test]
    fn il_without_inputs_is_empty() {
        assert_eq!(eval_op(&Op::Il(Kind::NUM, 0), vec![]), Ok(vec![]));
    }

    #[test]
    fn ssd_il_copies_whole_segments() {
        let output = eval_op(
            &Op::SsdIl(2),
            vec![ssd(&[1, 0]), ssd(&[2, 0]), ssd(&[3, 0]), ssd(&[1, 0, 0])],
        );
        assert_eq!(output, Ok(ssd(&[3, 0, 1, 0, 0])));
    }

    #[test]
    fn ssd_concat_merges_inner_segments() {
        let output = eval_op(
            &Op::SsdConcat,
            vec![ssd(&[3, 0, 0]), ssd(&[2, 0, 1, 0, 0])],
        );
        assert_eq!(output, Ok(ssd(&[2, 1, 0, 0])));
    }

    #[test]
    fn check_singletons_accepts_singletons() {
        let output = eval_op(&Op::CheckSingletons, vec![ssd(&[1, 0, 1, 0])]);
        assert_eq!(output, Ok(vec![]));
    }

    #[test]
    fn check_singletons_rejects_other_lengths() {
        let output = eval_op(&Op::CheckSingletons, vec![ssd(&[1, 0, 2, 0])]);
        assert_eq!(fault(output), Fault::NotSingleton { len: 2 });

        let output = eval_op(&Op::CheckSingletons, vec![ssd(&[0])]);
        assert_eq!(fault(output), Fault::NotSingleton { len: 0 });
    }

    #[test]
    fn faults_name_the_stream() {
        let output = eval_op(&Op::Iotas, vec![nums(&[1.0])]);
        match output {
            Err(RuntimeError::Fault { stream, .. }) => assert_eq!(stream, StreamId::Output(1)),
            output => panic!("expected a fault, found {:?}", output),
        }
    }
}
