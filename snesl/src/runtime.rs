//! The streaming execution engine.
//!
//! Every instruction becomes a [kernel] reading from single-slot broadcast
//! [channels]. Kernels are stepped round-robin by a single-threaded scheduler,
//! and only the instructions that the result streams transitively depend on
//! are ever instantiated.
//!
//! [kernel]: kernel::Kernel
//! [channels]: stream::Channel

use contracts::debug_ensures;
use std::collections::{HashMap, HashSet};
use std::task::Poll;

use crate::lang::svcode::{Elem, Op, StreamId, StreamTree, Svcode, SvcodeError, ValueTree};
use crate::reporting::RuntimeError;

pub mod kernel;
pub mod reify;
pub mod stream;

use self::kernel::{Inputs, Kernel, Step};
use self::stream::{Channel, Port};

/// Engine configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Give up after this many scheduling passes.
    pub max_passes: Option<u64>,
}

/// The contents of every result stream, laid out as a value tree.
pub type Output = StreamTree<Vec<Elem>>;

/// An instantiated instruction.
struct Node {
    name: StreamId,
    kernel: Box<dyn Kernel>,
    inputs: Vec<Port>,
    output: usize,
    done: bool,
}

/// A stream whose contents are collected.
struct Sink {
    name: StreamId,
    port: Port,
    elems: Vec<Elem>,
    ended: bool,
}

struct Scheduler {
    nodes: Vec<Node>,
    channels: Vec<Channel>,
    sinks: Vec<Sink>,
}

impl Scheduler {
    /// Build a scheduler from kernels listed in dependency order.
    fn new(
        nodes: Vec<(StreamId, Box<dyn Kernel>, Vec<StreamId>)>,
        forced: &[StreamId],
    ) -> Result<Scheduler, RuntimeError> {
        let indices = nodes
            .iter()
            .enumerate()
            .map(|(index, (name, _, _))| (*name, index))
            .collect::<HashMap<_, _>>();
        let mut channels = vec![Channel::new(); nodes.len()];

        let mut connect = |name: &StreamId| match indices.get(name) {
            Some(&channel) => Ok(Port {
                channel,
                reader: channels[channel].add_reader(),
            }),
            None => Err(RuntimeError::UnknownStream(*name)),
        };

        let mut sinks = Vec::new();
        for name in forced {
            if sinks.iter().all(|sink: &Sink| sink.name != *name) {
                sinks.push(Sink {
                    name: *name,
                    port: connect(name)?,
                    elems: Vec::new(),
                    ended: false,
                });
            }
        }

        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(output, (name, kernel, args))| -> Result<Node, RuntimeError> {
                Ok(Node {
                    name,
                    kernel,
                    inputs: args.iter().map(&mut connect).collect::<Result<_, _>>()?,
                    output,
                    done: false,
                })
            })
            .collect::<Result<_, RuntimeError>>()?;

        Ok(Scheduler {
            nodes,
            channels,
            sinks,
        })
    }

    /// Step every kernel until it blocks, then drain the result streams.
    ///
    /// Returns `true` if anything happened.
    fn pass(&mut self) -> Result<bool, RuntimeError> {
        let mut progress = false;

        for node in self.nodes.iter_mut().filter(|node| !node.done) {
            while self.channels[node.output].is_writable() {
                let mut inputs = Inputs::new(&mut self.channels, &node.inputs);
                let step = node.kernel.step(&mut inputs).map_err(|fault| {
                    RuntimeError::Fault {
                        stream: node.name,
                        fault,
                    }
                })?;
                log::trace!("{}: {:?}", node.name, step);

                match step {
                    Step::Yield(elem) => self.channels[node.output].write(elem),
                    Step::Continue => {}
                    Step::Pending => break,
                    Step::Done => {
                        self.channels[node.output].close();
                        for port in &node.inputs {
                            self.channels[port.channel].detach(port.reader);
                        }
                        node.done = true;
                    }
                }
                progress = true;

                if node.done {
                    break;
                }
            }
        }

        for sink in self.sinks.iter_mut().filter(|sink| !sink.ended) {
            let channel = &mut self.channels[sink.port.channel];
            match channel.peek(sink.port.reader) {
                Poll::Pending => {}
                Poll::Ready(None) => {
                    sink.ended = true;
                    progress = true;
                }
                Poll::Ready(Some(elem)) => {
                    channel.consume(sink.port.reader);
                    sink.elems.push(elem);
                    progress = true;
                }
            }
        }

        Ok(progress)
    }

    fn is_finished(&self) -> bool {
        self.sinks.iter().all(|sink| sink.ended)
    }

    #[debug_ensures(ret.is_ok() -> self.is_finished())]
    fn run(&mut self, config: &Config) -> Result<(), RuntimeError> {
        let mut passes = 0;

        while !self.is_finished() {
            if config.max_passes.map_or(false, |max| passes >= max) {
                return Err(RuntimeError::PassLimitExceeded(passes));
            }
            passes += 1;

            if !self.pass()? {
                let waiting = (self.sinks.iter())
                    .filter(|sink| !sink.ended)
                    .map(|sink| sink.name)
                    .collect::<Vec<_>>();
                log::warn!("deadlocked after {} passes", passes);
                return Err(RuntimeError::Deadlock { waiting });
            }
        }

        log::debug!("finished after {} passes", passes);
        Ok(())
    }

    fn take_output(&self, name: StreamId) -> Vec<Elem> {
        (self.sinks.iter())
            .find(|sink| sink.name == name)
            .map_or_else(Vec::new, |sink| sink.elems.clone())
    }
}

/// The root control stream, evaluating the program in a single lane.
fn root_ctrl() -> Vec<Elem> {
    vec![Elem::Pulse]
}

/// Run a program, collecting the streams named in the value tree.
///
/// Check instructions are run alongside the result streams, so that their
/// faults are reported even if nothing depends on them.
pub fn run(code: &Svcode, value: &ValueTree, config: &Config) -> Result<Output, RuntimeError> {
    code.validate().map_err(RuntimeError::from)?;

    let checks = (code.instructions.iter())
        .filter(|instruction| instruction.op.is_check())
        .map(|instruction| instruction.name);
    let forced = value.streams().into_iter().chain(checks).collect::<Vec<_>>();
    let live = live_streams(code, &forced)?;
    log::debug!(
        "running {} of {} instructions for {} forced streams",
        live.len(),
        code.len(),
        forced.len(),
    );

    let mut nodes = Vec::with_capacity(live.len() + 1);
    let ctrl: Box<dyn Kernel> = Box::new(kernel::Source::new(root_ctrl()));
    nodes.push((StreamId::Ctrl, ctrl, Vec::new()));
    for instruction in &code.instructions {
        if live.contains(&instruction.name) {
            let kernel = kernel::instantiate(&instruction.op);
            nodes.push((instruction.name, kernel, instruction.args.clone()));
        }
    }

    let mut scheduler = Scheduler::new(nodes, &forced)?;
    scheduler.run(config)?;

    Ok(value.map(&mut |name: &StreamId| scheduler.take_output(*name)))
}

/// The streams that the forced streams transitively depend on.
fn live_streams(code: &Svcode, forced: &[StreamId]) -> Result<HashSet<StreamId>, RuntimeError> {
    let definitions = (code.instructions.iter())
        .map(|instruction| (instruction.name, instruction))
        .collect::<HashMap<_, _>>();

    let mut live = HashSet::new();
    let mut pending = forced.to_vec();
    while let Some(name) = pending.pop() {
        if name == StreamId::Ctrl || !live.insert(name) {
            continue;
        }
        match definitions.get(&name) {
            Some(instruction) => pending.extend(instruction.args.iter().copied()),
            None => return Err(RuntimeError::UnknownStream(name)),
        }
    }

    Ok(live)
}

/// Run a single instruction over some fully materialized inputs.
///
/// Given `n` inputs, the inputs are named `s0` to `s{n-1}` and the output is
/// named `s{n}`.
pub fn eval_op(op: &Op, inputs: Vec<Vec<Elem>>) -> Result<Vec<Elem>, RuntimeError> {
    let name = StreamId::Output(inputs.len() as u32);
    if inputs.len() != op.arity() {
        return Err(RuntimeError::from(SvcodeError::ArityMismatch {
            name,
            expected: op.arity(),
            found: inputs.len(),
        }));
    }

    let mut nodes = Vec::with_capacity(inputs.len() + 1);
    let mut args = Vec::with_capacity(inputs.len());
    for (index, elems) in inputs.into_iter().enumerate() {
        let source: Box<dyn Kernel> = Box::new(kernel::Source::new(elems));
        let input = StreamId::Output(index as u32);
        nodes.push((input, source, Vec::new()));
        args.push(input);
    }
    nodes.push((name, kernel::instantiate(op), args));

    let mut scheduler = Scheduler::new(nodes, &[name])?;
    scheduler.run(&Config::default())?;

    Ok(scheduler.take_output(name))
}
