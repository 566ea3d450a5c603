//! A code generation monad.
//!
//! Generators thread a counter used to allocate fresh stream names, and
//! accumulate the instructions they emit. Composing generators with
//! [`Gen::bind`] and [`sequence`] keeps instructions in emission order, so a
//! generated program never refers to a stream before it is defined.

use contracts::debug_ensures;

use crate::lang::svcode::{Instruction, Op, StreamId};
use crate::reporting::CompileError;

/// The result of running a generator.
#[derive(Clone, Debug)]
pub struct Generated<T> {
    pub value: T,
    pub instructions: Vec<Instruction>,
    /// The next unused stream index.
    pub next: u32,
}

/// Deferred code generation, producing a value of type `T`.
pub struct Gen<'a, T> {
    run: Box<dyn FnOnce(u32) -> Result<Generated<T>, CompileError> + 'a>,
}

impl<'a, T: 'a> Gen<'a, T> {
    fn new(run: impl FnOnce(u32) -> Result<Generated<T>, CompileError> + 'a) -> Gen<'a, T> {
        Gen { run: Box::new(run) }
    }

    /// Produce a value without emitting any code.
    pub fn pure(value: T) -> Gen<'a, T> {
        Gen::new(move |next| {
            Ok(Generated {
                value,
                instructions: Vec::new(),
                next,
            })
        })
    }

    /// Abort code generation.
    pub fn fail(error: CompileError) -> Gen<'a, T> {
        Gen::new(move |_| Err(error))
    }

    /// Run this generator, then the generator computed from its result.
    pub fn bind<U: 'a>(self, f: impl FnOnce(T) -> Gen<'a, U> + 'a) -> Gen<'a, U> {
        Gen::new(move |next| {
            let first = (self.run)(next)?;
            let mut second = (f(first.value).run)(first.next)?;

            let mut instructions = first.instructions;
            instructions.append(&mut second.instructions);

            Ok(Generated {
                value: second.value,
                instructions,
                next: second.next,
            })
        })
    }

    pub fn map<U: 'a>(self, f: impl FnOnce(T) -> U + 'a) -> Gen<'a, U> {
        self.bind(move |value| Gen::pure(f(value)))
    }

    /// Run the generator, allocating names starting from `start`.
    #[debug_ensures(ret.as_ref().map_or(true, |generated| generated.next >= start))]
    pub fn run(self, start: u32) -> Result<Generated<T>, CompileError> {
        (self.run)(start)
    }
}

/// Run some generators from left to right, collecting their results.
pub fn sequence<'a, T: 'a>(gens: Vec<Gen<'a, T>>) -> Gen<'a, Vec<T>> {
    gens.into_iter().fold(Gen::pure(Vec::new()), |acc, gen| {
        acc.bind(move |mut values| {
            gen.map(move |value| {
                values.push(value);
                values
            })
        })
    })
}

/// Emit a single instruction, returning the name of its output stream.
pub fn emit<'a>(op: Op, args: Vec<StreamId>) -> Gen<'a, StreamId> {
    Gen::new(move |next| {
        let name = StreamId::Output(next);
        let instruction = Instruction {
            name,
            kind: op.output_kind(),
            op,
            args,
        };

        Ok(Generated {
            value: name,
            instructions: vec![instruction],
            next: next + 1,
        })
    })
}
