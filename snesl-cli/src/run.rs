use snesl::lang::core::semantics;
use snesl::lang::svcode::Elem;
use snesl::pass::{core_to_pretty, core_to_svcode, svcode_to_pretty};
use snesl::runtime::{self, reify};
use std::path::PathBuf;

/// Run a SNESL program on the streaming engine.
#[derive(structopt::StructOpt)]
pub struct Options {
    /// Compare the result with the reference interpreter.
    #[structopt(long = "cross-check")]
    cross_check: bool,
    /// Print the raw contents of every result stream.
    #[structopt(long = "show-streams")]
    show_streams: bool,
    /// Give up after this many scheduling passes.
    #[structopt(long = "max-passes")]
    max_passes: Option<u64>,
    /// The SNESL source file to be run.
    #[structopt(name = "FILE")]
    file_name: PathBuf,
}

pub fn run(options: Options) -> anyhow::Result<()> {
    let file = crate::read_file(&options.file_name)?;
    let program = match crate::load_program(&file)? {
        Some(program) => program,
        None => anyhow::bail!("errors found in `{}`", options.file_name.display()),
    };

    let compiled = match core_to_svcode::compile_program(&program) {
        Ok(compiled) => compiled,
        Err(error) => {
            crate::emit(&file, &error.to_diagnostic())?;
            anyhow::bail!("failed to compile `{}`", options.file_name.display());
        }
    };

    let config = runtime::Config {
        max_passes: options.max_passes,
    };
    let output = match runtime::run(&compiled.code, &compiled.value, &config) {
        Ok(output) => output,
        Err(error) => {
            crate::emit(&file, &error.to_diagnostic())?;
            anyhow::bail!("failed to run `{}`", options.file_name.display());
        }
    };

    let width = crate::term_width();
    let pretty_alloc = pretty::BoxAllocator;

    if options.show_streams {
        let mut contents = Vec::new();
        output.for_each(&mut |elems: &Vec<Elem>| contents.push(elems.clone()));
        for (stream, elems) in compiled.value.streams().iter().zip(&contents) {
            let doc = svcode_to_pretty::from_elems(&pretty_alloc, elems);
            println!("{} = {}", stream, doc.1.pretty(width));
        }
    }

    let value = reify::reify(&output)?;
    println!("{}", core_to_pretty::from_value(&pretty_alloc, &value).1.pretty(width));

    if options.cross_check {
        // The interpreter is eager, so it can fault on bindings the result never uses.
        let expected = match semantics::eval_program(&program) {
            Ok(expected) => expected,
            Err(error) => anyhow::bail!("the reference interpreter failed: {}", error),
        };
        if expected != value {
            let expected = core_to_pretty::from_value(&pretty_alloc, &expected);
            anyhow::bail!(
                "the reference interpreter disagrees, producing: {}",
                expected.1.pretty(width),
            );
        }
    }

    Ok(())
}
