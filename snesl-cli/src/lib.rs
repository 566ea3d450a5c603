use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use snesl::lang::{core, surface};
use snesl::pass::surface_to_core;
use std::path::Path;

pub mod check;
pub mod compile;
pub mod repl;
pub mod run;

/// The SNESL command line interface.
#[derive(structopt::StructOpt)]
pub enum Options {
    /// Type check some programs.
    #[structopt(name = "check")]
    Check(check::Options),
    /// Print the vector code that a program compiles to.
    #[structopt(name = "compile")]
    Compile(compile::Options),
    /// Run a program on the streaming engine.
    #[structopt(name = "run")]
    Run(run::Options),
    /// Runs the REPL/interactive mode.
    #[structopt(name = "repl")]
    Repl(repl::Options),
}

/// Run the CLI with the given options
pub fn run(options: Options) -> anyhow::Result<()> {
    match options {
        Options::Check(options) => check::run(options),
        Options::Compile(options) => compile::run(options),
        Options::Run(options) => run::run(options),
        Options::Repl(options) => repl::run(options),
    }
}

pub type File = SimpleFile<String, String>;

pub fn read_file(file_name: &Path) -> anyhow::Result<File> {
    let source = std::fs::read_to_string(file_name)?;
    Ok(SimpleFile::new(file_name.display().to_string(), source))
}

/// Write a diagnostic to stderr.
pub fn emit(file: &File, diagnostic: &Diagnostic<()>) -> anyhow::Result<()> {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let reporting_config = codespan_reporting::term::Config::default();
    codespan_reporting::term::emit(&mut writer.lock(), &reporting_config, file, diagnostic)?;
    Ok(())
}

/// Parse and elaborate a program, reporting any diagnostics along the way.
///
/// Returns `None` if the program contained errors.
pub fn load_program(file: &File) -> anyhow::Result<Option<core::Program>> {
    let pretty_alloc = pretty::BoxAllocator;
    let (messages_tx, messages_rx) = crossbeam_channel::unbounded();

    let program = match surface::Program::from_str(file.source()) {
        Ok(surface_program) => {
            let mut state = surface_to_core::State::new(messages_tx);
            Some(state.from_program(&surface_program))
        }
        Err(error) => {
            messages_tx.send(error.into())?;
            None
        }
    };

    let mut is_ok = true;
    for message in messages_rx.try_iter() {
        let diagnostic = message.to_diagnostic(&pretty_alloc);
        is_ok &= diagnostic.severity < Severity::Error;
        emit(file, &diagnostic)?;
    }

    Ok(program.filter(|_| is_ok))
}

pub fn term_width() -> usize {
    match term_size::dimensions() {
        Some((width, _)) => width,
        None => std::usize::MAX,
    }
}
