use snesl::pass::{core_to_svcode, svcode_to_pretty};
use std::path::PathBuf;

/// Print the vector code for a SNESL program.
#[derive(structopt::StructOpt)]
pub struct Options {
    /// The width to wrap the listing at. Defaults to the terminal width.
    #[structopt(long = "width")]
    width: Option<usize>,
    /// The SNESL source file to be compiled.
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

    let width = options.width.unwrap_or_else(crate::term_width);
    let pretty_alloc = pretty::BoxAllocator;
    let listing = svcode_to_pretty::from_svcode(&pretty_alloc, &compiled.code);
    let result = svcode_to_pretty::from_value_tree(&pretty_alloc, &compiled.value);

    println!("{}", listing.1.pretty(width));
    println!("result: {}", result.1.pretty(width));

    Ok(())
}
