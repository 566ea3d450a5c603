use snesl::pass::core_to_pretty;
use std::path::PathBuf;

/// Check some SNESL programs.
#[derive(structopt::StructOpt)]
pub struct Options {
    /// The SNESL source files to be checked.
    #[structopt(name = "FILE")]
    file_names: Vec<PathBuf>,
}

pub fn run(options: Options) -> anyhow::Result<()> {
    let pretty_alloc = pretty::BoxAllocator;
    let mut is_ok = true;

    for file_name in &options.file_names {
        let file = crate::read_file(file_name)?;
        match crate::load_program(&file)? {
            Some(program) => {
                let doc = core_to_pretty::from_type(&pretty_alloc, &program.main_type);
                println!("{}: {}", file_name.display(), doc.1.pretty(crate::term_width()));
            }
            None => is_ok = false,
        }
    }

    match is_ok {
        true => Ok(()),
        false => Err(anyhow::anyhow!("errors found in supplied source files")),
    }
}
