use snesl::lang::core::{self, semantics};
use snesl::reporting::CompileError;

const HISTORY_FILE_NAME: &str = "history";

/// The SNESL REPL/interactive mode.
#[derive(structopt::StructOpt)]
pub struct Options {
    /// The prompt to display before expressions.
    #[structopt(long = "prompt", default_value = "> ")]
    pub prompt: String,
    /// Disable the welcome banner on startup.
    #[structopt(long = "no-banner")]
    pub no_banner: bool,
    /// Disable saving of command history on exit.
    #[structopt(long = "no-history")]
    pub no_history: bool,
}

fn print_welcome_banner() {
    const WELCOME_BANNER: &[&str] = &[
        r"  ___ _  _ ___ ___ _      ",
        r" / __| \| | __/ __| |     ",
        r" \__ \ .` | _|\__ \ |__   ",
        r" |___/_|\_|___|___/____|  ",
        r"",
    ];

    for (i, line) in WELCOME_BANNER.iter().enumerate() {
        match i {
            1 => println!("{}Version {}", line, env!("CARGO_PKG_VERSION")),
            2 => println!("{}:? for help", line),
            _ => println!("{}", line.trim_end()),
        }
    }
}

fn print_help() {
    println!(":? :help         display this help text");
    println!(":t :type <term>  show the type of a term");
    println!(":q :quit         exit the REPL");
    println!("<term>           evaluate a term on the streaming engine");
}

enum Command<'a> {
    Help,
    Quit,
    Type(&'a str),
    Eval(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((":t", term)) | Some((":type", term)) => Command::Type(term.trim()),
        _ => match line {
            ":?" | ":h" | ":help" => Command::Help,
            ":q" | ":quit" => Command::Quit,
            _ => Command::Eval(line),
        },
    }
}

/// Run the REPL with the given options.
pub fn run(options: Options) -> anyhow::Result<()> {
    use codespan_reporting::files::SimpleFile;
    use rustyline::error::ReadlineError;
    use rustyline::{Config, Editor};
    use snesl::lang::surface;
    use snesl::pass::{core_to_pretty, core_to_svcode, surface_to_core};
    use snesl::runtime::{self, reify};

    let mut editor = {
        let config = Config::builder()
            .history_ignore_space(true)
            .history_ignore_dups(true)
            .build();

        Editor::<()>::with_config(config)
    };

    if !options.no_banner {
        print_welcome_banner()
    }

    let xdg_dirs = xdg::BaseDirectories::with_prefix("snesl/repl")?;
    let history_path = xdg_dirs.get_data_home().join(HISTORY_FILE_NAME);

    if !options.no_history && editor.load_history(&history_path).is_err() {
        // No previous REPL history!
    }

    let pretty_alloc = pretty::BoxAllocator;
    let config = runtime::Config::default();

    loop {
        let line = match editor.readline(&options.prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted!");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        };

        if !options.no_history {
            editor.add_history_entry(line.as_str());
        }

        let (source, show_value) = match parse_command(&line) {
            Command::Help => {
                print_help();
                continue;
            }
            Command::Quit => break,
            Command::Type(source) => (source, false),
            Command::Eval(source) => (source, true),
        };
        if source.is_empty() {
            continue;
        }
        let file = SimpleFile::new("<input>".to_owned(), source.to_owned());

        let surface_term = match surface::Term::from_str(file.source()) {
            Ok(surface_term) => surface_term,
            Err(error) => {
                let message = snesl::reporting::Message::from(error);
                crate::emit(&file, &message.to_diagnostic(&pretty_alloc))?;
                continue;
            }
        };

        let (messages_tx, messages_rx) = crossbeam_channel::unbounded();
        let (term, r#type) = surface_to_core::State::new(messages_tx).synth_type(&surface_term);

        let mut is_ok = true;
        for message in messages_rx.try_iter() {
            is_ok = false;
            crate::emit(&file, &message.to_diagnostic(&pretty_alloc))?;
        }
        let r#type = match r#type {
            Some(r#type) if is_ok => r#type,
            _ => continue,
        };

        if !show_value {
            let doc = core_to_pretty::from_type(&pretty_alloc, &r#type);
            println!("{}", doc.1.pretty(crate::term_width()));
            continue;
        }

        let program = core::Program {
            definitions: Vec::new(),
            main: term,
            main_type: r#type.clone(),
        };
        let value = match core_to_svcode::compile_program(&program) {
            Ok(compiled) => match runtime::run(&compiled.code, &compiled.value, &config) {
                Ok(output) => reify::reify(&output).map_err(anyhow::Error::from),
                Err(error) => {
                    crate::emit(&file, &error.to_diagnostic())?;
                    continue;
                }
            },
            // Arrays are only understood by the reference interpreter
            Err(CompileError::Unsupported { construct }) => {
                log::info!("evaluating `{}` with the reference interpreter", construct);
                semantics::eval_program(&program).map_err(anyhow::Error::from)
            }
            Err(error) => {
                crate::emit(&file, &error.to_diagnostic())?;
                continue;
            }
        };

        match value {
            Ok(value) => {
                let doc = (core_to_pretty::from_value(&pretty_alloc, &value))
                    .append(" : ")
                    .append(core_to_pretty::from_type(&pretty_alloc, &r#type))
                    .group();
                println!("{}", doc.1.pretty(crate::term_width()));
            }
            Err(error) => eprintln!("error: {}", error),
        }
    }

    if !options.no_history && !editor.history().is_empty() {
        let history_path = xdg_dirs.place_data_file(HISTORY_FILE_NAME)?;
        editor.save_history(&history_path)?;
    }

    println!("Bye bye");

    Ok(())
}
