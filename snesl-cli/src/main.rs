use snesl_cli::Options;
use structopt::StructOpt;

fn main() -> anyhow::Result<()> {
    let _logger = flexi_logger::Logger::try_with_env_or_str("warn")?.start()?;

    snesl_cli::run(Options::from_args())
}
