use clap::Parser;
use tp_core::cli::{run, Cli};
use tp_core::logging;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code().as_i32());
    }
    let code = run(cli);
    std::process::exit(code.into());
}
