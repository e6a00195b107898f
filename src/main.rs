use std::process::ExitCode;

use clap::Parser;

use retouch::cli::{self, CliArgs};
use retouch::logger;
use retouch::settings::Settings;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let settings = Settings::load();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        logger::parse_level(&settings.log_level)
    };
    logger::init(level);
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("log: {}", path.display());
    }
    log::info!("Retouch {} starting", env!("CARGO_PKG_VERSION"));

    cli::run(args, &settings)
}
