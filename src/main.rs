//! CLI entry point: parse flags, run the pipeline, report failure.

use clap::Parser;

use raybake::cli::Args;

fn main() {
    env_logger::init();
    let args = Args::parse();
    let input = args.input.clone();
    let config = args.into_config();

    if let Err(e) = raybake::run(&input, &config) {
        eprintln!("raybake: {e}");
        std::process::exit(20);
    }
}
