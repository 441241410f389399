use std::env;
use std::process;

use buscador::{cli, logging};

fn main() {
    logging::init_tracing_from_env();
    let args: Vec<String> = env::args().collect();
    process::exit(cli::run_with_args(&args));
}
