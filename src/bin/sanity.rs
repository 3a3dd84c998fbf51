use std::io;

use tracing_subscriber::EnvFilter;

use ntru_sanity::cli;

fn main() {
    // diagnostics share stderr with the progress report
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .try_init();

    let code = cli::run(std::env::args_os(), &mut io::stderr());
    std::process::exit(code);
}
