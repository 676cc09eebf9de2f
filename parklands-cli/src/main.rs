//! Entry point for the parklands command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = parklands_cli::run() {
        eprintln!("parklands: {err}");
        std::process::exit(1);
    }
}
