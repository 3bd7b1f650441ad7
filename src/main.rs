//! Binary entry point: minimal flag parsing and daemon startup.

use std::path::PathBuf;
use std::process::ExitCode;

use zmanimd::Zmanimd;

fn print_help() {
    println!("zmanimd v{}", env!("CARGO_PKG_VERSION"));
    println!("Daemon driving halachic time-of-day switches from daily zmanim");
    println!();
    println!("Usage: zmanimd [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Use an explicit configuration file");
    println!("  -d, --debug          Enable debug output");
    println!("  -V, --version        Print version");
    println!("  -h, --help           Print this help");
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut debug_enabled = false;
    let mut config_path: Option<PathBuf> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-d" | "--debug" => debug_enabled = true,
            "-c" | "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("--config requires a path");
                    return ExitCode::FAILURE;
                }
            },
            "-V" | "--version" => {
                println!("zmanimd {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                return ExitCode::FAILURE;
            }
        }
    }

    let mut app = Zmanimd::new(debug_enabled);
    if let Some(path) = config_path {
        app = app.with_config_path(path);
    }

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            zmanimd::log_error_exit!("zmanimd exited with an error");
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}
