use backtraced_error::error_chain_to_pretty_formatted;
use clap::Parser;
use greptime_frames::cli::{frames_to_json, read_input, run, CliError, LaunchConfig};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    // load env vars so clap can use it when parsing a config
    dotenv::dotenv().ok();
    let config = LaunchConfig::parse();
    if let Err(e) = tracing_config_helper::setup_logging(&config.logging_config()) {
        eprintln!("{}", error_chain_to_pretty_formatted(&CliError::from(e)));
        return ExitCode::FAILURE;
    }
    info!("Using config: {:#?}", config);
    match convert(&config) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", error_chain_to_pretty_formatted(&e));
            ExitCode::FAILURE
        }
    }
}

fn convert(config: &LaunchConfig) -> Result<String, CliError> {
    let input = read_input(config.input.as_ref())?;
    let frames = run(config, &input)?;
    frames_to_json(&frames)
}
