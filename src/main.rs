use std::process::ExitCode;

use log::{error, info};

use rusty_charts::app::RustyChartsApp;
use rusty_charts::config::Config;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::discover() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match RustyChartsApp::new(config).run() {
        Ok(files) => {
            info!("done, {} chart(s) written", files.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
