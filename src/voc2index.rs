use clap::Parser;
use log::{error, info};

use dataturks2voc::{run_flatten, FlattenArgs, FlattenerConfig};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = FlattenArgs::parse();

    let config = match FlattenerConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to resolve the devkit directory: {}", e);
            std::process::exit(1);
        }
    };

    info!("Flattening annotations under {}...", config.devkit_dir.display());
    if let Err(e) = run_flatten(&config) {
        error!("Failed to flatten annotations: {}", e);
        std::process::exit(1);
    }
}
