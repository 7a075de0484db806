use clap::Parser;
use log::{error, info};

use dataturks2voc::{run_import, setup_output_directories, HttpFetcher, ImportArgs, ImporterConfig};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ImportArgs::parse();

    if let Err(e) = setup_output_directories(&args.pascal_voc_dir) {
        error!("Failed to set up output directories: {}", e);
        return;
    }

    let config = ImporterConfig::from_args(&args);
    info!("test percent is {}%", config.test_percent * 100.0);

    match run_import(&config, &HttpFetcher::new()) {
        Ok(report) => {
            report.print_summary();
            info!("Completed");
        }
        Err(e) => error!("{}", e),
    }
}
