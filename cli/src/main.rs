use std::process::ExitCode;

use kubestrap_core::{bootstrap, logging, Config};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.install_dir) {
        eprintln!(
            "error: cannot create install directory {}: {e}",
            config.install_dir.display()
        );
        return ExitCode::FAILURE;
    }
    if let Err(e) = logging::init(&config.log_path()) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    match bootstrap::run(&config).await {
        Ok(report) => {
            report.print();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("bootstrap failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
