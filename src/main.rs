use clap::Parser;
use dessmonitor_rs::config;
use dessmonitor_rs::model::Action;
use std::process::ExitCode;

/// Read or switch the output source priority of a DESS Monitor / ShineMonitor inverter.
///
/// Credentials and device identifiers come from `DESS_*` environment variables.
#[derive(Debug, Parser)]
#[clap(author, version)]
struct Options {
    /// Action to perform
    #[clap(value_enum)]
    action: Action,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();

    let dispatcher = match config::read_settings().and_then(|s| s.dispatcher()) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            log::error!("FATAL ERROR: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    match dispatcher.run(options.action).await {
        Ok(result) => {
            log::info!(
                "SUCCESS: '{}' completed ({})",
                options.action,
                result.description
            );
            if let Some(priority) = result.priority {
                log::info!("Current output source priority: {}", priority);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("FAILED: '{}': {}", options.action, e);
            ExitCode::from(e.exit_code())
        }
    }
}
