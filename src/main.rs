use furretweet_init::{
    bootstrap,
    conf::load_dotenv,
    utils::o11y::build_subscriber,
};

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

/// Authenticate against the FurRetweet database and make sure the
/// `not_retweeted_tweets.author_id` index exists. Safe to run on every start.
#[derive(Parser)]
struct Cli {
    /// Path to an optional YAML configuration file
    #[arg(long, value_name = "FILE", env = "FURRETWEET_INIT_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = match build_subscriber() {
        Ok(subscriber) => subscriber,
        Err(e) => {
            eprintln!("failed to build tracing subscriber: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    load_dotenv();
    let args = Cli::parse();

    let config = match bootstrap::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, source = ?std::error::Error::source(&e), "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    match bootstrap::run(&config).await {
        Ok(report) => {
            info!(
                database = %report.database,
                collection = %report.collection,
                index = %report.index_name,
                "bootstrap complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, source = ?std::error::Error::source(&e), "bootstrap failed");
            ExitCode::FAILURE
        }
    }
}
