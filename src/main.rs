use clap::Parser;
use send_gmail::app::run;
use send_gmail::cli::Cli;
use send_gmail::error::{Error, EXIT_FAILURE};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // Usage errors exit with 1, --help and --version with 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            e.print().ok();
            std::process::exit(EXIT_FAILURE);
        }
        Err(e) => e.exit(),
    };

    if let Err(e) = run(cli).await {
        tracing::debug!(error = ?e, "Send aborted");
        eprintln!("ERROR: {}", e);
        if let Error::ConfigCorrupt { path, .. } = &e {
            eprintln!("Try deleting '{}' if it exists", path.display());
        }
        std::process::exit(e.exit_code());
    }
}
