use hammerhdr::cli::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::parse() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("hammerhdr: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = hammerhdr::supervisor::run(config).await {
        eprintln!("hammerhdr: {err}");
        std::process::exit(1);
    }
}
