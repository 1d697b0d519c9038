use tracing::{error, info};
use yt_live_relay::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "Invalid configuration");
            std::process::exit(2);
        }
    };
    info!(?config, "Starting live relay");

    if let Err(error) = yt_live_relay::run(config).await {
        error!(?error, "Live relay stopped with an error");
        std::process::exit(1);
    }
}
