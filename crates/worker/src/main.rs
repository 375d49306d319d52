use clap::Parser;
use kiosk_worker::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    kiosk_worker::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = kiosk_worker::run(cli).await {
        tracing::error!(error = %format!("{e:#}"), "Worker failed");
        return Err(e);
    }
    Ok(())
}
