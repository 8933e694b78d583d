use clap::Parser;
use mirage_mock::config::{Cli, ServerConfig};
use mirage_mock::{telemetry, MirageApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, cli.log_format);

    let config = ServerConfig::from_cli(&cli)?;
    let app = MirageApp::bootstrap(config).await?;
    app.run_until_ctrl_c().await
}
