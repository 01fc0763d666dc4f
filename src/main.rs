use watsonx_gateway::regions::RegionPreset;
use watsonx_gateway::{build_router, AppState, GatewayConfig, SharedLogger, UpstreamClient};

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "watsonx-gateway",
    about = "OpenAI-compatible gateway for IBM watsonx.ai",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// watsonx.ai region (overrides config and WATSONX_REGION)
    #[arg(long)]
    region: Option<String>,

    /// Log file path
    #[arg(long, default_value = "watsonx-gateway.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watsonx_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        println!("  1. watsonx-gateway.toml (current directory)");
        println!("  2. $XDG_CONFIG_HOME/watsonx-gateway/config.toml");
        println!("     ~/.config/watsonx-gateway/config.toml");
        println!("  3. ~/.watsonx-gateway.toml");
        println!("Supported regions: {}", RegionPreset::names());
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env();

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(region) = cli.region {
        config.region = Some(region);
    }

    // Fail fast before binding anything
    let base_url = config.effective_base_url()?;
    let api_key = config.resolve_api_key()?;
    let project_id = config.require_project_id()?;

    let logger = SharedLogger::new(&cli.log_file)?;
    let upstream = UpstreamClient::from_config(&config, &api_key, &project_id)?;

    info!("watsonx-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Region:         {}", config.region.as_deref().unwrap_or("custom"));
    info!("  Base URL:       {}", base_url);
    info!("  API version:    {}", config.api_version);
    info!("  Default model:  {}", config.default_model);
    info!("  Log file:       {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting watsonx-gateway base_url={} port={}",
            base_url, config.port
        ),
    );

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        upstream,
        logger,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OPENAI_BASE_URL=http://{}/v1", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
