use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webbrief::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "webbrief")]
#[command(about = "Web research + page extraction tools (authenticated MCP over HTTP)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server over HTTP (bearer-token authenticated).
    Serve(ServeCmd),
    /// Report which settings are configured (json; no secrets).
    Doctor,
    /// Print version info (json).
    Version,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Address to bind.
    #[arg(long, env = "WEBBRIEF_HOST", default_value = "0.0.0.0")]
    host: IpAddr,
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Serve without MCP sessions: every POST is handled independently.
    #[arg(long)]
    stateless: bool,
}

fn dotenv_enabled() -> bool {
    !matches!(
        std::env::var("WEBBRIEF_DOTENV")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn doctor_json() -> serde_json::Value {
    // Only report booleans, never values.
    let has = |keys: &[&str]| {
        keys.iter().any(|k| {
            std::env::var(k)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        })
    };
    let cfg = AppConfig::from_env(SocketAddr::from(([127, 0, 0, 1], 0)));
    serde_json::json!({
        "schema_version": 1,
        "name": "webbrief",
        "version": env!("CARGO_PKG_VERSION"),
        "configured": {
            "auth_token": cfg.is_ok(),
            "validation_id": cfg.as_ref().map(|c| c.validation_id.is_some()).unwrap_or(false),
            "serper_api_key": cfg.as_ref().map(|c| c.serper_api_key.is_some()).unwrap_or(false),
            "serper_endpoint_override": has(&["WEBBRIEF_SERPER_ENDPOINT"]),
        },
        "ready": cfg.is_ok(),
        "error": cfg.err().map(|e| e.to_string()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    if dotenv_enabled() {
        // Never overrides variables already present in the process environment.
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            init_tracing();
            let mut config = AppConfig::from_env(SocketAddr::new(args.host, args.port))?;
            config.stateless = args.stateless;
            tracing::info!(?config, "starting webbrief");
            webbrief::serve(config).await?;
        }
        Commands::Doctor => {
            println!("{}", serde_json::to_string_pretty(&doctor_json())?);
        }
        Commands::Version => {
            let v = serde_json::json!({
                "schema_version": 1,
                "name": "webbrief",
                "version": env!("CARGO_PKG_VERSION"),
            });
            println!("{v}");
        }
    }
    Ok(())
}
