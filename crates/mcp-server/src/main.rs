use std::sync::Arc;

use agent_coord_common::config::CoordinationConfig;
use agent_coord_coordination::Coordination;
use agent_coord_mcp_server::{tracing_setup, McpServer, ToolRegistry};
use agent_coord_storage::{KvStore, RedisStore};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "agent-coord-mcp")]
#[command(about = "Agent coordination MCP server (stdio)")]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Redis connection URL (overrides REDIS_URL)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_setup::init_tracing_with_level(&cli.log_level)?;

    let mut config = CoordinationConfig::from_env()?;
    if let Some(url) = cli.redis_url {
        config.redis_url = url;
    }

    let store = Arc::new(RedisStore::from_config(&config)?);
    store.spawn_health_monitor();
    info!(redis_url = %config.redis_url, "connecting to coordination store");

    let coordination = Coordination::new(store as Arc<dyn KvStore>, &config);
    let server = McpServer::new(ToolRegistry::new(coordination));
    server.run().await
}
