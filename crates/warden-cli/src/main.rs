//! Warden entrypoint: parse arguments, load stores, run the gateway bridge.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use warden_moderation::{KeywordStore, PatternStore};
use warden_rules::{RuleEngine, RuleEngineConfig};
use warden_runtime::{run_warden_bridge, BridgeConfig};

mod cli_args;

use cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.admin_ids.is_empty() {
        tracing::warn!("no admin ids configured; allowlist-only commands are disabled");
    }

    let patterns = Arc::new(PatternStore::load(&cli.data_dir)?);
    tracing::info!(
        "moderation store loaded: patterns={} enabled_groups={}",
        patterns.pattern_count(),
        patterns.enabled_group_count()
    );
    let keywords = KeywordStore::new(&cli.data_dir);

    let engine = RuleEngine::new(
        RuleEngineConfig {
            admin_ids: cli.admin_ids.clone(),
            warning_message: cli.warning_message.clone(),
            video_warning_message: cli.video_warning_message.clone(),
        },
        patterns,
        keywords,
    );

    run_warden_bridge(
        BridgeConfig {
            gateway_url: cli.gateway_url,
            token: cli.token,
            reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
        },
        engine,
    )
    .await
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
