//! Veilleur - tech-watch chat assistant
//!
//! Runs the background watchers (RSS tech-news, CVE feed, weather
//! presence) and exposes a one-shot forced RSS cycle for operators.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veilleur::config::BotConfig;
use veilleur::fetch::{HttpCveFetcher, HttpFeedFetcher, HttpWeatherFetcher};
use veilleur::llm::HttpCompletionClient;
use veilleur::notify::WebhookSink;
use veilleur::watch::{
    CveWatcher, CycleOutcome, RssWatcher, Schedule, Supervisor, Watchlist, WeatherWatcher,
};

#[derive(Parser)]
#[command(name = "veilleur")]
#[command(version)]
#[command(about = "Tech-watch chat assistant")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VEILLEUR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the watchers and run until interrupted
    Run,

    /// Run one RSS watch cycle immediately, bypassing the day gate
    Veille,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("veilleur={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => BotConfig::load(path)?.overlay_env(),
        None => BotConfig::default().overlay_env(),
    };

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Veille => run_veille(config).await?,
        Commands::Config { default } => {
            let shown = if default { BotConfig::default() } else { config };
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn build_sink(config: &BotConfig) -> Arc<WebhookSink> {
    Arc::new(WebhookSink::new(
        config.webhooks.channels.clone(),
        config.webhooks.presence_url.clone(),
    ))
}

fn build_completion(config: &BotConfig) -> Arc<HttpCompletionClient> {
    Arc::new(HttpCompletionClient::new(
        config.chat.api_base.clone(),
        config.chat.model_id.clone(),
        config.chat.api_token.clone(),
        config.chat.completion_timeout_secs,
    ))
}

fn build_rss_watcher(config: &BotConfig, channel: String) -> Arc<RssWatcher> {
    Arc::new(RssWatcher::new(
        Arc::new(HttpFeedFetcher::new(config.rss.feed_urls.clone())),
        build_sink(config),
        build_completion(config),
        channel,
        config.rss.clone(),
    ))
}

async fn run_bot(config: BotConfig) -> Result<()> {
    let sink = build_sink(&config);
    let mut supervisor = Supervisor::new();

    // A watcher with missing required configuration disables itself with
    // one log line; the rest of the process is unaffected.
    match config.rss.channel.clone() {
        Some(channel) => {
            supervisor.spawn(
                build_rss_watcher(&config, channel),
                Schedule::Daily {
                    hour: config.rss.daily_hour,
                    minute: config.rss.daily_minute,
                },
                Duration::from_secs(config.rss.initial_delay_secs),
            );
        }
        None => tracing::warn!("VEILLE_CHANNEL_ID not configured, RSS watcher disabled"),
    }

    match config.cve.channel.clone() {
        Some(channel) => {
            supervisor.spawn(
                Arc::new(CveWatcher::new(
                    Arc::new(HttpCveFetcher::new(config.cve.api_url.clone())),
                    sink.clone(),
                    Watchlist::default(),
                    channel,
                )),
                Schedule::Every(Duration::from_secs(config.cve.poll_interval_secs)),
                Duration::ZERO,
            );
        }
        None => tracing::warn!("VEILLE_CVE_CHANNEL_ID not configured, CVE watcher disabled"),
    }

    match config.weather.api_key.clone() {
        Some(api_key) => {
            supervisor.spawn(
                Arc::new(WeatherWatcher::new(
                    Arc::new(HttpWeatherFetcher::new(
                        api_key,
                        config.weather.location.clone(),
                        config.weather.fetch_timeout_secs,
                    )),
                    sink.clone(),
                    config.weather.log_channel.clone(),
                )),
                Schedule::Every(Duration::from_secs(config.weather.poll_interval_secs)),
                Duration::from_secs(config.weather.initial_delay_secs),
            );
        }
        None => tracing::warn!("OPENWEATHER_API_KEY not configured, weather watcher disabled"),
    }

    supervisor.mark_ready();
    tracing::info!("Veilleur started, watchers running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    supervisor.shutdown().await;

    Ok(())
}

async fn run_veille(config: BotConfig) -> Result<()> {
    let Some(channel) = config.rss.channel.clone() else {
        anyhow::bail!("VEILLE_CHANNEL_ID is not configured");
    };

    let watcher = build_rss_watcher(&config, channel);
    match watcher.run(true, chrono::Utc::now()).await? {
        CycleOutcome::Posted(title) => println!("Article posté : {}", title),
        CycleOutcome::NothingNew => println!("Aucun nouvel article trouvé."),
        CycleOutcome::Skipped => println!("Cycle ignoré."),
    }
    Ok(())
}
