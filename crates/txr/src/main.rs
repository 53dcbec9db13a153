use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use txr_core::{
    config::Config, config_cache::ConfigCache, dispatcher::EventDispatcher, extraction,
    formatting::format_inr, relay::RelayClient,
};
use txr_telegram::{polling, webhook, webhook::AppState, TelegramMessenger};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    txr_core::logging::init("txr")?;

    let mut cfg = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                cfg.port = port;
            }
            let state = bootstrap(cfg).await?;
            webhook::serve(state).await
        }
        Commands::Poll => {
            let state = bootstrap(cfg).await?;
            polling::run_polling(state.dispatcher, state.messenger).await
        }
        Commands::Extract { text, json } => {
            print_extraction(&text, json)?;
            Ok(())
        }
        Commands::CheckConfig => check_config(&cfg).await,
        Commands::SetWebhook => {
            let url = cfg
                .webhook_endpoint()
                .context("WEBHOOK_URL not configured")?;
            let state = bootstrap(cfg).await?;
            state.messenger.set_webhook(&url).await?;
            println!("Webhook set to {url}");
            Ok(())
        }
    }
}

/// Load the initial snapshot (falling back to env overrides) and wire the
/// transport-independent pieces together.
async fn bootstrap(cfg: Config) -> anyhow::Result<AppState> {
    let cfg = Arc::new(cfg);

    tracing::info!(
        api_endpoint = %cfg.api_endpoint,
        vendor_id = cfg.vendor_id,
        bot_config_endpoint = %cfg.bot_config_endpoint,
        policy = ?cfg.unauthorized_policy,
        "starting transaction relay"
    );

    let cache = Arc::new(ConfigCache::new(&cfg)?);
    match cache.ensure_fresh(false).await {
        Ok(snap) => tracing::info!(
            authorized_chat_id = %snap
                .authorized_chat_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "initial bot configuration loaded"
        ),
        Err(e) => match cache.seed_from_overrides().await {
            Some(_) => tracing::warn!(
                error = %e,
                "config API unavailable; starting with BOT_TOKEN from the environment"
            ),
            None => anyhow::bail!("failed to fetch initial bot configuration: {e}"),
        },
    }

    let messenger = Arc::new(TelegramMessenger::new(
        cache.clone(),
        cfg.telegram_api_url.as_deref(),
    )?);
    let dispatcher = Arc::new(EventDispatcher::new(
        cache,
        RelayClient::new(&cfg)?,
        messenger.clone(),
        cfg.unauthorized_policy,
    ));

    Ok(AppState {
        cfg,
        dispatcher,
        messenger,
    })
}

fn print_extraction(text: &str, as_json: bool) -> anyhow::Result<()> {
    let found = extraction::extract(text);

    if as_json {
        let out = serde_json::json!({
            "reference_numbers": found.reference_numbers,
            "amounts": found.amounts,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("No reference numbers or amounts found.");
        return Ok(());
    }
    println!("Reference numbers: {}", found.reference_numbers.join(", "));
    let amounts: Vec<String> = found.amounts.iter().map(|a| format_inr(*a)).collect();
    println!("Amounts: {}", amounts.join(", "));
    Ok(())
}

async fn check_config(cfg: &Config) -> anyhow::Result<()> {
    let cache = ConfigCache::new(cfg)?;
    let snap = cache
        .ensure_fresh(true)
        .await
        .context("failed to fetch bot configuration")?;

    println!("Config endpoint:    {}", cfg.bot_config_endpoint);
    println!("Vendor ID:          {}", cfg.vendor_id);
    println!(
        "Bot token:          {}",
        snap.bot_token.as_deref().map(redact).unwrap_or_else(|| "(missing)".to_string())
    );
    println!(
        "Authorized chat ID: {}",
        snap.authorized_chat_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(missing)".to_string())
    );
    println!("Relay endpoint:     {}", cfg.api_endpoint);
    println!("Webhook:            {}", cfg.webhook_endpoint().unwrap_or_else(|| "(not set)".to_string()));
    Ok(())
}

fn redact(secret: &str) -> String {
    let shown: String = secret.chars().take(6).collect();
    if shown.len() == secret.len() {
        "***".to_string()
    } else {
        format!("{shown}***")
    }
}
