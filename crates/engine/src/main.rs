//! Lucie bot - Main entry point.

use std::process::ExitCode;
use std::sync::Arc;

use lucie_domain::Catalog;
use lucie_engine::api;
use lucie_engine::infrastructure::{
    clock::{SystemClock, SystemRandom},
    discord::{DiscordGateway, DiscordRest},
    instance_lock::InstanceLock,
    settings::BotSettings,
};
use lucie_engine::use_cases::draw::CommandMatcher;
use lucie_engine::App;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment from repo root (the bot may be started from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lucie_engine=debug,lucie_domain=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lucie bot");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Lucie bot stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = BotSettings::from_env()?;
    tracing::debug!(?settings, "Settings loaded");

    let _lock = InstanceLock::acquire(&settings.lock_file)?;

    let _keep_alive =
        api::http::spawn_keep_alive(&settings.health_host, &settings.health_ports).await;

    let chat = Arc::new(DiscordRest::new(
        &settings.discord_api_base,
        &settings.discord_token,
    )?);
    let app = App::new(
        &Catalog::builtin(),
        settings.cooldown,
        settings.dedup_capacity,
        Arc::new(SystemClock::new()),
        Arc::new(SystemRandom::new()),
        chat,
    );

    let gateway = DiscordGateway::new(
        settings.discord_gateway_url.as_str(),
        settings.discord_token.as_str(),
        CommandMatcher::new(settings.command_prefix.as_str(), settings.command_name.as_str()),
        app.lucie.clone(),
    );

    tokio::select! {
        result = gateway.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
    }

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
