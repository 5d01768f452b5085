mod account;
mod api;
mod auth;
mod config;
mod context;
mod credential;
mod db;
mod error;
mod intake;
mod mailer;
mod otp;
mod rate_limit;
mod server;
mod sms;
mod uploads;

use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "intake_server=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;
    tracing::info!(
        name = %config.service.application_name,
        "starting proposal intake server"
    );

    let ctx = AppContext::new(config).await?;
    ctx.accounts.seed_super_admin().await?;

    server::serve(ctx).await
}
