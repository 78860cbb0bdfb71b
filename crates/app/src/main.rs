//! NoteDown terminal client
//!
//! Signs a user in against a Supabase project (or an in-process stand-in)
//! and manages their personal task list from the terminal.

mod command;
mod config;
mod render;
mod shell;

use std::sync::Arc;

use anyhow::Context;
use notedown_core::backend::{Backend, InMemoryBackend, SupabaseClient, SupabaseConfig};
use notedown_core::controller::App;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, BackendConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they stay out of the rendered screen
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notedown=info,notedown_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let backend = build_backend(&config).await?;

    let mut app = App::new(backend);
    app.mount().await;

    let result = shell::run(&mut app).await;
    app.teardown().await;
    result
}

async fn build_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn Backend>> {
    match &config.backend {
        BackendConfig::Supabase {
            url,
            anon_key,
            auto_refresh,
        } => {
            tracing::info!("Using Supabase backend at {}", url);
            tracing::info!("Session file: {:?}", config.session_path());

            let client = SupabaseClient::new(
                SupabaseConfig::new(url, anon_key).with_session_path(config.session_path()),
            )
            .context("Failed to create Supabase client")?;
            if *auto_refresh {
                client.start_auto_refresh().await;
            }
            Ok(Arc::new(client))
        }
        BackendConfig::Memory { confirm_email } => {
            tracing::info!("Using in-memory backend, nothing is persisted");
            Ok(Arc::new(
                InMemoryBackend::new().with_email_confirmation(*confirm_email),
            ))
        }
    }
}
