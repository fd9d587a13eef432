//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run a front-end.
//! No business logic here.
//!
//! `tg-sweep` runs the interactive menu, `tg-sweep serve` the local HTTP API.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tg_sweep::adapters::http::{AppState, HttpInputPort};
use tg_sweep::adapters::mock::MockConnector;
use tg_sweep::adapters::persistence::CredentialsJson;
use tg_sweep::adapters::telegram::GrammersConnector;
use tg_sweep::adapters::ui::tui::TuiInputPort;
use tg_sweep::domain::Credentials;
use tg_sweep::ports::{Connector, InputPort};
use tg_sweep::shared::config::AppConfig;
use tg_sweep::usecases::{ChatService, ChatSettings, ExportService, SessionManager};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let serve = std::env::args().nth(1).as_deref() == Some("serve");

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        AppConfig::default()
    });
    let data_dir = cfg.data_dir_or_default();
    info!(path = %data_dir.display(), demo = cfg.is_demo(), "data directory");

    // --- Connector: grammers, or the in-memory demo account ---
    let (connector, fallback): (Arc<dyn Connector>, Option<Credentials>) = if cfg.is_demo() {
        warn!("TG_SWEEP_DEMO is set, using the in-memory demo account");
        let demo = Credentials {
            api_id: 1,
            api_hash: "demo".into(),
            phone: Some("+10000000000".into()),
        };
        (Arc::new(MockConnector::demo()), Some(demo))
    } else {
        (
            Arc::new(GrammersConnector::new(cfg.sessions_dir())),
            cfg.fallback_credentials(),
        )
    };

    let store = Arc::new(CredentialsJson::new(cfg.credentials_path_or_default()));
    info!(path = %store.path().display(), "credential file");
    let session = Arc::new(SessionManager::new(connector, store).with_fallback(fallback));

    let settings = ChatSettings {
        probe_budget: cfg.probe_budget_or_default(),
        probe_limit: cfg.probe_limit_or_default(),
        undo_delay: Duration::from_secs(cfg.undo_delay_secs_or_default()),
        ..ChatSettings::default()
    };
    info!(
        probe_budget = settings.probe_budget,
        probe_limit = settings.probe_limit,
        undo_delay_secs = settings.undo_delay.as_secs(),
        "analysis and delete settings"
    );
    let chats = Arc::new(ChatService::new(Arc::clone(&session), settings));

    let input_port: Arc<dyn InputPort> = if serve {
        if session.auto_connect().await {
            info!("resumed saved session");
        }
        Arc::new(HttpInputPort::new(
            AppState::new(Arc::clone(&chats)),
            cfg.http_port_or_default(),
        ))
    } else {
        tg_sweep::adapters::ui::init_ui();
        let exports = Arc::new(ExportService::new(cfg.output_dir()));
        Arc::new(TuiInputPort::new(Arc::clone(&chats), exports))
    };

    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    session.close().await;
    Ok(())
}
