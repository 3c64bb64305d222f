use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parkpass::booking::BookingService;
use parkpass::captcha::{SharedToken, TokenVerifier, UpstreamVerified};
use parkpass::config::Config;
use parkpass::notify::{GcNotify, LogNotifier, Notifier};
use parkpass::seed::Seed;
use parkpass::store::Store;
use parkpass::{compactor, server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parkpass=info")),
        )
        .init();

    let config = Config::from_env()?;
    parkpass::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(Store::open(config.data_dir.join("parkpass.wal"))?);
    if let Some(path) = &config.seed_path {
        let (parks, facilities) = Seed::from_file(path)?.apply(&store).await?;
        info!("seeded {parks} parks and {facilities} facilities from {}", path.display());
    }

    let compactor_store = store.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_store, threshold, Duration::from_secs(30)).await;
    });

    let notifier: Arc<dyn Notifier> = match &config.notify.api_path {
        Some(path) => Arc::new(GcNotify::new(path.clone(), config.notify.api_key.clone())),
        None => Arc::new(LogNotifier),
    };
    let verifier: Arc<dyn TokenVerifier> = match &config.captcha_token {
        Some(token) => Arc::new(SharedToken(token.clone())),
        None => Arc::new(UpstreamVerified),
    };
    let service = Arc::new(BookingService::new(
        store,
        notifier,
        verifier,
        config.booking.clone(),
        config.notify.clone(),
    ));

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("parkpass listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  timezone: {}", config.booking.timezone);
    info!("  max_connections: {}", config.max_connections);
    info!("  notify: {}", if config.notify.api_path.is_some() { "enabled" } else { "log only" });
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };

    server::serve(listener, service, config.max_connections, Duration::from_secs(10), shutdown).await;
    info!("parkpass stopped");
    Ok(())
}
