use axum::{routing::get, Router};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use padron_bot::bot::{self, Dispatcher};
use padron_bot::config;
use padron_bot::refresh::SnapshotRefresher;
use padron_bot::search::{Formatter, SearchEngine};
use padron_bot::store::RecordStore;
use padron_bot::telegram::TelegramClient;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "padron_bot=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    // Missing token is the only fatal configuration error / 缺少令牌时终止启动
    app_config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!("Liveness server will listen on {}", app_config.get_bind_address());

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let store = Arc::new(RecordStore::new(
        app_config.get_snapshot_path(),
        &app_config.dataset.table,
    ));
    let engine = Arc::new(SearchEngine::from_config(store.clone(), &app_config));
    let refresher = Arc::new(SnapshotRefresher::from_config(store.clone(), &app_config)?);
    let client = Arc::new(TelegramClient::new(
        &app_config.bot.api_base,
        &app_config.bot.token,
        app_config.bot.poll_timeout_secs,
    )?);

    match client.get_me().await {
        Ok(me) => tracing::info!("Connected as @{}", me.username.unwrap_or_default()),
        Err(e) => tracing::warn!("getMe failed: {}", e),
    }

    // Startup download; the bot still starts without a dataset / 启动时下载数据库
    if let Err(e) = refresher.refresh().await {
        tracing::warn!("Starting without a fresh dataset: {}", e);
    }

    let interval = app_config.dataset.refresh_interval_secs;
    if interval > 0 {
        refresher.clone().spawn_periodic(Duration::from_secs(interval));
        tracing::info!("Periodic refresh every {}s", interval);
    }

    let dispatcher = Arc::new(Dispatcher::new(
        client.clone(),
        engine,
        Formatter::new(app_config.columns.clone(), app_config.bot.max_message_len),
        refresher.clone(),
    ));

    let state = Arc::new(AppState {
        store,
        refresher,
        started_at: Utc::now(),
    });

    let app = Router::new()
        .route("/", get(api::server::alive))
        .route("/api/health", get(api::server::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Liveness server running at http://{}", bind_addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Liveness server stopped: {}", e);
        }
    });

    tokio::select! {
        _ = bot::run_polling(client, dispatcher, app_config.bot.poll_timeout_secs) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    server.abort();
    Ok(())
}
