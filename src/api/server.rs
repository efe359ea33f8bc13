use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

/// GET / - 存活标识
pub async fn alive() -> &'static str {
    "🤖 Bot activo"
}

/// GET /api/health - 健康检查
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let last_refresh = state.refresher.last_success().or_else(|| state.store.loaded_at());

    Json(json!({
        "status": "ok",
        "dataset_loaded": state.store.loaded_at().is_some(),
        "snapshot_exists": state.store.snapshot_exists(),
        "refreshing": state.refresher.is_running(),
        "last_refresh": last_refresh.map(|t| t.to_rfc3339()),
        "last_error": state.refresher.last_error(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use padron_bot::refresh::SnapshotRefresher;
    use padron_bot::store::RecordStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_health_before_first_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::new(dir.path().join("padron.db"), "maestra"));
        let refresher = Arc::new(SnapshotRefresher::new(store.clone(), "", Duration::from_secs(5)).unwrap());
        let state = Arc::new(AppState {
            store,
            refresher,
            started_at: Utc::now(),
        });

        let app = Router::new()
            .route("/", get(alive))
            .route("/api/health", get(health_check))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = reqwest::get(format!("http://{}/", addr)).await.unwrap().text().await.unwrap();
        assert_eq!(body, "🤖 Bot activo");

        let health: Value = reqwest::get(format!("http://{}/api/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["dataset_loaded"], false);
        assert_eq!(health["snapshot_exists"], false);
        assert!(health["last_refresh"].is_null());
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    }
}
