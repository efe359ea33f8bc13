use chrono::{DateTime, Utc};
use padron_bot::refresh::SnapshotRefresher;
use padron_bot::store::RecordStore;
use std::sync::Arc;

/// Shared state of the liveness server / 存活检测服务共享状态
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub refresher: Arc<SnapshotRefresher>,
    pub started_at: DateTime<Utc>,
}
