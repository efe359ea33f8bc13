//! Snapshot refresh - download the dataset and swap it in / 数据快照刷新
//!
//! The file is written to a temp file next to the snapshot, then handed to the
//! record store which renames it into place. Only one refresh runs at a time.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::config::AppConfig;
use crate::error::BotError;
use crate::store::RecordStore;

/// Header of every SQLite database file / SQLite 文件头
pub const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New snapshot installed / 新快照已安装
    Updated { bytes: u64 },
    /// Another refresh is in progress / 已有刷新在进行
    AlreadyRunning,
}

/// Resets the running flag when dropped / 释放时重置运行标记
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn try_new(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct SnapshotRefresher {
    client: reqwest::Client,
    url: String,
    store: Arc<RecordStore>,
    running: AtomicBool,
    last_success: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
}

impl SnapshotRefresher {
    pub fn new(store: Arc<RecordStore>, url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
            store,
            running: AtomicBool::new(false),
            last_success: RwLock::new(None),
            last_error: RwLock::new(None),
        })
    }

    pub fn from_config(store: Arc<RecordStore>, config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            store,
            &config.dataset.url,
            Duration::from_secs(config.dataset.download_timeout_secs),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Download and install a fresh snapshot / 下载并安装新快照
    pub async fn refresh(&self) -> Result<RefreshOutcome, BotError> {
        let Some(_guard) = RunningGuard::try_new(&self.running) else {
            tracing::info!("Snapshot refresh already running, skipped");
            return Ok(RefreshOutcome::AlreadyRunning);
        };

        match self.download_and_install().await {
            Ok(bytes) => {
                *self.last_success.write() = Some(Utc::now());
                *self.last_error.write() = None;
                tracing::info!("Snapshot refreshed ({} bytes)", bytes);
                Ok(RefreshOutcome::Updated { bytes })
            }
            Err(e) => {
                tracing::error!("Snapshot refresh failed: {}", e);
                *self.last_error.write() = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn download_and_install(&self) -> Result<u64, BotError> {
        if self.url.is_empty() {
            return Err(BotError::DownloadFailure("dataset URL not configured".to_string()));
        }

        tracing::info!("Downloading snapshot from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| BotError::DownloadFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::DownloadFailure(format!("HTTP {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BotError::DownloadFailure(e.to_string()))?;

        // Share links answer 200 with an HTML page when the file is not public
        if !body.starts_with(SQLITE_MAGIC) {
            return Err(BotError::DownloadFailure(
                "downloaded file is not a SQLite database".to_string(),
            ));
        }

        let size = body.len() as u64;
        let dir = self.snapshot_dir();
        let file = tokio::task::spawn_blocking(move || write_temp(&dir, &body))
            .await
            .map_err(|e| BotError::DownloadFailure(e.to_string()))??;

        self.store.install_snapshot(file).await?;
        Ok(size)
    }

    fn snapshot_dir(&self) -> PathBuf {
        match self.store.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Refresh every `interval` in the background / 后台定时刷新
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately, startup already refreshed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracing::debug!("Periodic snapshot refresh");
                let _ = self.refresh().await;
            }
        })
    }
}

fn write_temp(dir: &std::path::Path, body: &[u8]) -> Result<NamedTempFile, BotError> {
    let io_err = |e: std::io::Error| BotError::DownloadFailure(e.to_string());
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(body).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    Ok(file)
}
