//! Application configuration module / 应用配置模块
//!
//! Manages configuration loaded from config.json, overridden by environment variables
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the bot access token / 机器人令牌环境变量
pub const ENV_TOKEN: &str = "TELEGRAM_TOKEN";
/// Environment variable holding the dataset URL / 数据集下载地址环境变量
pub const ENV_DB_URL: &str = "DB_URL";
/// Port assigned by the hosting platform / 托管平台分配的端口
pub const ENV_PORT: &str = "PORT";
pub const ENV_DATA_DIR: &str = "DATA_DIR";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Liveness server configuration / 存活检测服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Messaging transport configuration / 消息通道配置
    #[serde(default)]
    pub bot: BotConfig,
    /// Snapshot dataset configuration / 数据快照配置
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Physical column for each search role / 各搜索角色对应的物理列
    #[serde(default)]
    pub columns: ColumnMap,
    /// Search configuration / 搜索配置
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Bot configuration / 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Access token, usually supplied through TELEGRAM_TOKEN / 访问令牌
    #[serde(default)]
    pub token: String,
    /// Bot API base URL / Bot API 地址
    pub api_base: String,
    /// Long polling timeout in seconds / 长轮询超时（秒）
    pub poll_timeout_secs: u64,
    /// Maximum message length accepted by the transport / 单条消息最大长度
    pub max_message_len: usize,
}

/// Dataset configuration / 数据集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Remote snapshot URL, usually supplied through DB_URL / 远程快照地址
    #[serde(default)]
    pub url: String,
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Local snapshot file name (relative to data_dir) / 本地快照文件名
    pub db_file: String,
    /// Master table name / 主表名
    pub table: String,
    pub download_timeout_secs: u64,
    /// Periodic refresh interval in seconds, 0 = disabled / 定时刷新间隔，0表示禁用
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

/// Column-name mapping for every search role / 搜索角色与列名映射
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub id: String,
    pub surname: String,
    pub given_name: String,
    pub address: String,
    pub sex: String,
    pub cohort: String,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Rows per page / 每页行数
    pub page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            max_message_len: 4096,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            data_dir: "data".to_string(),
            db_file: "datos_seguros.db".to_string(),
            table: "maestra".to_string(),
            download_timeout_secs: 300,
            refresh_interval_secs: 0,
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            surname: "APELLIDO".to_string(),
            given_name: "NOMBRE".to_string(),
            address: "domicilio".to_string(),
            sex: "SEXO".to_string(),
            cohort: "CLASE".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

impl AppConfig {
    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.dataset.data_dir)
    }

    /// Get the local snapshot path / 获取本地快照路径
    pub fn get_snapshot_path(&self) -> PathBuf {
        self.get_data_dir().join(&self.dataset.db_file)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply environment overrides / 应用环境变量覆盖
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.bot.token = token.trim().to_string();
        }
        if let Some(url) = lookup(ENV_DB_URL).filter(|v| !v.trim().is_empty()) {
            self.dataset.url = url.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid {}: {}", ENV_PORT, port),
            }
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.dataset.data_dir = dir;
        }
    }

    /// Check required settings, startup aborts on error / 校验必需配置，失败则终止启动
    pub fn validate(&self) -> Result<(), String> {
        if self.bot.token.trim().is_empty() {
            return Err(format!("Missing bot token, set {} or bot.token in config.json", ENV_TOKEN));
        }
        if self.search.page_size == 0 {
            return Err("search.page_size must be at least 1".to_string());
        }
        if self.dataset.table.trim().is_empty() {
            return Err("dataset.table must not be empty".to_string());
        }
        let columns = &self.columns;
        for (role, name) in [
            ("id", &columns.id),
            ("surname", &columns.surname),
            ("given_name", &columns.given_name),
            ("address", &columns.address),
            ("sex", &columns.sex),
            ("cohort", &columns.cohort),
        ] {
            if name.trim().is_empty() {
                return Err(format!("columns.{} must not be empty", role));
            }
        }
        Ok(())
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
///
/// Environment overrides are applied afterwards and never written back.
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_env();
    Ok(config)
}

fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
