//! Service-level error taxonomy / 服务错误分类
//!
//! Every failure a user interaction can hit ends up as a [`BotError`]; the
//! dispatcher turns it into a reply with [`BotError::user_message`] and logs the
//! operator-facing ones.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Snapshot not downloaded yet, or master table missing / 数据快照尚未加载
    #[error("record store unavailable")]
    StoreUnavailable,

    /// Query ran and matched nothing / 查询无结果
    #[error("no matching records")]
    NoMatch,

    /// Backing engine rejected the query (e.g. misconfigured column) / 查询执行失败
    #[error("query execution failed: {0}")]
    QueryExecutionFailure(String),

    /// Refresh could not retrieve or install the new snapshot / 快照下载失败
    #[error("snapshot download failed: {0}")]
    DownloadFailure(String),

    /// Not enough arguments; carries the usage hint for the user / 命令参数不足
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

impl BotError {
    /// Text shown to the user / 展示给用户的文本
    ///
    /// `NoMatch` replies are mode-specific and rendered by the formatter, this is
    /// only the generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            BotError::StoreUnavailable => {
                "⚠️ La base de datos todavía se está cargando. Intenta de nuevo en unos instantes.".to_string()
            }
            BotError::NoMatch => "❌ No encontré ningún registro con ese dato.".to_string(),
            BotError::QueryExecutionFailure(_) => {
                "⚠️ Ocurrió un error interno al buscar. Intenta más tarde.".to_string()
            }
            BotError::DownloadFailure(_) => "❌ Falló la actualización de la base de datos.".to_string(),
            BotError::MalformedCommand(usage) => usage.clone(),
        }
    }

    /// Whether the detail should be logged for operators / 是否需要记录详细日志
    pub fn is_operator_error(&self) -> bool {
        matches!(self, BotError::QueryExecutionFailure(_) | BotError::DownloadFailure(_))
    }
}

impl From<StoreError> for BotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => BotError::StoreUnavailable,
            StoreError::Query(e) => BotError::QueryExecutionFailure(e.to_string()),
            StoreError::Install(msg) => BotError::DownloadFailure(msg),
        }
    }
}
