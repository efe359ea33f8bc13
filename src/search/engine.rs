//! Search engine - query execution and page arithmetic / 搜索引擎
//!
//! count → (0 ⇒ NoMatch) → ceil(total / page_size) → LIMIT/OFFSET fetch.
//! Rows come back in the store's natural order; no ORDER BY is applied.

use std::sync::Arc;

use crate::config::{AppConfig, ColumnMap};
use crate::error::BotError;
use crate::store::RecordStore;

use super::schema::{Page, SearchQuery};

/// Number of pages needed for `total` rows / 计算总页数
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(page_size)).unwrap_or(u32::MAX)
}

/// Search engine over the master table / 主表搜索引擎
pub struct SearchEngine {
    store: Arc<RecordStore>,
    columns: ColumnMap,
    page_size: u32,
}

impl SearchEngine {
    pub fn new(store: Arc<RecordStore>, columns: ColumnMap, page_size: u32) -> Self {
        Self {
            store,
            columns,
            page_size: page_size.max(1),
        }
    }

    pub fn from_config(store: Arc<RecordStore>, config: &AppConfig) -> Self {
        Self::new(store, config.columns.clone(), config.search.page_size)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Execute `query` and return page `page_index` (0-based) / 执行查询并返回指定页
    ///
    /// A page past the end is an empty page, not an error.
    pub async fn search(&self, query: &SearchQuery, page_index: u32) -> Result<Page, BotError> {
        let filter = query.filter(&self.columns);
        let snapshot = self.store.snapshot().await?;

        let total_count = snapshot.count(&filter).await?;
        if total_count == 0 {
            tracing::debug!("No match for {:?}", query);
            return Err(BotError::NoMatch);
        }

        let total_pages = total_pages(total_count, self.page_size);
        let offset = u64::from(page_index) * u64::from(self.page_size);
        let (records, columns) = snapshot.fetch(&filter, self.page_size, offset).await?;

        tracing::debug!(
            "Search {:?} page {}/{}: {} of {} rows",
            query,
            page_index + 1,
            total_pages,
            records.len(),
            total_count
        );

        Ok(Page {
            query: query.clone(),
            records,
            columns,
            page_index,
            total_pages,
            total_count,
            has_next: page_index.saturating_add(1) < total_pages,
        })
    }
}
