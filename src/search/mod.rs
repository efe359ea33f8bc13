//! Search module - query shapes, execution, rendering and pagination tokens / 搜索模块
//!
//! Call direction: Dispatcher → Search → Store (unidirectional) / 调用方向
//!
//! - `schema`: the three query shapes and the result page
//! - `engine`: count / page arithmetic / fetch against the record store
//! - `format`: plain-text rendering with null-like fields skipped
//! - `token`: stateless navigation tokens for next/previous controls

pub mod engine;
pub mod format;
pub mod schema;
pub mod token;

pub use engine::SearchEngine;
pub use format::Formatter;
pub use schema::{Field, Page, SearchQuery};
pub use token::{navigation, NavButton, NavigationToken, TokenError};
