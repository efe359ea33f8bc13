//! Telegram transport - Bot API client used by the polling loop / Telegram 消息通道

pub mod client;
pub mod types;

pub use client::{keyboard, TelegramClient, TelegramError};
pub use types::Update;
