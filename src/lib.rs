pub mod bot;
pub mod config;
pub mod error;
pub mod models;
pub mod refresh;
pub mod search;
pub mod store;
pub mod telegram;
