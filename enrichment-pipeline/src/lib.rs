pub mod api;
pub mod app_context;
pub mod catalog;
pub mod config;
pub mod currency;
pub mod description;
pub mod error;
pub mod event;
pub mod metrics_consts;
pub mod player;
pub mod server;
pub mod sink;
pub mod stage;

// Shared with the integration tests under tests/, so it can't be cfg(test)
pub mod test_utils;
