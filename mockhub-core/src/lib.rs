// src/lib.rs

pub mod db;
pub mod repositories;
pub mod crypto;
pub mod http;
pub mod services;
pub mod tasks;
pub mod api;
pub mod config;
pub mod context;
pub mod utils;
pub mod test_utils;

pub use db::Database;
pub use mockhub_common::error::Error;
pub use http::{DefaultHttpClient, HubHttpClient};
pub use config::HubConfig;
pub use context::{MockHub, ShutdownOptions};
pub use tasks::ShutdownMode;
