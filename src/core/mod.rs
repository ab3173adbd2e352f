// src/core/mod.rs
//! Configuration, file system helpers and the provider HTTP client

pub mod config_manager;
pub mod fs_ops;
pub mod service_client;

pub use config_manager::ConfigManager;
pub use fs_ops::FsOps;
pub use service_client::OpenAiBatchClient;
