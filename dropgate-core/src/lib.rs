//! Dropgate core engine
//!
//! Chat-based content distribution: users upload files and receive share
//! codes with privacy controls, and redeem codes release account payloads to
//! a bounded number of users. This crate holds the engine only; the chat
//! transport and durable storage are abstract seams (`Messenger`,
//! `Repository`) implemented by the frontends.

pub mod config;
pub mod core_access;
pub mod core_flow;
pub mod core_store;
pub mod engine;
pub mod logging;
pub mod messenger;

pub use config::Config;
pub use engine::{Engine, EngineError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
