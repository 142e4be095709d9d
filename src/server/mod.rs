//! Server module for QuotaWatch
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup validation of the loaded configuration
//! - `init`: Agent startup, HTTP server and shutdown

pub mod config;
mod init;
mod loader;
mod validation;

pub use init::{open_store, run};
pub use loader::load_config;
