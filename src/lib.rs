pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod loader;
pub mod mcp;
pub mod service;

pub use config::Config;
pub use error::{KinshipError, Result};
pub use service::KinshipService;
