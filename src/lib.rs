pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::{AppConfig, MatchConfig};
pub use error::EngineError;
pub use service::ReconEngine;
