pub mod toml_config;

pub use toml_config::{AppConfig, DatabaseConfig, ProviderConfig, ServerConfig};
