// Configuration management module
// Handles TOML configuration for dataset layout, partition storage and the embedding server

pub mod settings;

pub use settings::{
    BucketConfig, Config, ConfigError, DatasetConfig, OllamaConfig, SearchConfig, StorageBackend,
    StorageConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    println!("Configuration directory: {}", config.get_base_dir().display());
    println!();
    print!("{}", content);
    Ok(())
}
