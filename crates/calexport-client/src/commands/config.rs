//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Show the configuration, store and socket paths.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", ClientConfig::default_path().display());
    println!("store:  {}", config.store_path().display());
    println!("outbox: {}", config.outbox_dir().display());
    println!("socket: {}", config.socket_path().display());
    Ok(())
}
