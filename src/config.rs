use anyhow::{Context, Result};
use keycut_core::config::Config;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {warning}", path.display());
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./keycut.toml", "~/.config/keycut/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("using config {}", path.display());
            return load_config(path);
        }
    }

    Ok(Config::default())
}
