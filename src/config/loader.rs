use std::path::Path;

use super::types::Config;
use super::validation::validate_config;

/// Loads configuration from a JSON file, falling back to defaults if no
/// path is given. Mirrors the teacher's file-first, defaults-fallback
/// loader rather than pulling in a generic config-layering crate.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read config file {path:?}: {e}"))?;
            serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("failed to parse config file {path:?}: {e}"))?
        }
        None => Config::default(),
    };
    validate_config(&config).map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config, Config::default());
    }
}
