//! Configuration loading from deadref.toml.

use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::{DeadrefError, DeadrefResult};

/// Main configuration structure for deadref.toml.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeadrefConfig {
    /// Additional entry-point qualified names (kept alive even if unreferenced).
    pub entry_points: Option<Vec<String>>,
    /// List of declaration names or patterns to ignore in reports.
    pub ignore: Option<Vec<String>>,
    /// Whether to report unused parameters.
    pub include_parameters: Option<bool>,
    /// Output configuration.
    pub output: Option<OutputConfig>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

/// Loads configuration from deadref.toml in the given directory, if it exists.
pub fn load_config(root: &Path) -> DeadrefResult<Option<DeadrefConfig>> {
    let path = root.join("deadref.toml");
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(|e| DeadrefError::io(&path, e))?;
    let cfg = toml::from_str(&content).map_err(|e| DeadrefError::config(&path, e.to_string()))?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = std::env::temp_dir().join(format!("deadref_cfg_none_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert!(load_config(&dir).unwrap().is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parse_config() {
        let dir = std::env::temp_dir().join(format!("deadref_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("deadref.toml"),
            "entry_points = [\"com.acme.Main.main(String[])\"]\nignore = [\"Generated*\"]\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();

        let cfg = load_config(&dir).unwrap().unwrap();
        assert_eq!(cfg.entry_points.unwrap().len(), 1);
        assert_eq!(cfg.ignore.unwrap()[0], "Generated*");
        assert_eq!(cfg.output.unwrap().format.unwrap(), "json");
        fs::remove_dir_all(&dir).ok();
    }
}
