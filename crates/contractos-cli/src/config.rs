//! CLI-level configuration loading.
//!
//! Grounded on the teacher's `legalis-cli/src/config.rs` layered
//! config-file pattern: a TOML file on disk, overridable by environment
//! variables, deserialized into the core's own [`contractos_core::Config`]
//!. The CLI adds nothing to the recognized key
//! set — it only decides *where* the file lives and *when* it reloads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use contractos_core::Config;

/// Default config file location: `./contractos.toml`, falling back to
/// `$XDG_CONFIG_HOME/contractos/config.toml` (or the platform equivalent
/// via `dirs`) when the current directory has none.
pub fn default_config_path() -> Option<PathBuf> {
    let cwd_candidate = PathBuf::from("contractos.toml");
    if cwd_candidate.is_file() {
        return Some(cwd_candidate);
    }
    dirs::config_dir().map(|d| d.join("contractos").join("config.toml"))
}

/// Loads configuration from an explicit path, the default search path, or
/// built-in defaults if neither exists (spec §5: "process-wide, immutable
/// after startup" — loaded once, here, and never mutated again).
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let path = match explicit_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let mut config = match path {
        Some(p) if p.is_file() => {
            let text = std::fs::read_to_string(&p)
                .with_context(|| format!("failed to read config file: {}", p.display()))?;
            Config::from_toml_str(&text)
                .with_context(|| format!("failed to parse config file: {}", p.display()))?
        }
        _ => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// A small set of env overrides for the values an operator most often wants
/// to flip without editing the file: the LM provider's API key never lives
/// in the config file itself.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(model) = std::env::var("CONTRACTOS_LM_MODEL") {
        config.lm.model = model;
    }
    if let Ok(path) = std::env::var("CONTRACTOS_STORAGE_PATH") {
        config.storage.path = path;
    }
}

/// Resolves the API key for a remote LM provider from the environment.
/// Never read from the config file — secrets do not belong in a
/// checked-in TOML file.
pub fn lm_api_key() -> Option<String> {
    std::env::var("CONTRACTOS_LM_API_KEY").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_without_a_file() {
        let config = load_config(Some(Path::new("/nonexistent/contractos.toml"))).unwrap();
        assert_eq!(config.retrieval.top_k, 30);
    }

    #[test]
    fn parses_an_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contractos.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 10\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.retrieval.top_k, 10);
    }
}
