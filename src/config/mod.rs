pub mod schema;

pub use schema::{AgentConfig, EmptyTurnPolicy};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Checked after `api_key_env` when the config file carries no key.
pub const FALLBACK_API_KEY_ENV: &str = "TAGLOOP_API_KEY";

/// Default home directory (~/.tagloop).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".tagloop"))
        .unwrap_or_else(|| PathBuf::from(".tagloop"))
}

/// Config file used when `--config` is not given (~/.tagloop/agent.toml).
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("agent.toml")
}

/// Resolve a path that may start with `~`.
pub fn resolve_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read agent config file")?;
        let config: AgentConfig =
            toml::from_str(&contents).context("Failed to parse agent config (TOML)")?;
        Ok(config)
    } else {
        Ok(AgentConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_lives_in_home_dir() {
        let path = default_config_path();
        assert_eq!(path.file_name().unwrap(), "agent.toml");
        assert_eq!(path.parent().unwrap(), default_home_dir());
        assert!(default_home_dir().ends_with(".tagloop"));
    }

    #[test]
    fn tilde_paths_expand() {
        let path = resolve_path("~/x/agent.toml");
        assert!(path.ends_with("x/agent.toml"));
        assert_eq!(resolve_path("/etc/agent.toml"), PathBuf::from("/etc/agent.toml"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.empty_turn_policy, EmptyTurnPolicy::Nudge);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.toml");
        let config = AgentConfig {
            max_iterations: 3,
            empty_turn_policy: EmptyTurnPolicy::Fail,
            instructions: "Be brief.".into(),
            ..AgentConfig::default()
        };

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.max_iterations, 3);
        assert_eq!(loaded.empty_turn_policy, EmptyTurnPolicy::Fail);
        assert_eq!(loaded.instructions, "Be brief.");
        assert_eq!(loaded.model, config.model);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "max_iterations = 4\nempty_turn_policy = \"fail\"\n").unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.max_iterations, 4);
        assert_eq!(loaded.empty_turn_policy, EmptyTurnPolicy::Fail);
        assert_eq!(loaded.api_url, AgentConfig::default().api_url);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "max_iterations = \"many\"").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let config = AgentConfig {
            api_key: "  from-file ".into(),
            ..AgentConfig::default()
        };
        assert_eq!(config.resolved_api_key(), "from-file");
    }

    #[test]
    fn key_falls_back_through_env_vars() {
        fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        }

        let config = AgentConfig::default();

        assert_eq!(
            config.resolve_api_key_with(env(&[("GROQ_API_KEY", "groq"), ("TAGLOOP_API_KEY", "tl")])),
            "groq"
        );
        assert_eq!(
            config.resolve_api_key_with(env(&[("GROQ_API_KEY", "  "), ("TAGLOOP_API_KEY", "tl")])),
            "tl"
        );
        assert_eq!(config.resolve_api_key_with(env(&[])), "");
    }
}
