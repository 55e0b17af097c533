// src/settings.rs
// Pipeline settings: optional TOML file first, env vars win.
//
// Lookup order mirrors the rest of the config surface:
// 1) $NEWSFORGE_CONFIG_PATH
// 2) config/newsforge.toml
// 3) built-in defaults
// Env vars (NEWSFORGE_*, OPENAI_API_KEY) override whatever the file said.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "NEWSFORGE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/newsforge.toml";

fn default_max_articles() -> usize {
    3
}
fn default_tag() -> String {
    "news".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    1600
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Daily ceiling on generated drafts across all sources.
    #[serde(default = "default_max_articles")]
    pub max_articles_per_day: usize,
    /// Classification tag used when a source or request doesn't carry one.
    #[serde(default = "default_tag")]
    pub default_tag: String,
    /// Shared secret for the manual trigger and the ad-hoc URL endpoint.
    #[serde(default)]
    pub run_secret: String,
    #[serde(default)]
    pub model: ModelSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_articles_per_day: default_max_articles(),
            default_tag: default_tag(),
            run_secret: String::new(),
            model: ModelSettings::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let cfg: Settings = toml::from_str(&data)
            .with_context(|| format!("parsing settings from {}", path.display()))?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("NEWSFORGE_MAX_ARTICLES_PER_DAY") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_articles_per_day = n;
            }
        }
        if let Ok(v) = std::env::var("NEWSFORGE_DEFAULT_TAG") {
            if !v.trim().is_empty() {
                self.default_tag = v;
            }
        }
        if let Ok(v) = std::env::var("NEWSFORGE_RUN_SECRET") {
            self.run_secret = v;
        }
        // "ENV" (or an empty key) defers to the environment.
        if self.model.api_key.trim().is_empty()
            || self.model.api_key.trim().eq_ignore_ascii_case("env")
        {
            self.model.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        if let Ok(v) = std::env::var("NEWSFORGE_MODEL") {
            if !v.trim().is_empty() {
                self.model.model = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.max_articles_per_day, 3);
        assert_eq!(s.default_tag, "news");
        assert_eq!(s.model.model, "gpt-4o-mini");
    }

    #[test]
    fn toml_round_trip() {
        let toml = r#"
            max_articles_per_day = 5
            default_tag = "tech"
            run_secret = "s3cret"

            [model]
            api_key = "sk-test"
            model = "gpt-4o"
        "#;
        let s: Settings = toml::from_str(toml).unwrap();
        assert_eq!(s.max_articles_per_day, 5);
        assert_eq!(s.default_tag, "tech");
        assert_eq!(s.model.model, "gpt-4o");
        assert_eq!(s.model.max_tokens, 1600);
    }
}
