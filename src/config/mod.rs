//! `FinderConfig`: one document with `[filter]`, `[ai]`, `[notify]`,
//! `[store]` and `[sources]` sections, plus env overrides.

pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ai::AiConfig;
use crate::filter::FilterConfig;
use crate::ingest::SourcesConfig;
use crate::notify::NotifyConfig;

pub const DEFAULT_CONFIG_TOML: &str = "config/finder.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/finder.json";

pub const ENV_CONFIG_PATH: &str = "FINDER_CONFIG_PATH";
pub const ENV_THRESHOLD: &str = "FINDER_THRESHOLD";
pub const ENV_STATE_DIR: &str = "FINDER_STATE_DIR";
pub const ENV_DRY_RUN: &str = "FINDER_DRY_RUN";
pub const ENV_INTERVAL_SECS: &str = "FINDER_INTERVAL_SECS";

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinderConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Skip persist, commit and notify; still report the summary.
    #[serde(default)]
    pub dry_run: bool,
    /// Loop mode when set; otherwise run once.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl FinderConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: FinderConfig = toml::from_str(s).context("parsing finder TOML config")?;
        cfg.finish()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: FinderConfig = serde_json::from_str(s).context("parsing finder JSON config")?;
        cfg.finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.ai = self.ai.normalized()?;
        Ok(self)
    }

    /// Load from an explicit path; format chosen by extension (`.json` or TOML).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading finder config from {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Resolve the config file, then apply env overrides:
    /// 1) $FINDER_CONFIG_PATH
    /// 2) config/finder.toml
    /// 3) config/finder.json
    /// 4) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_TOML).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_TOML))?
        } else if Path::new(DEFAULT_CONFIG_JSON).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_JSON))?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Env wins over file values. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_THRESHOLD).ok()) {
            self.filter.threshold = t;
        }
        if let Some(dir) = std::env::var(ENV_STATE_DIR).ok().filter(|d| !d.trim().is_empty()) {
            self.store.state_dir = PathBuf::from(dir.trim());
        }
        if let Some(on) = parse_bool_env(std::env::var(ENV_DRY_RUN).ok()) {
            self.dry_run = on;
        }
        if let Some(secs) = std::env::var(ENV_INTERVAL_SECS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            self.interval_secs = (secs > 0).then_some(secs);
        }
    }
}

// parse optional float env; non-finite values are ignored
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_env_parsing() {
        assert_eq!(parse_threshold_env(Some(" 5.5 ".into())), Some(5.5));
        assert_eq!(parse_threshold_env(Some("NaN".into())), None);
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn bool_env_parsing() {
        assert_eq!(parse_bool_env(Some("1".into())), Some(true));
        assert_eq!(parse_bool_env(Some("Off".into())), Some(false));
        assert_eq!(parse_bool_env(Some("maybe".into())), None);
    }

    #[test]
    fn sections_default_when_missing() {
        let cfg = FinderConfig::from_toml_str("dry_run = true\n").unwrap();
        assert!(cfg.dry_run);
        assert_eq!(cfg.filter.threshold, 4.0);
        assert_eq!(cfg.store.state_dir, PathBuf::from("state"));
        assert!(!cfg.ai.enabled);
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn toml_rules_parse_in_order() {
        let cfg = FinderConfig::from_toml_str(
            r#"
[filter]
threshold = 3.5

[[filter.positive]]
keyword = "rust"
weight = 3.0

[[filter.negative]]
pattern = "\\bintern(ship)?\\b"
hard_exclude = true

[[filter.categories]]
name = "data"
keywords = ["data", "ml"]

[[filter.categories]]
name = "backend"
keywords = ["backend"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.filter.threshold, 3.5);
        assert_eq!(cfg.filter.positive[0].keyword.as_deref(), Some("rust"));
        assert!(cfg.filter.negative[0].hard_exclude);
        let names: Vec<_> = cfg.filter.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["data", "backend"]);
    }
}
