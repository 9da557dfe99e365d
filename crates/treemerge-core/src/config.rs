use anyhow::Context;
use merge_engine::{MergeConfig, MergeStrategy, StrategyTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub merge: MergeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub conditional_merge: bool,
    /// Node kind -> strategy. Kinds not listed merge ordered.
    #[serde(default)]
    pub strategies: BTreeMap<String, MergeStrategy>,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            conditional_merge: false,
            strategies: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_log_dir(),
        }
    }
}

fn default_threshold() -> f64 {
    merge_engine::context::DEFAULT_THRESHOLD
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(".treemerge/logs")
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path).with_context(|| format!("invalid settings file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Engine configuration described by the `merge` section.
    pub fn merge_config(&self) -> anyhow::Result<MergeConfig> {
        let mut strategies = StrategyTable::new();
        for (kind, strategy) in &self.merge.strategies {
            strategies.insert(kind.as_str(), *strategy);
        }
        let config = MergeConfig {
            threshold: self.merge.threshold,
            conditional_merge: self.merge.conditional_merge,
            strategies,
        };
        config.validate()?;
        Ok(config)
    }
}
