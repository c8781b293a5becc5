use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::data::loader::BrainMethodInfo;
use crate::error::ConfigError;
use crate::state::theme::Theme;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "OXIDEEMBED_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "oxideembed.json";

/// Which visualizations the panel offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Only 3D embeddings.
    #[default]
    Strict3d,
    /// Every embedding; 2D runs are drawn on the z = 0 plane.
    Permissive,
}

impl DimensionPolicy {
    pub fn admits(&self, num_dims: usize) -> bool {
        match self {
            DimensionPolicy::Strict3d => num_dims == 3,
            DimensionPolicy::Permissive => (1..=3).contains(&num_dims),
        }
    }

    pub fn eligible<'a>(&self, methods: &'a [BrainMethodInfo]) -> Vec<&'a BrainMethodInfo> {
        methods.iter().filter(|m| self.admits(m.num_dims)).collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            DimensionPolicy::Strict3d => "3D only",
            DimensionPolicy::Permissive => "All dimensions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset directory opened on startup.
    pub dataset_dir: Option<PathBuf>,
    pub dimension_policy: DimensionPolicy,
    pub point_size: f32,
    pub theme: Theme,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_dir: None,
            dimension_policy: DimensionPolicy::default(),
            point_size: 4.0,
            theme: Theme::default(),
        }
    }
}

impl AppConfig {
    /// Settings file location: `$OXIDEEMBED_CONFIG` or `./oxideembed.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                tracing::info!("Loaded settings from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring settings file {:?}: {e}", path);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
