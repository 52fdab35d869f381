use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration loaded from recast.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecastConfig {
    /// Catalog connection
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Transformation library
    #[serde(default)]
    pub transformations: TransformationsConfig,

    /// Transformation engine
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Canonical base URL of the catalog server
    #[serde(default)]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationsConfig {
    /// Directory holding the .xsl transformation library
    #[serde(default = "default_transformations_path")]
    pub path: PathBuf,
}

impl Default for TransformationsConfig {
    fn default() -> Self {
        TransformationsConfig {
            path: default_transformations_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// XSLT processor executable
    #[serde(default = "default_engine_command")]
    pub command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            command: default_engine_command(),
        }
    }
}

fn default_transformations_path() -> PathBuf {
    PathBuf::from("transformations")
}

fn default_engine_command() -> String {
    "xsltproc".to_string()
}

impl RecastConfig {
    /// Load configuration with deterministic precedence: the explicit file
    /// when given, else ./recast.toml, else recast/recast.toml under the user
    /// config directory, else defaults. `RECAST_*` environment variables
    /// override whatever was loaded.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_file(explicit) {
            Some(path) => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => RecastConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("RECAST_CATALOG_URL") {
            self.catalog.url = url;
        }
        if let Ok(username) = env::var("RECAST_CATALOG_USERNAME") {
            self.catalog.username = Some(username);
        }
        if let Ok(password) = env::var("RECAST_CATALOG_PASSWORD") {
            self.catalog.password = Some(password);
        }
        if let Ok(path) = env::var("RECAST_TRANSFORMATIONS_PATH") {
            self.transformations.path = PathBuf::from(path);
        }
        if let Ok(command) = env::var("RECAST_ENGINE_COMMAND") {
            self.engine.command = command;
        }
    }
}

fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("recast.toml");
    if local.is_file() {
        return Some(local);
    }
    let user = dirs_next::config_dir()?.join("recast").join("recast.toml");
    user.is_file().then_some(user)
}
