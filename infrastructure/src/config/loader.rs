//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tool-relay";
const PROJECT_FILES: [&str; 2] = ["relay.toml", ".relay.toml"];
const ENV_PREFIX: &str = "RELAY_";

/// Where a configuration layer comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Explicit,
    Project,
    Global,
    Environment,
    Default,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Explicit => "explicit",
            SourceKind::Project => "project",
            SourceKind::Global => "global",
            SourceKind::Environment => "environment",
            SourceKind::Default => "default",
        }
    }
}

/// One configuration layer, as reported by `relay config sources`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub kind: SourceKind,
    pub location: String,
    pub found: bool,
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let global = Self::global_config_path().filter(|p| p.exists());
        let project = Self::project_config_path();
        Self::figment(global.as_deref(), project.as_deref(), config_path.map(PathBuf::as_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Load only the given files over the defaults, ignoring discovery
    /// and the environment
    pub fn load_files(files: &[&Path]) -> Result<FileConfig, Box<figment::Error>> {
        files
            .iter()
            .fold(Self::defaults_figment(), |figment, path| {
                figment.merge(Toml::file(path))
            })
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn defaults_figment() -> Figment {
        Figment::new().merge(Serialized::defaults(FileConfig::default()))
    }

    fn figment(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Self::defaults_figment();
        if let Some(path) = global {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = project {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/tool-relay/config.toml if set,
    /// otherwise falls back to the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Config layers in priority order, highest first
    pub fn sources(config_path: Option<&PathBuf>) -> Vec<ConfigSource> {
        let mut sources = Vec::new();

        let env_found = std::env::vars().any(|(k, _)| k.starts_with(ENV_PREFIX));
        sources.push(ConfigSource {
            kind: SourceKind::Environment,
            location: format!("{ENV_PREFIX}*"),
            found: env_found,
        });

        if let Some(path) = config_path {
            sources.push(ConfigSource {
                kind: SourceKind::Explicit,
                location: path.display().to_string(),
                found: path.exists(),
            });
        }

        sources.push(match Self::project_config_path() {
            Some(path) => ConfigSource {
                kind: SourceKind::Project,
                location: path.display().to_string(),
                found: true,
            },
            None => ConfigSource {
                kind: SourceKind::Project,
                location: PROJECT_FILES.map(|f| format!("./{f}")).join(" or "),
                found: false,
            },
        });

        if let Some(path) = Self::global_config_path() {
            sources.push(ConfigSource {
                kind: SourceKind::Global,
                location: path.display().to_string(),
                found: path.exists(),
            });
        }

        sources.push(ConfigSource {
            kind: SourceKind::Default,
            location: "built-in defaults".to_string(),
            found: true,
        });
        sources
    }
}
