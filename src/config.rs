//! Configuration file support for gemflash

use crate::studio::api::ApiConfig;
use crate::studio::progress::ProgressConfig;
use crate::studio::request::TabForm;
use crate::studio::selection::DEFAULT_MAX_SELECTION;
use crate::studio::types::{AspectRatio, OutputFormat, Resolution};
use crate::studio::upload::UploadPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the config file looked up in the working and home directories
pub const CONFIG_FILE_NAME: &str = ".gemflash.toml";

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "GEMFLASH_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioConfig {
    /// Where the CLI saves results
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub defaults: FormDefaults,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub upload: UploadPolicy,

    #[serde(default)]
    pub compose: ComposeConfig,
}

/// Initial form values for every tab
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormDefaults {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default)]
    pub format: OutputFormat,
}

impl FormDefaults {
    pub fn form(&self) -> TabForm {
        TabForm {
            prompt: String::new(),
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            format: self.format,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposeConfig {
    #[serde(default = "default_max_selection")]
    pub max_selection: usize,
}

fn default_max_selection() -> usize {
    DEFAULT_MAX_SELECTION
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./gemflash-output")
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_selection: default_max_selection(),
        }
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            api: ApiConfig::default(),
            defaults: FormDefaults::default(),
            progress: ProgressConfig::default(),
            upload: UploadPolicy::default(),
            compose: ComposeConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: StudioConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `path`, or from the first config file found, or defaults.
    /// `GEMFLASH_API_URL` overrides the service URL in every case.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match find_config() {
                Some(found) => {
                    debug!(path = %found.display(), "Loading config");
                    Self::from_file(found)?
                }
                None => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url.trim().to_string();
            }
        }

        Ok(config)
    }
}

/// Look for `.gemflash.toml` in the current directory, then the home directory
pub fn find_config() -> Option<PathBuf> {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return Some(local_config);
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}
