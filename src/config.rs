use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use home::home_dir;
use serde::Deserialize;

/// Repository cloned when none is given.
pub const DEFAULT_URL: &str = "https://github.com/github/VisualStudio.git";

const CONFIG_FILE: &str = ".clonekit/config.toml";

#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusStyle {
    /// Rewrite a single line on stderr
    #[default]
    Terminal,
    /// Log every status change
    Log,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ClonekitConfig {
    pub url: String,
    pub directory: Option<PathBuf>,
    pub submodules: bool,
    pub timeout: Option<Duration>,
    pub status: StatusStyle,
}

impl ClonekitConfig {
    /// Loads `~/.clonekit/config.toml` (or `file`) overlaid with
    /// `CLONEKIT_*` environment variables.
    pub fn load(file: Option<PathBuf>) -> anyhow::Result<Self> {
        let file = file.or_else(|| home_dir().map(|home| home.join(CONFIG_FILE)));
        let raw_config = RawConfig::load(file, None)?;
        Ok(raw_config.into())
    }
}

impl From<RawConfig> for ClonekitConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            url: raw.clone.url.unwrap_or_else(|| DEFAULT_URL.to_owned()),
            directory: raw.clone.directory,
            submodules: raw.clone.submodules.unwrap_or(false),
            timeout: raw.clone.timeout.map(Duration::from_secs),
            status: raw.status.style.unwrap_or_default(),
        }
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    clone: CloneConfig,
    #[serde(default)]
    status: StatusConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CloneConfig {
    url: Option<String>,
    directory: Option<PathBuf>,
    submodules: Option<bool>,
    /// Seconds
    timeout: Option<u64>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct StatusConfig {
    style: Option<StatusStyle>,
}

impl RawConfig {
    fn load(
        file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("CLONEKIT")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
