use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vipt_flow::PacketOrigin;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG: &str = "vipt.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Dot,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViptConfig {
    /// iptables-save dump to read; stdin when unset or "-"
    #[serde(default)]
    pub dump: Option<PathBuf>,
    #[serde(default = "default_origin")]
    pub origin: PacketOrigin,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    /// Where to write the rendered graph; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_origin() -> PacketOrigin {
    PacketOrigin::Forward
}

fn default_format() -> OutputFormat {
    OutputFormat::Dot
}

impl ViptConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse vipt config YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_yaml(&content)
    }

    /// Load `path` if given, else `vipt.yaml` when present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

impl Default for ViptConfig {
    fn default() -> Self {
        Self {
            dump: None,
            origin: default_origin(),
            format: default_format(),
            output: None,
        }
    }
}
