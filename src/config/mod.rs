use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Config file read when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "tenx.toml";

/// Pull the value of `--config` out of a command line.
pub fn config_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    /// Etherscan-compatible API endpoint (BaseScan by default)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// API key - loaded from env EXPLORER_API_KEY
    #[serde(default)]
    pub api_key: String,
    /// Records per `tokentx` page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pause between pages, to stay under the explorer's rate limit
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Deepest `page * offset` the explorer will serve for one query;
    /// longer histories are fetched in block-range windows
    #[serde(default = "default_result_window")]
    pub result_window: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Token contracts to analyze, processed in order.
    #[serde(default)]
    pub contracts: Vec<String>,
    /// How many distinct first buyers to track per token.
    #[serde(default = "default_max_buyers")]
    pub max_buyers: usize,
    /// Price multiple over entry that counts as "held through".
    #[serde(default = "default_target_multiple")]
    pub target_multiple: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Directory for CSV output.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Holders printed per contract in the log summary.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Also write the early-buyer set alongside the holders file.
    #[serde(default)]
    pub write_buyers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Pause between contracts.
    #[serde(default = "default_contract_delay_ms")]
    pub contract_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_api_url() -> String {
    "https://api.basescan.org/api".to_string()
}
fn default_page_size() -> u32 {
    1000
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_result_window() -> u32 {
    10_000
}
fn default_max_buyers() -> usize {
    crate::buyers::DEFAULT_MAX_BUYERS
}
fn default_target_multiple() -> f64 {
    10.0
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_top_n() -> usize {
    10
}
fn default_contract_delay_ms() -> u64 {
    3000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            result_window: default_result_window(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            contracts: Vec::new(),
            max_buyers: default_max_buyers(),
            target_multiple: default_target_multiple(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            top_n: default_top_n(),
            write_buyers: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            contract_delay_ms: default_contract_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        // Never store the API key in the config file
        if let Ok(key) = std::env::var("EXPLORER_API_KEY") {
            config.explorer.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the config a binary should run with, and the file it came from.
    ///
    /// An explicit path must exist. Without one, `tenx.toml` is used when
    /// present and the environment otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) if !path.exists() => Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Ok((Self::load(path)?, Some(path.to_path_buf()))),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Ok((Self::load(default)?, Some(default.to_path_buf())))
                } else {
                    Ok((Self::from_env(), None))
                }
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a default config from the environment (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(url) = std::env::var("EXPLORER_API_URL") {
            config.explorer.api_url = url;
        }
        config.explorer.api_key = std::env::var("EXPLORER_API_KEY").unwrap_or_default();
        if let Ok(list) = std::env::var("TENX_CONTRACTS") {
            config.analysis.contracts = parse_contract_list(&list);
        }
        if let Ok(dir) = std::env::var("TENX_OUTPUT_DIR") {
            config.report.output_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let multiple = self.analysis.target_multiple;
        if !multiple.is_finite() || multiple <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "analysis.target_multiple",
                value: multiple.to_string(),
            });
        }
        if self.explorer.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "explorer.page_size",
                value: "0".to_string(),
            });
        }
        if self.explorer.result_window < self.explorer.page_size {
            return Err(ConfigError::Invalid {
                field: "explorer.result_window",
                value: self.explorer.result_window.to_string(),
            });
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.explorer.api_key.is_empty()
    }
}

/// Split a comma-separated contract list, dropping blanks.
pub fn parse_contract_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
