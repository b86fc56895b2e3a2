//! llmplanner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::memory::DEFAULT_MEMORY_DIR;

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".llmplanner.yml";

/// Main llmplanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Memory bank layout
    pub memory: MemoryConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Clarification gate configuration
    pub clarify: ClarifyConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise `<root>/.llmplanner.yml`, then
    /// `~/.config/llmplanner/llmplanner.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>, root: &Path) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = root.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, ignoring any other problems in the file
    ///
    /// Used before logging is set up, so failures are silent.
    pub fn load_log_level(config_path: Option<&PathBuf>, root: &Path) -> Option<String> {
        let candidates = match config_path {
            Some(p) => vec![p.clone()],
            None => {
                let mut v = vec![root.join(LOCAL_CONFIG_FILE)];
                v.extend(Self::user_config_path());
                v
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("llmplanner").join("llmplanner.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Memory bank layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory name under the project root
    pub dir: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_MEMORY_DIR.to_string(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider: auto, openai, bedrock or azure
    pub provider: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    pub openai: OpenAIConfig,
    pub bedrock: BedrockConfig,
    pub azure: AzureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
            openai: OpenAIConfig::default(),
            bedrock: BedrockConfig::default(),
            azure: AzureConfig::default(),
        }
    }
}

/// OpenAI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// Model identifier
    pub model: String,

    /// API base URL (OPENAI_BASE_URL overrides)
    #[serde(rename = "base-url")]
    pub base_url: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: "o3-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
        }
    }
}

/// AWS Bedrock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    /// Bedrock model id
    pub model: String,

    /// Region used when AWS_REGION / AWS_DEFAULT_REGION are unset
    pub region: String,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            model: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Azure OpenAI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. https://my-resource.openai.azure.com (AZURE_OPENAI_ENDPOINT overrides)
    pub endpoint: Option<String>,

    /// Deployment name
    pub deployment: String,

    /// REST API version
    #[serde(rename = "api-version")]
    pub api_version: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: "gpt-4o".to_string(),
            api_version: "2024-06-01".to_string(),
        }
    }
}

/// Clarification gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarifyConfig {
    /// Case-sensitive substrings that mark unresolved instructions
    pub markers: Vec<String>,

    /// Line that ends interactive operator input
    pub sentinel: String,

    /// Maximum interactive clarification rounds
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,
}

impl Default for ClarifyConfig {
    fn default() -> Self {
        Self {
            markers: vec!["TBD".to_string()],
            sentinel: "EXIT".to_string(),
            max_rounds: 1,
        }
    }
}
