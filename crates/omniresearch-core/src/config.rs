use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::ResearchError;

const DEFAULT_CONFIG_PATH: &str = "omniresearch.toml";
const CONFIG_PATH_ENV: &str = "OMNIRESEARCH_CONFIG";

/// Top-level configuration. Every field has a default, so a missing file or
/// an empty table yields a working setup; secrets are referenced through
/// environment variable names, never inlined.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the LLM secret value from the configured environment variable.
    pub fn llm_api_key(&self) -> Result<String, ResearchError> {
        require_env(&self.llm.api_key_env)
    }

    /// Tavily is optional; the tool is only registered when its key is set.
    pub fn tavily_api_key(&self) -> Option<String> {
        env::var(&self.search.tavily_api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "LlmConfig::default_provider")]
    pub provider: String,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default = "LlmConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "LlmConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "LlmConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl LlmConfig {
    fn default_provider() -> String {
        "groq".to_string()
    }

    fn default_model() -> String {
        "llama-3.1-8b-instant".to_string()
    }

    fn default_api_key_env() -> String {
        "GROQ_API_KEY".to_string()
    }

    const fn default_temperature() -> f32 {
        0.4
    }

    const fn default_max_tokens() -> u32 {
        1000
    }

    const fn default_max_attempts() -> u32 {
        3
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            api_key_env: Self::default_api_key_env(),
            temperature: Self::default_temperature(),
            max_tokens: Self::default_max_tokens(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub wikipedia: bool,
    #[serde(default = "default_true")]
    pub arxiv: bool,
    #[serde(default = "default_true")]
    pub duckduckgo: bool,
    #[serde(default = "SearchConfig::default_tavily_env")]
    pub tavily_api_key_env: String,
    #[serde(default = "SearchConfig::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl SearchConfig {
    fn default_tavily_env() -> String {
        "TAVILY_API_KEY".to_string()
    }

    const fn default_fetch_timeout_secs() -> u64 {
        6
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            wikipedia: true,
            arxiv: true,
            duckduckgo: true,
            tavily_api_key_env: Self::default_tavily_env(),
            fetch_timeout_secs: Self::default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `OMNIRESEARCH_CONFIG` environment variable.
    /// 3. `omniresearch.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ResearchError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate).map_err(|err| {
            ResearchError::internal(format!(
                "failed to read config {}: {err}",
                candidate.display()
            ))
        })?;
        let config: Config = toml::from_str(&raw)
            .map_err(|err| ResearchError::internal(format!("invalid configuration: {err}")))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Like [`ConfigLoader::load`], but a missing discoverable file falls
    /// back to defaults. An explicitly provided path must still load.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config, ResearchError> {
        if path.is_some() {
            return Self::load(path);
        }
        let candidate = resolve_path(None);
        if candidate.exists() {
            Self::load(Some(candidate))
        } else {
            Ok(Config::default())
        }
    }

    fn validate(config: &Config) -> Result<(), ResearchError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(ResearchError::internal(
                "llm.api_key_env must reference an environment variable",
            ));
        }
        if config.search.fetch_timeout_secs == 0 {
            return Err(ResearchError::internal(
                "search.fetch_timeout_secs must be positive",
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

fn default_true() -> bool {
    true
}

/// Read a required secret from the environment.
pub fn require_env(name: &str) -> Result<String, ResearchError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ResearchError::internal(format!("missing environment variable: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.llm.max_attempts, 3);
        assert!(config.search.wikipedia);
        assert_eq!(config.search.fetch_timeout_secs, 6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_tables_override_only_named_fields() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "llama-3.3-70b-versatile"

            [search]
            arxiv = false
            fetch_timeout_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.temperature, 0.4);
        assert!(!config.search.arxiv);
        assert!(config.search.duckduckgo);
        assert_eq!(config.search.fetch_timeout_secs, 10);
    }

    #[test]
    fn loader_reads_from_disk_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omniresearch.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = ConfigLoader::load(Some(path)).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn loader_rejects_blank_api_key_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omniresearch.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[llm]\napi_key_env = \"\"").unwrap();

        assert!(ConfigLoader::load(Some(path)).is_err());
    }

    #[test]
    fn explicit_path_must_exist_but_discovery_may_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("definitely-not-there.toml");
        assert!(ConfigLoader::load_or_default(Some(missing)).is_err());

        let config = ConfigLoader::load_or_default(None).unwrap();
        assert_eq!(config.llm.provider, "groq");
    }
}
