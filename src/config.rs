use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Absent `[db]` selects the in-memory store (demo/dev path).
    #[serde(default)]
    pub db: Option<DbConfig>,
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub standardize: StandardizeConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// How many of the most recent documents are fetched per query.
    #[serde(default = "default_doc_limit")]
    pub doc_limit: i64,
    /// Size of the ranked cut handed to the completion service. The cut is
    /// purely top-N by score; zero-score documents can appear when fewer
    /// than N score positively.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            doc_limit: default_doc_limit(),
            max_sources: default_max_sources(),
        }
    }
}

fn default_doc_limit() -> i64 {
    20
}
fn default_max_sources() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct StandardizeConfig {
    /// OpenAI model used for standardization.
    #[serde(default = "default_standardize_model")]
    pub model: String,
    /// Character cap on the fallback section body.
    #[serde(default = "default_fallback_chars")]
    pub fallback_chars: usize,
    /// Character cap on the text sent to the model.
    #[serde(default = "default_prompt_chars")]
    pub prompt_chars: usize,
    #[serde(default = "default_standardize_timeout")]
    pub timeout_secs: u64,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            model: default_standardize_model(),
            fallback_chars: default_fallback_chars(),
            prompt_chars: default_prompt_chars(),
            timeout_secs: default_standardize_timeout(),
        }
    }
}

fn default_standardize_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_fallback_chars() -> usize {
    4000
}
fn default_prompt_chars() -> usize {
    120_000
}
fn default_standardize_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Logical model used when a request does not name one.
    #[serde(default = "default_llm_model")]
    pub default_model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_model() -> String {
    "auto".to_string()
}
fn default_llm_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HMAC key for session tokens. Falls back to the ASKD_SESSION_SECRET
    /// environment variable when unset.
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            admin_email: default_admin_email(),
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@example.com".to_string()
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_admin_password() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: default_ocr_enabled(),
            endpoint: default_ocr_endpoint(),
            timeout_secs: default_ocr_timeout(),
        }
    }
}

fn default_ocr_enabled() -> bool {
    true
}
fn default_ocr_endpoint() -> String {
    "https://api.ocr.space/parse/image".to_string()
}
fn default_ocr_timeout() -> u64 {
    60
}

impl Config {
    /// Minimal configuration for tests and commands that do not need a
    /// config file on disk.
    pub fn minimal() -> Self {
        Self {
            db: None,
            server: ServerConfig {
                bind: "127.0.0.1:7461".to_string(),
            },
            retrieval: RetrievalConfig::default(),
            standardize: StandardizeConfig::default(),
            llm: LlmConfig::default(),
            auth: AuthConfig::default(),
            ocr: OcrConfig::default(),
        }
    }

    /// The session signing key: config value, else the environment, else a
    /// fixed development key (callers warn when the fallback is used).
    pub fn session_secret(&self) -> (String, bool) {
        if let Some(secret) = &self.auth.session_secret {
            return (secret.clone(), false);
        }
        if let Ok(secret) = std::env::var("ASKD_SESSION_SECRET") {
            return (secret, false);
        }
        ("askdocs-dev-secret".to_string(), true)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.retrieval.doc_limit < 1 {
        anyhow::bail!("retrieval.doc_limit must be >= 1");
    }

    if config.retrieval.max_sources < 1 {
        anyhow::bail!("retrieval.max_sources must be >= 1");
    }

    if config.standardize.fallback_chars == 0 {
        anyhow::bail!("standardize.fallback_chars must be > 0");
    }

    if config.standardize.prompt_chars < config.standardize.fallback_chars {
        anyhow::bail!("standardize.prompt_chars must be >= standardize.fallback_chars");
    }

    Ok(config)
}
