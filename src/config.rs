use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm::batch::BatchPolicy;
use crate::pacing::RateBudget;
use crate::relevance::overrides::KeywordRules;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy. Subcommand flags are
/// applied on top with the `with_*` overrides.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generative Language API key (GEMINI_API_KEY). Only the LLM path needs it.
    pub gemini_api_key: String,
    pub llm_model: String,
    pub llm_api_url: String,
    pub translate_url: String,
    /// Directory containing relevance_model.onnx and vectorizer.json
    pub model_dir: PathBuf,
    /// Optional replacement for the built-in disqualifying keyword list
    pub keywords_file: Option<PathBuf>,
    pub batch_size: usize,
    pub max_rpd: u32,
    pub max_rpm: u32,
    /// Total attempts per batch, including the first
    pub retry_attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub timeout_cooldown: Duration,
    pub fault_cooldown: Duration,
    pub translate_backoff: Duration,
    pub echo_check: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the API key; a value that is set
    /// but does not parse is an error naming the variable.
    pub fn load() -> Result<Self> {
        let model_dir = env::var("TITLESIFT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::relevance::artifacts::default_model_dir());

        let config = Self {
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            llm_model: env::var("TITLESIFT_LLM_MODEL")
                .unwrap_or_else(|_| crate::llm::gemini::DEFAULT_MODEL.to_string()),
            llm_api_url: env::var("TITLESIFT_LLM_API_URL")
                .unwrap_or_else(|_| crate::llm::gemini::DEFAULT_API_URL.to_string()),
            translate_url: env::var("TITLESIFT_TRANSLATE_URL")
                .unwrap_or_else(|_| crate::translate::google::DEFAULT_TRANSLATE_URL.to_string()),
            model_dir,
            keywords_file: env::var("TITLESIFT_KEYWORDS_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            batch_size: env_parse(
                "TITLESIFT_BATCH_SIZE",
                crate::pipeline::llm_path::DEFAULT_BATCH_SIZE,
            )?,
            max_rpd: env_parse("TITLESIFT_MAX_RPD", 1500)?,
            max_rpm: env_parse("TITLESIFT_MAX_RPM", 15)?,
            retry_attempts: env_parse("TITLESIFT_RETRY_ATTEMPTS", 2)?,
            rate_limit_cooldown: Duration::from_secs(env_parse(
                "TITLESIFT_RATE_LIMIT_COOLDOWN_SECS",
                15,
            )?),
            timeout_cooldown: Duration::from_secs(env_parse("TITLESIFT_TIMEOUT_COOLDOWN_SECS", 10)?),
            fault_cooldown: Duration::from_secs(env_parse("TITLESIFT_FAULT_COOLDOWN_SECS", 10)?),
            translate_backoff: Duration::from_millis(env_parse(
                "TITLESIFT_TRANSLATE_BACKOFF_MS",
                1000,
            )?),
            echo_check: env_parse("TITLESIFT_ECHO_CHECK", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("Batch size must be at least 1 (TITLESIFT_BATCH_SIZE / --batch-size)");
        }
        if self.max_rpm == 0 {
            anyhow::bail!(
                "Requests per minute must be at least 1 (TITLESIFT_MAX_RPM / --max-rpm)"
            );
        }
        Ok(())
    }

    /// Apply the LLM subcommand's flags over the loaded values.
    pub fn with_llm_overrides(mut self, flags: LlmOverrides) -> Result<Self> {
        if let Some(v) = flags.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = flags.max_rpd {
            self.max_rpd = v;
        }
        if let Some(v) = flags.max_rpm {
            self.max_rpm = v;
        }
        if let Some(v) = flags.retry_attempts {
            self.retry_attempts = v;
        }
        if let Some(v) = flags.rate_limit_cooldown_secs {
            self.rate_limit_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = flags.timeout_cooldown_secs {
            self.timeout_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = flags.fault_cooldown_secs {
            self.fault_cooldown = Duration::from_secs(v);
        }
        if flags.no_echo_check {
            self.echo_check = false;
        }
        self.validate()?;
        Ok(self)
    }

    /// Apply the trained-model subcommand's flags over the loaded values.
    pub fn with_model_overrides(mut self, flags: ModelOverrides) -> Self {
        if flags.keywords_file.is_some() {
            self.keywords_file = flags.keywords_file;
        }
        if let Some(dir) = flags.model_dir {
            self.model_dir = dir;
        }
        if let Some(ms) = flags.translate_backoff_ms {
            self.translate_backoff = Duration::from_millis(ms);
        }
        self
    }

    /// Check that the Gemini API key is configured.
    /// Call this before any operation that needs the LLM path.
    pub fn require_llm(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            anyhow::bail!(
                "GEMINI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the trained model artifacts are in place.
    pub fn require_model(&self) -> Result<()> {
        if !crate::relevance::artifacts::model_files_present(&self.model_dir) {
            anyhow::bail!(
                "Relevance model files not found in {}\n\
                 Expected {} and {}. Set TITLESIFT_MODEL_DIR to the directory holding them.",
                self.model_dir.display(),
                crate::relevance::artifacts::MODEL_FILE,
                crate::relevance::artifacts::VECTORIZER_FILE,
            );
        }
        Ok(())
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            retry_attempts: self.retry_attempts,
            rate_limit_cooldown: self.rate_limit_cooldown,
            timeout_cooldown: self.timeout_cooldown,
            fault_cooldown: self.fault_cooldown,
            echo_check: self.echo_check,
        }
    }

    pub fn rate_budget(&self) -> RateBudget {
        RateBudget::new(self.max_rpd, self.max_rpm)
    }

    /// The keyword list from the configured file, or the built-in list.
    pub fn keyword_rules(&self) -> Result<KeywordRules> {
        match &self.keywords_file {
            Some(path) => KeywordRules::load(path),
            None => Ok(KeywordRules::default()),
        }
    }

    pub fn keywords_source(&self) -> String {
        self.keywords_file
            .as_deref()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "built-in list".to_string())
    }
}

/// `classify-llm` flags; `None` keeps the env/default value.
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub batch_size: Option<usize>,
    pub max_rpd: Option<u32>,
    pub max_rpm: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub rate_limit_cooldown_secs: Option<u64>,
    pub timeout_cooldown_secs: Option<u64>,
    pub fault_cooldown_secs: Option<u64>,
    pub no_echo_check: bool,
}

/// `classify-model` flags; `None` keeps the env/default value.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub keywords_file: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub translate_backoff_ms: Option<u64>,
}

/// Parse an env var, falling back to `default` when it is unset or blank.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}
