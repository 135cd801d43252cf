use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use titlesift::config::{Config, LlmOverrides, ModelOverrides};
use titlesift::output::terminal;
use titlesift::pacing::TokioSleeper;
use titlesift::pipeline::llm_path::{self, LlmPath};
use titlesift::pipeline::model_path::{self, ModelPath, ModelPathSettings};

/// Titlesift: decide which prospects' job titles fit the outreach profile.
///
/// Titles are classified either by a locally trained model (with translation
/// and a disqualifying-keyword override) or in small batches by a generative
/// model under a daily request budget.
#[derive(Parser)]
#[command(name = "titlesift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate and score titles with the local trained model
    ClassifyModel {
        /// JSON list of prospects with `id` and `title`
        input: PathBuf,

        #[arg(long, default_value = "C_classified_titles.json")]
        out: PathBuf,

        /// Continue an interrupted run from its progress log
        #[arg(long)]
        resume: bool,

        /// Disqualifying keywords, one per line (overrides TITLESIFT_KEYWORDS_FILE)
        #[arg(long)]
        keywords_file: Option<PathBuf>,

        /// Skip the second attempt for failed titles after the main pass
        #[arg(long)]
        no_retry_sweep: bool,

        /// Directory with relevance_model.onnx and vectorizer.json (overrides TITLESIFT_MODEL_DIR)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Pause before retrying a failed translation (default: TITLESIFT_TRANSLATE_BACKOFF_MS or 1000)
        #[arg(long)]
        translate_backoff_ms: Option<u64>,
    },

    /// Classify titles in batches with the generative model
    ClassifyLlm {
        /// JSON list of prospects with `id` and `title`
        input: PathBuf,

        #[arg(long, default_value = "C_classified_titles.json")]
        out: PathBuf,

        /// Continue an interrupted run from its progress log
        #[arg(long)]
        resume: bool,

        /// Titles per request (default: TITLESIFT_BATCH_SIZE or 3)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Daily request cap (default: TITLESIFT_MAX_RPD or 1500)
        #[arg(long)]
        max_rpd: Option<u32>,

        /// Requests per minute (default: TITLESIFT_MAX_RPM or 15)
        #[arg(long)]
        max_rpm: Option<u32>,

        /// Attempts per batch, including the first (default: TITLESIFT_RETRY_ATTEMPTS or 2)
        #[arg(long)]
        retry_attempts: Option<u32>,

        /// Wait after a rate-limit error (default: TITLESIFT_RATE_LIMIT_COOLDOWN_SECS or 15)
        #[arg(long)]
        rate_limit_cooldown_secs: Option<u64>,

        /// Wait after a timeout (default: TITLESIFT_TIMEOUT_COOLDOWN_SECS or 10)
        #[arg(long)]
        timeout_cooldown_secs: Option<u64>,

        /// Wait after an unusable response (default: TITLESIFT_FAULT_COOLDOWN_SECS or 10)
        #[arg(long)]
        fault_cooldown_secs: Option<u64>,

        /// Match verdicts to titles by position only
        #[arg(long)]
        no_echo_check: bool,
    },

    /// Show the most frequent title words per verdict in an LLM output file
    Keywords {
        /// Output of `classify-llm`
        file: PathBuf,

        /// Tokens per class
        #[arg(long, default_value = "20")]
        top: usize,

        /// Where to write include_keywords.txt and exclude_keywords.txt
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Join classification output onto the full prospect records
    Merge {
        /// Output of `classify-model` or `classify-llm`
        #[arg(long)]
        scores: PathBuf,

        /// Prospect records from the lead search
        #[arg(long)]
        people: PathBuf,

        #[arg(long, default_value = "D_filtered_relevant_entries.json")]
        out: PathBuf,

        /// Keep only positive scores / RELEVANT verdicts
        #[arg(long)]
        only_relevant: bool,
    },

    /// Show configuration status (model files, API key, effective tunables)
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("titlesift=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ClassifyModel {
            input,
            out,
            resume,
            keywords_file,
            no_retry_sweep,
            model_dir,
            translate_backoff_ms,
        } => {
            let config = Config::load()?.with_model_overrides(ModelOverrides {
                keywords_file,
                model_dir,
                translate_backoff_ms,
            });
            config.require_model()?;
            let rules = config.keyword_rules()?;

            info!(dir = %config.model_dir.display(), "Loading relevance model");
            let model =
                titlesift::relevance::onnx::OnnxRelevanceModel::load(&config.model_dir)?;
            let translator =
                titlesift::translate::google::GoogleTranslator::new(&config.translate_url)?;

            println!(
                "Scoring titles from {} ({} keywords from {})...",
                input.display(),
                rules.len(),
                config.keywords_source()
            );

            let path = ModelPath {
                translator: &translator,
                model: &model,
                sleeper: &TokioSleeper,
                rules: &rules,
                settings: ModelPathSettings {
                    translate_backoff: config.translate_backoff,
                    retry_sweep: !no_retry_sweep,
                },
            };
            let report = model_path::classify_file(&path, &input, &out, resume).await?;
            terminal::display_model_summary(&report, &out);
        }

        Commands::ClassifyLlm {
            input,
            out,
            resume,
            batch_size,
            max_rpd,
            max_rpm,
            retry_attempts,
            rate_limit_cooldown_secs,
            timeout_cooldown_secs,
            fault_cooldown_secs,
            no_echo_check,
        } => {
            let config = Config::load()?.with_llm_overrides(LlmOverrides {
                batch_size,
                max_rpd,
                max_rpm,
                retry_attempts,
                rate_limit_cooldown_secs,
                timeout_cooldown_secs,
                fault_cooldown_secs,
                no_echo_check,
            })?;
            config.require_llm()?;

            let generator = titlesift::llm::gemini::GeminiClient::new(
                &config.llm_api_url,
                &config.llm_model,
                config.gemini_api_key.clone(),
            )?;
            let mut budget = config.rate_budget();

            println!(
                "Classifying titles from {} with {} (batches of {}, up to {} requests)...",
                input.display(),
                config.llm_model,
                config.batch_size,
                config.max_rpd
            );

            let path = LlmPath {
                generator: &generator,
                sleeper: &TokioSleeper,
                policy: config.batch_policy(),
                batch_size: config.batch_size,
            };
            let report = llm_path::classify_file(&path, &mut budget, &input, &out, resume).await?;
            terminal::display_llm_summary(&report, &out);
        }

        Commands::Keywords { file, top, out_dir } => {
            let rows = titlesift::analysis::keywords::load_classified(&file)?;
            let report = titlesift::analysis::keywords::KeywordReport::build(&rows, top);
            terminal::display_keywords(&report);

            let (include, exclude) = report.write(&out_dir)?;
            println!(
                "\n{}",
                format!("Saved {} and {}", include.display(), exclude.display()).dimmed()
            );
        }

        Commands::Merge {
            scores,
            people,
            out,
            only_relevant,
        } => {
            let report = titlesift::merge::merge_files(&scores, &people, &out, only_relevant)?;
            terminal::display_merge_summary(&report, &out);
        }

        Commands::Check => {
            let config = Config::load()?;
            terminal::display_check(&config);
        }
    }

    Ok(())
}
