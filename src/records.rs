// Record types: the values that flow through both classification paths.
//
// Internally every record carries a tagged outcome. The string sentinels the
// downstream merge step expects ("N/A", "TRANSLATION_ERROR", "ERROR") only
// appear when a record is converted into an output row.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Score sentinel for records that were skipped or could not be scored.
pub const NOT_AVAILABLE: &str = "N/A";

/// Translated-title sentinel for records whose translation or scoring failed.
pub const TRANSLATION_ERROR: &str = "TRANSLATION_ERROR";

/// One raw input entry. Only `id` and `title` are read; any other fields the
/// lead-search export carries are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProspectInput {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Value,
}

impl ProspectInput {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Value::String(id.into()),
            title: Value::String(title.into()),
        }
    }

    /// The prospect id as an opaque string. Numeric ids are rendered as-is,
    /// missing or null ids become "".
    pub fn id_text(&self) -> String {
        value_to_text(&self.id)
    }

    /// The title as it should be echoed in output, whatever its JSON type.
    pub fn title_text(&self) -> String {
        value_to_text(&self.title)
    }

    /// The title to classify, or `None` when it is missing, not a string,
    /// or blank after trimming.
    pub fn scorable_title(&self) -> Option<&str> {
        match &self.title {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Render a JSON scalar as plain text; null becomes "".
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load a JSON array of prospect entries.
///
/// A missing file or a document that is not an array of objects is fatal;
/// nothing downstream can run without the input.
pub fn load_inputs(path: &Path) -> Result<Vec<ProspectInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let inputs: Vec<ProspectInput> = serde_json::from_str(&raw).with_context(|| {
        format!(
            "Input {} must be a JSON list of objects with 'id' and 'title'",
            path.display()
        )
    })?;

    let mut seen = HashSet::new();
    let duplicates = inputs
        .iter()
        .map(|p| p.id_text())
        .filter(|id| !id.is_empty() && !seen.insert(id.clone()))
        .count();
    if duplicates > 0 {
        warn!(
            duplicates,
            "Input contains repeated ids; each entry is still classified by position"
        );
    }

    info!(entries = inputs.len(), file = %path.display(), "Loaded input");
    Ok(inputs)
}

/// Zero-padded ordinal used in the `index` field of output rows.
pub fn format_index(index: usize) -> String {
    format!("{index:05}")
}

/// A score produced by the trained model. The pipeline treats it as opaque,
/// apart from negating numeric values during keyword override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModelScore {
    Integer(i64),
    Real(f64),
    Label(String),
}

impl ModelScore {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ModelScore::Label(_))
    }

    /// The score with its sign flipped, or `None` for categorical labels.
    pub fn negated(&self) -> Option<ModelScore> {
        match self {
            ModelScore::Integer(v) => Some(ModelScore::Integer(v.saturating_neg())),
            ModelScore::Real(v) => Some(ModelScore::Real(-v)),
            ModelScore::Label(_) => None,
        }
    }

    /// True for numeric scores above zero.
    pub fn is_positive(&self) -> bool {
        match self {
            ModelScore::Integer(v) => *v > 0,
            ModelScore::Real(v) => *v > 0.0,
            ModelScore::Label(_) => false,
        }
    }
}

impl fmt::Display for ModelScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelScore::Integer(v) => write!(f, "{v}"),
            ModelScore::Real(v) => write!(f, "{v}"),
            ModelScore::Label(s) => write!(f, "{s}"),
        }
    }
}

/// Which stage of the trained-model path failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Translation,
    Scoring,
}

/// Where a record stands in the trained-model path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// Not yet processed.
    Pending,
    /// Title missing or blank; never sent to the translator or the model.
    Skipped,
    Scored {
        score: ModelScore,
        /// The disqualifying keyword that already negated `score`, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        override_keyword: Option<String>,
    },
    Failed {
        stage: FailureStage,
        error: String,
        attempts: u32,
    },
}

/// A prospect's title moving through the trained-model path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub index: usize,
    pub id: String,
    pub title: String,
    /// Empty until translated.
    pub translated_title: String,
    pub outcome: ScoreOutcome,
}

impl TitleRecord {
    pub fn from_input(index: usize, input: &ProspectInput) -> Self {
        Self {
            index,
            id: input.id_text(),
            title: input.title_text(),
            translated_title: String::new(),
            outcome: ScoreOutcome::Pending,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ScoreOutcome::Failed { .. })
    }

    /// Convert to the serialized output shape, mapping outcomes to sentinels.
    pub fn to_row(&self) -> ScoredRow {
        let (translated_title, relevance_score) = match &self.outcome {
            ScoreOutcome::Pending | ScoreOutcome::Skipped => {
                (String::new(), NOT_AVAILABLE.to_string())
            }
            ScoreOutcome::Scored { score, .. } => {
                (self.translated_title.clone(), score.to_string())
            }
            ScoreOutcome::Failed { .. } => {
                (TRANSLATION_ERROR.to_string(), NOT_AVAILABLE.to_string())
            }
        };

        ScoredRow {
            index: format_index(self.index),
            id: self.id.clone(),
            title: self.title.clone(),
            translated_title,
            relevance_score,
        }
    }
}

/// Output row of the trained-model path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub index: String,
    pub id: String,
    pub title: String,
    pub translated_title: String,
    pub relevance_score: String,
}

/// Verdict produced by the LLM path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "RELEVANT")]
    Relevant,
    #[serde(rename = "NOT RELEVANT")]
    NotRelevant,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "SKIPPED")]
    Skipped,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Relevant => "RELEVANT",
            Verdict::NotRelevant => "NOT RELEVANT",
            Verdict::Error => "ERROR",
            Verdict::Skipped => "SKIPPED",
        }
    }

    /// Parse a verdict as written by the model. Only the two judgement
    /// values are accepted; case, surrounding whitespace and an underscore
    /// in place of the space are tolerated.
    pub fn from_model_text(text: &str) -> Option<Verdict> {
        let normalized = text.trim().to_uppercase().replace('_', " ");
        match normalized.as_str() {
            "RELEVANT" => Some(Verdict::Relevant),
            "NOT RELEVANT" => Some(Verdict::NotRelevant),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output row of the LLM path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub index: String,
    pub id: String,
    pub title: String,
    pub translated_title: String,
    pub classification: Verdict,
}
