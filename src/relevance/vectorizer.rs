// TF-IDF vectorizer loaded from a JSON export of a fitted scikit-learn
// TfidfVectorizer.
//
// Only the pieces inference needs are exported: the vocabulary (term ->
// column), the idf weights, and the handful of flags that change how a
// document is turned into a row. Tokenisation matches the default
// `(?u)\b\w\w+\b` pattern: runs of word characters, at least two long.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default ONNX input name used by skl2onnx for float feature tensors.
const DEFAULT_INPUT_NAME: &str = "float_input";

/// A fitted TF-IDF vectorizer.
#[derive(Debug, Clone, Deserialize)]
pub struct TfIdfVectorizer {
    /// Term (single token or space-joined n-gram) to feature column.
    pub vocabulary: HashMap<String, usize>,
    /// Per-column idf weights. Empty when the vectorizer was fitted with
    /// `use_idf=False`.
    #[serde(default)]
    pub idf: Vec<f32>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    /// "l2", "l1" or absent for no normalisation.
    #[serde(default = "default_norm")]
    pub norm: Option<String>,
    /// Name of the classifier's float input tensor.
    #[serde(default = "default_input_name")]
    pub onnx_input: String,
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<String> {
    Some("l2".to_string())
}

fn default_input_name() -> String {
    DEFAULT_INPUT_NAME.to_string()
}

impl TfIdfVectorizer {
    /// Load a vectorizer export from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vectorizer from {}", path.display()))?;
        let vectorizer: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse vectorizer {}", path.display()))?;
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    fn validate(&self) -> Result<()> {
        if self.vocabulary.is_empty() {
            anyhow::bail!("Vectorizer vocabulary is empty");
        }
        let (lo, hi) = self.ngram_range;
        if lo == 0 || lo > hi {
            anyhow::bail!("Invalid ngram_range ({lo}, {hi})");
        }
        if !self.idf.is_empty() && self.idf.len() < self.width() {
            anyhow::bail!(
                "Vectorizer has {} idf weights for {} feature columns",
                self.idf.len(),
                self.width()
            );
        }
        Ok(())
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        let from_vocab = self.vocabulary.values().max().map(|m| m + 1).unwrap_or(0);
        from_vocab.max(self.idf.len())
    }

    /// Turn one document into a dense feature row.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut row = vec![0f32; self.width()];

        let tokens = tokenize(text, self.lowercase);
        let (lo, hi) = self.ngram_range;
        for n in lo..=hi {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                let term = window.join(" ");
                if let Some(&col) = self.vocabulary.get(&term) {
                    row[col] += 1.0;
                }
            }
        }

        for (col, value) in row.iter_mut().enumerate() {
            if *value == 0.0 {
                continue;
            }
            if self.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            if let Some(idf) = self.idf.get(col) {
                *value *= idf;
            }
        }

        match self.norm.as_deref() {
            Some("l2") => {
                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|v| *v /= norm);
                }
            }
            Some("l1") => {
                let norm = row.iter().map(|v| v.abs()).sum::<f32>();
                if norm > 0.0 {
                    row.iter_mut().for_each(|v| *v /= norm);
                }
            }
            _ => {}
        }

        row
    }
}

/// Split into runs of word characters at least two characters long.
fn tokenize(text: &str, lowercase: bool) -> Vec<String> {
    let text = if lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}
