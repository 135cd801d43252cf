// Response extraction and structural validation for batch verdicts.
//
// The model's output is free text that usually, but not always, is a bare
// JSON array. Everything between the first '[' and the last ']' is parsed.
// A parsed response is only accepted when it has exactly one entry per
// requested title and, where the model echoes the title, the echo matches
// the title at the same position.

use serde::Deserialize;

use super::traits::LlmError;
use crate::records::Verdict;

/// One element of the model's JSON array, as written by the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelVerdict {
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub verdict: Option<String>,
}

/// An accepted verdict for one title of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleVerdict {
    pub translated_title: String,
    pub verdict: Verdict,
}

impl TitleVerdict {
    /// Placeholder for a title whose batch could not be classified.
    pub fn error() -> Self {
        Self {
            translated_title: String::new(),
            verdict: Verdict::Error,
        }
    }
}

/// The slice between the first '[' and the last ']', inclusive.
pub fn extract_json_array(raw: &str) -> Result<&str, LlmError> {
    let start = raw.find('[');
    let end = raw.rfind(']');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(LlmError::Malformed(
            "no JSON array found in response".to_string(),
        )),
    }
}

/// Parse the model's raw text into its list of verdict entries.
pub fn parse_verdicts(raw: &str) -> Result<Vec<ModelVerdict>, LlmError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    let json = extract_json_array(raw)?;
    serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))
}

/// Check a parsed response against the titles it was requested for and
/// convert it into accepted verdicts, position for position.
pub fn validate_batch(
    titles: &[&str],
    entries: Vec<ModelVerdict>,
    echo_check: bool,
) -> Result<Vec<TitleVerdict>, LlmError> {
    if entries.len() != titles.len() {
        return Err(LlmError::CountMismatch {
            expected: titles.len(),
            got: entries.len(),
        });
    }

    titles
        .iter()
        .zip(entries)
        .enumerate()
        .map(|(position, (title, entry))| {
            if echo_check {
                if let Some(echo) = entry.original_title.as_deref() {
                    if !echo.trim().is_empty() && normalize(echo) != normalize(title) {
                        return Err(LlmError::EchoMismatch {
                            position,
                            expected: title.to_string(),
                            got: echo.to_string(),
                        });
                    }
                }
            }

            let raw_verdict = entry.verdict.unwrap_or_default();
            let verdict =
                Verdict::from_model_text(&raw_verdict).ok_or_else(|| LlmError::UnknownVerdict {
                    position,
                    value: raw_verdict.clone(),
                })?;

            Ok(TitleVerdict {
                translated_title: entry.translated_title.unwrap_or_default(),
                verdict,
            })
        })
        .collect()
}

/// Case-folded, whitespace-collapsed form used to compare echoed titles.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
