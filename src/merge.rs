// Join classification output back onto the full prospect records.
//
// The score file is either trained-model output (relevance_score) or
// LLM-path output (classification). Every person whose id has a judgement is
// emitted with contact fields, the current organization (first employment
// history entry) and the judgement. People without one are dropped.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::checkpoint::write_json_atomic;
use crate::records::{value_to_text, Verdict};

/// One entry of a classification output file. Fields are read loosely so
/// files from either path, with or without `index`, are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreEntry {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Value,
    #[serde(default)]
    pub translated_title: Value,
    #[serde(default)]
    pub relevance_score: Value,
    #[serde(default)]
    pub classification: Value,
}

/// The judgement carried over from a score file.
#[derive(Debug, Clone, PartialEq)]
pub enum Judgement {
    Score(String),
    Classification(String),
}

impl Judgement {
    /// Score entries need a non-empty relevance_score; LLM entries need a
    /// classification.
    fn from_entry(entry: &ScoreEntry) -> Option<Self> {
        let score = value_to_text(&entry.relevance_score);
        if !score.is_empty() {
            return Some(Judgement::Score(score));
        }
        let classification = value_to_text(&entry.classification);
        (!classification.is_empty()).then_some(Judgement::Classification(classification))
    }

    /// Positive numeric score, or a RELEVANT verdict.
    pub fn is_relevant(&self) -> bool {
        match self {
            Judgement::Score(s) => s.trim().parse::<f64>().is_ok_and(|v| v > 0.0),
            Judgement::Classification(c) => c == Verdict::Relevant.as_str(),
        }
    }
}

/// The fields read from a lead-search person record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub employment_history: Value,
}

impl Person {
    /// Organization of the first employment history entry, if any.
    fn organization_name(&self) -> String {
        self.employment_history
            .as_array()
            .and_then(|jobs| jobs.first())
            .and_then(|job| job.get("organization_name"))
            .map(value_to_text)
            .unwrap_or_default()
    }
}

/// One output record of the merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedProspect {
    pub id: Value,
    pub first_name: String,
    pub last_name: String,
    pub linkedin_url: String,
    pub organization_name: String,
    pub title: String,
    pub translated_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

/// Join `people` against the judgements in `scores`, in people order.
pub fn merge(scores: &[ScoreEntry], people: &[Person], only_relevant: bool) -> Vec<MergedProspect> {
    // Later entries win when an id repeats.
    let judged: HashMap<String, (&ScoreEntry, Judgement)> = scores
        .iter()
        .filter_map(|entry| {
            let id = value_to_text(&entry.id);
            if id.is_empty() {
                return None;
            }
            Judgement::from_entry(entry).map(|j| (id, (entry, j)))
        })
        .collect();

    people
        .iter()
        .filter_map(|person| {
            let (entry, judgement) = judged.get(&value_to_text(&person.id))?;
            if only_relevant && !judgement.is_relevant() {
                return None;
            }
            let (relevance_score, classification) = match judgement {
                Judgement::Score(s) => (Some(s.clone()), None),
                Judgement::Classification(c) => (None, Some(c.clone())),
            };
            Some(MergedProspect {
                id: person.id.clone(),
                first_name: person.first_name.clone().unwrap_or_default(),
                last_name: person.last_name.clone().unwrap_or_default(),
                linkedin_url: person.linkedin_url.clone().unwrap_or_default(),
                organization_name: person.organization_name(),
                title: value_to_text(&entry.title),
                translated_title: value_to_text(&entry.translated_title),
                relevance_score,
                classification,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub judged: usize,
    pub people: usize,
    pub written: usize,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{what} file {} must be a JSON list of objects", path.display()))
}

/// Merge two files and write the result atomically as pretty JSON.
pub fn merge_files(
    scores_path: &Path,
    people_path: &Path,
    out: &Path,
    only_relevant: bool,
) -> Result<MergeReport> {
    let scores: Vec<ScoreEntry> = load_json(scores_path, "Score")?;
    let people: Vec<Person> = load_json(people_path, "People")?;

    let merged = merge(&scores, &people, only_relevant);
    write_json_atomic(out, &merged)?;

    let report = MergeReport {
        judged: scores.len(),
        people: people.len(),
        written: merged.len(),
    };
    info!(
        judged = report.judged,
        people = report.people,
        written = report.written,
        out = %out.display(),
        "Merged classification into prospect records"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Person> {
        serde_json::from_value(json!([
            {
                "id": "p1",
                "first_name": "Ana",
                "last_name": "Silva",
                "linkedin_url": "https://linkedin.com/in/ana",
                "employment_history": [
                    {"organization_name": "Acme Foods"},
                    {"organization_name": "Older Co"}
                ]
            },
            {"id": "p2", "first_name": "Ben", "last_name": null, "employment_history": []},
            {"id": "p3", "first_name": "Cy"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_merge_scores_keeps_people_with_a_score() {
        let scores: Vec<ScoreEntry> = serde_json::from_value(json!([
            {"index": "00000", "id": "p1", "title": "Jefe de Planta", "translated_title": "Plant Manager", "relevance_score": "3"},
            {"index": "00001", "id": "p2", "title": "", "translated_title": "", "relevance_score": "N/A"},
            {"index": "00002", "id": "p3", "title": "CFO", "translated_title": "CFO", "relevance_score": ""}
        ]))
        .unwrap();

        let merged = merge(&scores, &people(), false);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].organization_name, "Acme Foods");
        assert_eq!(merged[0].translated_title, "Plant Manager");
        assert_eq!(merged[0].relevance_score.as_deref(), Some("3"));
        assert_eq!(merged[1].last_name, "");
        assert_eq!(merged[1].organization_name, "");
    }

    #[test]
    fn test_only_relevant_filters_non_positive_scores() {
        let scores: Vec<ScoreEntry> = serde_json::from_value(json!([
            {"id": "p1", "relevance_score": "3"},
            {"id": "p2", "relevance_score": "-3"},
            {"id": "p3", "relevance_score": "N/A"}
        ]))
        .unwrap();
        let merged = merge(&scores, &people(), true);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, json!("p1"));
    }

    #[test]
    fn test_merge_classifications() {
        let scores: Vec<ScoreEntry> = serde_json::from_value(json!([
            {"id": "p1", "title": "Plant Manager", "classification": "RELEVANT"},
            {"id": "p2", "title": "HR Lead", "classification": "NOT RELEVANT"}
        ]))
        .unwrap();

        let all = merge(&scores, &people(), false);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].classification.as_deref(), Some("NOT RELEVANT"));
        assert!(all[1].relevance_score.is_none());

        let relevant = merge(&scores, &people(), true);
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].title, "Plant Manager");
    }

    #[test]
    fn test_error_verdicts_kept_unless_only_relevant() {
        let scores: Vec<ScoreEntry> = serde_json::from_value(json!([
            {"id": "p1", "title": "Plant Manager", "classification": "RELEVANT"},
            {"id": "p2", "title": "Gerente", "classification": "ERROR"},
            {"id": "p3", "title": "CFO", "classification": "NOT RELEVANT"}
        ]))
        .unwrap();

        let all = merge(&scores, &people(), false);
        let verdicts: Vec<_> = all.iter().filter_map(|m| m.classification.as_deref()).collect();
        assert_eq!(verdicts, ["RELEVANT", "ERROR", "NOT RELEVANT"]);

        let relevant = merge(&scores, &people(), true);
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].id, json!("p1"));
    }

    #[test]
    fn test_numeric_ids_match_string_ids() {
        let scores: Vec<ScoreEntry> =
            serde_json::from_value(json!([{"id": 42, "relevance_score": "1"}])).unwrap();
        let people: Vec<Person> = serde_json::from_value(json!([{"id": "42"}])).unwrap();
        assert_eq!(merge(&scores, &people, false).len(), 1);
    }

    #[test]
    fn test_merge_files_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let scores = dir.path().join("scores.json");
        let people_file = dir.path().join("people.json");
        let out = dir.path().join("merged.json");
        std::fs::write(&scores, r#"[{"id": "p3", "classification": "RELEVANT"}]"#).unwrap();
        std::fs::write(&people_file, r#"[{"id": "p3", "first_name": "Cy"}]"#).unwrap();

        let report = merge_files(&scores, &people_file, &out, false).unwrap();
        assert_eq!(report.written, 1);

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written[0]["first_name"], "Cy");
        assert_eq!(written[0]["classification"], "RELEVANT");
        assert!(written[0].get("relevance_score").is_none());
    }
}
