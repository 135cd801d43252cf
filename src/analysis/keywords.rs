// Title vocabulary per verdict class.
//
// Titles of one class are lower-cased and split on whitespace, slashes and
// hyphens; tokens are counted and the most frequent are reported. Ties keep
// the order in which tokens were first seen, so identical input always
// yields identical output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex_lite::Regex;
use tracing::info;

use crate::records::{ClassifiedRow, Verdict};

/// Number of tokens reported per class by default.
pub const DEFAULT_TOP_N: usize = 20;

pub const INCLUDE_FILE: &str = "include_keywords.txt";
pub const EXCLUDE_FILE: &str = "exclude_keywords.txt";

/// A token and how many titles of the class used it (with repeats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCount {
    pub token: String,
    pub count: usize,
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s/\-]+").expect("valid separator pattern"))
}

/// Lower-cased tokens of one title.
pub fn tokenize(title: &str) -> Vec<String> {
    let lower = title.to_lowercase();
    separators()
        .split(&lower)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `n` most frequent tokens among titles classified as `class`.
pub fn top_tokens(rows: &[ClassifiedRow], class: Verdict, n: usize) -> Vec<TokenCount> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<TokenCount> = Vec::new();

    for row in rows.iter().filter(|r| r.classification == class) {
        for token in tokenize(&row.title) {
            match positions.get(&token) {
                Some(&i) => counts[i].count += 1,
                None => {
                    positions.insert(token.clone(), counts.len());
                    counts.push(TokenCount { token, count: 1 });
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

/// Top tokens for both judgement classes.
#[derive(Debug, Clone, Default)]
pub struct KeywordReport {
    pub relevant: Vec<TokenCount>,
    pub not_relevant: Vec<TokenCount>,
}

impl KeywordReport {
    pub fn build(rows: &[ClassifiedRow], n: usize) -> Self {
        Self {
            relevant: top_tokens(rows, Verdict::Relevant, n),
            not_relevant: top_tokens(rows, Verdict::NotRelevant, n),
        }
    }

    /// Write the include and exclude lists, one token per line.
    /// Returns the paths written.
    pub fn write(&self, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;

        let include = out_dir.join(INCLUDE_FILE);
        let exclude = out_dir.join(EXCLUDE_FILE);
        write_token_list(&include, &self.relevant)?;
        write_token_list(&exclude, &self.not_relevant)?;

        info!(
            include = %include.display(),
            exclude = %exclude.display(),
            "Wrote keyword lists"
        );
        Ok((include, exclude))
    }
}

fn write_token_list(path: &Path, tokens: &[TokenCount]) -> Result<()> {
    let mut body = String::new();
    for t in tokens {
        body.push_str(&t.token);
        body.push('\n');
    }
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read an LLM-path output file.
pub fn load_classified(path: &Path) -> Result<Vec<ClassifiedRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a classified-titles file", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::format_index;

    fn row(i: usize, title: &str, classification: Verdict) -> ClassifiedRow {
        ClassifiedRow {
            index: format_index(i),
            id: format!("p{i}"),
            title: title.to_string(),
            translated_title: title.to_string(),
            classification,
        }
    }

    #[test]
    fn test_tokenize_splits_on_slash_and_hyphen() {
        assert_eq!(
            tokenize("Co-Founder / CEO  Plant-Manager"),
            vec!["co", "founder", "ceo", "plant", "manager"]
        );
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn test_counts_only_requested_class() {
        let rows = vec![
            row(0, "Plant Manager", Verdict::Relevant),
            row(1, "HR Manager", Verdict::NotRelevant),
            row(2, "Operations Manager", Verdict::Relevant),
            row(3, "Manager", Verdict::Error),
        ];
        let top = top_tokens(&rows, Verdict::Relevant, 20);
        assert_eq!(top[0], TokenCount { token: "manager".into(), count: 2 });
        assert_eq!(top.len(), 3);
        assert!(!top.iter().any(|t| t.token == "hr"));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let rows = vec![
            row(0, "Zeta Alpha", Verdict::NotRelevant),
            row(1, "Beta", Verdict::NotRelevant),
            row(2, "Beta Alpha", Verdict::NotRelevant),
        ];
        let tokens: Vec<String> = top_tokens(&rows, Verdict::NotRelevant, 20)
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(tokens, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_truncates_to_n() {
        let rows: Vec<ClassifiedRow> = (0..30)
            .map(|i| row(i, &format!("word{i}"), Verdict::Relevant))
            .collect();
        assert_eq!(top_tokens(&rows, Verdict::Relevant, DEFAULT_TOP_N).len(), 20);
    }

    #[test]
    fn test_write_lists() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            row(0, "Plant Manager", Verdict::Relevant),
            row(1, "Finance Director", Verdict::NotRelevant),
        ];
        let (include, exclude) = KeywordReport::build(&rows, 20).write(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(include).unwrap(), "plant\nmanager\n");
        assert_eq!(std::fs::read_to_string(exclude).unwrap(), "finance\ndirector\n");
    }
}
