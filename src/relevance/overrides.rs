// Keyword override: a deterministic post-pass over model scores.
//
// The trained model occasionally rates titles from excluded departments
// (finance, sales, HR, legal, marketing) as relevant. After scoring, every
// numeric score whose translated title contains a disqualifying keyword is
// negated. Matching is a literal substring test against the upper-cased
// title; the first keyword in list order wins.
//
// The matched keyword is stored on the record, so a record that has already
// been overridden is never flipped back by a second pass.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::records::{ScoreOutcome, TitleRecord};

/// Disqualifying keywords, in match order. Leading and trailing spaces are
/// significant (" BD " must not match "ABDUL").
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "AUDIT",
    "AUDITOR",
    "AUDITING",
    "TAX",
    "TAXATION",
    "TAX ADVISOR",
    "LEGAL",
    "LAWYER",
    "ATTORNEY",
    "PARALEGAL",
    "ACCOUNT MANAGER",
    "CLIENT MANAGER",
    "RELATIONSHIP MANAGER",
    " HR ",
    "HR ",
    " HRBP ",
    "HRBP ",
    "HUMAN RESOURCE",
    "HUMAN CAPITAL",
    "TALENT MANAGEMENT",
    "KEY ACCOUNT MANAGER",
    "STRATEGIC ACCOUNT MANAGER",
    "ENTERPRISE ACCOUNT MANAGER",
    "MARKETING",
    " BRAND ",
    "PROMOTION",
    "DIGITAL MARKETING",
    " CONTENT ",
    "BUSINESS DEVELOPMENT",
    "BIZ DEV",
    " BD ",
    "SALES",
    "SELLING",
    "SALES EXECUTIVE",
    "ACCOUNT EXECUTIVE",
    "TERRITORY MANAGER",
    "COMMERCIAL MANAGER",
    "COMMERCIAL LEAD",
    "TRADE MANAGER",
    "TALENT ACQUISITION",
    "RECRUITER",
    "HIRING MANAGER",
    "FINANCIAL",
    "FINANCE",
    "PUBLIC RELATIONS",
    "PUBLIC AFFAIRS",
];

/// What a single override pass did to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// Numeric score negated because of this keyword.
    Negated { keyword: String },
    /// A keyword matched but the score is categorical; left untouched.
    NonNumeric { keyword: String },
    /// A previous pass already negated this record.
    AlreadyApplied,
    NoMatch,
    /// Skipped or failed records carry no score to override.
    NotScored,
}

/// Ordered list of disqualifying keywords.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    /// Upper-cased, in match order.
    keywords: Vec<String>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl KeywordRules {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_uppercase())
                .filter(|k| !k.trim().is_empty())
                .collect(),
        }
    }

    /// Load keywords from a file, one per line. Blank lines and lines
    /// starting with `#` are ignored; surrounding spaces are kept.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keyword file {}", path.display()))?;
        let rules = Self::new(
            raw.lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.trim_start().starts_with('#')),
        );
        if rules.is_empty() {
            anyhow::bail!("Keyword file {} contains no keywords", path.display());
        }
        info!(keywords = rules.len(), file = %path.display(), "Loaded keyword overrides");
        Ok(rules)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The first keyword, in list order, contained in `title` (case-insensitive).
    pub fn first_match(&self, title: &str) -> Option<&str> {
        let upper = title.to_uppercase();
        self.keywords
            .iter()
            .find(|kw| upper.contains(kw.as_str()))
            .map(String::as_str)
    }

    /// Apply the override to one record.
    pub fn apply(&self, record: &mut TitleRecord) -> OverrideOutcome {
        let ScoreOutcome::Scored {
            score,
            override_keyword,
        } = &mut record.outcome
        else {
            return OverrideOutcome::NotScored;
        };

        if override_keyword.is_some() {
            return OverrideOutcome::AlreadyApplied;
        }

        let Some(keyword) = self.first_match(&record.translated_title) else {
            return OverrideOutcome::NoMatch;
        };
        let keyword = keyword.to_string();

        match score.negated() {
            Some(negated) => {
                info!(
                    index = record.index,
                    keyword = %keyword,
                    title = %record.translated_title,
                    old_score = %score,
                    new_score = %negated,
                    "Keyword override"
                );
                *score = negated;
                *override_keyword = Some(keyword.clone());
                OverrideOutcome::Negated { keyword }
            }
            None => {
                debug!(index = record.index, keyword = %keyword, "Keyword matched a categorical score");
                OverrideOutcome::NonNumeric { keyword }
            }
        }
    }

    /// Apply the override to every record; returns how many were negated.
    pub fn apply_all(&self, records: &mut [TitleRecord]) -> usize {
        let mut negated = 0;
        for record in records.iter_mut() {
            if let OverrideOutcome::Negated { .. } = self.apply(record) {
                negated += 1;
            }
        }
        negated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ModelScore, ProspectInput};

    fn scored(translated: &str, score: ModelScore) -> TitleRecord {
        let mut record = TitleRecord::from_input(0, &ProspectInput::new("p1", translated));
        record.translated_title = translated.to_string();
        record.outcome = ScoreOutcome::Scored {
            score,
            override_keyword: None,
        };
        record
    }

    #[test]
    fn test_first_match_respects_list_order() {
        let rules = KeywordRules::new(["SALES", "SALES EXECUTIVE"]);
        assert_eq!(rules.first_match("Senior Sales Executive"), Some("SALES"));
    }

    #[test]
    fn test_first_match_is_case_insensitive() {
        let rules = KeywordRules::new(["finance"]);
        assert_eq!(rules.first_match("Finance Manager"), Some("FINANCE"));
    }

    #[test]
    fn test_padded_keywords_need_word_boundaries() {
        let rules = KeywordRules::new([" BD "]);
        assert_eq!(rules.first_match("ABDUL plant head"), None);
        assert_eq!(rules.first_match("Head of BD team"), Some(" BD "));
    }

    #[test]
    fn test_negates_positive_score() {
        let rules = KeywordRules::default();
        let mut record = scored("Finance Manager", ModelScore::Integer(7));
        assert_eq!(
            rules.apply(&mut record),
            OverrideOutcome::Negated {
                keyword: "FINANCE".into()
            }
        );
        assert_eq!(record.to_row().relevance_score, "-7");
    }

    #[test]
    fn test_no_match_leaves_score() {
        let rules = KeywordRules::default();
        let mut record = scored("Plant Manager", ModelScore::Integer(7));
        assert_eq!(rules.apply(&mut record), OverrideOutcome::NoMatch);
        assert_eq!(record.to_row().relevance_score, "7");
    }

    #[test]
    fn test_second_pass_does_not_flip_back() {
        let rules = KeywordRules::default();
        let mut record = scored("Finance Manager", ModelScore::Integer(7));
        rules.apply(&mut record);
        assert_eq!(rules.apply(&mut record), OverrideOutcome::AlreadyApplied);
        assert_eq!(record.to_row().relevance_score, "-7");
    }

    #[test]
    fn test_label_score_untouched() {
        let rules = KeywordRules::default();
        let mut record = scored("Finance Manager", ModelScore::Label("high".into()));
        assert!(matches!(
            rules.apply(&mut record),
            OverrideOutcome::NonNumeric { .. }
        ));
        assert_eq!(record.to_row().relevance_score, "high");
    }

    #[test]
    fn test_skipped_record_not_scored() {
        let rules = KeywordRules::default();
        let mut record = TitleRecord::from_input(0, &ProspectInput::new("x", ""));
        record.outcome = ScoreOutcome::Skipped;
        assert_eq!(rules.apply(&mut record), OverrideOutcome::NotScored);
    }

    #[test]
    fn test_load_keeps_padding_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.txt");
        std::fs::write(&path, "# excluded departments\nfinance\n\n hr \r\n").unwrap();
        let rules = KeywordRules::load(&path).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.first_match("Head of HR Ops"), Some(" HR "));
        assert_eq!(rules.first_match("CHRO"), None);
    }

    #[test]
    fn test_load_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.txt");
        std::fs::write(&path, "# nothing here\n\n").unwrap();
        assert!(KeywordRules::load(&path).is_err());
    }
}
