// Trained-model classification path.
//
// Strategy: one title at a time, translate (one fixed-backoff retry), score
// with the local model, checkpoint. After the full pass, sweep the records
// that still failed and give each exactly one more attempt. Finally apply
// the keyword override to every numeric score.
//
// Blank titles are never sent to the translator or the model; they are
// tagged as skipped and carried through to the output in position.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use super::{progress_bar, resume_prefix};
use crate::checkpoint::{write_json_atomic, CheckpointLog};
use crate::pacing::Sleeper;
use crate::records::{
    load_inputs, FailureStage, ProspectInput, ScoreOutcome, ScoredRow, TitleRecord,
};
use crate::relevance::overrides::KeywordRules;
use crate::relevance::traits::RelevanceModel;
use crate::translate::retry::{translate_once, translate_with_retry, TranslationFailure};
use crate::translate::traits::Translator;

/// Tunables for the trained-model path.
#[derive(Debug, Clone)]
pub struct ModelPathSettings {
    /// Pause before the single in-pass translation retry.
    pub translate_backoff: Duration,
    /// Re-attempt failed records once after the full pass.
    pub retry_sweep: bool,
}

impl Default for ModelPathSettings {
    fn default() -> Self {
        Self {
            translate_backoff: crate::translate::retry::DEFAULT_TRANSLATE_BACKOFF,
            retry_sweep: true,
        }
    }
}

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRunReport {
    pub total: usize,
    pub resumed: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub recovered_in_sweep: usize,
    pub overridden: usize,
    /// RFC 3339 start time of the file run.
    pub started_at: String,
    pub elapsed_secs: i64,
}

impl ModelRunReport {
    fn tally(records: &[TitleRecord]) -> Self {
        let mut report = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.outcome {
                ScoreOutcome::Scored { .. } => report.scored += 1,
                ScoreOutcome::Skipped => report.skipped += 1,
                ScoreOutcome::Failed { .. } | ScoreOutcome::Pending => report.failed += 1,
            }
        }
        report
    }
}

/// The collaborators the trained-model path runs against.
pub struct ModelPath<'a> {
    pub translator: &'a dyn Translator,
    pub model: &'a dyn RelevanceModel,
    pub sleeper: &'a dyn Sleeper,
    pub rules: &'a KeywordRules,
    pub settings: ModelPathSettings,
}

impl ModelPath<'_> {
    /// Classify `inputs`, continuing after any `resumed` records.
    ///
    /// Each newly processed record is appended to `checkpoint` before the
    /// next one starts.
    pub async fn run(
        &self,
        inputs: &[ProspectInput],
        resumed: Vec<TitleRecord>,
        mut checkpoint: Option<&mut CheckpointLog>,
    ) -> Result<(Vec<TitleRecord>, ModelRunReport)> {
        let resumed_count = resumed.len();
        let mut records = resumed;
        records.reserve(inputs.len().saturating_sub(resumed_count));

        let total = inputs.len();
        let pb = progress_bar(total - resumed_count.min(total), "Scoring");

        // Pass 1: translate and score each record, checkpointing as we go.
        for (index, input) in inputs.iter().enumerate().skip(resumed_count) {
            let record = self.process(index, input).await;
            log_record(&record, total);

            if let Some(log) = checkpoint.as_deref_mut() {
                log.append(std::slice::from_ref(&record))?;
            }
            records.push(record);
            pb.inc(1);
        }
        pb.finish_and_clear();

        // Pass 2: one more attempt for everything that still failed.
        let recovered = if self.settings.retry_sweep {
            self.sweep(&mut records).await
        } else {
            0
        };

        // Pass 3: keyword override.
        let overridden = self.rules.apply_all(&mut records);

        let report = ModelRunReport {
            resumed: resumed_count,
            recovered_in_sweep: recovered,
            overridden,
            ..ModelRunReport::tally(&records)
        };
        Ok((records, report))
    }

    /// First-pass processing of one input.
    pub async fn process(&self, index: usize, input: &ProspectInput) -> TitleRecord {
        let mut record = TitleRecord::from_input(index, input);
        match input.scorable_title() {
            Some(title) => {
                let translated =
                    translate_with_retry(self.translator, self.sleeper, title, self.settings.translate_backoff)
                        .await;
                self.score_translation(&mut record, translated, 0).await;
            }
            None => record.outcome = ScoreOutcome::Skipped,
        }
        record
    }

    /// Give every failed record exactly one more translate-and-score attempt.
    /// Returns how many recovered.
    async fn sweep(&self, records: &mut [TitleRecord]) -> usize {
        let failed = records.iter().filter(|r| r.is_failed()).count();
        if failed == 0 {
            return 0;
        }
        info!(failed, "Retrying failed translations");

        let mut recovered = 0;
        for record in records.iter_mut().filter(|r| r.is_failed()) {
            let previous_attempts = match record.outcome {
                ScoreOutcome::Failed { attempts, .. } => attempts,
                _ => 0,
            };
            // Failed records always came from a scorable title.
            let title = record.title.clone();
            let translated = translate_once(self.translator, &title).await;
            self.score_translation(record, translated, previous_attempts)
                .await;

            if record.is_failed() {
                warn!(index = record.index, title = %record.title, "Retry failed");
            } else {
                info!(
                    index = record.index,
                    translated = %record.translated_title,
                    "Retry succeeded"
                );
                recovered += 1;
            }
        }
        recovered
    }

    /// Score a translation result into `record`.
    async fn score_translation(
        &self,
        record: &mut TitleRecord,
        translated: Result<String, TranslationFailure>,
        previous_attempts: u32,
    ) {
        let translated = match translated {
            Ok(translated) => translated,
            Err(failure) => {
                record.translated_title.clear();
                record.outcome = ScoreOutcome::Failed {
                    stage: FailureStage::Translation,
                    error: failure.cause.to_string(),
                    attempts: previous_attempts + failure.attempts,
                };
                return;
            }
        };

        let attempts = previous_attempts + 1;
        match self.model.score(&translated).await {
            Ok(score) => {
                record.outcome = ScoreOutcome::Scored {
                    score,
                    override_keyword: None,
                };
            }
            Err(e) => {
                record.outcome = ScoreOutcome::Failed {
                    stage: FailureStage::Scoring,
                    error: e.to_string(),
                    attempts,
                };
            }
        }
        record.translated_title = translated;
    }
}

fn log_record(record: &TitleRecord, total: usize) {
    let position = record.index + 1;
    match &record.outcome {
        ScoreOutcome::Scored { score, .. } => info!(
            index = record.index,
            id = %record.id,
            score = %score,
            translated = %record.translated_title,
            "[{position}/{total}] scored"
        ),
        ScoreOutcome::Skipped => info!(
            index = record.index,
            id = %record.id,
            "[{position}/{total}] skipped (blank title)"
        ),
        ScoreOutcome::Failed { stage, error, .. } => warn!(
            index = record.index,
            id = %record.id,
            stage = ?stage,
            error = %error,
            title = %record.title,
            "[{position}/{total}] failed"
        ),
        ScoreOutcome::Pending => {}
    }
}

/// Run the trained-model path over an input file and write the output file.
///
/// With `resume`, records already in the progress log are kept and the run
/// continues after them; otherwise the log is started fresh.
pub async fn classify_file(
    path: &ModelPath<'_>,
    input: &Path,
    output: &Path,
    resume: bool,
) -> Result<ModelRunReport> {
    let started = Utc::now();
    let inputs = load_inputs(input)?;
    let log_path = CheckpointLog::path_for(output);

    let (resumed, mut log) = if resume {
        let logged: Vec<TitleRecord> = CheckpointLog::load(&log_path)?;
        let restored = resume_prefix(logged, &inputs, |r| (Some(r.index), r.id.as_str()));
        // The log is replaced by exactly the restored prefix, dropping any
        // torn trailing write.
        let log = CheckpointLog::rewrite(&log_path, &restored)?;
        (restored, log)
    } else {
        (Vec::new(), CheckpointLog::create(&log_path)?)
    };

    let (records, mut report) = path.run(&inputs, resumed, Some(&mut log)).await?;

    let rows: Vec<ScoredRow> = records.iter().map(TitleRecord::to_row).collect();
    write_json_atomic(output, &rows)?;
    log.finish()?;

    report.started_at = started.to_rfc3339();
    report.elapsed_secs = (Utc::now() - started).num_seconds();

    info!(output = %output.display(), records = rows.len(), "Wrote scored titles");
    Ok(report)
}
