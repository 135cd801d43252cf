// Generative-model classification path.
//
// The input is cut into fixed-size batches by position. Each batch costs one
// request against the run's RateBudget: the budget's interval is slept before
// the call, and once the daily cap is reached no further batch is issued and
// the remaining inputs are left out of the output.
//
// Blank titles stay in their batch position with a SKIPPED verdict but are
// not sent to the model. A batch made entirely of blank titles costs nothing.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::{progress_bar, resume_prefix};
use crate::checkpoint::{write_json_atomic, CheckpointLog};
use crate::llm::batch::{classify_batch, BatchPolicy, BatchStatus};
use crate::llm::extract::TitleVerdict;
use crate::llm::traits::TextGenerator;
use crate::pacing::{RateBudget, Sleeper};
use crate::records::{format_index, load_inputs, ClassifiedRow, ProspectInput, Verdict};

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmRunReport {
    pub total: usize,
    pub resumed: usize,
    pub relevant: usize,
    pub not_relevant: usize,
    pub errors: usize,
    pub skipped: usize,
    /// Batch requests issued this run.
    pub requests: u32,
    pub failed_batches: usize,
    /// Failed batches whose last error was an unusable response.
    pub faulted_batches: usize,
    /// Inputs left out because the daily cap was reached.
    pub absent: usize,
    pub cap_reached: bool,
    /// RFC 3339 start time of the file run.
    pub started_at: String,
    pub elapsed_secs: i64,
}

impl LlmRunReport {
    fn count(&mut self, rows: &[ClassifiedRow]) {
        for row in rows {
            match row.classification {
                Verdict::Relevant => self.relevant += 1,
                Verdict::NotRelevant => self.not_relevant += 1,
                Verdict::Error => self.errors += 1,
                Verdict::Skipped => self.skipped += 1,
            }
        }
    }
}

/// The collaborators and policy the LLM path runs with.
pub struct LlmPath<'a> {
    pub generator: &'a dyn TextGenerator,
    pub sleeper: &'a dyn Sleeper,
    pub policy: BatchPolicy,
    pub batch_size: usize,
}

impl LlmPath<'_> {
    /// Classify `inputs`, continuing after any `resumed` rows.
    ///
    /// Rows of each completed batch are appended to `checkpoint` before the
    /// next batch starts.
    pub async fn run(
        &self,
        inputs: &[ProspectInput],
        resumed: Vec<ClassifiedRow>,
        budget: &mut RateBudget,
        mut checkpoint: Option<&mut CheckpointLog>,
    ) -> Result<(Vec<ClassifiedRow>, LlmRunReport)> {
        if self.batch_size == 0 {
            bail!("Batch size must be at least 1");
        }

        let mut report = LlmRunReport {
            total: inputs.len(),
            resumed: resumed.len(),
            ..LlmRunReport::default()
        };
        report.count(&resumed);

        let start = resumed.len().min(inputs.len());
        let mut rows = resumed;
        let remaining = &inputs[start..];
        let batches = remaining.len().div_ceil(self.batch_size);
        let pb = progress_bar(batches, "Batches");

        for (batch_no, chunk) in remaining.chunks(self.batch_size).enumerate() {
            if budget.is_exhausted() {
                report.cap_reached = true;
                report.absent = remaining.len() - batch_no * self.batch_size;
                warn!(
                    requests = budget.requests_made(),
                    max = budget.max_requests(),
                    absent = report.absent,
                    "Daily request cap reached, stopping"
                );
                break;
            }

            let first_index = start + batch_no * self.batch_size;
            let batch_rows = self.classify_chunk(first_index, chunk, budget, &mut report).await;

            if let Some(log) = checkpoint.as_deref_mut() {
                log.append(&batch_rows)?;
            }
            report.count(&batch_rows);
            rows.extend(batch_rows);
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.requests = budget.requests_made();
        Ok((rows, report))
    }

    /// Classify one positional chunk into one row per input.
    async fn classify_chunk(
        &self,
        first_index: usize,
        chunk: &[ProspectInput],
        budget: &mut RateBudget,
        report: &mut LlmRunReport,
    ) -> Vec<ClassifiedRow> {
        let titles: Vec<&str> = chunk.iter().filter_map(|p| p.scorable_title()).collect();

        let verdicts: Vec<TitleVerdict> = if titles.is_empty() {
            Vec::new()
        } else {
            budget.throttle(self.sleeper).await;
            let outcome = classify_batch(self.generator, self.sleeper, &self.policy, &titles).await;
            budget.record_request();

            if let BatchStatus::Failed {
                fault,
                ref error,
                attempts,
            } = outcome.status
            {
                report.failed_batches += 1;
                if fault {
                    report.faulted_batches += 1;
                }
                warn!(
                    first_index,
                    titles = titles.len(),
                    attempts,
                    fault,
                    error = %error,
                    "Batch classified as ERROR"
                );
            }
            outcome.verdicts
        };
        let mut verdicts = verdicts.into_iter();

        chunk
            .iter()
            .enumerate()
            .map(|(offset, input)| {
                let index = first_index + offset;
                let (translated_title, classification) = if input.scorable_title().is_some() {
                    // One verdict per scorable title, in order.
                    let verdict = verdicts.next().unwrap_or_else(TitleVerdict::error);
                    (verdict.translated_title, verdict.verdict)
                } else {
                    (String::new(), Verdict::Skipped)
                };

                info!(
                    index,
                    id = %input.id_text(),
                    classification = %classification,
                    "Classified"
                );
                ClassifiedRow {
                    index: format_index(index),
                    id: input.id_text(),
                    title: input.title_text(),
                    translated_title,
                    classification,
                }
            })
            .collect()
    }
}

/// Run the LLM path over an input file and write the output file.
///
/// With `resume`, rows already in the progress log are kept and the run
/// continues after them; otherwise the log is started fresh.
pub async fn classify_file(
    path: &LlmPath<'_>,
    budget: &mut RateBudget,
    input: &Path,
    output: &Path,
    resume: bool,
) -> Result<LlmRunReport> {
    let started = Utc::now();
    let inputs = load_inputs(input)?;
    let log_path = CheckpointLog::path_for(output);

    let (resumed, mut log) = if resume {
        let logged: Vec<ClassifiedRow> = CheckpointLog::load(&log_path)?;
        let restored = resume_prefix(logged, &inputs, |r| {
            (r.index.parse().ok(), r.id.as_str())
        });
        // The log is replaced by exactly the restored prefix, dropping any
        // torn trailing write.
        let log = CheckpointLog::rewrite(&log_path, &restored)?;
        (restored, log)
    } else {
        (Vec::new(), CheckpointLog::create(&log_path)?)
    };

    let (rows, mut report) = path.run(&inputs, resumed, budget, Some(&mut log)).await?;

    write_json_atomic(output, &rows)?;
    log.finish()?;

    report.started_at = started.to_rfc3339();
    report.elapsed_secs = (Utc::now() - started).num_seconds();

    info!(output = %output.display(), rows = rows.len(), "Wrote classified titles");
    Ok(report)
}
