// Trained-model path tests: blank-title handling, translation retry and the
// retry sweep, keyword override inside a run, checkpointing and resume.
// Translator and model are in-process fakes that count their calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use titlesift::checkpoint::CheckpointLog;
use titlesift::pacing::RecordingSleeper;
use titlesift::pipeline::model_path::{classify_file, ModelPath, ModelPathSettings};
use titlesift::records::{
    FailureStage, ModelScore, ProspectInput, ScoreOutcome, ScoredRow, TitleRecord,
    NOT_AVAILABLE, TRANSLATION_ERROR,
};
use titlesift::relevance::overrides::KeywordRules;
use titlesift::relevance::traits::RelevanceModel;
use titlesift::translate::traits::Translator;

// ============================================================
// Fakes
// ============================================================

/// Translates by dictionary lookup (falling back to the input itself).
/// Fails the first `failures` calls for each title listed in `flaky`, and
/// every call when `always_fail` is set.
#[derive(Default)]
struct FakeTranslator {
    dictionary: HashMap<String, String>,
    flaky: HashMap<String, u32>,
    always_fail: bool,
    calls: AtomicU32,
    seen: Mutex<HashMap<String, u32>>,
}

impl FakeTranslator {
    fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut seen = self.seen.lock().unwrap();
            let n = seen.entry(text.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if self.always_fail {
            return Err(anyhow!("translation service unavailable"));
        }
        if let Some(&failures) = self.flaky.get(text) {
            if attempt <= failures {
                return Err(anyhow!("connection reset"));
            }
        }
        Ok(self
            .dictionary
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

/// Scores every title 7, except titles containing "broken", which error.
#[derive(Default)]
struct FakeModel {
    calls: AtomicU32,
}

impl FakeModel {
    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceModel for FakeModel {
    async fn score(&self, translated_title: &str) -> Result<ModelScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if translated_title.contains("broken") {
            return Err(anyhow!("input shape mismatch"));
        }
        Ok(ModelScore::Integer(7))
    }
}

fn model_path<'a>(
    translator: &'a FakeTranslator,
    model: &'a FakeModel,
    sleeper: &'a RecordingSleeper,
    rules: &'a KeywordRules,
    retry_sweep: bool,
) -> ModelPath<'a> {
    ModelPath {
        translator,
        model,
        sleeper,
        rules,
        settings: ModelPathSettings {
            translate_backoff: Duration::from_millis(1000),
            retry_sweep,
        },
    }
}

async fn run_one(
    translator: &FakeTranslator,
    model: &FakeModel,
    sleeper: &RecordingSleeper,
    retry_sweep: bool,
    input: ProspectInput,
) -> TitleRecord {
    let rules = KeywordRules::default();
    let (mut records, _) = model_path(translator, model, sleeper, &rules, retry_sweep)
        .run(&[input], Vec::new(), None)
        .await
        .unwrap();
    records.remove(0)
}

// ============================================================
// Blank titles
// ============================================================

#[tokio::test]
async fn empty_title_makes_no_collaborator_calls() {
    let translator = FakeTranslator::default();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();

    let record = run_one(&translator, &model, &sleeper, true, ProspectInput::new("x", "")).await;

    assert_eq!(translator.calls(), 0);
    assert_eq!(model.calls(), 0);
    assert_eq!(record.outcome, ScoreOutcome::Skipped);

    let row = serde_json::to_value(record.to_row()).unwrap();
    assert_eq!(
        row,
        json!({
            "index": "00000",
            "id": "x",
            "title": "",
            "translated_title": "",
            "relevance_score": "N/A"
        })
    );
}

#[tokio::test]
async fn non_string_title_is_skipped() {
    let translator = FakeTranslator::default();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let input: ProspectInput = serde_json::from_value(json!({"id": "y", "title": null})).unwrap();

    let record = run_one(&translator, &model, &sleeper, true, input).await;
    assert_eq!(record.outcome, ScoreOutcome::Skipped);
    assert_eq!(translator.calls(), 0);
}

// ============================================================
// Translation retry and the retry sweep
// ============================================================

#[tokio::test]
async fn always_failing_translator_makes_exactly_two_attempts() {
    let translator = FakeTranslator::failing();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();

    let record = run_one(
        &translator,
        &model,
        &sleeper,
        false,
        ProspectInput::new("x", "Jefe de Planta"),
    )
    .await;

    assert_eq!(translator.calls(), 2);
    assert_eq!(model.calls(), 0);
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(1000)]);

    let row = record.to_row();
    assert_eq!(row.translated_title, TRANSLATION_ERROR);
    assert_eq!(row.relevance_score, NOT_AVAILABLE);
    assert!(matches!(
        record.outcome,
        ScoreOutcome::Failed {
            stage: FailureStage::Translation,
            attempts: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn retry_sweep_adds_exactly_one_attempt() {
    let translator = FakeTranslator::failing();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();

    let record = run_one(
        &translator,
        &model,
        &sleeper,
        true,
        ProspectInput::new("x", "Jefe de Planta"),
    )
    .await;

    assert_eq!(translator.calls(), 3);
    // The sweep attempt does not back off.
    assert_eq!(sleeper.calls().len(), 1);
    assert!(matches!(
        record.outcome,
        ScoreOutcome::Failed { attempts: 3, .. }
    ));
    assert_eq!(record.to_row().translated_title, TRANSLATION_ERROR);
}

#[tokio::test]
async fn retry_sweep_recovers_transient_failures_only() {
    let mut translator = FakeTranslator::with(&[("Jefe de Planta", "Plant Manager")]);
    translator.flaky.insert("Jefe de Planta".to_string(), 2);
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let rules = KeywordRules::default();

    let inputs = vec![
        ProspectInput::new("a", "Jefe de Planta"),
        ProspectInput::new("b", "Plant Manager"),
        ProspectInput::new("c", ""),
    ];
    let (records, report) = model_path(&translator, &model, &sleeper, &rules, true)
        .run(&inputs, Vec::new(), None)
        .await
        .unwrap();

    // a: two failures in the pass + one successful sweep attempt; b: one call.
    assert_eq!(translator.calls(), 4);
    assert_eq!(report.recovered_in_sweep, 1);
    assert_eq!(report.scored, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(records[0].translated_title, "Plant Manager");
    assert_eq!(records[0].to_row().relevance_score, "7");
}

#[tokio::test]
async fn scoring_failure_is_recorded_with_error_sentinels() {
    let translator = FakeTranslator::with(&[("kaputt", "broken title")]);
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();

    let record = run_one(&translator, &model, &sleeper, false, ProspectInput::new("z", "kaputt")).await;

    assert!(matches!(
        record.outcome,
        ScoreOutcome::Failed {
            stage: FailureStage::Scoring,
            ..
        }
    ));
    let row = record.to_row();
    assert_eq!(row.translated_title, TRANSLATION_ERROR);
    assert_eq!(row.relevance_score, NOT_AVAILABLE);
}

// ============================================================
// Whole-run properties
// ============================================================

#[tokio::test]
async fn one_record_per_input_with_override_applied() {
    let translator = FakeTranslator::with(&[
        ("Gerente de Finanzas", "Finance Manager"),
        ("Gerente de Planta", "Plant Manager"),
    ]);
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let rules = KeywordRules::default();

    let inputs = vec![
        ProspectInput::new("1", "Gerente de Finanzas"),
        ProspectInput::new("2", "Gerente de Planta"),
        ProspectInput::new("3", "  "),
    ];
    let (records, report) = model_path(&translator, &model, &sleeper, &rules, true)
        .run(&inputs, Vec::new(), None)
        .await
        .unwrap();

    let rows: Vec<ScoredRow> = records.iter().map(TitleRecord::to_row).collect();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(rows[0].relevance_score, "-7");
    assert_eq!(rows[1].relevance_score, "7");
    assert_eq!(rows[2].relevance_score, "N/A");
    assert_eq!(report.overridden, 1);

    // Never null or missing.
    for row in serde_json::to_value(&rows).unwrap().as_array().unwrap() {
        assert!(row["relevance_score"].is_string());
    }
}

fn write_input(dir: &std::path::Path, inputs: &[ProspectInput]) -> std::path::PathBuf {
    let path = dir.join("B_people.json");
    let raw: Vec<_> = inputs
        .iter()
        .map(|p| json!({"id": p.id, "title": p.title}))
        .collect();
    std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn classify_file_writes_rows_and_removes_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            ProspectInput::new("1", "Plant Manager"),
            ProspectInput::new("2", ""),
        ],
    );
    let out = dir.path().join("C_classified_titles.json");

    let translator = FakeTranslator::default();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let rules = KeywordRules::default();
    let report = classify_file(
        &model_path(&translator, &model, &sleeper, &rules, true),
        &input,
        &out,
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.total, 2);
    let rows: Vec<ScoredRow> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(rows[0].relevance_score, "7");
    assert_eq!(rows[1].relevance_score, "N/A");
    assert!(!CheckpointLog::path_for(&out).exists());
}

#[tokio::test]
async fn resume_continues_after_logged_records() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        ProspectInput::new("1", "Plant Manager"),
        ProspectInput::new("2", "Operations Director"),
        ProspectInput::new("3", "Sales Manager"),
    ];
    let input = write_input(dir.path(), &inputs);
    let out = dir.path().join("C_classified_titles.json");

    // First record done by an earlier run, plus a torn write of the second.
    let mut done = TitleRecord::from_input(0, &inputs[0]);
    done.translated_title = "Plant Manager".into();
    done.outcome = ScoreOutcome::Scored {
        score: ModelScore::Integer(9),
        override_keyword: None,
    };
    let log_path = CheckpointLog::path_for(&out);
    CheckpointLog::create(&log_path).unwrap().append(&[done]).unwrap();
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        f.write_all(b"{\"index\":1,\"id\":\"2\",\"ti").unwrap();
    }

    let translator = FakeTranslator::default();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let rules = KeywordRules::default();
    let report = classify_file(
        &model_path(&translator, &model, &sleeper, &rules, true),
        &input,
        &out,
        true,
    )
    .await
    .unwrap();

    assert_eq!(report.resumed, 1);
    assert_eq!(translator.calls(), 2);

    let rows: Vec<ScoredRow> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].relevance_score, "9");
    assert_eq!(rows[1].relevance_score, "7");
    assert_eq!(rows[2].relevance_score, "-7");
}

#[tokio::test]
async fn failed_resume_keeps_logged_progress() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        ProspectInput::new("1", "Plant Manager"),
        ProspectInput::new("2", "Sales Manager"),
    ];
    let input = write_input(dir.path(), &inputs);
    let out = dir.path().join("C_classified_titles.json");

    let mut done = TitleRecord::from_input(0, &inputs[0]);
    done.translated_title = "Plant Manager".into();
    done.outcome = ScoreOutcome::Scored {
        score: ModelScore::Integer(9),
        override_keyword: None,
    };
    let log_path = CheckpointLog::path_for(&out);
    CheckpointLog::create(&log_path).unwrap().append(&[done]).unwrap();

    // Block the log rewrite: its temp file path is taken by a directory.
    let file_name = log_path.file_name().unwrap().to_string_lossy().to_string();
    std::fs::create_dir(dir.path().join(format!(".{file_name}.tmp"))).unwrap();

    let translator = FakeTranslator::default();
    let model = FakeModel::default();
    let sleeper = RecordingSleeper::new();
    let rules = KeywordRules::default();
    let result = classify_file(
        &model_path(&translator, &model, &sleeper, &rules, true),
        &input,
        &out,
        true,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(translator.calls(), 0);
    let logged: Vec<TitleRecord> = CheckpointLog::load(&log_path).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].id, "1");
}
