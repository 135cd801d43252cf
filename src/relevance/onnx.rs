// Local ONNX relevance model.
//
// The classifier was fitted on translated job titles and exported with
// skl2onnx, so it takes the vectorizer's dense float row and returns the
// predicted label as its first output. Everything runs on the local CPU.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use super::artifacts::{MODEL_FILE, VECTORIZER_FILE};
use super::traits::RelevanceModel;
use super::vectorizer::TfIdfVectorizer;
use crate::records::ModelScore;

/// Vectorizer + classifier pair, loaded once at startup.
pub struct OnnxRelevanceModel {
    // ort::Session::run takes &mut self and inference runs on spawn_blocking,
    // hence Arc<Mutex<_>>.
    session: Arc<Mutex<Session>>,
    vectorizer: Arc<TfIdfVectorizer>,
}

impl OnnxRelevanceModel {
    /// Load the classifier and vectorizer from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let vectorizer_path = model_dir.join(VECTORIZER_FILE);

        if !model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\nSet TITLESIFT_MODEL_DIR to the directory holding the fitted model.",
                model_path.display()
            );
        }
        if !vectorizer_path.exists() {
            anyhow::bail!(
                "Vectorizer file not found: {}\nSet TITLESIFT_MODEL_DIR to the directory holding the fitted model.",
                vectorizer_path.display()
            );
        }

        let vectorizer = TfIdfVectorizer::load(&vectorizer_path)?;

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        debug!(
            features = vectorizer.width(),
            "Loaded relevance model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            vectorizer: Arc::new(vectorizer),
        })
    }
}

#[async_trait]
impl RelevanceModel for OnnxRelevanceModel {
    async fn score(&self, translated_title: &str) -> Result<ModelScore> {
        let session = Arc::clone(&self.session);
        let vectorizer = Arc::clone(&self.vectorizer);
        let text = translated_title.to_string();

        tokio::task::spawn_blocking(move || {
            let row = vectorizer.transform(&text);
            let shape = [1i64, row.len() as i64];
            let input = Tensor::from_array((shape, row)).context("Failed to create input tensor")?;

            let mut session = session
                .lock()
                .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

            let outputs = session
                .run(ort::inputs! { vectorizer.onnx_input.as_str() => input })
                .context("ONNX inference failed")?;

            // skl2onnx classifiers emit the label first, typed after the
            // fitted classes; regressors emit a float.
            let output = &outputs[0];
            let label = if let Ok((_shape, labels)) = output.try_extract_tensor::<i64>() {
                RawLabel::Integer(*labels.first().context("Model returned no label")?)
            } else if let Ok((_shape, values)) = output.try_extract_tensor::<f32>() {
                RawLabel::Real(*values.first().context("Model returned no score")?)
            } else {
                let (_shape, names) = output
                    .try_extract_strings()
                    .context("Model output is not an int64, float or string tensor")?;
                RawLabel::Text(names.into_iter().next().context("Model returned no label")?)
            };
            let score = label_to_score(label);

            debug!(score = %score, title = %text, "Model scored title");
            Ok(score)
        })
        .await
        .context("spawn_blocking panicked")?
    }
}

/// First element of the classifier's label output.
#[derive(Debug, Clone, PartialEq)]
enum RawLabel {
    Integer(i64),
    Real(f32),
    Text(String),
}

/// The label is the class value itself, so it is passed through as-is.
fn label_to_score(label: RawLabel) -> ModelScore {
    match label {
        RawLabel::Integer(v) => ModelScore::Integer(v),
        RawLabel::Real(v) => ModelScore::Real(v as f64),
        RawLabel::Text(name) => ModelScore::Label(name),
    }
}
