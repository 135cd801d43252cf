// Location of the pre-fitted model artifacts.
//
// The classifier and its vectorizer are fitted elsewhere and dropped into a
// platform-appropriate directory (~/.local/share/titlesift/models/ on Linux)
// or wherever TITLESIFT_MODEL_DIR points.

use std::path::{Path, PathBuf};

/// ONNX export of the fitted classifier.
pub const MODEL_FILE: &str = "relevance_model.onnx";

/// JSON export of the fitted TF-IDF vectorizer.
pub const VECTORIZER_FILE: &str = "vectorizer.json";

/// Returns the default directory for the model artifacts.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("titlesift")
        .join("models")
}

/// Check whether both required artifact files exist.
pub fn model_files_present(dir: &Path) -> bool {
    dir.join(MODEL_FILE).exists() && dir.join(VECTORIZER_FILE).exists()
}
