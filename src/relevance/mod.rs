// Trained-model relevance scoring: trait-based abstraction plus the
// deterministic keyword override applied after scoring.
//
// The RelevanceModel trait defines the interface. OnnxRelevanceModel runs a
// pre-fitted vectorizer + classifier pair locally; tests substitute fakes.

pub mod artifacts;
pub mod onnx;
pub mod overrides;
pub mod traits;
pub mod vectorizer;
