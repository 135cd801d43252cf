// LLM batch classification: the generative model seam and the per-batch
// driver built on top of it.
//
// The TextGenerator trait defines the interface. GeminiClient implements it
// against the Generative Language API; tests substitute scripted fakes.
// `batch` owns the retry policy, `extract` owns response parsing and the
// structural checks a response must pass before it is accepted.

pub mod batch;
pub mod extract;
pub mod gemini;
pub mod prompts;
pub mod traits;
