// Title translation: trait-based abstraction over the translation service.
//
// The Translator trait defines the interface. GoogleTranslator implements it
// against the public Google translate endpoint; tests substitute scripted
// fakes. `retry` wraps any translator with the single fixed-backoff retry the
// trained-model path relies on.

pub mod google;
pub mod retry;
pub mod traits;
