// Titlesift: job-title relevance classification for prospect lists
//
// This is the library root. Each module corresponds to a major subsystem
// of the classification pipeline.

pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod llm;
pub mod merge;
pub mod output;
pub mod pacing;
pub mod pipeline;
pub mod records;
pub mod relevance;
pub mod translate;
