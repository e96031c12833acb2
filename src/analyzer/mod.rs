// Analyzer module: windowing plus the trend, extrema and deviation analyses.

pub mod series;
pub mod stats;
pub mod trend;
pub mod extrema;
pub mod deviation;
pub mod history;
pub mod engine;

// Re-export the main pieces for ease of use.
pub use engine::AnalysisEngine;
pub use history::History;
pub use stats::Shortcuts;
