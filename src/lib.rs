pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod pose;
pub mod stage;

pub use detector::PlankDetector;
pub use error::{InferenceError, InitializationError};
pub use stage::{DetectionResult, ErrorEvent, ErrorLog, EvaluatorState, Stage, StageEvaluator};
