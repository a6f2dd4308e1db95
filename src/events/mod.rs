// Event classification module
// Feature-based drum hit classification with an ML/heuristic fallback

pub mod backend;
pub mod heuristic;
pub mod model;
pub mod types;

pub use backend::{
    classify, default_model_path, Classification, Classifier, ClassifierError, SkippedOnset,
    DEFAULT_WINDOW_SECS,
};
pub use heuristic::{ClassificationResult, ClassifierConfig, HeuristicClassifier};
pub use model::{ReferenceModel, ReferenceSample};
pub use types::{ClassifiedHit, ClassifierMode, EventFeatures, UNKNOWN_LABEL};
