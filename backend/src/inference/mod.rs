pub mod classifier;
pub mod loader;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

pub use classifier::{ClassScore, ClassificationResult, Classifier, TOP_K};
pub use loader::{default_backend_loader, BackendLoader, InferenceBackend, ModelHandle, ModelLoader};
pub use preprocess::{PreprocessError, Preprocessor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(#[from] PreprocessError),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model returned {actual} outputs, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("No inference backend compiled in (build with the `torch` feature)")]
    BackendDisabled,
}
