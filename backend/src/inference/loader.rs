use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::InferenceError;
use crate::config::ModelConfig;

/// A loaded model. Forward passes take `&self`; the weights are never mutated.
pub trait InferenceBackend: Send + Sync {
    /// Raw model outputs for a `(1, H, W, 3)` batch, one value per class.
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    fn describe(&self) -> String {
        "inference backend".to_string()
    }
}

/// Knows how to turn a model file into an [`InferenceBackend`].
pub trait BackendLoader: Send + Sync {
    fn load(
        &self,
        path: &Path,
        config: &ModelConfig,
    ) -> Result<Arc<dyn InferenceBackend>, InferenceError>;
}

/// Used when the crate is built without an inference engine.
pub struct DisabledBackendLoader;

impl BackendLoader for DisabledBackendLoader {
    fn load(
        &self,
        _path: &Path,
        _config: &ModelConfig,
    ) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
        Err(InferenceError::BackendDisabled)
    }
}

pub fn default_backend_loader() -> Arc<dyn BackendLoader> {
    #[cfg(feature = "torch")]
    {
        Arc::new(super::torch::TorchBackendLoader)
    }
    #[cfg(not(feature = "torch"))]
    {
        Arc::new(DisabledBackendLoader)
    }
}

pub enum ModelHandle {
    Ready(Arc<dyn InferenceBackend>),
    Unavailable,
}

/// Process-wide lazily loaded model.
///
/// Only a successful load is cached. Callers racing on the first load may each
/// read the file; the first instance stored wins and everyone converges on it.
/// A missing or unreadable file yields [`ModelHandle::Unavailable`] and is
/// retried on the next call.
pub struct ModelLoader {
    model_path: PathBuf,
    config: ModelConfig,
    backend_loader: Arc<dyn BackendLoader>,
    cached: OnceLock<Arc<dyn InferenceBackend>>,
}

impl ModelLoader {
    pub fn new(
        model_path: impl Into<PathBuf>,
        config: ModelConfig,
        backend_loader: Arc<dyn BackendLoader>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            config,
            backend_loader,
            cached: OnceLock::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.get().is_some()
    }

    pub fn load_model(&self) -> ModelHandle {
        if let Some(model) = self.cached.get() {
            return ModelHandle::Ready(model.clone());
        }

        if !self.model_path.exists() {
            log::warn!(
                "Model file not found at {}, serving demo results",
                self.model_path.display()
            );
            return ModelHandle::Unavailable;
        }

        match self.backend_loader.load(&self.model_path, &self.config) {
            Ok(model) => {
                log::info!(
                    "Model loaded from {} ({})",
                    self.model_path.display(),
                    model.describe()
                );
                // Losing the race just drops our copy.
                let _ = self.cached.set(model);
                match self.cached.get() {
                    Some(model) => ModelHandle::Ready(model.clone()),
                    None => ModelHandle::Unavailable,
                }
            }
            Err(e) => {
                log::error!(
                    "Failed to load model from {}: {}",
                    self.model_path.display(),
                    e
                );
                ModelHandle::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant;

    impl InferenceBackend for Constant {
        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![1.0])
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
    }

    impl BackendLoader for CountingLoader {
        fn load(
            &self,
            _path: &Path,
            _config: &ModelConfig,
        ) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(InferenceError::Model("corrupt weights".to_string()))
            } else {
                Ok(Arc::new(Constant))
            }
        }
    }

    fn counting(fail: bool) -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn missing_file_is_unavailable_without_touching_backend() {
        let backend = counting(false);
        let loader = ModelLoader::new("/nonexistent/model.pt", ModelConfig::default(), backend.clone());
        assert!(matches!(loader.load_model(), ModelHandle::Unavailable));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
        assert!(!loader.is_loaded());
    }

    #[test]
    fn successful_load_is_cached() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let backend = counting(false);
        let loader = ModelLoader::new(file.path(), ModelConfig::default(), backend.clone());

        assert!(matches!(loader.load_model(), ModelHandle::Ready(_)));
        assert!(matches!(loader.load_model(), ModelHandle::Ready(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
    }

    #[test]
    fn failed_load_is_retried() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let backend = counting(true);
        let loader = ModelLoader::new(file.path(), ModelConfig::default(), backend.clone());

        assert!(matches!(loader.load_model(), ModelHandle::Unavailable));
        assert!(matches!(loader.load_model(), ModelHandle::Unavailable));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_first_loads_converge_on_one_instance() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let loader = Arc::new(ModelLoader::new(
            file.path(),
            ModelConfig::default(),
            counting(false),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                std::thread::spawn(move || match loader.load_model() {
                    ModelHandle::Ready(model) => Arc::as_ptr(&model) as *const () as usize,
                    ModelHandle::Unavailable => 0,
                })
            })
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ptrs.iter().all(|p| *p != 0 && *p == ptrs[0]));
    }

    #[test]
    fn disabled_backend_reports_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let loader = ModelLoader::new(
            file.path(),
            ModelConfig::default(),
            Arc::new(DisabledBackendLoader),
        );
        assert!(matches!(loader.load_model(), ModelHandle::Unavailable));
    }
}
