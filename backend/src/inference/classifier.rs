use std::sync::Arc;

use super::loader::{InferenceBackend, ModelHandle, ModelLoader};
use super::preprocess::Preprocessor;
use super::InferenceError;
use crate::config::{ConfigError, ModelConfig};

pub const DEMO_LABEL: &str = "Healthy Leaf";
pub const DEMO_CONFIDENCE: f32 = 0.95;
pub const DEMO_MESSAGE: &str = "Mode demo - model belum dimuat";
pub const SUCCESS_MESSAGE: &str = "Klasifikasi berhasil";
pub const TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassScore {
    pub class_name: String,
    pub confidence: f32,
}

/// Outcome of one classification. Failures are values, not errors.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub success: bool,
    pub label: Option<String>,
    pub confidence: f32,
    /// Every known class, highest confidence first.
    pub ranked: Vec<ClassScore>,
    pub message: String,
    pub demo: bool,
}

impl ClassificationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            label: None,
            confidence: 0.0,
            ranked: Vec::new(),
            message: message.into(),
            demo: false,
        }
    }

    pub fn top(&self, k: usize) -> &[ClassScore] {
        &self.ranked[..self.ranked.len().min(k)]
    }
}

pub struct Classifier {
    loader: Arc<ModelLoader>,
    preprocessor: Preprocessor,
    classes: Vec<String>,
}

impl Classifier {
    pub fn new(loader: Arc<ModelLoader>, config: &ModelConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            loader,
            preprocessor: Preprocessor::from_config(&config.image)?,
            classes: config.classes.clone(),
        })
    }

    pub fn model_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    /// Loads the model ahead of the first request. `false` means demo mode for now.
    pub fn warm_up(&self) -> bool {
        matches!(self.loader.load_model(), ModelHandle::Ready(_))
    }

    pub fn classify(&self, raw: &[u8]) -> ClassificationResult {
        let model = match self.loader.load_model() {
            ModelHandle::Ready(model) => model,
            ModelHandle::Unavailable => return self.demo_result(),
        };

        match self.run(model.as_ref(), raw) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Classification failed: {}", e);
                ClassificationResult::failure(format!("Kesalahan saat klasifikasi: {}", e))
            }
        }
    }

    fn run(
        &self,
        model: &dyn InferenceBackend,
        raw: &[u8],
    ) -> Result<ClassificationResult, InferenceError> {
        let input = self.preprocessor.preprocess(raw)?;
        let outputs = model.forward(&input)?;
        if outputs.len() != self.classes.len() {
            return Err(InferenceError::OutputShape {
                expected: self.classes.len(),
                actual: outputs.len(),
            });
        }

        let probabilities = to_probabilities(&outputs)?;
        let best = argmax(&probabilities);

        Ok(ClassificationResult {
            success: true,
            label: Some(self.classes[best].clone()),
            confidence: probabilities[best],
            ranked: rank(&self.classes, &probabilities),
            message: SUCCESS_MESSAGE.to_string(),
            demo: false,
        })
    }

    fn demo_result(&self) -> ClassificationResult {
        let scores: Vec<f32> = self
            .classes
            .iter()
            .map(|class| if class == DEMO_LABEL { DEMO_CONFIDENCE } else { 0.0 })
            .collect();
        ClassificationResult {
            success: true,
            label: Some(DEMO_LABEL.to_string()),
            confidence: DEMO_CONFIDENCE,
            ranked: rank(&self.classes, &scores),
            message: DEMO_MESSAGE.to_string(),
            demo: true,
        }
    }
}

/// Model outputs that already form a distribution are kept as is; anything
/// else (logits) goes through a softmax. Results are clamped to `[0, 1]`.
pub fn to_probabilities(outputs: &[f32]) -> Result<Vec<f32>, InferenceError> {
    if outputs.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::Model("model produced non-finite output".to_string()));
    }
    let sum: f32 = outputs.iter().sum();
    let is_distribution =
        outputs.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() <= 1e-3;

    if is_distribution {
        return Ok(outputs.iter().map(|v| v.clamp(0.0, 1.0)).collect());
    }

    let max = outputs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = outputs.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    Ok(exps.iter().map(|e| (e / total).clamp(0.0, 1.0)).collect())
}

/// Index of the first maximal value.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = i;
        }
    }
    best
}

/// Pairs classes with scores, sorted descending. Ties keep class-index order.
pub fn rank(classes: &[String], scores: &[f32]) -> Vec<ClassScore> {
    let mut ranked: Vec<ClassScore> = classes
        .iter()
        .zip(scores)
        .map(|(class_name, confidence)| ClassScore {
            class_name: class_name.clone(),
            confidence: *confidence,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::loader::BackendLoader;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use ndarray::Array4;
    use std::io::Cursor;
    use std::path::Path;

    struct Fixed(Vec<f32>);

    impl InferenceBackend for Fixed {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            assert_eq!(input.shape(), &[1, 224, 224, 3]);
            Ok(self.0.clone())
        }
    }

    struct FixedLoader(Vec<f32>);

    impl BackendLoader for FixedLoader {
        fn load(
            &self,
            _path: &Path,
            _config: &ModelConfig,
        ) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
            Ok(Arc::new(Fixed(self.0.clone())))
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 12, Rgb([30, 140, 20])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn classifier_with(outputs: Vec<f32>, file: &tempfile::NamedTempFile) -> Classifier {
        let config = ModelConfig::default();
        let loader = ModelLoader::new(file.path(), config.clone(), Arc::new(FixedLoader(outputs)));
        Classifier::new(Arc::new(loader), &config).unwrap()
    }

    fn demo_classifier() -> Classifier {
        let config = ModelConfig::default();
        let loader = ModelLoader::new(
            "/nonexistent/model.pt",
            config.clone(),
            Arc::new(FixedLoader(vec![])),
        );
        Classifier::new(Arc::new(loader), &config).unwrap()
    }

    #[test]
    fn demo_mode_when_model_missing() {
        let result = demo_classifier().classify(b"anything");
        assert!(result.success);
        assert!(result.demo);
        assert_eq!(result.label.as_deref(), Some(DEMO_LABEL));
        assert!((result.confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.message, DEMO_MESSAGE);
        assert_eq!(result.ranked.len(), 9);
        assert_eq!(result.ranked[0].class_name, DEMO_LABEL);
        assert!(result.ranked[1..].iter().all(|s| s.confidence == 0.0));
    }

    #[test]
    fn argmax_picks_predicted_label() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let outputs = vec![0.05, 0.05, 0.05, 0.05, 0.6, 0.05, 0.05, 0.05, 0.05];
        let result = classifier_with(outputs, &file).classify(&png());
        assert!(result.success);
        assert!(!result.demo);
        assert_eq!(result.label.as_deref(), Some("Leaf Curl"));
        assert!((result.confidence - 0.6).abs() < 1e-6);
        assert_eq!(result.message, SUCCESS_MESSAGE);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let outputs = vec![0.1, 0.3, 0.1, 0.1, 0.1, 0.1, 0.1, 0.05, 0.05];
        let result = classifier_with(outputs, &file).classify(&png());
        assert_eq!(result.ranked.len(), 9);
        assert!(result
            .ranked
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        let order: Vec<&str> = result.ranked.iter().map(|s| s.class_name.as_str()).collect();
        assert_eq!(
            &order[..6],
            &["Damping Off", "Anthracnose", "Healthy Fruit", "Healthy Leaf", "Leaf Curl", "Leaf Spot"]
        );
        assert_eq!(result.top(TOP_K).len(), 5);
    }

    #[test]
    fn logits_are_softmaxed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let outputs = vec![2.0, -1.0, 0.5, 7.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let result = classifier_with(outputs, &file).classify(&png());
        assert_eq!(result.label.as_deref(), Some("Healthy Leaf"));
        let total: f32 = result.ranked.iter().map(|s| s.confidence).sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(result.ranked.iter().all(|s| (0.0..=1.0).contains(&s.confidence)));
    }

    #[test]
    fn undecodable_image_is_a_failure_result() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = classifier_with(vec![0.0; 9], &file).classify(b"not an image");
        assert!(!result.success);
        assert_eq!(result.confidence, 0.0);
        assert!(result.ranked.is_empty());
        assert!(result.label.is_none());
        assert!(result.message.starts_with("Kesalahan saat klasifikasi"));
    }

    #[test]
    fn wrong_output_width_is_a_failure_result() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = classifier_with(vec![0.5, 0.5], &file).classify(&png());
        assert!(!result.success);
        assert!(result.message.contains("expected 9"));
    }

    #[test]
    fn non_finite_output_is_rejected() {
        assert!(to_probabilities(&[f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn argmax_prefers_first_of_equal_maxima() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
    }
}
