use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CLASSES: [&str; 9] = [
    "Anthracnose",
    "Damping Off",
    "Healthy Fruit",
    "Healthy Leaf",
    "Leaf Curl",
    "Leaf Spot",
    "Veinal Mottle",
    "Whitefly",
    "Yellowish",
];

pub const DEFAULT_HEALTHY_CLASSES: [&str; 2] = ["Healthy Fruit", "Healthy Leaf"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid model config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Model metadata. Class labels are listed in the model's output index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub version: f32,
    pub model_path: PathBuf,
    pub classes: Vec<String>,
    pub healthy_classes: Vec<String>,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub channels: u32,
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub resize_method: String,
    #[serde(default)]
    pub input_layout: InputLayout,
}

/// Memory layout the serialized model expects for its input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            model_path: PathBuf::from("ml_models/chiliguard_model_v1.pt"),
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            healthy_classes: DEFAULT_HEALTHY_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            image: ImageConfig {
                size: vec![224, 224],
                channels: 3,
                preprocessing: PreprocessingConfig {
                    resize_method: "lanczos3".to_string(),
                    input_layout: InputLayout::Nchw,
                },
            },
        }
    }
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: ModelConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("Loading model config from {}", path.display());
            Self::load(path)
        } else {
            log::info!(
                "Model config {} not found, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classes.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "classes",
                value: "[]".to_string(),
            });
        }
        if self.image.channels != 3 {
            return Err(ConfigError::InvalidValue {
                key: "image.channels",
                value: self.image.channels.to_string(),
            });
        }
        self.image.dimensions()?;
        self.image.filter()?;
        for healthy in &self.healthy_classes {
            if !self.classes.contains(healthy) {
                log::warn!("Healthy class '{}' is not a model class", healthy);
            }
        }
        Ok(())
    }
}

impl ImageConfig {
    /// Target (width, height) for the model input.
    pub fn dimensions(&self) -> Result<(u32, u32), ConfigError> {
        match self.size.as_slice() {
            [w, h] if *w > 0 && *h > 0 => Ok((*w, *h)),
            _ => Err(ConfigError::InvalidValue {
                key: "image.size",
                value: format!("{:?}", self.size),
            }),
        }
    }

    pub fn filter(&self) -> Result<FilterType, ConfigError> {
        match self.preprocessing.resize_method.to_lowercase().as_str() {
            "lanczos3" | "lanczos" => Ok(FilterType::Lanczos3),
            "catmullrom" | "bicubic" => Ok(FilterType::CatmullRom),
            "gaussian" => Ok(FilterType::Gaussian),
            "triangle" | "bilinear" => Ok(FilterType::Triangle),
            "nearest" => Ok(FilterType::Nearest),
            other => Err(ConfigError::InvalidValue {
                key: "image.preprocessing.resize_method",
                value: other.to_string(),
            }),
        }
    }
}

/// Process configuration, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    pub jwt_secret: String,
    pub model_config_path: PathBuf,
    pub model_path_override: Option<PathBuf>,
    pub password_iterations: u32,
    pub max_upload_bytes: usize,
}

const DEFAULT_JWT_SECRET: &str = "chiliguard-development-secret";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 8081u16)?;
        let password_iterations = parse_or(&lookup, "PASSWORD_ITERATIONS", 100_000u32)?;
        let max_upload_mb = parse_or(&lookup, "MAX_UPLOAD_MB", 10usize)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
            })?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                log::warn!("JWT_SECRET is not set, using the development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            port,
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("chiliguard.db")),
            media_root: lookup("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("media")),
            jwt_secret,
            model_config_path: lookup("MODEL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/model.yaml")),
            model_path_override: lookup("MODEL_PATH").map(PathBuf::from),
            password_iterations,
            max_upload_bytes,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
        assert!(config.model_path_override.is_none());
    }

    #[test]
    fn environment_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("MAX_UPLOAD_MB", "2"),
            ("JWT_SECRET", "s3cret"),
            ("MODEL_PATH", "/models/leaf.pt"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(
            config.model_path_override,
            Some(PathBuf::from("/models/leaf.pt"))
        );
    }

    #[test]
    fn unparsable_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn overflowing_upload_limit_is_rejected() {
        let huge = usize::MAX.to_string();
        let err = AppConfig::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", huge.as_str())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "MAX_UPLOAD_MB", .. }));
    }

    #[test]
    fn default_model_config_has_nine_classes() {
        let config = ModelConfig::default();
        assert_eq!(config.classes.len(), 9);
        assert_eq!(config.image.dimensions().unwrap(), (224, 224));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_model_config_parses() {
        let yaml = r#"
version: 1.1
model_path: models/leaf.pt
classes: ["Healthy Leaf", "Leaf Spot"]
healthy_classes: ["Healthy Leaf"]
image:
  size: [128, 128]
  channels: 3
  preprocessing:
    resize_method: triangle
    input_layout: nhwc
"#;
        let config = ModelConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.classes.len(), 2);
        assert_eq!(config.image.dimensions().unwrap(), (128, 128));
        assert_eq!(config.image.preprocessing.input_layout, InputLayout::Nhwc);
    }

    #[test]
    fn yaml_with_bad_size_is_rejected() {
        let yaml = r#"
version: 1.0
model_path: m.pt
classes: ["A"]
healthy_classes: []
image:
  size: [224]
  channels: 3
  preprocessing:
    resize_method: lanczos3
"#;
        assert!(ModelConfig::from_yaml(yaml).is_err());
    }
}
