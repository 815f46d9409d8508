use leafscan::{
    algorithms::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IMAGE_SIZE},
    server::DEFAULT_BODY_LIMIT,
    vision::gemini::API_KEY_ENV,
    Analyzer, GeminiClient, UploadArchive, VisionConfig, VisionError,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    VisionError(#[from] VisionError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Where uploads are archived; `None` keeps nothing
    pub upload_dir: Option<PathBuf>,
    pub body_limit_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            upload_dir: Some(PathBuf::from("uploads")),
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Detection settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AnalysisSection {
    pub image_size: u32,
    pub confidence_threshold: f64,
    /// Edge and circle detection for the specialized classifiers
    pub vision_library: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            vision_library: true,
        }
    }
}

/// Complete service configuration. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct LeafScanConfig {
    pub server: ServerSection,
    pub analysis: AnalysisSection,
    pub vision: VisionConfig,
}

impl LeafScanConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: LeafScanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: LeafScanConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ConfigError::UnsupportedFileFormat),
        }
    }

    /// The API key is never included
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.image_size == 0 {
            return Err(ConfigError::Invalid("analysis.image_size must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.analysis.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "analysis.confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid("server.body_limit_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Fill in the API key from the environment when the file has none
    pub fn resolve_credentials(self) -> Self {
        self.with_api_key_from(|name| std::env::var(name).ok())
    }

    pub fn with_api_key_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.vision.api_key().is_none() {
            self.vision.api_key = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty());
        }
        self
    }

    pub fn vision_client(&self) -> Result<Option<GeminiClient>, ConfigError> {
        Ok(GeminiClient::from_config(&self.vision)?)
    }

    pub fn build_analyzer(&self) -> Result<Analyzer, ConfigError> {
        let mut builder = Analyzer::builder()
            .image_size(self.analysis.image_size)
            .confidence_threshold(self.analysis.confidence_threshold)
            .vision_library(self.analysis.vision_library);

        if let Some(client) = self.vision_client()? {
            builder = builder.vision_model(Box::new(client));
        }
        Ok(builder.build())
    }

    pub fn upload_archive(&self) -> Result<Option<UploadArchive>, ConfigError> {
        self.server
            .upload_dir
            .as_ref()
            .map(UploadArchive::new)
            .transpose()
            .map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LeafScanConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.server.body_limit_bytes, 16 * 1024 * 1024);
        assert_eq!(config.analysis.image_size, 256);
        assert_eq!(config.analysis.confidence_threshold, 0.7);
        assert_eq!(config.vision.model, "gemini-1.5-flash");
        assert_eq!(config.vision.timeout_secs, 30);
        assert!(config.vision.api_key.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = LeafScanConfig::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:8080"

            [analysis]
            vision_library = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.upload_dir, Some(PathBuf::from("uploads")));
        assert!(!config.analysis.vision_library);
        assert_eq!(config.analysis.image_size, 256);
    }

    #[test]
    fn test_json_and_validation() {
        let config = LeafScanConfig::from_json(r#"{"vision": {"model": "gemini-1.5-pro"}}"#).unwrap();
        assert_eq!(config.vision.model, "gemini-1.5-pro");

        let invalid = LeafScanConfig::from_json(r#"{"analysis": {"confidence_threshold": 1.5}}"#);
        assert!(matches!(invalid, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("leafscan.toml");
        fs::write(&toml_path, "[analysis]\nimage_size = 128\n").unwrap();
        assert_eq!(LeafScanConfig::from_file(&toml_path).unwrap().analysis.image_size, 128);

        let yaml_path = dir.path().join("leafscan.yaml");
        fs::write(&yaml_path, "analysis: {}").unwrap();
        assert!(matches!(
            LeafScanConfig::from_file(&yaml_path),
            Err(ConfigError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_api_key_from_environment() {
        let config = LeafScanConfig::default()
            .with_api_key_from(|name| (name == "GEMINI_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.vision.api_key(), Some("from-env"));

        let mut explicit = LeafScanConfig::default();
        explicit.vision.api_key = Some("from-file".to_string());
        let explicit = explicit.with_api_key_from(|_| Some("from-env".to_string()));
        assert_eq!(explicit.vision.api_key(), Some("from-file"));
    }

    #[test]
    fn test_api_key_never_written() {
        let mut config = LeafScanConfig::default();
        config.vision.api_key = Some("top-secret".to_string());
        assert!(!config.to_toml().unwrap().contains("top-secret"));
        assert!(!config.to_json().unwrap().contains("top-secret"));
    }

    #[test]
    fn test_analyzer_without_key_has_no_vision_model() {
        let analyzer = LeafScanConfig::default().build_analyzer().unwrap();
        assert!(!analyzer.capabilities().vision_model);
    }

    #[test]
    fn test_upload_archive_optional() {
        let mut config = LeafScanConfig::default();
        config.server.upload_dir = None;
        assert!(config.upload_archive().unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        config.server.upload_dir = Some(dir.path().join("uploads"));
        let archive = config.upload_archive().unwrap().expect("Should create archive");
        assert!(archive.dir().is_dir());
    }
}
