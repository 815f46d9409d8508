use std::time::Duration;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use super::{VisionError, VisionModel};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Environment variable consulted when no key is configured
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Connection settings for the Generative Language API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VisionConfig {
    /// Never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl VisionConfig {
    /// Configured key, if it is not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Client for Gemini `generateContent`
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &VisionConfig, api_key: impl Into<String>) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VisionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// `None` when the configuration holds no key
    pub fn from_config(config: &VisionConfig) -> Result<Option<Self>, VisionError> {
        match config.api_key() {
            Some(key) => Self::new(config, key).map(Some),
            None => Ok(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models that support `generateContent`
    pub async fn list_models(&self) -> Result<Vec<String>, VisionError> {
        let url = format!("{}/models", self.endpoint);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let listing: ModelListing = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| VisionError::MalformedReply(e.to_string()))?;

        Ok(listing.generating_models())
    }

    /// Text-only round trip, used to check connectivity
    pub async fn ping(&self, prompt: &str) -> Result<String, VisionError> {
        self.generate(json!([{ "text": prompt }])).await
    }

    async fn generate(&self, parts: serde_json::Value) -> Result<String, VisionError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({ "contents": [{ "parts": parts }] });

        debug!(model = %self.model, "sending generateContent request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let parsed: GenerateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| VisionError::MalformedReply(e.to_string()))?;

        parsed.text().ok_or(VisionError::EmptyReply)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, VisionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(VisionError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            VisionError::Connection(self.endpoint.clone())
        } else {
            VisionError::Client(e.to_string())
        }
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn describe(&self, prompt: &str, image: &[u8], mime_type: &str) -> Result<String, VisionError> {
        self.generate(json!([
            { "text": prompt },
            { "inline_data": { "mime_type": mime_type, "data": STANDARD.encode(image) } }
        ]))
        .await
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

impl ModelListing {
    fn generating_models(self) -> Vec<String> {
        self.models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
            .map(|m| m.name)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_client_without_key() {
        assert!(GeminiClient::from_config(&VisionConfig::default()).unwrap().is_none());

        let blank = VisionConfig {
            api_key: Some("   ".to_string()),
            ..VisionConfig::default()
        };
        assert!(GeminiClient::from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn test_client_from_key() {
        let config = VisionConfig {
            api_key: Some("test-key".to_string()),
            endpoint: "http://localhost:9/v1beta/".to_string(),
            ..VisionConfig::default()
        };
        let client = GeminiClient::from_config(&config).unwrap().expect("Should build client");
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.endpoint, "http://localhost:9/v1beta");
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = VisionConfig {
            api_key: Some("secret".to_string()),
            ..VisionConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn test_response_text_extraction() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_generating_models_filter() {
        let raw = r#"{"models":[
            {"name":"models/gemini-1.5-flash","supportedGenerationMethods":["generateContent","countTokens"]},
            {"name":"models/embedding-001","supportedGenerationMethods":["embedContent"]},
            {"name":"models/legacy"}
        ]}"#;
        let listing: ModelListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.generating_models(), vec!["models/gemini-1.5-flash"]);

        let empty: ModelListing = serde_json::from_str("{}").unwrap();
        assert!(empty.generating_models().is_empty());
    }
}
