//! Fallback diagnosis by a hosted vision-language model.
//!
//! The model is asked for a strict JSON reply, but replies routinely wrap the
//! object in prose or code fences. [`extract_json_object`] pulls out the first
//! balanced object and [`VisionReport`] tolerates missing fields. Every failure
//! along the way is logged and reported as "no result".

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use crate::types::Detection;

pub use gemini::{GeminiClient, VisionConfig};

/// Upper bound for confidences reported by the vision model
pub const MAX_VISION_CONFIDENCE: f64 = 0.95;
/// Used when the reply carries no usable confidence
pub const DEFAULT_VISION_CONFIDENCE: f64 = 0.8;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("No API key configured for the vision model")]
    MissingCredentials,

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Cannot reach vision endpoint at {0}")]
    Connection(String),

    #[error("Vision request timed out after {0}s")]
    Timeout(u64),

    #[error("Vision model returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Vision model returned no text")]
    EmptyReply,

    #[error("Malformed vision reply: {0}")]
    MalformedReply(String),
}

/// A hosted model that answers a text prompt about one image
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Send the prompt together with the encoded image and return the raw text reply
    async fn describe(&self, prompt: &str, image: &[u8], mime_type: &str) -> Result<String, VisionError>;
}

/// Structured reply of the vision model. Every field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisionReport {
    #[serde(default)]
    pub plant_species: Option<String>,
    #[serde(default)]
    pub disease_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub visual_symptoms: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub prevention: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Accepts `0.9`, `"0.9"` or `null`; anything else counts as absent
fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

impl VisionReport {
    /// Parse a free-text model reply
    pub fn from_reply(reply: &str) -> Result<Self, VisionError> {
        let object = extract_json_object(reply)
            .ok_or_else(|| VisionError::MalformedReply("no JSON object in reply".to_string()))?;
        serde_json::from_str(object).map_err(|e| VisionError::MalformedReply(e.to_string()))
    }

    /// Confidence in `[0, 0.95]`
    pub fn confidence(&self) -> f64 {
        match self.confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, MAX_VISION_CONFIDENCE),
            _ => DEFAULT_VISION_CONFIDENCE,
        }
    }

    pub fn into_detection(self) -> Detection {
        let confidence = self.confidence();
        let plant = self.plant_species.unwrap_or_else(|| "Unknown".to_string());
        let disease = self.disease_name.unwrap_or_else(|| "Unknown".to_string());

        Detection {
            disease: format!("{plant} - {disease}"),
            confidence,
            plant_type: plant,
            treatment: self.treatment.unwrap_or_else(|| "Monitor plant health".to_string()),
            prevention: self.prevention.unwrap_or_else(|| "Good agricultural practices".to_string()),
            severity: self.severity.unwrap_or_else(|| "Unknown".to_string()),
            model_version: "Enhanced Gemini AI".to_string(),
            detection_method: "Google Gemini Vision".to_string(),
        }
    }
}

/// The first balanced `{...}` in `text`. Braces inside JSON strings are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Asks the configured vision model, if any, and swallows its failures
pub struct VisionFallback {
    model: Option<Box<dyn VisionModel>>,
    prompt: String,
}

impl VisionFallback {
    pub fn new(model: Option<Box<dyn VisionModel>>) -> Self {
        Self {
            model,
            prompt: prompt::analysis_prompt(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// `None` when no model is configured or the exchange fails in any way
    pub async fn consult(&self, image: &[u8]) -> Option<VisionReport> {
        let model = self.model.as_deref()?;
        let mime_type = image::guess_format(image)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/jpeg");

        debug!(model = model.name(), mime_type, bytes = image.len(), "consulting vision model");
        let reply = match model.describe(&self.prompt, image, mime_type).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = model.name(), error = %e, "vision model call failed");
                return None;
            }
        };

        match VisionReport::from_reply(&reply) {
            Ok(report) => {
                info!(
                    model = model.name(),
                    plant = ?report.plant_species,
                    disease = ?report.disease_name,
                    "vision model answered"
                );
                Some(report)
            }
            Err(e) => {
                warn!(model = model.name(), error = %e, "discarding vision reply");
                None
            }
        }
    }
}

impl Default for VisionFallback {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Replays a canned reply
#[cfg(test)]
pub(crate) struct StaticVisionModel {
    reply: Result<String, u16>,
}

#[cfg(test)]
impl StaticVisionModel {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self { reply: Ok(reply.into()) }
    }

    /// Fails every call with the given HTTP status
    pub fn failing(status: u16) -> Self {
        Self { reply: Err(status) }
    }
}

#[cfg(test)]
#[async_trait]
impl VisionModel for StaticVisionModel {
    fn name(&self) -> &str {
        "static"
    }

    async fn describe(&self, _prompt: &str, _image: &[u8], _mime_type: &str) -> Result<String, VisionError> {
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(VisionError::Status {
                status: *status,
                body: "unavailable".to_string(),
            }),
        }
    }
}
