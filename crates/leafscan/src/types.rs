use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Scalar pixel statistics of one raster, shared by every classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureStatistics {
    pub pixel_count: u64,
    /// Mean red, green and blue values
    pub mean_rgb: [f64; 3],
    pub yellow_upper_ratio: f64,
    pub gray_powder_ratio: f64,
    pub brown_ratio: f64,
    pub white_ratio: f64,
    /// Population variance of the luma channel
    pub gray_variance: f64,
    /// Only present when edge detection is available
    pub edges: Option<EdgeStatistics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EdgeStatistics {
    pub edge_density: f64,
    pub circle_count: usize,
}

/// A label and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    pub confidence: f64,
}

impl Finding {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// A finding together with the advice and provenance of the strategy that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub disease: String,
    pub confidence: f64,
    pub plant_type: String,
    pub treatment: String,
    pub prevention: String,
    pub severity: String,
    pub model_version: String,
    pub detection_method: String,
}

impl Detection {
    /// Assemble the response record. Confidence becomes a percentage with two decimals.
    pub fn into_result(self, timestamp: DateTime<Local>) -> DetectionResult {
        let is_healthy = self.disease.to_lowercase().contains("healthy");
        DetectionResult {
            confidence: to_percentage(self.confidence),
            is_healthy,
            disease: self.disease,
            plant_type: self.plant_type,
            treatment: self.treatment,
            prevention: self.prevention,
            severity: self.severity,
            model_version: self.model_version,
            detection_method: self.detection_method,
            timestamp,
            sensor_recommendations: None,
            sensor_data: None,
        }
    }
}

fn to_percentage(confidence: f64) -> f64 {
    let percentage = confidence.clamp(0.0, 1.0) * 100.0;
    (percentage * 100.0).round() / 100.0
}

/// The composed diagnosis returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionResult {
    pub disease: String,
    /// Percentage in `[0, 100]`
    pub confidence: f64,
    pub is_healthy: bool,
    pub plant_type: String,
    pub treatment: String,
    pub prevention: String,
    pub severity: String,
    pub model_version: String,
    pub detection_method: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_recommendations: Option<Vec<AdvisoryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<SensorReading>,
}

/// Soil sensor readings supplied with a request. Zero means "not measured".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SensorReading {
    /// Soil moisture, percent
    pub soil_moisture: f64,
    /// Air temperature, degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

impl SensorReading {
    pub fn new(soil_moisture: f64, temperature: f64, humidity: f64) -> Self {
        Self {
            soil_moisture,
            temperature,
            humidity,
        }
    }

    /// True if any reading was supplied
    pub fn is_present(&self) -> bool {
        self.soil_moisture != 0.0 || self.temperature != 0.0 || self.humidity != 0.0
    }
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdvisoryEntry {
    pub priority: Priority,
    pub issue: String,
    pub current: String,
    pub optimal: String,
    pub action: String,
}

/// Optional collaborators the analyzer was constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Capabilities {
    /// Edge and circle detection is available to the specialized classifiers
    pub vision_library: bool,
    /// A hosted vision model is configured as fallback
    pub vision_model: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(disease: &str, confidence: f64) -> Detection {
        Detection {
            disease: disease.to_string(),
            confidence,
            plant_type: "Unknown".to_string(),
            treatment: String::new(),
            prevention: String::new(),
            severity: "Unknown".to_string(),
            model_version: "test".to_string(),
            detection_method: "test".to_string(),
        }
    }

    #[test]
    fn confidence_becomes_rounded_percentage() {
        let result = detection("Powdery Mildew", 0.85).into_result(Local::now());
        assert_eq!(result.confidence, 85.0);

        let result = detection("Powdery Mildew", 0.123456).into_result(Local::now());
        assert_eq!(result.confidence, 12.35);
    }

    #[test]
    fn confidence_percentage_stays_in_range() {
        assert_eq!(detection("x", 1.7).into_result(Local::now()).confidence, 100.0);
        assert_eq!(detection("x", -0.2).into_result(Local::now()).confidence, 0.0);
    }

    #[test]
    fn healthy_flag_follows_label() {
        assert!(detection("Healthy Plant", 0.8).into_result(Local::now()).is_healthy);
        assert!(detection("Tomato - HEALTHY", 0.8).into_result(Local::now()).is_healthy);
        assert!(!detection("Tomato - Leaf Mold", 0.8).into_result(Local::now()).is_healthy);
    }

    #[test]
    fn sensor_presence() {
        assert!(!SensorReading::default().is_present());
        assert!(SensorReading::new(0.0, -4.0, 0.0).is_present());
    }

    #[test]
    fn priority_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(Priority::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn optional_sections_are_omitted() {
        let result = detection("Healthy Plant", 0.8).into_result(Local::now());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("sensor_recommendations").is_none());
        assert!(json.get("sensor_data").is_none());
        assert_eq!(json["is_healthy"], true);
    }
}
