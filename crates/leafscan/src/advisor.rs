use tracing::info;
use crate::types::{AdvisoryEntry, DetectionResult, Priority, SensorReading};

/// One threshold rule. Rules are evaluated independently of each other.
struct AdvisoryRule {
    priority: Priority,
    applies: fn(&DetectionResult, &SensorReading) -> bool,
    issue: fn(&SensorReading) -> String,
    current: fn(&SensorReading) -> String,
    optimal: &'static str,
    action: &'static str,
}

fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn celsius(value: f64) -> String {
    format!("{value:.1}°C")
}

fn label_contains(result: &DetectionResult, needle: &str) -> bool {
    result.disease.to_lowercase().contains(needle)
}

const RULES: [AdvisoryRule; 6] = [
    AdvisoryRule {
        priority: Priority::High,
        applies: |r, s| (label_contains(r, "mold") || label_contains(r, "mildew")) && s.humidity > 75.0,
        issue: |s| format!("High humidity ({:.1}%) promoting fungal growth", s.humidity),
        current: |s| percent(s.humidity),
        optimal: "Below 60%",
        action: "Improve ventilation immediately, reduce watering frequency",
    },
    AdvisoryRule {
        priority: Priority::Medium,
        applies: |r, s| !r.is_healthy && s.soil_moisture < 25.0,
        issue: |s| format!("Low soil moisture ({:.1}%) weakening plant immunity", s.soil_moisture),
        current: |s| percent(s.soil_moisture),
        optimal: "40-60%",
        action: "Increase watering schedule while treating disease",
    },
    AdvisoryRule {
        priority: Priority::Medium,
        applies: |r, s| label_contains(r, "blight") && s.temperature > 30.0,
        issue: |s| format!("High temperature ({:.1}°C) creating stress and promoting blight", s.temperature),
        current: |s| celsius(s.temperature),
        optimal: "20-28°C",
        action: "Provide shade, improve air circulation, water in early morning",
    },
    AdvisoryRule {
        priority: Priority::Critical,
        applies: |_, s| s.soil_moisture < 15.0,
        issue: |s| format!("Extremely low soil moisture ({:.1}%)", s.soil_moisture),
        current: |s| percent(s.soil_moisture),
        optimal: "40-60%",
        action: "Water immediately - plant is severely stressed",
    },
    AdvisoryRule {
        priority: Priority::Critical,
        applies: |_, s| s.temperature > 35.0,
        issue: |s| format!("Dangerous temperature ({:.1}°C) for most plants", s.temperature),
        current: |s| celsius(s.temperature),
        optimal: "20-28°C",
        action: "Move to shade immediately, provide cooling",
    },
    AdvisoryRule {
        priority: Priority::High,
        applies: |_, s| s.humidity > 85.0,
        issue: |s| format!("Very high humidity ({:.1}%) - high disease risk", s.humidity),
        current: |s| percent(s.humidity),
        optimal: "50-70%",
        action: "Improve ventilation, reduce watering, increase spacing",
    },
];

/// Advisories triggered by the readings, in rule order
pub fn recommendations(result: &DetectionResult, reading: &SensorReading) -> Vec<AdvisoryEntry> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(result, reading))
        .map(|rule| AdvisoryEntry {
            priority: rule.priority,
            issue: (rule.issue)(reading),
            current: (rule.current)(reading),
            optimal: rule.optimal.to_string(),
            action: rule.action.to_string(),
        })
        .collect()
}

/// Attach advisories and the raw readings. The list is attached even when empty.
pub fn advise(mut result: DetectionResult, reading: &SensorReading) -> DetectionResult {
    let entries = recommendations(&result, reading);
    info!(
        soil_moisture = reading.soil_moisture,
        temperature = reading.temperature,
        humidity = reading.humidity,
        count = entries.len(),
        "sensor recommendations attached"
    );
    result.sensor_recommendations = Some(entries);
    result.sensor_data = Some(*reading);
    result
}
