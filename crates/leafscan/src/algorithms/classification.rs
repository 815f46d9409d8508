use tracing::{debug, info, warn};
use crate::{
    error::{LeafScanError, Result},
    traits::Classifier,
    types::{Detection, FeatureStatistics, Finding},
};

/// A specialized finding must exceed this confidence to win the chain
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

const SPECIALIZED_METHOD: &str = "Specialized Algorithm";

/// Yellow upper surface, gray powder underneath and a rough texture.
/// Each indicator adds a fixed weight; the total is capped.
#[derive(Debug, Clone)]
pub struct TomatoLeafMold {
    pub yellow_upper_ratio: f64,
    pub gray_powder_ratio: f64,
    pub texture_variance: f64,
    pub yellow_weight: f64,
    pub powder_weight: f64,
    pub texture_weight: f64,
    pub max_confidence: f64,
    /// Totals at or below this are not reported
    pub report_threshold: f64,
}

impl Default for TomatoLeafMold {
    fn default() -> Self {
        Self {
            yellow_upper_ratio: 0.12,
            gray_powder_ratio: 0.08,
            texture_variance: 800.0,
            yellow_weight: 0.4,
            powder_weight: 0.3,
            texture_weight: 0.3,
            max_confidence: 0.95,
            report_threshold: 0.7,
        }
    }
}

impl TomatoLeafMold {
    pub const LABEL: &'static str = "Tomato - Leaf Mold";

    pub fn score(&self, stats: &FeatureStatistics) -> f64 {
        let mut confidence = 0.0;
        if stats.yellow_upper_ratio > self.yellow_upper_ratio {
            confidence += self.yellow_weight;
        }
        if stats.gray_powder_ratio > self.gray_powder_ratio {
            confidence += self.powder_weight;
        }
        if stats.gray_variance > self.texture_variance {
            confidence += self.texture_weight;
        }
        f64::min(confidence, self.max_confidence)
    }
}

impl Classifier for TomatoLeafMold {
    fn name(&self) -> &'static str {
        "tomato_leaf_mold"
    }

    fn evaluate(&self, stats: &FeatureStatistics) -> Result<Option<Finding>> {
        let confidence = self.score(stats);
        if confidence > self.report_threshold {
            Ok(Some(Finding::new(Self::LABEL, confidence)))
        } else {
            Ok(None)
        }
    }

    fn diagnose(&self, finding: Finding) -> Detection {
        Detection {
            disease: finding.label,
            confidence: finding.confidence,
            plant_type: "Tomato".to_string(),
            treatment: "Increase ventilation, reduce humidity, apply copper-based fungicide".to_string(),
            prevention: "Ensure good air circulation, water at base of plants, avoid overhead watering".to_string(),
            severity: "Moderate to Severe".to_string(),
            model_version: "Enhanced Tomato Mold Detection".to_string(),
            detection_method: SPECIALIZED_METHOD.to_string(),
        }
    }
}

/// Concentric target rings, with a brown-tissue fallback when no rings are found
#[derive(Debug, Clone)]
pub struct EarlyBlight {
    /// More circles than this count as the ring pattern
    pub min_circles: usize,
    pub ring_confidence: f64,
    pub brown_ratio: f64,
    pub brown_confidence: f64,
}

impl Default for EarlyBlight {
    fn default() -> Self {
        Self {
            min_circles: 3,
            ring_confidence: 0.8,
            brown_ratio: 0.15,
            brown_confidence: 0.7,
        }
    }
}

impl EarlyBlight {
    pub const LABEL: &'static str = "Tomato - Early Blight";
}

impl Classifier for EarlyBlight {
    fn name(&self) -> &'static str {
        "early_blight"
    }

    fn evaluate(&self, stats: &FeatureStatistics) -> Result<Option<Finding>> {
        let edges = stats
            .edges
            .ok_or(LeafScanError::MissingDependency("circle detection"))?;

        if edges.circle_count > self.min_circles {
            return Ok(Some(Finding::new(Self::LABEL, self.ring_confidence)));
        }
        if stats.brown_ratio > self.brown_ratio {
            return Ok(Some(Finding::new(Self::LABEL, self.brown_confidence)));
        }
        Ok(None)
    }

    fn diagnose(&self, finding: Finding) -> Detection {
        Detection {
            disease: finding.label,
            confidence: finding.confidence,
            plant_type: "Tomato".to_string(),
            treatment: "Remove affected leaves, apply fungicide, ensure proper spacing".to_string(),
            prevention: "Crop rotation, resistant varieties, proper spacing".to_string(),
            severity: "Moderate".to_string(),
            model_version: "Enhanced Early Blight Detection".to_string(),
            detection_method: SPECIALIZED_METHOD.to_string(),
        }
    }
}

/// White coating over a smooth surface
#[derive(Debug, Clone)]
pub struct PowderyMildew {
    pub white_ratio: f64,
    pub max_edge_density: f64,
    pub confidence: f64,
}

impl Default for PowderyMildew {
    fn default() -> Self {
        Self {
            white_ratio: 0.15,
            max_edge_density: 0.1,
            confidence: 0.85,
        }
    }
}

impl PowderyMildew {
    pub const LABEL: &'static str = "Powdery Mildew";
}

impl Classifier for PowderyMildew {
    fn name(&self) -> &'static str {
        "powdery_mildew"
    }

    fn evaluate(&self, stats: &FeatureStatistics) -> Result<Option<Finding>> {
        let edges = stats
            .edges
            .ok_or(LeafScanError::MissingDependency("edge detection"))?;

        if stats.white_ratio > self.white_ratio && edges.edge_density < self.max_edge_density {
            Ok(Some(Finding::new(Self::LABEL, self.confidence)))
        } else {
            Ok(None)
        }
    }

    fn diagnose(&self, finding: Finding) -> Detection {
        Detection {
            disease: finding.label,
            confidence: finding.confidence,
            plant_type: "Unknown".to_string(),
            treatment: "Apply sulfur fungicide, improve air circulation, remove affected leaves".to_string(),
            prevention: "Proper spacing, good ventilation, resistant varieties".to_string(),
            severity: "Moderate".to_string(),
            model_version: "Enhanced Powdery Mildew Detection".to_string(),
            detection_method: SPECIALIZED_METHOD.to_string(),
        }
    }
}

/// Mean-color heuristic. Never abstains.
#[derive(Debug, Clone, Default)]
pub struct GeneralPlantAnalysis;

impl GeneralPlantAnalysis {
    pub fn assess(&self, stats: &FeatureStatistics) -> Finding {
        let [red, green, blue] = stats.mean_rgb;

        if green > red && green > blue {
            if green > 140.0 {
                Finding::new("Healthy Plant", 0.8)
            } else {
                Finding::new("Nutrient Deficiency", 0.7)
            }
        } else if red > 120.0 && green < 100.0 {
            Finding::new("Fungal Infection", 0.75)
        } else {
            Finding::new("Environmental Stress", 0.6)
        }
    }
}

impl Classifier for GeneralPlantAnalysis {
    fn name(&self) -> &'static str {
        "general_plant_analysis"
    }

    fn requires_vision_library(&self) -> bool {
        false
    }

    fn evaluate(&self, stats: &FeatureStatistics) -> Result<Option<Finding>> {
        Ok(Some(self.assess(stats)))
    }

    fn diagnose(&self, finding: Finding) -> Detection {
        Detection {
            disease: finding.label,
            confidence: finding.confidence,
            plant_type: "Unknown".to_string(),
            treatment: "Monitor plant health and provide proper care".to_string(),
            prevention: "Maintain good growing conditions".to_string(),
            severity: "Unknown".to_string(),
            model_version: "General Analysis".to_string(),
            detection_method: "Color Analysis".to_string(),
        }
    }
}

/// Ordered classifiers; the first confident finding wins
pub struct ClassifierChain {
    classifiers: Vec<Box<dyn Classifier>>,
    threshold: f64,
}

impl ClassifierChain {
    pub fn new(classifiers: Vec<Box<dyn Classifier>>, threshold: f64) -> Self {
        Self {
            classifiers,
            threshold,
        }
    }

    /// Tomato leaf mold, early blight, powdery mildew
    pub fn specialized() -> Self {
        Self::new(
            vec![
                Box::new(TomatoLeafMold::default()),
                Box::new(EarlyBlight::default()),
                Box::new(PowderyMildew::default()),
            ],
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    pub fn into_classifiers(self) -> Vec<Box<dyn Classifier>> {
        self.classifiers
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Errors and missing capabilities count as "no match".
    pub fn first_match(&self, stats: &FeatureStatistics, vision_library: bool) -> Option<Detection> {
        for classifier in &self.classifiers {
            if classifier.requires_vision_library() && !vision_library {
                debug!(classifier = classifier.name(), "vision library unavailable, abstaining");
                continue;
            }

            match classifier.evaluate(stats) {
                Ok(Some(finding)) if finding.confidence > self.threshold => {
                    info!(
                        classifier = classifier.name(),
                        label = %finding.label,
                        confidence = finding.confidence,
                        "classifier matched"
                    );
                    return Some(classifier.diagnose(finding));
                }
                Ok(Some(finding)) => {
                    debug!(
                        classifier = classifier.name(),
                        confidence = finding.confidence,
                        "finding below threshold"
                    );
                }
                Ok(None) => debug!(classifier = classifier.name(), "no match"),
                Err(e) => warn!(classifier = classifier.name(), error = %e, "classifier failed, treating as no match"),
            }
        }
        None
    }
}

impl Default for ClassifierChain {
    fn default() -> Self {
        Self::specialized()
    }
}
