use image::RgbImage;
use crate::{
    error::Result,
    types::{Detection, FeatureStatistics, Finding},
};

/// Trait for image enhancement steps
pub trait Enhancement: Send + Sync {
    /// Produce an enhanced copy of the input image
    fn apply(&self, image: &RgbImage) -> RgbImage;
}

/// Trait for rule-based disease classifiers
pub trait Classifier: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Whether the classifier can only run when edge detection is available
    fn requires_vision_library(&self) -> bool {
        true
    }

    /// Inspect the statistics and return a finding, or `None` to abstain
    fn evaluate(&self, stats: &FeatureStatistics) -> Result<Option<Finding>>;

    /// Attach this classifier's advice and provenance to a finding
    fn diagnose(&self, finding: Finding) -> Detection;
}
