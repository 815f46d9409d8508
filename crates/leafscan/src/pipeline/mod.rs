pub mod builder;

use chrono::Local;
use tracing::{debug, info};
use crate::{
    algorithms::{ClassifierChain, FeatureExtractor, GeneralPlantAnalysis, Preprocessor},
    error::Result,
    traits::Classifier,
    types::{Capabilities, Detection, DetectionResult, FeatureStatistics, SensorReading},
    vision::VisionFallback,
    advisor,
};

/// Reported by `/health` and the CLI
pub const MODEL_VERSION: &str = "Fixed Ultra-Accurate v5.0";

/// Outcome of the local, CPU-bound part of an analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Screening {
    pub stats: FeatureStatistics,
    /// First confident specialized classifier, if any
    pub specialized: Option<Detection>,
    /// Color heuristic, used when nothing better turns up
    pub general: Detection,
}

/// Image in, diagnosis out.
///
/// Strategies are tried in a fixed order: the specialized classifier chain,
/// then the vision model, then the general color analysis which always answers.
pub struct Analyzer {
    preprocessor: Preprocessor,
    extractor: FeatureExtractor,
    chain: ClassifierChain,
    general: GeneralPlantAnalysis,
    vision: VisionFallback,
    vision_library: bool,
}

impl Analyzer {
    pub fn builder() -> builder::AnalyzerBuilder {
        builder::AnalyzerBuilder::new()
    }

    pub fn new(
        preprocessor: Preprocessor,
        extractor: FeatureExtractor,
        chain: ClassifierChain,
        vision: VisionFallback,
        vision_library: bool,
    ) -> Self {
        Self {
            preprocessor,
            extractor,
            chain,
            general: GeneralPlantAnalysis,
            vision,
            vision_library,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            vision_library: self.vision_library,
            vision_model: self.vision.is_available(),
        }
    }

    /// Decode, preprocess, extract statistics and run every local classifier
    pub fn screen(&self, bytes: &[u8]) -> Result<Screening> {
        let variants = self.preprocessor.process(bytes)?;
        let stats = self.extractor.extract(&variants.enhanced, self.vision_library);
        debug!(?stats, "features extracted");

        let specialized = self.chain.first_match(&stats, self.vision_library);
        let general = self.general.diagnose(self.general.assess(&stats));

        Ok(Screening {
            stats,
            specialized,
            general,
        })
    }

    /// Pick the winning strategy and compose the response record
    pub async fn resolve(&self, screening: Screening, bytes: &[u8]) -> DetectionResult {
        let detection = match screening.specialized {
            Some(detection) => detection,
            None => match self.vision.consult(bytes).await {
                Some(report) => report.into_detection(),
                None => screening.general,
            },
        };

        info!(
            disease = %detection.disease,
            confidence = detection.confidence,
            method = %detection.detection_method,
            "analysis complete"
        );
        detection.into_result(Local::now())
    }

    pub async fn analyze(&self, bytes: &[u8]) -> Result<DetectionResult> {
        let screening = self.screen(bytes)?;
        Ok(self.resolve(screening, bytes).await)
    }

    /// Like [`Analyzer::analyze`], adding advisories when any reading is present
    pub async fn analyze_with_sensors(&self, bytes: &[u8], reading: &SensorReading) -> Result<DetectionResult> {
        let result = self.analyze(bytes).await?;
        Ok(if reading.is_present() {
            advisor::advise(result, reading)
        } else {
            result
        })
    }

    pub fn info(&self) -> String {
        format!(
            "Analyzer: {}px variants, {} specialized classifiers (threshold {}), edge detection {}, vision model {}",
            self.preprocessor.target_size(),
            self.chain.len(),
            self.chain.threshold(),
            if self.vision_library { "on" } else { "off" },
            self.vision.model_name().unwrap_or("none"),
        )
    }
}
