use tracing::warn;
use crate::{
    algorithms::{
        ClassifierChain, FeatureExtractor, HoughCircles, Preprocessor,
        DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IMAGE_SIZE,
    },
    pipeline::Analyzer,
    traits::Classifier,
    vision::{VisionFallback, VisionModel},
};

/// Builder for [`Analyzer`] with a fluent API
pub struct AnalyzerBuilder {
    image_size: u32,
    confidence_threshold: f64,
    vision_library: bool,
    classifiers: Vec<Box<dyn Classifier>>,
    vision_model: Option<Box<dyn VisionModel>>,
    extractor: FeatureExtractor,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            vision_library: cfg!(feature = "vision"),
            classifiers: Vec::new(),
            vision_model: None,
            extractor: FeatureExtractor::default(),
        }
    }

    /// Side length of the preprocessed variants
    pub fn image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// A specialized finding must be strictly above this to win
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Enable edge and circle detection. Ignored when not compiled in.
    pub fn vision_library(mut self, enabled: bool) -> Self {
        if enabled && !cfg!(feature = "vision") {
            warn!("edge detection requested but the `vision` feature is disabled");
            self.vision_library = false;
        } else {
            self.vision_library = enabled;
        }
        self
    }

    /// Append a classifier to the chain. Without any, the standard three are used.
    pub fn add_classifier<C>(mut self, classifier: C) -> Self
    where
        C: Classifier + 'static,
    {
        self.classifiers.push(Box::new(classifier));
        self
    }

    pub fn vision_model(mut self, model: Box<dyn VisionModel>) -> Self {
        self.vision_model = Some(model);
        self
    }

    pub fn hough(mut self, circles: HoughCircles) -> Self {
        self.extractor.circles = circles;
        self
    }

    pub fn edge_thresholds(mut self, low: f32, high: f32) -> Self {
        self.extractor.edge_low = low;
        self.extractor.edge_high = high;
        self
    }

    pub fn build(self) -> Analyzer {
        let chain = if self.classifiers.is_empty() {
            ClassifierChain::new(ClassifierChain::specialized().into_classifiers(), self.confidence_threshold)
        } else {
            ClassifierChain::new(self.classifiers, self.confidence_threshold)
        };

        Analyzer::new(
            Preprocessor::new(self.image_size),
            self.extractor,
            chain,
            VisionFallback::new(self.vision_model),
            self.vision_library,
        )
    }
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
