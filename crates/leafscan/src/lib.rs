//! # LeafScan
//!
//! Plant-leaf disease screening from a single photograph, with optional
//! soil-sensor context.
//!
//! An upload is decoded, enhanced and reduced to a handful of pixel
//! statistics. Rule-based classifiers inspect those statistics in a fixed
//! order and the first confident one wins. When none is confident, a hosted
//! vision model may be consulted, and a mean-color heuristic answers last.
//! Sensor readings, when present, add prioritized advisories.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leafscan::{Analyzer, SensorReading};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = Analyzer::builder().build();
//! let bytes = std::fs::read("leaf.jpg")?;
//!
//! let result = analyzer
//!     .analyze_with_sensors(&bytes, &SensorReading::new(30.0, 24.0, 80.0))
//!     .await?;
//! println!("{} ({:.2}%)", result.disease, result.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! ## Serving
//!
//! ```rust,no_run
//! use leafscan::{server, Analyzer};
//!
//! # async fn run() -> std::io::Result<()> {
//! let state = server::AppState::new(Analyzer::builder().build(), None);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! server::serve(listener, state, server::DEFAULT_BODY_LIMIT).await
//! # }
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod taxonomy;
pub mod vision;
pub mod advisor;
pub mod archive;
pub mod pipeline;
pub mod server;

pub use error::{LeafScanError, Result};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use vision::{VisionFallback, VisionModel, VisionReport, VisionError, GeminiClient, VisionConfig};
pub use archive::UploadArchive;
pub use pipeline::{Analyzer, Screening, MODEL_VERSION, builder::AnalyzerBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use crate::vision::StaticVisionModel;

    fn encode(image: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn uniform(color: [u8; 3]) -> Vec<u8> {
        encode(RgbImage::from_pixel(256, 256, Rgb(color)))
    }

    /// Checkerboard of pale gray powder, yellow tissue and dark veins
    fn moldy_leaf() -> Vec<u8> {
        let tones = [Rgb([200, 200, 200]), Rgb([220, 210, 40]), Rgb([30, 90, 30])];
        encode(RgbImage::from_fn(256, 256, |x, y| tones[((x / 16 + y / 16) % 3) as usize]))
    }

    /// Sixteen brown lesions on a green leaf
    fn spotted_leaf() -> Vec<u8> {
        encode(RgbImage::from_fn(256, 256, |x, y| {
            let lesion = (0..4).flat_map(|i| (0..4).map(move |j| (32 + 64 * i, 32 + 64 * j))).any(
                |(cx, cy): (i64, i64)| {
                    let (dx, dy) = (x as i64 - cx, y as i64 - cy);
                    dx * dx + dy * dy <= 15 * 15
                },
            );
            if lesion { Rgb([90, 50, 20]) } else { Rgb([60, 170, 70]) }
        }))
    }

    #[tokio::test]
    async fn test_green_leaf_is_healthy() {
        let result = Analyzer::builder().build().analyze(&uniform([60, 170, 70])).await.unwrap();
        assert_eq!(result.disease, "Healthy Plant");
        assert_eq!(result.confidence, 80.0);
        assert!(result.is_healthy);
        assert_eq!(result.detection_method, "Color Analysis");
        assert!(result.sensor_recommendations.is_none());
    }

    #[test]
    fn test_screen_is_deterministic() {
        let analyzer = Analyzer::builder().build();
        let bytes = moldy_leaf();
        assert_eq!(analyzer.screen(&bytes).unwrap(), analyzer.screen(&bytes).unwrap());
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let analyzer = Analyzer::builder().build();
        let bytes = moldy_leaf();
        let first = analyzer.analyze(&bytes).await.unwrap();
        let mut second = analyzer.analyze(&bytes).await.unwrap();
        second.timestamp = first.timestamp;
        assert_eq!(first, second);
    }

    #[test]
    fn test_vision_library_off_skips_specialized() {
        let analyzer = Analyzer::builder().vision_library(false).build();
        assert!(!analyzer.capabilities().vision_library);

        let screening = analyzer.screen(&moldy_leaf()).unwrap();
        assert!(screening.stats.edges.is_none());
        assert!(screening.specialized.is_none());
    }

    #[cfg(feature = "vision")]
    #[tokio::test]
    async fn test_leaf_mold_from_pixels() {
        let result = Analyzer::builder().build().analyze(&moldy_leaf()).await.unwrap();
        assert_eq!(result.disease, "Tomato - Leaf Mold");
        assert_eq!(result.confidence, 95.0);
        assert_eq!(result.detection_method, "Specialized Algorithm");
        assert!(!result.is_healthy);
    }

    #[cfg(feature = "vision")]
    #[tokio::test]
    async fn test_early_blight_from_lesion_rings() {
        let analyzer = Analyzer::builder().build();
        let screening = analyzer.screen(&spotted_leaf()).unwrap();
        let edges = screening.stats.edges.expect("Edge statistics should be computed");
        assert!(edges.circle_count > 3);

        let result = analyzer.analyze(&spotted_leaf()).await.unwrap();
        assert_eq!(result.disease, "Tomato - Early Blight");
        assert_eq!(result.confidence, 80.0);
        assert_eq!(result.plant_type, "Tomato");
    }

    #[cfg(feature = "vision")]
    #[tokio::test]
    async fn test_powdery_mildew_from_pixels() {
        let result = Analyzer::builder().build().analyze(&uniform([235, 235, 235])).await.unwrap();
        assert_eq!(result.disease, "Powdery Mildew");
        assert_eq!(result.confidence, 85.0);
        assert_eq!(result.detection_method, "Specialized Algorithm");
    }

    #[cfg(feature = "vision")]
    #[tokio::test]
    async fn test_specialized_match_skips_vision_model() {
        let analyzer = Analyzer::builder()
            .vision_model(Box::new(StaticVisionModel::replying(r#"{"disease_name": "Rust"}"#)))
            .build();
        let result = analyzer.analyze(&uniform([235, 235, 235])).await.unwrap();
        assert_eq!(result.disease, "Powdery Mildew");
        assert_eq!(result.detection_method, "Specialized Algorithm");
    }

    #[tokio::test]
    async fn test_resolve_prefers_specialized_detection() {
        let analyzer = Analyzer::builder()
            .vision_model(Box::new(StaticVisionModel::replying(r#"{"disease_name": "Rust"}"#)))
            .build();
        let mold = TomatoLeafMold::default();
        let screening = Screening {
            stats: FeatureStatistics::default(),
            specialized: Some(mold.diagnose(Finding::new(TomatoLeafMold::LABEL, 0.95))),
            general: GeneralPlantAnalysis.diagnose(Finding::new("Healthy Plant", 0.8)),
        };

        let result = analyzer.resolve(screening, b"unused").await;
        assert_eq!(result.disease, "Tomato - Leaf Mold");
        assert_eq!(result.confidence, 95.0);
    }

    #[tokio::test]
    async fn test_malformed_vision_reply_falls_back_to_general() {
        let analyzer = Analyzer::builder()
            .vision_model(Box::new(StaticVisionModel::replying("The leaf looks sad.")))
            .build();
        let result = analyzer.analyze(&uniform([100, 100, 100])).await.unwrap();
        assert_eq!(result.disease, "Environmental Stress");
        assert_eq!(result.confidence, 60.0);
        assert!(!result.is_healthy);
    }

    #[tokio::test]
    async fn test_vision_confidence_is_clamped() {
        let analyzer = Analyzer::builder()
            .vision_model(Box::new(StaticVisionModel::replying(
                r#"{"plant_species": "Basil", "disease_name": "healthy", "confidence": 1.4}"#,
            )))
            .build();
        let result = analyzer.analyze(&uniform([100, 100, 100])).await.unwrap();
        assert_eq!(result.disease, "Basil - healthy");
        assert_eq!(result.confidence, 95.0);
        assert!(result.is_healthy);
    }

    #[tokio::test]
    async fn test_sensors_only_when_present() {
        let analyzer = Analyzer::builder().build();
        let bytes = uniform([60, 170, 70]);

        let plain = analyzer.analyze_with_sensors(&bytes, &SensorReading::default()).await.unwrap();
        assert!(plain.sensor_recommendations.is_none());
        assert!(plain.sensor_data.is_none());

        let reading = SensorReading::new(50.0, 37.0, 60.0);
        let advised = analyzer.analyze_with_sensors(&bytes, &reading).await.unwrap();
        let entries = advised.sensor_recommendations.expect("Should attach advisories");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_undecodable_upload() {
        let err = Analyzer::builder().build().analyze(b"\x00\x01garbage").await.unwrap_err();
        assert!(matches!(err, LeafScanError::Decode(_)));
    }

    #[test]
    fn test_custom_classifier_chain() {
        let analyzer = Analyzer::builder()
            .confidence_threshold(0.5)
            .add_classifier(GeneralPlantAnalysis)
            .build();
        let screening = analyzer.screen(&uniform([60, 170, 70])).unwrap();
        let specialized = screening.specialized.expect("General analysis never abstains");
        assert_eq!(specialized.disease, "Healthy Plant");
        assert!(analyzer.info().contains("1 specialized classifiers"));
    }
}
