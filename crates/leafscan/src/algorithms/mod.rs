pub mod preprocessing;
pub mod features;
pub mod circles;
pub mod classification;

pub use preprocessing::*;
pub use features::{FeatureExtractor, ChannelRule, Bound, BROWN, GRAY_POWDER, WHITE, YELLOW_UPPER};
pub use circles::{Circle, HoughCircles};
pub use classification::*;
