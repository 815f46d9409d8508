use image::{GrayImage, Luma, Rgb, RgbImage};
use crate::{
    algorithms::circles::HoughCircles,
    types::{EdgeStatistics, FeatureStatistics},
};

/// Canny thresholds for the edge-density statistic
pub const EDGE_LOW_THRESHOLD: f32 = 50.0;
pub const EDGE_HIGH_THRESHOLD: f32 = 150.0;

/// Per-channel condition of a channel rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Any,
    /// Strictly greater than
    Above(u8),
    /// Strictly less than
    Below(u8),
}

impl Bound {
    fn accepts(self, value: u8) -> bool {
        match self {
            Bound::Any => true,
            Bound::Above(limit) => value > limit,
            Bound::Below(limit) => value < limit,
        }
    }
}

/// A pixel matches when all three channel bounds hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRule {
    pub red: Bound,
    pub green: Bound,
    pub blue: Bound,
}

impl ChannelRule {
    pub const fn new(red: Bound, green: Bound, blue: Bound) -> Self {
        Self { red, green, blue }
    }

    pub fn matches(&self, pixel: &Rgb<u8>) -> bool {
        self.red.accepts(pixel[0]) && self.green.accepts(pixel[1]) && self.blue.accepts(pixel[2])
    }
}

/// Yellowing on the upper leaf surface
pub const YELLOW_UPPER: ChannelRule =
    ChannelRule::new(Bound::Above(150), Bound::Above(150), Bound::Below(100));
/// Grayish powder on the underside
pub const GRAY_POWDER: ChannelRule =
    ChannelRule::new(Bound::Above(180), Bound::Above(180), Bound::Above(180));
/// Brown necrotic tissue
pub const BROWN: ChannelRule =
    ChannelRule::new(Bound::Above(100), Bound::Below(100), Bound::Below(80));
/// White powdery coating
pub const WHITE: ChannelRule =
    ChannelRule::new(Bound::Above(200), Bound::Above(200), Bound::Above(200));

/// ITU-R BT.601 luma with fixed-point rounding
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

pub fn grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| Luma([luma(image.get_pixel(x, y))]))
}

/// Matched pixels over total pixels
pub fn mask_ratio(image: &RgbImage, rule: &ChannelRule) -> f64 {
    let total = pixel_count(image);
    if total == 0 {
        return 0.0;
    }
    let matched = image.pixels().filter(|p| rule.matches(p)).count();
    matched as f64 / total as f64
}

/// Population variance of all gray values
pub fn variance(gray: &GrayImage) -> f64 {
    let count = gray.width() as usize * gray.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let mean = gray.pixels().map(|p| f64::from(p[0])).sum::<f64>() / count as f64;
    gray.pixels()
        .map(|p| {
            let d = f64::from(p[0]) - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64
}

pub fn mean_rgb(image: &RgbImage) -> [f64; 3] {
    let total = pixel_count(image);
    if total == 0 {
        return [0.0; 3];
    }
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for c in 0..3 {
            sums[c] += u64::from(pixel[c]);
        }
    }
    sums.map(|s| s as f64 / total as f64)
}

/// Share of pixels marked as edges by Canny
#[cfg(feature = "vision")]
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f64 {
    let count = gray.width() as usize * gray.height() as usize;
    if count == 0 {
        return 0.0;
    }
    let edges = imageproc::edges::canny(gray, low, high);
    let marked = edges.pixels().filter(|p| p[0] > 0).count();
    marked as f64 / count as f64
}

fn pixel_count(image: &RgbImage) -> u64 {
    u64::from(image.width()) * u64::from(image.height())
}

/// Computes [`FeatureStatistics`] from a raster
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pub edge_low: f32,
    pub edge_high: f32,
    pub circles: HoughCircles,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            edge_low: EDGE_LOW_THRESHOLD,
            edge_high: EDGE_HIGH_THRESHOLD,
            circles: HoughCircles::default(),
        }
    }
}

impl FeatureExtractor {
    /// Edge statistics are only computed when `with_edges` is set and edge detection is compiled in.
    pub fn extract(&self, image: &RgbImage, with_edges: bool) -> FeatureStatistics {
        let gray = grayscale(image);

        FeatureStatistics {
            pixel_count: pixel_count(image),
            mean_rgb: mean_rgb(image),
            yellow_upper_ratio: mask_ratio(image, &YELLOW_UPPER),
            gray_powder_ratio: mask_ratio(image, &GRAY_POWDER),
            brown_ratio: mask_ratio(image, &BROWN),
            white_ratio: mask_ratio(image, &WHITE),
            gray_variance: variance(&gray),
            edges: if with_edges { self.edge_statistics(&gray) } else { None },
        }
    }

    #[cfg(feature = "vision")]
    fn edge_statistics(&self, gray: &GrayImage) -> Option<EdgeStatistics> {
        Some(EdgeStatistics {
            edge_density: edge_density(gray, self.edge_low, self.edge_high),
            circle_count: self.circles.detect(gray).len(),
        })
    }

    #[cfg(not(feature = "vision"))]
    fn edge_statistics(&self, _gray: &GrayImage) -> Option<EdgeStatistics> {
        tracing::debug!("edge detection not compiled in, skipping edge statistics");
        None
    }
}
