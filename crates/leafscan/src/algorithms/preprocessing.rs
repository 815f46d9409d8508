use image::{imageops::FilterType, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use crate::{
    algorithms::features::luma,
    error::Result,
    traits::Enhancement,
};

/// Side length of every preprocessed variant
pub const DEFAULT_IMAGE_SIZE: u32 = 256;

/// 3x3 smoothing kernel used as the degenerate image for sharpening
const SMOOTH_KERNEL: [i32; 9] = [1, 1, 1, 1, 5, 1, 1, 1, 1];
const SMOOTH_DIVISOR: i32 = 13;

/// 3x3 detail-boosting kernel
const DETAIL_KERNEL: [i32; 9] = [0, -1, 0, -1, 10, -1, 0, -1, 0];
const DETAIL_DIVISOR: i32 = 6;

/// Per-channel linear stretch so each channel spans the full 0..=255 range
#[derive(Debug, Clone, Default)]
pub struct AutoContrast;

impl Enhancement for AutoContrast {
    fn apply(&self, image: &RgbImage) -> RgbImage {
        let mut low = [u8::MAX; 3];
        let mut high = [u8::MIN; 3];
        for pixel in image.pixels() {
            for c in 0..3 {
                low[c] = low[c].min(pixel[c]);
                high[c] = high[c].max(pixel[c]);
            }
        }

        let mut tables = [[0u8; 256]; 3];
        for c in 0..3 {
            for (value, entry) in tables[c].iter_mut().enumerate() {
                *entry = if high[c] <= low[c] {
                    // Flat channel, nothing to stretch
                    value as u8
                } else {
                    let scale = 255.0 / f32::from(high[c] - low[c]);
                    let offset = -f32::from(low[c]) * scale;
                    clamp_channel(value as f32 * scale + offset)
                };
            }
        }

        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            for c in 0..3 {
                pixel[c] = tables[c][pixel[c] as usize];
            }
        }
        output
    }
}

/// Blend towards (factor < 1) or away from (factor > 1) a smoothed copy
#[derive(Debug, Clone)]
pub struct Sharpness {
    pub factor: f32,
}

impl Default for Sharpness {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Enhancement for Sharpness {
    fn apply(&self, image: &RgbImage) -> RgbImage {
        let smoothed = convolve3x3(image, &SMOOTH_KERNEL, SMOOTH_DIVISOR);
        blend(&smoothed, image, self.factor)
    }
}

/// Blend against a flat gray image at the mean luma
#[derive(Debug, Clone)]
pub struct Contrast {
    pub factor: f32,
}

impl Default for Contrast {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Enhancement for Contrast {
    fn apply(&self, image: &RgbImage) -> RgbImage {
        let count = u64::from(image.width()) * u64::from(image.height());
        if count == 0 {
            return image.clone();
        }
        let total: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
        let mean = (total as f64 / count as f64 + 0.5) as u8;
        let flat = RgbImage::from_pixel(image.width(), image.height(), Rgb([mean, mean, mean]));
        blend(&flat, image, self.factor)
    }
}

/// Saturation: blend against the grayscale version of the image
#[derive(Debug, Clone)]
pub struct ColorBalance {
    pub factor: f32,
}

impl Default for ColorBalance {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Enhancement for ColorBalance {
    fn apply(&self, image: &RgbImage) -> RgbImage {
        let gray = RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let l = luma(image.get_pixel(x, y));
            Rgb([l, l, l])
        });
        blend(&gray, image, self.factor)
    }
}

/// Fixed 3x3 detail filter, emphasizes fine texture
#[derive(Debug, Clone, Default)]
pub struct DetailFilter;

impl Enhancement for DetailFilter {
    fn apply(&self, image: &RgbImage) -> RgbImage {
        convolve3x3(image, &DETAIL_KERNEL, DETAIL_DIVISOR)
    }
}

/// An ordered list of enhancement steps
pub struct Recipe {
    steps: Vec<Box<dyn Enhancement>>,
}

impl Recipe {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then<E>(mut self, step: E) -> Self
    where
        E: Enhancement + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let mut processed = image.clone();
        for step in &self.steps {
            processed = step.apply(&processed);
        }
        processed
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Recipe {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Variant {
    /// Contrast and sharpness boosted, the input of every classifier
    Enhanced,
    /// Saturation boosted
    ColorEnhanced,
    /// Detail filtered
    TextureEnhanced,
}

/// The three resized variants produced from one upload
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedVariants {
    pub enhanced: RgbImage,
    pub color_enhanced: RgbImage,
    pub texture_enhanced: RgbImage,
}

impl PreprocessedVariants {
    pub fn get(&self, variant: Variant) -> &RgbImage {
        match variant {
            Variant::Enhanced => &self.enhanced,
            Variant::ColorEnhanced => &self.color_enhanced,
            Variant::TextureEnhanced => &self.texture_enhanced,
        }
    }
}

/// Decodes uploads and produces the enhanced variants
pub struct Preprocessor {
    target_size: u32,
    enhanced: Recipe,
    color_enhanced: Recipe,
    texture_enhanced: Recipe,
}

impl Preprocessor {
    pub fn new(target_size: u32) -> Self {
        Self {
            target_size,
            enhanced: Recipe::new()
                .then(AutoContrast)
                .then(Sharpness { factor: 1.5 })
                .then(Contrast { factor: 1.4 })
                .then(ColorBalance { factor: 1.3 }),
            color_enhanced: Recipe::new()
                .then(ColorBalance { factor: 1.5 })
                .then(Sharpness { factor: 1.3 }),
            texture_enhanced: Recipe::new()
                .then(DetailFilter)
                .then(Contrast { factor: 1.5 }),
        }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Decode any supported format into 8-bit RGB
    pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
        let image = image::load_from_memory(bytes)?;
        Ok(image.to_rgb8())
    }

    pub fn process(&self, bytes: &[u8]) -> Result<PreprocessedVariants> {
        let image = Self::decode(bytes)?;
        Ok(self.process_image(&image))
    }

    pub fn process_image(&self, image: &RgbImage) -> PreprocessedVariants {
        PreprocessedVariants {
            enhanced: self.resize(&self.enhanced.apply(image)),
            color_enhanced: self.resize(&self.color_enhanced.apply(image)),
            texture_enhanced: self.resize(&self.texture_enhanced.apply(image)),
        }
    }

    fn resize(&self, image: &RgbImage) -> RgbImage {
        image::imageops::resize(image, self.target_size, self.target_size, FilterType::Lanczos3)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}

/// `degenerate + factor * (image - degenerate)` per channel
fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f32) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let base = degenerate.get_pixel(x, y);
        let source = image.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let b = f32::from(base[c]);
            out[c] = clamp_channel(b + factor * (f32::from(source[c]) - b));
        }
        Rgb(out)
    })
}

/// Integer 3x3 convolution. Border pixels are copied unchanged.
fn convolve3x3(image: &RgbImage, kernel: &[i32; 9], divisor: i32) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut output = image.clone();
    if width < 3 || height < 3 {
        return output;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0i32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let px = image.get_pixel(x + (k as u32 % 3) - 1, y + (k as u32 / 3) - 1);
                for c in 0..3 {
                    sums[c] += weight * i32::from(px[c]);
                }
            }
            let pixel = output.get_pixel_mut(x, y);
            for c in 0..3 {
                pixel[c] = clamp_channel(sums[c] as f32 / divisor as f32);
            }
        }
    }
    output
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
