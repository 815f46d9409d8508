use serde::{Deserialize, Serialize};

/// Gaussian sigma `imageproc::edges::canny` smooths with before finding edges
#[cfg(feature = "vision")]
const CANNY_SIGMA: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub x: u32,
    pub y: u32,
    pub radius: u32,
    /// Accumulator votes at the center
    pub votes: u32,
}

/// Gradient Hough transform for circles.
///
/// Every Canny edge pixel votes along its gradient direction, in both senses,
/// for every radius in `min_radius..=max_radius`. Voting directions come from
/// the same smoothed image the edges were found on. Local accumulator maxima
/// above `accumulator_threshold` become candidate centers, accepted strongest
/// first as long as they keep `min_distance` from already accepted centers.
#[derive(Debug, Clone, PartialEq)]
pub struct HoughCircles {
    pub min_distance: f32,
    /// Upper Canny threshold, the lower one is half of it
    pub edge_threshold: f32,
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughCircles {
    fn default() -> Self {
        Self {
            min_distance: 30.0,
            edge_threshold: 50.0,
            accumulator_threshold: 30,
            min_radius: 5,
            max_radius: 25,
        }
    }
}

#[cfg(feature = "vision")]
impl HoughCircles {
    pub fn detect(&self, gray: &image::GrayImage) -> Vec<Circle> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 || self.max_radius < self.min_radius {
            return Vec::new();
        }

        let edges = imageproc::edges::canny(gray, self.edge_threshold / 2.0, self.edge_threshold);
        let smoothed = imageproc::filter::gaussian_blur_f32(gray, CANNY_SIGMA);
        let dx = imageproc::gradients::horizontal_sobel(&smoothed);
        let dy = imageproc::gradients::vertical_sobel(&smoothed);

        let mut accumulator = vec![0u32; width as usize * height as usize];
        let mut edge_points = Vec::new();

        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            let gx = f32::from(dx.get_pixel(x, y)[0]);
            let gy = f32::from(dy.get_pixel(x, y)[0]);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            edge_points.push((x, y));

            let (ux, uy) = (gx / magnitude, gy / magnitude);
            for radius in self.min_radius..=self.max_radius {
                let r = radius as f32;
                for sign in [-1.0f32, 1.0] {
                    let cx = (x as f32 + sign * r * ux).round();
                    let cy = (y as f32 + sign * r * uy).round();
                    if cx < 0.0 || cy < 0.0 || cx >= width as f32 || cy >= height as f32 {
                        continue;
                    }
                    accumulator[cy as usize * width as usize + cx as usize] += 1;
                }
            }
        }

        let w = width as usize;
        let mut centers = Vec::new();
        for y in 1..height as usize - 1 {
            for x in 1..w - 1 {
                let i = y * w + x;
                let votes = accumulator[i];
                if votes > self.accumulator_threshold
                    && votes > accumulator[i - 1]
                    && votes >= accumulator[i + 1]
                    && votes > accumulator[i - w]
                    && votes >= accumulator[i + w]
                {
                    centers.push((x as u32, y as u32, votes));
                }
            }
        }

        // Strongest first, ties broken by position so the result is deterministic
        centers.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

        let mut circles: Vec<Circle> = Vec::new();
        for (x, y, votes) in centers {
            let crowded = circles
                .iter()
                .any(|c| distance(c.x, c.y, x, y) < self.min_distance);
            if crowded {
                continue;
            }
            if let Some(radius) = self.estimate_radius(x, y, &edge_points) {
                circles.push(Circle { x, y, radius, votes });
            }
        }

        tracing::trace!(count = circles.len(), "hough circles detected");
        circles
    }

    /// Radius with the most edge pixels at that distance from the center
    fn estimate_radius(&self, cx: u32, cy: u32, edge_points: &[(u32, u32)]) -> Option<u32> {
        let mut histogram = vec![0u32; (self.max_radius - self.min_radius + 1) as usize];
        for &(x, y) in edge_points {
            let d = distance(cx, cy, x, y).round() as u32;
            if (self.min_radius..=self.max_radius).contains(&d) {
                histogram[(d - self.min_radius) as usize] += 1;
            }
        }

        let mut best: Option<(u32, u32)> = None;
        for (offset, &count) in histogram.iter().enumerate() {
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((self.min_radius + offset as u32, count));
            }
        }
        best.map(|(radius, _)| radius)
    }
}

#[cfg(feature = "vision")]
fn distance(ax: u32, ay: u32, bx: u32, by: u32) -> f32 {
    let dx = ax as f32 - bx as f32;
    let dy = ay as f32 - by as f32;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(all(test, feature = "vision"))]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Dark discs on a light background
    fn discs(size: u32, centers: &[(i64, i64)], radius: i64) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = centers.iter().any(|&(cx, cy)| {
                let (dx, dy) = (x as i64 - cx, y as i64 - cy);
                dx * dx + dy * dy <= radius * radius
            });
            Luma([if inside { 30 } else { 220 }])
        })
    }

    /// 4x4 grid of centers, 64 px apart
    fn grid() -> Vec<(i64, i64)> {
        (0..4)
            .flat_map(|i| (0..4).map(move |j| (32 + 64 * i, 32 + 64 * j)))
            .collect()
    }

    #[test]
    fn test_flat_image_has_no_circles() {
        let flat = GrayImage::from_pixel(64, 64, Luma([128]));
        assert!(HoughCircles::default().detect(&flat).is_empty());
    }

    #[test]
    fn test_single_disc_is_located() {
        let detector = HoughCircles::default();
        let circles = detector.detect(&discs(128, &[(64, 64)], 15));
        assert_eq!(circles.len(), 1);
        let disc = circles[0];
        assert!(distance(disc.x, disc.y, 64, 64) <= 3.0);
        assert!((12..=18).contains(&disc.radius));
        assert!(disc.votes > detector.accumulator_threshold);
    }

    #[test]
    fn test_disc_grid_with_default_parameters() {
        let detector = HoughCircles::default();
        let centers = grid();
        let circles = detector.detect(&discs(256, &centers, 15));
        assert_eq!(circles.len(), centers.len());

        for &(cx, cy) in &centers {
            assert!(circles
                .iter()
                .any(|c| distance(c.x, c.y, cx as u32, cy as u32) <= 3.0));
        }
        for (i, a) in circles.iter().enumerate() {
            for b in circles.iter().skip(i + 1) {
                assert!(distance(a.x, a.y, b.x, b.y) >= detector.min_distance);
            }
        }
    }

    #[test]
    fn test_min_distance_suppresses_close_centers() {
        let detector = HoughCircles {
            min_distance: 100.0,
            ..HoughCircles::default()
        };
        let circles = detector.detect(&discs(256, &grid(), 15));
        assert!(!circles.is_empty());
        for (i, a) in circles.iter().enumerate() {
            for b in circles.iter().skip(i + 1) {
                assert!(distance(a.x, a.y, b.x, b.y) >= 100.0);
            }
        }
    }

    #[test]
    fn test_inverted_radius_range_finds_nothing() {
        let detector = HoughCircles {
            min_radius: 30,
            max_radius: 10,
            ..HoughCircles::default()
        };
        assert!(detector.detect(&discs(128, &[(64, 64)], 15)).is_empty());
    }
}
