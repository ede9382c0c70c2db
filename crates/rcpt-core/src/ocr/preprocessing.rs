//! Image preprocessing for OCR: resize, perspective correction, denoising
//! and binarization of photographed receipts.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Corners of a detected document, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl Quad {
    fn corners(&self) -> [(f32, f32); 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Polygon area (shoelace formula).
    pub fn area(&self) -> f32 {
        let c = self.corners();
        let twice: f32 = (0..4)
            .map(|i| {
                let (x1, y1) = c[i];
                let (x2, y2) = c[(i + 1) % 4];
                x1 * y2 - x2 * y1
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Size of the rectangle the quad is warped onto.
    fn target_size(&self) -> (u32, u32) {
        let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        let width = dist(self.top_left, self.top_right).max(dist(self.bottom_left, self.bottom_right));
        let height = dist(self.top_left, self.bottom_left).max(dist(self.top_right, self.bottom_right));
        ((width.round() as u32).max(1), (height.round() as u32).max(1))
    }
}

/// Image preprocessor for the OCR pipeline.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Maximum image dimension.
    max_size: u32,
    perspective_correction: bool,
    denoise: bool,
    /// Adaptive threshold window; forced odd and at least 3.
    block_size: u32,
    /// Subtracted from the local mean.
    offset: i32,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&OcrConfig::default())
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            max_size: config.max_image_size.max(1),
            perspective_correction: config.perspective_correction,
            denoise: config.denoise,
            block_size: config.threshold_block_size,
            offset: config.threshold_offset,
        }
    }

    /// Set maximum image dimension.
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size.max(1);
        self
    }

    /// Enable or disable perspective correction.
    pub fn with_perspective_correction(mut self, enabled: bool) -> Self {
        self.perspective_correction = enabled;
        self
    }

    /// Enable or disable median denoising.
    pub fn with_denoise(mut self, enabled: bool) -> Self {
        self.denoise = enabled;
        self
    }

    /// Run the full pipeline: grayscale, downscale, perspective correction,
    /// denoising, binarization.
    pub fn prepare(&self, image: &DynamicImage) -> Result<DynamicImage, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage("image has zero size".to_string()));
        }

        let mut gray = image.to_luma8();
        let (w, h) = gray.dimensions();
        let (nw, nh) = Self::calculate_resize_dimensions(w, h, self.max_size);
        if (nw, nh) != (w, h) {
            debug!("Resizing {}x{} -> {}x{}", w, h, nw, nh);
            gray = image::imageops::resize(&gray, nw, nh, FilterType::Triangle);
        }

        if self.perspective_correction {
            if let Some(quad) = Self::detect_document(&gray) {
                debug!("Correcting perspective for document at {:?}", quad);
                gray = Self::warp_perspective(&gray, &quad)?;
            }
        }

        if self.denoise {
            gray = Self::median_filter(&gray);
        }

        Ok(DynamicImage::ImageLuma8(Self::adaptive_threshold(
            &gray,
            self.block_size,
            self.offset,
        )))
    }

    /// Scale (width, height) down so the longer side fits `target_size`.
    pub fn calculate_resize_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
        let max_dim = width.max(height);

        if max_dim <= target_size {
            return (width, height);
        }

        let scale = target_size as f32 / max_dim as f32;
        let new_width = (width as f32 * scale).round() as u32;
        let new_height = (height as f32 * scale).round() as u32;

        (new_width.max(1), new_height.max(1))
    }

    /// Global threshold separating the two dominant intensity classes.
    pub fn otsu_threshold(image: &GrayImage) -> u8 {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }

        let total: u64 = histogram.iter().sum();
        let weighted_total: f64 = histogram
            .iter()
            .enumerate()
            .map(|(v, &n)| v as f64 * n as f64)
            .sum();

        let (mut best, mut best_variance) = (0u8, -1.0f64);
        let (mut background, mut background_sum) = (0u64, 0.0f64);

        for (value, &count) in histogram.iter().enumerate() {
            background += count;
            background_sum += value as f64 * count as f64;
            let foreground = total - background;
            if background == 0 || foreground == 0 {
                continue;
            }

            let mean_bg = background_sum / background as f64;
            let mean_fg = (weighted_total - background_sum) / foreground as f64;
            let variance = background as f64 * foreground as f64 * (mean_bg - mean_fg).powi(2);
            if variance > best_variance {
                best_variance = variance;
                best = value as u8;
            }
        }

        best
    }

    /// Locate a bright receipt on a darker background.
    ///
    /// Returns `None` when there is no clear document, when it covers less
    /// than a fifth of the frame, or when it already fills the frame.
    pub fn detect_document(image: &GrayImage) -> Option<Quad> {
        let (width, height) = image.dimensions();
        if width < 8 || height < 8 {
            return None;
        }

        let threshold = Self::otsu_threshold(image);
        let mut bright = 0u64;
        // Extremes of x+y and x-y over bright pixels land on the corners.
        let mut tl = (f32::INFINITY, (0.0, 0.0));
        let mut br = (f32::NEG_INFINITY, (0.0, 0.0));
        let mut tr = (f32::NEG_INFINITY, (0.0, 0.0));
        let mut bl = (f32::INFINITY, (0.0, 0.0));

        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[0] <= threshold {
                continue;
            }
            bright += 1;
            let (fx, fy) = (x as f32, y as f32);
            let (sum, diff) = (fx + fy, fx - fy);
            if sum < tl.0 {
                tl = (sum, (fx, fy));
            }
            if sum > br.0 {
                br = (sum, (fx, fy));
            }
            if diff > tr.0 {
                tr = (diff, (fx, fy));
            }
            if diff < bl.0 {
                bl = (diff, (fx, fy));
            }
        }

        let total = width as u64 * height as u64;
        if bright == 0 || bright == total {
            return None;
        }

        let quad = Quad {
            top_left: tl.1,
            top_right: tr.1,
            bottom_right: br.1,
            bottom_left: bl.1,
        };

        let frame_area = (width as f32) * (height as f32);
        if quad.area() < frame_area * 0.2 {
            return None;
        }

        let margin = 0.03 * width.max(height) as f32;
        let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);
        let frame = [(0.0, 0.0), (max_x, 0.0), (max_x, max_y), (0.0, max_y)];
        let fills_frame = quad
            .corners()
            .iter()
            .zip(frame.iter())
            .all(|(c, f)| (c.0 - f.0).abs() <= margin && (c.1 - f.1).abs() <= margin);
        if fills_frame {
            return None;
        }

        Some(quad)
    }

    /// Warp the quadrilateral onto an upright rectangle.
    pub fn warp_perspective(image: &GrayImage, quad: &Quad) -> Result<GrayImage, OcrError> {
        let (out_w, out_h) = quad.target_size();
        let (w, h) = ((out_w - 1).max(1) as f64, (out_h - 1).max(1) as f64);

        let destination = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let source = quad.corners().map(|(x, y)| (x as f64, y as f64));
        let homography = solve_homography(&destination, &source)?;

        let mut output = GrayImage::new(out_w, out_h);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let (sx, sy) = apply_homography(&homography, x as f64, y as f64);
            *pixel = Luma([sample_bilinear(image, sx, sy)]);
        }

        Ok(output)
    }

    /// 3x3 median filter; removes salt-and-pepper specks.
    pub fn median_filter(image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut output = GrayImage::new(width, height);
        let mut window = [0u8; 9];

        for y in 0..height {
            for x in 0..width {
                let mut i = 0;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                        let ny = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                        window[i] = image.get_pixel(nx, ny)[0];
                        i += 1;
                    }
                }
                window.sort_unstable();
                output.put_pixel(x, y, Luma([window[4]]));
            }
        }

        output
    }

    /// Local-mean binarization: a pixel is white when it is brighter than
    /// the mean of its `block_size` window minus `offset`.
    pub fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
        let (width, height) = image.dimensions();
        let block = (block_size.max(3)) | 1;
        let half = (block / 2) as usize;
        let (w, h) = (width as usize, height as usize);

        // Summed-area table with a zero row and column in front.
        let mut integral = Array2::<u64>::zeros((h + 1, w + 1));
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
                integral[[y + 1, x + 1]] = integral[[y, x + 1]] + row_sum;
            }
        }

        let mut output = GrayImage::new(width, height);
        for y in 0..h {
            let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(h));
            for x in 0..w {
                let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(w));
                let sum = integral[[y1, x1]] + integral[[y0, x0]]
                    - integral[[y0, x1]]
                    - integral[[y1, x0]];
                let count = ((y1 - y0) * (x1 - x0)) as u64;
                let mean = (sum / count) as i32;

                let value = image.get_pixel(x as u32, y as u32)[0] as i32;
                let out = if value > mean - offset { 255 } else { 0 };
                output.put_pixel(x as u32, y as u32, Luma([out]));
            }
        }

        output
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve for the homography mapping each `from` point onto its `to` point.
fn solve_homography(from: &[(f64, f64); 4], to: &[(f64, f64); 4]) -> Result<[f64; 9], OcrError> {
    let mut a = Array2::<f64>::zeros((8, 8));
    let mut b = Array1::<f64>::zeros(8);

    for (i, (&(u, v), &(x, y))) in from.iter().zip(to.iter()).enumerate() {
        let r = 2 * i;
        a.row_mut(r).assign(&Array1::from(vec![u, v, 1.0, 0.0, 0.0, 0.0, -u * x, -v * x]));
        a.row_mut(r + 1).assign(&Array1::from(vec![0.0, 0.0, 0.0, u, v, 1.0, -u * y, -v * y]));
        b[r] = x;
        b[r + 1] = y;
    }

    // Gaussian elimination with partial pivoting.
    for col in 0..8 {
        let pivot = (col..8)
            .max_by(|&i, &j| a[[i, col]].abs().partial_cmp(&a[[j, col]].abs()).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(OcrError::Preprocessing("degenerate document corners".to_string()));
        }
        if pivot != col {
            for k in 0..8 {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in (col + 1)..8 {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..8 {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut h = [0.0f64; 9];
    for row in (0..8).rev() {
        let tail: f64 = ((row + 1)..8).map(|k| a[[row, k]] * h[k]).sum();
        h[row] = (b[row] - tail) / a[[row, row]];
    }
    h[8] = 1.0;

    Ok(h)
}

fn apply_homography(h: &[f64; 9], x: f64, y: f64) -> (f64, f64) {
    let w = h[6] * x + h[7] * y + h[8];
    let w = if w.abs() < 1e-12 { 1e-12 } else { w };
    ((h[0] * x + h[1] * y + h[2]) / w, (h[3] * x + h[4] * y + h[5]) / w)
}

/// Bilinear sample with edge clamping; outside the image reads white.
fn sample_bilinear(image: &GrayImage, x: f64, y: f64) -> u8 {
    let (width, height) = image.dimensions();
    if x < -0.5 || y < -0.5 || x > width as f64 - 0.5 || y > height as f64 - 0.5 {
        return 255;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let p = |px: u32, py: u32| image.get_pixel(px, py)[0] as f64;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;

    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark frame with a bright convex quadrilateral "receipt".
    fn photographed_receipt() -> (GrayImage, [(f32, f32); 4]) {
        let corners = [(40.0, 20.0), (170.0, 40.0), (160.0, 180.0), (30.0, 170.0)];
        let inside = |x: f32, y: f32| {
            (0..4).all(|i| {
                let (x1, y1) = corners[i];
                let (x2, y2) = corners[(i + 1) % 4];
                (x2 - x1) * (y - y1) - (y2 - y1) * (x - x1) >= 0.0
            })
        };

        let image = GrayImage::from_fn(200, 200, |x, y| {
            if inside(x as f32, y as f32) { Luma([230]) } else { Luma([20]) }
        });
        (image, corners)
    }

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() <= 2.0 && (a.1 - b.1).abs() <= 2.0
    }

    #[test]
    fn test_resize_dimensions() {
        // Image smaller than target
        let (w, h) = ImagePreprocessor::calculate_resize_dimensions(500, 300, 960);
        assert_eq!((w, h), (500, 300));

        // Image larger than target
        let (w, h) = ImagePreprocessor::calculate_resize_dimensions(1920, 1080, 960);
        assert_eq!((w, h), (960, 540));
    }

    #[test]
    fn test_otsu_splits_bimodal_image() {
        let image = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([30]) } else { Luma([200]) });
        let t = ImagePreprocessor::otsu_threshold(&image);
        assert!((30..200).contains(&t));
    }

    #[test]
    fn test_detects_tilted_document() {
        let (image, corners) = photographed_receipt();
        let quad = ImagePreprocessor::detect_document(&image).expect("document");

        assert!(close(quad.top_left, corners[0]), "{:?}", quad.top_left);
        assert!(close(quad.top_right, corners[1]), "{:?}", quad.top_right);
        assert!(close(quad.bottom_right, corners[2]), "{:?}", quad.bottom_right);
        assert!(close(quad.bottom_left, corners[3]), "{:?}", quad.bottom_left);
    }

    #[test]
    fn test_no_document_on_plain_page() {
        let blank = GrayImage::from_pixel(100, 100, Luma([240]));
        assert!(ImagePreprocessor::detect_document(&blank).is_none());

        // Already cropped: bright page with dark text fills the frame.
        let page = GrayImage::from_fn(100, 100, |x, y| {
            if (40..60).contains(&x) && (45..50).contains(&y) { Luma([10]) } else { Luma([240]) }
        });
        assert!(ImagePreprocessor::detect_document(&page).is_none());
    }

    #[test]
    fn test_warp_produces_upright_page() {
        let (image, _) = photographed_receipt();
        let quad = ImagePreprocessor::detect_document(&image).unwrap();
        let warped = ImagePreprocessor::warp_perspective(&image, &quad).unwrap();

        let (w, h) = warped.dimensions();
        assert!((125..=140).contains(&w), "width {w}");
        assert!((145..=160).contains(&h), "height {h}");
        // The center of the warped page is paper.
        assert!(warped.get_pixel(w / 2, h / 2)[0] > 200);
    }

    #[test]
    fn test_homography_identity() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let h = solve_homography(&square, &square).unwrap();
        let (x, y) = apply_homography(&h, 3.0, 7.0);
        assert!((x - 3.0).abs() < 1e-9 && (y - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_corners_rejected() {
        let point = [(5.0, 5.0); 4];
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(solve_homography(&point, &square).is_err());
    }

    #[test]
    fn test_median_removes_speck() {
        let mut image = GrayImage::from_pixel(5, 5, Luma([255]));
        image.put_pixel(2, 2, Luma([0]));
        let filtered = ImagePreprocessor::median_filter(&image);
        assert_eq!(filtered.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn test_adaptive_threshold_keeps_dark_strokes() {
        // Light paper with a dark vertical stroke and a gradient.
        let image = GrayImage::from_fn(30, 30, |x, _| {
            if x == 15 { Luma([40]) } else { Luma([150 + (x as u8) * 3]) }
        });
        let binary = ImagePreprocessor::adaptive_threshold(&image, 11, 2);

        assert_eq!(binary.get_pixel(15, 10)[0], 0);
        assert_eq!(binary.get_pixel(5, 10)[0], 255);
        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_prepare_outputs_binary_image() {
        let (image, _) = photographed_receipt();
        let prepared = ImagePreprocessor::new()
            .with_max_size(150)
            .prepare(&DynamicImage::ImageLuma8(image))
            .unwrap();

        let gray = prepared.to_luma8();
        assert!(gray.width() <= 150 && gray.height() <= 150);
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
