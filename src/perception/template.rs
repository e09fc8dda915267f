//! Zero-mean normalized cross-correlation (the TM_CCOEFF_NORMED measure) over
//! grayscale images.
//!
//! Window sums come from integral images so only the numerator costs
//! `O(template area)` per position; rows are scored in parallel with rayon.

use image::GrayImage;
use rayon::prelude::*;

use crate::errors::{RelayError, RelayResult};
use crate::perception::types::AnchorMatch;

/// Correlation score for every position where the template fits entirely
/// inside the image. Scores lie in `[-1, 1]`.
pub struct ScoreMap {
    width: usize,
    height: usize,
    template_width: u32,
    template_height: u32,
    scores: Vec<f32>,
}

impl ScoreMap {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn score(&self, x: usize, y: usize) -> f32 {
        self.scores[y * self.width + x]
    }

    /// Highest-scoring position.
    pub fn best(&self) -> Option<AnchorMatch> {
        self.scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, &score)| self.to_match(idx, score))
    }

    /// Every position scoring at least `threshold`, in raster order.
    pub fn above(&self, threshold: f32) -> Vec<AnchorMatch> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, &score)| score >= threshold)
            .map(|(idx, &score)| self.to_match(idx, score))
            .collect()
    }

    fn to_match(&self, idx: usize, score: f32) -> AnchorMatch {
        AnchorMatch {
            x: (idx % self.width) as i32,
            y: (idx / self.width) as i32,
            width: self.template_width,
            height: self.template_height,
            score,
        }
    }
}

/// Summed-area tables for pixel values and squared pixel values.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl Integral {
    fn new(pixels: &[f32], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0.0f64; stride * (height + 1)];
        let mut sq_sum = vec![0.0f64; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0.0f64;
            let mut row_sq = 0.0f64;
            for x in 0..width {
                let v = pixels[y * width + x] as f64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }
        Self { stride, sum, sq_sum }
    }

    fn window(&self, table: &[f64], x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w] - table[y * s + x + w] - table[(y + h) * s + x] + table[y * s + x]
    }
}

pub fn match_template(image: &GrayImage, template: &GrayImage) -> RelayResult<ScoreMap> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 {
        return Err(RelayError::Perception("empty template".into()));
    }
    if tw > iw || th > ih {
        return Err(RelayError::Perception(format!(
            "template {tw}x{th} larger than image {iw}x{ih}"
        )));
    }

    let pixels: Vec<f32> = image.as_raw().iter().map(|&p| p as f32).collect();
    let n = (tw * th) as f64;
    let t_mean = template.as_raw().iter().map(|&p| p as f64).sum::<f64>() / n;
    let t_zero: Vec<f32> = template
        .as_raw()
        .iter()
        .map(|&p| (p as f64 - t_mean) as f32)
        .collect();
    let t_energy: f64 = t_zero.iter().map(|&v| v as f64 * v as f64).sum();

    let integral = Integral::new(&pixels, iw as usize, ih as usize);
    let (iw, tw, th) = (iw as usize, tw as usize, th as usize);
    let out_w = iw - tw + 1;
    let out_h = ih as usize - th + 1;

    let mut scores = vec![0.0f32; out_w * out_h];
    scores.par_chunks_mut(out_w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut numerator = 0.0f64;
            for j in 0..th {
                let start = (y + j) * iw + x;
                let img_row = &pixels[start..start + tw];
                let tpl_row = &t_zero[j * tw..(j + 1) * tw];
                numerator += img_row
                    .iter()
                    .zip(tpl_row)
                    .map(|(a, b)| a * b)
                    .sum::<f32>() as f64;
            }

            let sum = integral.window(&integral.sum, x, y, tw, th);
            let sq = integral.window(&integral.sq_sum, x, y, tw, th);
            let variance = sq - sum * sum / n;
            // Flat windows (or a flat template) carry no correlation signal.
            *out = if variance <= 1e-6 || t_energy <= 1e-6 {
                0.0
            } else {
                (numerator / (t_energy * variance).sqrt()).clamp(-1.0, 1.0) as f32
            };
        }
    });

    Ok(ScoreMap {
        width: out_w,
        height: out_h,
        template_width: tw as u32,
        template_height: th as u32,
        scores,
    })
}
