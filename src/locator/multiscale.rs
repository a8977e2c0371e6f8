//! Edge-based multi-scale template correlation
//!
//! Both images are reduced to Sobel edge maps so flat-color differences
//! between the reference and the rendered icon do not matter. The
//! reference edge map is resized per scale factor and slid over the screen
//! edge map with zero-mean normalized cross-correlation.

use super::loader::{ReferenceIcon, ScreenCapture};
use super::types::{MatchCandidate, Region, Tier};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::gradients::sobel_gradients;
use imageproc::integral_image::{integral_image, integral_squared_image};

/// Edge magnitudes (after scaling to 0-255) below this are treated as flat
pub const DEFAULT_EDGE_THRESHOLD: u8 = 10;

/// Outcome of a multi-scale search before the threshold is applied
#[derive(Debug, Clone, PartialEq)]
pub enum MultiScaleOutcome {
    /// Best placement reached the threshold
    Matched(MatchCandidate),
    /// A placement was scored, but the best one stayed below threshold
    BelowThreshold { best_score: f32, scale: f32 },
    /// Every scale was skipped or had no edge structure to correlate
    NoCandidate,
}

impl MultiScaleOutcome {
    pub fn into_candidate(self) -> Option<MatchCandidate> {
        match self {
            MultiScaleOutcome::Matched(candidate) => Some(candidate),
            _ => None,
        }
    }
}

/// Best placement of a template at one scale
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    x: u32,
    y: u32,
    score: f64,
}

/// Dense search: every placement of every scaled template is scored, so
/// cost grows with screen area times template edge pixels, once per scale.
/// A busy 1080p screen with six scales takes seconds; callers that know the
/// icon's rendering scale should pass just that one.
#[derive(Debug, Clone)]
pub struct MultiScaleMatcher {
    scales: Vec<f32>,
    threshold: f32,
    edge_threshold: u8,
}

impl MultiScaleMatcher {
    pub fn new(scales: Vec<f32>, threshold: f32) -> Self {
        Self {
            scales,
            threshold,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
        }
    }

    pub fn with_edge_threshold(mut self, edge_threshold: u8) -> Self {
        self.edge_threshold = edge_threshold;
        self
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Search all configured scales and report the global best placement
    pub fn search(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> MultiScaleOutcome {
        let start_time = std::time::Instant::now();
        let reference_edges = edge_map(&reference.gray, self.edge_threshold);
        let screen_edges = edge_map(&screen.gray, self.edge_threshold);
        let search_space = SearchSpace::new(&screen_edges);

        let mut best: Option<(Peak, f32, u32, u32)> = None;

        for &scale in &self.scales {
            let Some(template) = scaled_template(&reference_edges, scale) else {
                log::debug!("⚠️ Skipping scale {:.2}: template collapses to nothing", scale);
                continue;
            };

            // Template larger than the screen in either dimension
            if template.width() > screen_edges.width() || template.height() > screen_edges.height() {
                log::debug!(
                    "⚠️ Skipping scale {:.2}: template {}x{} exceeds screen {}x{}",
                    scale,
                    template.width(),
                    template.height(),
                    screen_edges.width(),
                    screen_edges.height()
                );
                continue;
            }

            let Some(edge_template) = EdgeTemplate::new(&template) else {
                log::debug!("⚠️ Skipping scale {:.2}: template has no edge structure", scale);
                continue;
            };

            match search_space.best_placement(&edge_template) {
                Some(peak) => {
                    log::debug!(
                        "🔍 Scale {:.2}: best {:.4} at ({},{}) template {}x{}",
                        scale,
                        peak.score,
                        peak.x,
                        peak.y,
                        edge_template.width,
                        edge_template.height
                    );
                    if best.is_none_or(|(b, _, _, _)| peak.score > b.score) {
                        best = Some((peak, scale, edge_template.width, edge_template.height));
                    }
                }
                None => log::debug!("🔍 Scale {:.2}: no textured placement on screen", scale),
            }
        }

        let outcome = match best {
            None => MultiScaleOutcome::NoCandidate,
            Some((peak, scale, width, height)) => {
                let score = peak.score as f32;
                if score >= self.threshold {
                    let region = Region::from_origin(peak.x, peak.y, width, height);
                    MultiScaleOutcome::Matched(
                        MatchCandidate::from_region(region, score, Tier::MultiScale)
                            .with_scale(scale),
                    )
                } else {
                    MultiScaleOutcome::BelowThreshold {
                        best_score: score,
                        scale,
                    }
                }
            }
        };

        log::debug!(
            "⏱️ Multi-scale search finished in {}ms: {:?}",
            start_time.elapsed().as_millis(),
            outcome
        );
        outcome
    }
}

/// Multi-scale match of `reference` in `screen`.
///
/// Returns the best placement across `scales` if its correlation reaches
/// `threshold`.
pub fn match_multi_scale(
    reference: &ReferenceIcon,
    screen: &ScreenCapture,
    scales: &[f32],
    threshold: f32,
) -> Option<MatchCandidate> {
    MultiScaleMatcher::new(scales.to_vec(), threshold)
        .search(reference, screen)
        .into_candidate()
}

/// Sobel gradient magnitude, scaled into 0-255, with weak edges zeroed
pub fn edge_map(gray: &GrayImage, edge_threshold: u8) -> GrayImage {
    let gradients = sobel_gradients(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let magnitude = (gradients.get_pixel(x, y)[0] / 4).min(255) as u8;
        if magnitude < edge_threshold {
            Luma([0])
        } else {
            Luma([magnitude])
        }
    })
}

/// Resize the reference edge map by `scale`; `None` when it would be smaller than 2x2
fn scaled_template(edges: &GrayImage, scale: f32) -> Option<GrayImage> {
    if (scale - 1.0).abs() <= 0.01 {
        return Some(edges.clone());
    }

    let new_width = (edges.width() as f32 * scale).round() as u32;
    let new_height = (edges.height() as f32 * scale).round() as u32;
    if new_width < 2 || new_height < 2 {
        return None;
    }

    Some(imageops::resize(
        edges,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}

/// Template prepared for correlation: only non-zero pixels take part in the
/// cross term, the zero-mean correction comes from sums.
struct EdgeTemplate {
    width: u32,
    height: u32,
    entries: Vec<(u32, u32, u64)>,
    pixel_count: u128,
    sum: u128,
    /// `n * sum(T^2) - sum(T)^2`
    variance_term: u128,
}

impl EdgeTemplate {
    fn new(template: &GrayImage) -> Option<Self> {
        let mut entries = Vec::new();
        let mut sum = 0u128;
        let mut sum_sq = 0u128;

        for (x, y, pixel) in template.enumerate_pixels() {
            let value = pixel[0] as u64;
            if value > 0 {
                entries.push((x, y, value));
                sum += value as u128;
                sum_sq += (value * value) as u128;
            }
        }

        let pixel_count = template.width() as u128 * template.height() as u128;
        let variance_term = pixel_count * sum_sq - sum * sum;
        if variance_term == 0 {
            return None;
        }

        Some(Self {
            width: template.width(),
            height: template.height(),
            entries,
            pixel_count,
            sum,
            variance_term,
        })
    }
}

/// Screen edge map with summed-area tables for O(1) window statistics
struct SearchSpace<'a> {
    edges: &'a GrayImage,
    stride: usize,
    sums: Vec<u64>,
    squares: Vec<u64>,
}

impl<'a> SearchSpace<'a> {
    fn new(edges: &'a GrayImage) -> Self {
        let sums = integral_image::<_, u64>(edges).into_raw();
        let squares = integral_squared_image::<_, u64>(edges).into_raw();
        Self {
            edges,
            stride: edges.width() as usize + 1,
            sums,
            squares,
        }
    }

    fn window(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        (table[y1 * stride + x1] + table[y0 * stride + x0])
            - (table[y0 * stride + x1] + table[y1 * stride + x0])
    }

    /// Highest-scoring placement, first in row-major order on ties
    fn best_placement(&self, template: &EdgeTemplate) -> Option<Peak> {
        let width = self.edges.width();
        let height = self.edges.height();
        let pixels = self.edges.as_raw();
        let row = width as usize;
        let n = template.pixel_count;

        let mut best: Option<Peak> = None;

        for y in 0..=(height - template.height) {
            for x in 0..=(width - template.width) {
                let s = Self::window(&self.sums, self.stride, x, y, template.width, template.height)
                    as u128;
                let s2 =
                    Self::window(&self.squares, self.stride, x, y, template.width, template.height)
                        as u128;
                let window_variance = n * s2 - s * s;
                if window_variance == 0 {
                    continue;
                }

                let mut cross = 0u64;
                for &(dx, dy, value) in &template.entries {
                    let index = (y + dy) as usize * row + (x + dx) as usize;
                    cross += pixels[index] as u64 * value;
                }

                let numerator = (n * cross as u128) as f64 - (s * template.sum) as f64;
                let denominator =
                    (window_variance as f64 * template.variance_term as f64).sqrt();
                let score = (numerator / denominator).clamp(-1.0, 1.0);

                if best.is_none_or(|b| score > b.score) {
                    best = Some(Peak { x, y, score });
                }
            }
        }

        best
    }
}
