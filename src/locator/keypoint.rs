//! Keypoint feature matching
//!
//! Scale-aware fallback for when edge correlation fails. Corners are found
//! with FAST on a small image pyramid, oriented by intensity centroid and
//! described with a 256-bit steered BRIEF descriptor. Reference descriptors
//! are matched to screen descriptors by Hamming distance with a
//! nearest/second-nearest ratio test.

use super::config::LocateConfig;
use super::error::{ImageRole, KeypointError};
use super::loader::{ReferenceIcon, ScreenCapture};
use super::types::{MatchCandidate, Region, Tier};
use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use imageproc::suppress::local_maxima;

/// Descriptor length in bytes (256 bits)
pub const DESCRIPTOR_BYTES: usize = 32;

pub type Descriptor = [u8; DESCRIPTOR_BYTES];

const PYRAMID_SCALE: f32 = 1.2;
/// Keypoints this close to the level border are discarded
const EDGE_BORDER: u32 = 4;
/// Corners with a stronger neighbour this close are suppressed
const NMS_RADIUS: u32 = 3;
const ORIENTATION_RADIUS: i32 = 7;
const PATTERN_RADIUS: f32 = 8.0;
const DESCRIPTOR_BLUR_SIGMA: f32 = 1.2;
/// Levels smaller than this in either dimension are not built
const MIN_LEVEL_SIZE: u32 = 2 * EDGE_BORDER + 8;

/// An oriented corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Position in base image pixels
    pub x: f32,
    pub y: f32,
    /// Pyramid level the corner was detected on
    pub level: usize,
    /// Position on that level
    pub level_x: u32,
    pub level_y: u32,
    /// FAST score
    pub response: f32,
    /// Orientation in radians
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

/// Accepted reference-to-screen descriptor correspondence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub reference_index: usize,
    pub screen_index: usize,
    pub distance: u32,
}

/// One level of the image pyramid
struct PyramidLevel {
    scale: f32,
    image: GrayImage,
    blurred: GrayImage,
}

/// Detects and describes features. The sampling pattern is fixed at
/// construction so descriptors are reproducible across runs.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    fast_threshold: u8,
    max_keypoints: usize,
    pyramid_levels: usize,
    pattern: Vec<[f32; 4]>,
}

impl FeatureExtractor {
    pub fn new(fast_threshold: u8, max_keypoints: usize, pyramid_levels: usize) -> Self {
        Self {
            fast_threshold,
            max_keypoints,
            pyramid_levels: pyramid_levels.max(1),
            pattern: sampling_pattern(),
        }
    }

    /// Detect, orient and describe up to `max_keypoints` features
    pub fn extract(&self, gray: &GrayImage) -> Vec<Feature> {
        let levels = self.build_pyramid(gray);

        let mut keypoints: Vec<Keypoint> = Vec::new();
        for (index, level) in levels.iter().enumerate() {
            let detected = self.detect(level, index);
            log::trace!(
                "Level {} ({}x{}): {} keypoints",
                index,
                level.image.width(),
                level.image.height(),
                detected.len()
            );
            keypoints.extend(detected);
        }

        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.level.cmp(&b.level))
                .then(a.level_y.cmp(&b.level_y))
                .then(a.level_x.cmp(&b.level_x))
        });
        keypoints.truncate(self.max_keypoints);

        keypoints
            .into_iter()
            .map(|keypoint| {
                let level = &levels[keypoint.level];
                Feature {
                    descriptor: self.describe(&level.blurred, &keypoint),
                    keypoint,
                }
            })
            .collect()
    }

    fn build_pyramid(&self, gray: &GrayImage) -> Vec<PyramidLevel> {
        let mut levels = Vec::with_capacity(self.pyramid_levels);
        for index in 0..self.pyramid_levels {
            let scale = PYRAMID_SCALE.powi(index as i32);
            let image = if index == 0 {
                gray.clone()
            } else {
                let width = (gray.width() as f32 / scale).round() as u32;
                let height = (gray.height() as f32 / scale).round() as u32;
                if width < MIN_LEVEL_SIZE || height < MIN_LEVEL_SIZE {
                    break;
                }
                imageops::resize(gray, width, height, FilterType::Triangle)
            };
            let blurred = gaussian_blur_f32(&image, DESCRIPTOR_BLUR_SIGMA);
            levels.push(PyramidLevel {
                scale,
                image,
                blurred,
            });
        }
        levels
    }

    /// FAST corners on one level: border-filtered, suppressed, capped at
    /// `max_keypoints` and only then oriented
    fn detect(&self, level: &PyramidLevel, index: usize) -> Vec<Keypoint> {
        let (width, height) = level.image.dimensions();
        if width <= 2 * EDGE_BORDER || height <= 2 * EDGE_BORDER {
            return Vec::new();
        }

        let corners: Vec<_> = corners_fast9(&level.image, self.fast_threshold)
            .into_iter()
            .filter(|c| {
                c.x >= EDGE_BORDER
                    && c.y >= EDGE_BORDER
                    && c.x < width - EDGE_BORDER
                    && c.y < height - EDGE_BORDER
            })
            .collect();
        let raw_count = corners.len();

        let mut corners = local_maxima(&corners, NMS_RADIUS);
        corners.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });
        corners.truncate(self.max_keypoints);
        log::trace!(
            "Level {}: {} raw corners, {} after suppression",
            index,
            raw_count,
            corners.len()
        );

        corners
            .into_iter()
            .map(|corner| Keypoint {
                x: corner.x as f32 * level.scale,
                y: corner.y as f32 * level.scale,
                level: index,
                level_x: corner.x,
                level_y: corner.y,
                response: corner.score,
                angle: intensity_centroid_angle(&level.image, corner.x, corner.y),
            })
            .collect()
    }

    /// Steered BRIEF: the pattern is rotated by the keypoint angle
    fn describe(&self, blurred: &GrayImage, keypoint: &Keypoint) -> Descriptor {
        let (sin, cos) = keypoint.angle.sin_cos();
        let (cx, cy) = (keypoint.level_x as f32, keypoint.level_y as f32);
        let mut descriptor = [0u8; DESCRIPTOR_BYTES];

        for (i, &[x1, y1, x2, y2]) in self.pattern.iter().enumerate() {
            let a = bilinear_sample(blurred, cx + cos * x1 - sin * y1, cy + sin * x1 + cos * y1);
            let b = bilinear_sample(blurred, cx + cos * x2 - sin * y2, cy + sin * x2 + cos * y2);
            if a < b {
                descriptor[i / 8] |= 1 << (i % 8);
            }
        }
        descriptor
    }
}

/// 256 point pairs inside a disc, from the R2 low-discrepancy sequence
fn sampling_pattern() -> Vec<[f32; 4]> {
    const PLASTIC: f64 = 1.324_717_957_244_746;
    let a1 = 1.0 / PLASTIC;
    let a2 = 1.0 / (PLASTIC * PLASTIC);

    let point = |i: usize| -> (f32, f32) {
        let u = (0.5 + a1 * i as f64).fract();
        let v = (0.5 + a2 * i as f64).fract();
        let radius = PATTERN_RADIUS as f64 * u.sqrt();
        let theta = std::f64::consts::TAU * v;
        ((radius * theta.cos()) as f32, (radius * theta.sin()) as f32)
    };

    (0..DESCRIPTOR_BYTES * 8)
        .map(|i| {
            let (x1, y1) = point(2 * i);
            let (x2, y2) = point(2 * i + 1);
            [x1, y1, x2, y2]
        })
        .collect()
}

/// Orientation from the intensity centroid of a disc around the corner
fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32) -> f32 {
    let radius_sq = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    let mut m10 = 0i64;
    let mut m01 = 0i64;

    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let value = clamped_pixel(image, x as i64 + dx as i64, y as i64 + dy as i64) as i64;
            m10 += dx as i64 * value;
            m01 += dy as i64 * value;
        }
    }

    if m10 == 0 && m01 == 0 {
        0.0
    } else {
        (m01 as f32).atan2(m10 as f32)
    }
}

fn clamped_pixel(image: &GrayImage, x: i64, y: i64) -> u8 {
    let cx = x.clamp(0, image.width() as i64 - 1) as u32;
    let cy = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(cx, cy)[0]
}

/// Bilinear interpolation, coordinates clamped to the image
fn bilinear_sample(image: &GrayImage, x: f32, y: f32) -> f32 {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = clamped_pixel(image, x0, y0) as f32;
    let p10 = clamped_pixel(image, x0 + 1, y0) as f32;
    let p01 = clamped_pixel(image, x0, y0 + 1) as f32;
    let p11 = clamped_pixel(image, x0 + 1, y0 + 1) as f32;

    let top = p00 * (1.0 - fx) + p10 * fx;
    let bottom = p01 * (1.0 - fx) + p11 * fx;
    top * (1.0 - fy) + bottom * fy
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Brute-force nearest neighbours with the ratio test.
///
/// A reference descriptor is accepted when its nearest screen descriptor
/// is strictly closer than `ratio` times the second nearest and no further
/// than `max_distance`. With fewer than two screen descriptors nothing is
/// accepted.
pub fn match_descriptors(
    reference: &[Descriptor],
    screen: &[Descriptor],
    ratio: f32,
    max_distance: u32,
) -> Vec<DescriptorMatch> {
    if screen.len() < 2 {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (reference_index, descriptor) in reference.iter().enumerate() {
        let mut best = (u32::MAX, 0usize);
        let mut second = u32::MAX;

        for (screen_index, candidate) in screen.iter().enumerate() {
            let distance = hamming_distance(descriptor, candidate);
            if distance < best.0 {
                second = best.0;
                best = (distance, screen_index);
            } else if distance < second {
                second = distance;
            }
        }

        let (distance, screen_index) = best;
        if distance <= max_distance && (distance as f32) < ratio * second as f32 {
            matches.push(DescriptorMatch {
                reference_index,
                screen_index,
                distance,
            });
        }
    }
    matches
}

#[derive(Debug, Clone)]
pub struct KeypointMatcher {
    extractor: FeatureExtractor,
    min_good_matches: usize,
    ratio: f32,
    max_hamming_distance: u32,
}

impl KeypointMatcher {
    pub fn new(min_good_matches: usize, ratio: f32) -> Self {
        Self::from_config(&LocateConfig {
            min_good_matches,
            descriptor_ratio: ratio,
            ..LocateConfig::default()
        })
    }

    pub fn from_config(config: &LocateConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(
                config.fast_threshold,
                config.max_keypoints,
                config.pyramid_levels,
            ),
            min_good_matches: config.min_good_matches,
            ratio: config.descriptor_ratio,
            max_hamming_distance: config.max_hamming_distance,
        }
    }

    /// Match features, reporting why no candidate was produced
    pub fn try_match(
        &self,
        reference: &ReferenceIcon,
        screen: &ScreenCapture,
    ) -> Result<MatchCandidate, KeypointError> {
        let reference_features = self.extractor.extract(&reference.gray);
        if reference_features.is_empty() {
            return Err(KeypointError::NoFeaturesDetected {
                side: ImageRole::Reference,
            });
        }
        let screen_features = self.extractor.extract(&screen.gray);
        if screen_features.is_empty() {
            return Err(KeypointError::NoFeaturesDetected {
                side: ImageRole::Screen,
            });
        }

        let reference_descriptors: Vec<Descriptor> =
            reference_features.iter().map(|f| f.descriptor).collect();
        let screen_descriptors: Vec<Descriptor> =
            screen_features.iter().map(|f| f.descriptor).collect();

        let matches = match_descriptors(
            &reference_descriptors,
            &screen_descriptors,
            self.ratio,
            self.max_hamming_distance,
        );
        log::debug!(
            "🔑 {} reference / {} screen features, {} good matches",
            reference_features.len(),
            screen_features.len(),
            matches.len()
        );

        if matches.len() < self.min_good_matches {
            return Err(KeypointError::TooFewMatches {
                accepted: matches.len(),
                required: self.min_good_matches,
            });
        }

        let max_x = screen.width().saturating_sub(1) as f32;
        let max_y = screen.height().saturating_sub(1) as f32;
        let points = matches.iter().map(|m| {
            let keypoint = &screen_features[m.screen_index].keypoint;
            (
                keypoint.x.round().clamp(0.0, max_x) as u32,
                keypoint.y.round().clamp(0.0, max_y) as u32,
            )
        });

        let (mut min_x, mut min_y, mut max_px, mut max_py) = (u32::MAX, u32::MAX, 0u32, 0u32);
        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_px = max_px.max(x);
            max_py = max_py.max(y);
        }

        let region = Region {
            min_x,
            min_y,
            max_x: max_px + 1,
            max_y: max_py + 1,
        };
        Ok(MatchCandidate::from_region(
            region,
            matches.len() as f32,
            Tier::Keypoint,
        ))
    }

    /// Match features; any internal failure is reported as no match
    pub fn find_candidate(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> Option<MatchCandidate> {
        match self.try_match(reference, screen) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                log::debug!("🔑 Keypoint matching gave no candidate: {e}");
                None
            }
        }
    }
}

/// Keypoint match of `reference` in `screen`, center of the matched
/// screen keypoints' bounding box.
pub fn match_by_features(
    reference: &ReferenceIcon,
    screen: &ScreenCapture,
    min_good_matches: usize,
    ratio: f32,
) -> Option<MatchCandidate> {
    KeypointMatcher::new(min_good_matches, ratio).find_candidate(reference, screen)
}
