//! Result types shared by the matchers, the arbiter and callers

use serde::Serialize;
use std::path::PathBuf;

/// Which matcher produced a candidate.
///
/// Used instead of a unified numeric score when results of the two
/// matchers have to be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Edge-based multi-scale correlation
    MultiScale,
    /// Keypoint feature matching
    Keypoint,
}

impl Tier {
    /// Short lowercase tag used in file names and logs
    pub fn tag(&self) -> &'static str {
        match self {
            Tier::MultiScale => "multiscale",
            Tier::Keypoint => "keypoint",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::MultiScale => write!(f, "MULTISCALE"),
            Tier::Keypoint => write!(f, "KEYPOINT"),
        }
    }
}

/// Axis-aligned box in screen pixels, corners inclusive of `min`, exclusive of `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Region {
    /// Region covering `width` x `height` pixels starting at `(x, y)`
    pub fn from_origin(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    /// Midpoint of the region
    pub fn center(&self) -> (u32, u32) {
        (
            self.min_x + self.width() / 2,
            self.min_y + self.height() / 2,
        )
    }

    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

/// Result of one matcher.
///
/// `confidence` is only comparable with candidates of the same `tier`:
/// multi-scale scores are correlations in [-1, 1], keypoint scores are
/// match counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    /// Click point in screen pixels
    pub center: (u32, u32),
    /// Footprint of the match
    pub region: Region,
    /// Matcher-specific score
    pub confidence: f32,
    /// Matcher that produced this candidate
    pub tier: Tier,
    /// Template scale factor, multi-scale matches only
    pub scale: Option<f32>,
}

impl MatchCandidate {
    /// Candidate whose center is the midpoint of `region`
    pub fn from_region(region: Region, confidence: f32, tier: Tier) -> Self {
        Self {
            center: region.center(),
            region,
            confidence,
            tier,
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// The engine's externally visible answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum LocalizationResult {
    Found { x: u32, y: u32, tier: Tier },
    NotFound,
}

impl LocalizationResult {
    pub fn is_found(&self) -> bool {
        matches!(self, LocalizationResult::Found { .. })
    }

    /// Click point, if found
    pub fn point(&self) -> Option<(u32, u32)> {
        match self {
            LocalizationResult::Found { x, y, .. } => Some((*x, *y)),
            LocalizationResult::NotFound => None,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            LocalizationResult::Found { tier, .. } => Some(*tier),
            LocalizationResult::NotFound => None,
        }
    }
}

impl From<Option<&MatchCandidate>> for LocalizationResult {
    fn from(candidate: Option<&MatchCandidate>) -> Self {
        match candidate {
            Some(c) => LocalizationResult::Found {
                x: c.center.0,
                y: c.center.1,
                tier: c.tier,
            },
            None => LocalizationResult::NotFound,
        }
    }
}

impl std::fmt::Display for LocalizationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalizationResult::Found { x, y, tier } => {
                write!(f, "Found{{x:{x},y:{y},tier:{tier}}}")
            }
            LocalizationResult::NotFound => write!(f, "NotFound"),
        }
    }
}

/// Full outcome of one localization call
#[derive(Debug, Clone, Serialize)]
pub struct LocateReport {
    pub result: LocalizationResult,
    /// Winning candidate, if any
    pub candidate: Option<MatchCandidate>,
    /// Diagnostic image written for this call
    pub diagnostic_image: Option<PathBuf>,
    pub processing_time_ms: u128,
}
