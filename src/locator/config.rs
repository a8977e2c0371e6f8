//! Configuration for icon localization

use super::error::{ConfigFileError, LocateError, LocateResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the arbiter does when multi-scale matching produced a best score
/// that stayed below the correlation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Always try the keypoint matcher when multi-scale matching failed
    #[default]
    Always,
    /// A below-threshold multi-scale result suppresses the keypoint fallback
    SkipOnNearMiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Template scale factors tried by the multi-scale matcher, in order.
    /// Each one is a full dense scan of the screen.
    pub scales: Vec<f32>,
    /// Minimum normalized correlation for a multi-scale match (0.0 to 1.0)
    pub correlation_threshold: f32,
    /// Minimum accepted descriptor matches for a keypoint match
    pub min_good_matches: usize,
    /// Ratio test factor, nearest / second-nearest descriptor distance
    pub descriptor_ratio: f32,
    /// Edge magnitudes below this are zeroed in edge maps
    pub edge_threshold: u8,
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Upper bound of keypoints kept per image
    pub max_keypoints: usize,
    /// Pyramid levels used for keypoint detection (1 = base image only)
    pub pyramid_levels: usize,
    /// Hamming distance above which a descriptor match is rejected outright
    pub max_hamming_distance: u32,
    pub fallback_policy: FallbackPolicy,
    /// Where annotated screens are written; `None` disables annotation
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            scales: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            correlation_threshold: 0.7,
            min_good_matches: 4,
            descriptor_ratio: 0.85,
            edge_threshold: 10,
            fast_threshold: 20,
            max_keypoints: 2000,
            pyramid_levels: 3,
            max_hamming_distance: 80,
            fallback_policy: FallbackPolicy::Always,
            diagnostics_dir: None,
        }
    }
}

impl LocateConfig {
    /// Preset for desktop icons captured at native resolution, with diagnostics
    pub fn desktop_icon_preset(diagnostics_dir: impl Into<PathBuf>) -> Self {
        Self {
            scales: vec![0.8, 0.9, 1.0, 1.1, 1.25, 1.5],
            diagnostics_dir: Some(diagnostics_dir.into()),
            ..Self::default()
        }
    }

    /// Preset for exact-scale UI elements where a false click is expensive
    pub fn strict_preset() -> Self {
        Self {
            scales: vec![1.0],
            correlation_threshold: 0.85,
            min_good_matches: 10,
            descriptor_ratio: 0.75,
            max_hamming_distance: 64,
            fallback_policy: FallbackPolicy::SkipOnNearMiss,
            ..Self::default()
        }
    }

    pub fn with_scales(mut self, scales: Vec<f32>) -> Self {
        self.scales = scales;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> LocateResult<()> {
        if self.scales.is_empty() {
            return Err(LocateError::InvalidConfig(
                "scales must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self.scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(LocateError::InvalidConfig(format!(
                "scale factors must be positive, got {bad}"
            )));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(LocateError::InvalidConfig(format!(
                "correlation_threshold must be in [0, 1], got {}",
                self.correlation_threshold
            )));
        }
        if self.min_good_matches == 0 {
            return Err(LocateError::InvalidConfig(
                "min_good_matches must be at least 1".to_string(),
            ));
        }
        if !(self.descriptor_ratio > 0.0 && self.descriptor_ratio < 1.0) {
            return Err(LocateError::InvalidConfig(format!(
                "descriptor_ratio must be in (0, 1), got {}",
                self.descriptor_ratio
            )));
        }
        if self.fast_threshold == 0 {
            return Err(LocateError::InvalidConfig(
                "fast_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_keypoints == 0 || self.pyramid_levels == 0 {
            return Err(LocateError::InvalidConfig(
                "max_keypoints and pyramid_levels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a TOML file.
    ///
    /// Keys that are absent keep their default values.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "LocateConfig: scales={:?}, threshold={:.2}, min_good_matches={}, ratio={:.2}, fallback={:?}, diagnostics={}",
            self.scales,
            self.correlation_threshold,
            self.min_good_matches,
            self.descriptor_ratio,
            self.fallback_policy,
            self.diagnostics_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "off".to_string())
        )
    }
}
