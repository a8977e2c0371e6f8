//! Icon localization engine
//!
//! Finds one reference icon in a screen capture and returns a click point
//! together with the tier of the matcher that produced it. Edge-based
//! multi-scale correlation runs first, keypoint matching is the fallback,
//! and a diagnostic image is written for every successful match when a
//! diagnostics directory is configured.

pub mod annotator;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod keypoint;
pub mod loader;
pub mod multiscale;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export main types and functions
pub use annotator::annotate;
pub use arbiter::{Arbiter, ArbiterState, IconMatcher, MatcherOutcome, arbitrate};
pub use config::{FallbackPolicy, LocateConfig};
pub use error::{
    AnnotateError, ConfigFileError, ImageRole, KeypointError, LocateError, LocateResult,
};
pub use keypoint::{KeypointMatcher, match_by_features};
pub use loader::{ReferenceIcon, ScreenCapture};
pub use multiscale::{MultiScaleMatcher, MultiScaleOutcome, match_multi_scale};
pub use types::{LocalizationResult, LocateReport, MatchCandidate, Region, Tier};

use std::path::Path;
use std::time::Instant;

/// Configured engine. Holds no per-call state, so one locator can serve
/// any number of calls.
#[derive(Debug, Clone)]
pub struct IconLocator {
    config: LocateConfig,
    multi_scale: MultiScaleMatcher,
    keypoint: KeypointMatcher,
}

impl IconLocator {
    pub fn new(config: LocateConfig) -> LocateResult<Self> {
        config.validate()?;
        log::debug!("🔧 {}", config.summary());
        Ok(Self {
            multi_scale: MultiScaleMatcher::new(config.scales.clone(), config.correlation_threshold)
                .with_edge_threshold(config.edge_threshold),
            keypoint: KeypointMatcher::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &LocateConfig {
        &self.config
    }

    /// Locate an already loaded reference in the screen image at `screen_path`
    pub fn locate<P: AsRef<Path>>(
        &self,
        reference: &ReferenceIcon,
        screen_path: P,
    ) -> LocateResult<LocalizationResult> {
        Ok(self.locate_detailed(reference, screen_path)?.result)
    }

    /// Like [`IconLocator::locate`], with the winning candidate and diagnostic path
    pub fn locate_detailed<P: AsRef<Path>>(
        &self,
        reference: &ReferenceIcon,
        screen_path: P,
    ) -> LocateResult<LocateReport> {
        let screen = ScreenCapture::load(screen_path)?;
        Ok(self.locate_in(reference, &screen))
    }

    /// Run the matchers on in-memory images. Never fails: no match is `NotFound`.
    pub fn locate_in(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> LocateReport {
        let start_time = Instant::now();

        let candidate = arbitrate(
            &self.multi_scale,
            &self.keypoint,
            self.config.fallback_policy,
            reference,
            screen,
        );
        let result = LocalizationResult::from(candidate.as_ref());

        let diagnostic_image = match (&candidate, &self.config.diagnostics_dir) {
            (Some(candidate), Some(dir)) => match annotate(screen, candidate, dir) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("⚠️ Could not write diagnostic image: {e}");
                    None
                }
            },
            _ => None,
        };

        let processing_time_ms = start_time.elapsed().as_millis();
        match &result {
            LocalizationResult::Found { .. } => {
                log::info!("🎯 {} in {}ms", result, processing_time_ms)
            }
            LocalizationResult::NotFound => log::info!(
                "❌ {} not found in {} ({}ms)",
                reference.path.display(),
                screen.path.display(),
                processing_time_ms
            ),
        }

        LocateReport {
            result,
            candidate,
            diagnostic_image,
            processing_time_ms,
        }
    }
}

/// Locate the icon at `reference_path` in the screen image at `screen_path`.
///
/// A missing or undecodable image is an error; an icon that cannot be
/// found is `Ok(LocalizationResult::NotFound)`.
pub fn locate_icon<P: AsRef<Path>, Q: AsRef<Path>>(
    reference_path: P,
    screen_path: Q,
    config: &LocateConfig,
) -> LocateResult<LocalizationResult> {
    let locator = IconLocator::new(config.clone())?;
    let reference = ReferenceIcon::load(reference_path)?;
    locator.locate(&reference, screen_path)
}
