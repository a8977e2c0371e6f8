//! Two-tier arbitration between the multi-scale and keypoint matchers.
//!
//! The multi-scale matcher always runs first. A successful multi-scale
//! candidate is final: the keypoint matcher is not consulted and its
//! confidence is never compared against the correlation score.

use super::config::FallbackPolicy;
use super::keypoint::KeypointMatcher;
use super::loader::{ReferenceIcon, ScreenCapture};
use super::multiscale::{MultiScaleMatcher, MultiScaleOutcome};
use super::types::{MatchCandidate, Tier};

/// What one matcher produced for one screen
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherOutcome {
    Found(MatchCandidate),
    /// Something was scored but did not qualify
    NearMiss { best_score: f32 },
    Nothing,
}

impl From<MultiScaleOutcome> for MatcherOutcome {
    fn from(outcome: MultiScaleOutcome) -> Self {
        match outcome {
            MultiScaleOutcome::Matched(candidate) => MatcherOutcome::Found(candidate),
            MultiScaleOutcome::BelowThreshold { best_score, .. } => {
                MatcherOutcome::NearMiss { best_score }
            }
            MultiScaleOutcome::NoCandidate => MatcherOutcome::Nothing,
        }
    }
}

/// A matcher the arbiter can consult
pub trait IconMatcher {
    fn tier(&self) -> Tier;
    fn find(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> MatcherOutcome;
}

impl IconMatcher for MultiScaleMatcher {
    fn tier(&self) -> Tier {
        Tier::MultiScale
    }

    fn find(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> MatcherOutcome {
        self.search(reference, screen).into()
    }
}

impl IconMatcher for KeypointMatcher {
    fn tier(&self) -> Tier {
        Tier::Keypoint
    }

    fn find(&self, reference: &ReferenceIcon, screen: &ScreenCapture) -> MatcherOutcome {
        match self.find_candidate(reference, screen) {
            Some(candidate) => MatcherOutcome::Found(candidate),
            None => MatcherOutcome::Nothing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterState {
    TryMultiScale,
    TryKeypoint,
    Found(MatchCandidate),
    NotFound,
}

impl ArbiterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArbiterState::Found(_) | ArbiterState::NotFound)
    }
}

pub struct Arbiter<'a, P, S> {
    primary: &'a P,
    secondary: &'a S,
    policy: FallbackPolicy,
    state: ArbiterState,
}

impl<'a, P: IconMatcher, S: IconMatcher> Arbiter<'a, P, S> {
    pub fn new(primary: &'a P, secondary: &'a S, policy: FallbackPolicy) -> Self {
        Self {
            primary,
            secondary,
            policy,
            state: ArbiterState::TryMultiScale,
        }
    }

    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    fn change_state(&mut self, new_state: ArbiterState) {
        log::trace!("Arbiter: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
    }

    /// Advance one transition. Terminal states stay where they are.
    pub fn step(&mut self, reference: &ReferenceIcon, screen: &ScreenCapture) {
        match self.state {
            ArbiterState::TryMultiScale => match self.primary.find(reference, screen) {
                MatcherOutcome::Found(candidate) => {
                    log::debug!(
                        "✅ {} match at ({},{}) score {:.3}",
                        self.primary.tier(),
                        candidate.center.0,
                        candidate.center.1,
                        candidate.confidence
                    );
                    self.change_state(ArbiterState::Found(candidate));
                }
                MatcherOutcome::NearMiss { best_score }
                    if self.policy == FallbackPolicy::SkipOnNearMiss =>
                {
                    log::debug!(
                        "❌ {} near miss ({:.3}), fallback suppressed by policy",
                        self.primary.tier(),
                        best_score
                    );
                    self.change_state(ArbiterState::NotFound);
                }
                outcome => {
                    log::debug!(
                        "🔄 {} gave {:?}, falling back to {}",
                        self.primary.tier(),
                        outcome,
                        self.secondary.tier()
                    );
                    self.change_state(ArbiterState::TryKeypoint);
                }
            },
            ArbiterState::TryKeypoint => match self.secondary.find(reference, screen) {
                MatcherOutcome::Found(candidate) => {
                    log::debug!(
                        "✅ {} match at ({},{}) with {:.0} matches",
                        self.secondary.tier(),
                        candidate.center.0,
                        candidate.center.1,
                        candidate.confidence
                    );
                    self.change_state(ArbiterState::Found(candidate));
                }
                _ => self.change_state(ArbiterState::NotFound),
            },
            ArbiterState::Found(_) | ArbiterState::NotFound => {}
        }
    }

    /// Step until a terminal state and return the winning candidate
    pub fn run(mut self, reference: &ReferenceIcon, screen: &ScreenCapture) -> Option<MatchCandidate> {
        while !self.state.is_terminal() {
            self.step(reference, screen);
        }
        match self.state {
            ArbiterState::Found(candidate) => Some(candidate),
            _ => None,
        }
    }
}

/// Run the two-tier search with short-circuit evaluation
pub fn arbitrate<P: IconMatcher, S: IconMatcher>(
    primary: &P,
    secondary: &S,
    policy: FallbackPolicy,
    reference: &ReferenceIcon,
    screen: &ScreenCapture,
) -> Option<MatchCandidate> {
    Arbiter::new(primary, secondary, policy).run(reference, screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::types::Region;
    use image::{DynamicImage, GrayImage};
    use std::cell::Cell;

    struct ScriptedMatcher {
        tier: Tier,
        outcome: MatcherOutcome,
        calls: Cell<u32>,
    }

    impl ScriptedMatcher {
        fn new(tier: Tier, outcome: MatcherOutcome) -> Self {
            Self {
                tier,
                outcome,
                calls: Cell::new(0),
            }
        }
    }

    impl IconMatcher for ScriptedMatcher {
        fn tier(&self) -> Tier {
            self.tier
        }

        fn find(&self, _: &ReferenceIcon, _: &ScreenCapture) -> MatcherOutcome {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    fn inputs() -> (ReferenceIcon, ScreenCapture) {
        let image = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        (
            ReferenceIcon::from_image("ref", &image),
            ScreenCapture::from_image("screen", &image),
        )
    }

    fn candidate(x: u32, y: u32, confidence: f32, tier: Tier) -> MatchCandidate {
        MatchCandidate::from_region(Region::from_origin(x, y, 10, 10), confidence, tier)
    }

    #[test]
    fn test_multiscale_success_skips_keypoint() {
        let (reference, screen) = inputs();
        let primary = ScriptedMatcher::new(
            Tier::MultiScale,
            MatcherOutcome::Found(candidate(100, 100, 0.75, Tier::MultiScale)),
        );
        // Keypoint confidence is larger but must never be compared
        let secondary = ScriptedMatcher::new(
            Tier::Keypoint,
            MatcherOutcome::Found(candidate(500, 500, 42.0, Tier::Keypoint)),
        );

        let result = arbitrate(&primary, &secondary, FallbackPolicy::Always, &reference, &screen)
            .unwrap();
        assert_eq!(result.tier, Tier::MultiScale);
        assert_eq!(result.center, (105, 105));
        assert_eq!(primary.calls.get(), 1);
        assert_eq!(secondary.calls.get(), 0);
    }

    #[test]
    fn test_falls_back_when_multiscale_finds_nothing() {
        let (reference, screen) = inputs();
        let primary = ScriptedMatcher::new(Tier::MultiScale, MatcherOutcome::Nothing);
        let secondary = ScriptedMatcher::new(
            Tier::Keypoint,
            MatcherOutcome::Found(candidate(20, 30, 9.0, Tier::Keypoint)),
        );

        let result = arbitrate(&primary, &secondary, FallbackPolicy::Always, &reference, &screen)
            .unwrap();
        assert_eq!(result.tier, Tier::Keypoint);
        assert_eq!(secondary.calls.get(), 1);
    }

    #[test]
    fn test_both_fail_is_not_found() {
        let (reference, screen) = inputs();
        let primary =
            ScriptedMatcher::new(Tier::MultiScale, MatcherOutcome::NearMiss { best_score: 0.4 });
        let secondary = ScriptedMatcher::new(Tier::Keypoint, MatcherOutcome::Nothing);

        assert!(
            arbitrate(&primary, &secondary, FallbackPolicy::Always, &reference, &screen).is_none()
        );
        assert_eq!(primary.calls.get(), 1);
        assert_eq!(secondary.calls.get(), 1);
    }

    #[test]
    fn test_near_miss_policy_suppresses_fallback() {
        let (reference, screen) = inputs();
        let primary =
            ScriptedMatcher::new(Tier::MultiScale, MatcherOutcome::NearMiss { best_score: 0.6 });
        let secondary = ScriptedMatcher::new(
            Tier::Keypoint,
            MatcherOutcome::Found(candidate(1, 1, 12.0, Tier::Keypoint)),
        );

        let result = arbitrate(
            &primary,
            &secondary,
            FallbackPolicy::SkipOnNearMiss,
            &reference,
            &screen,
        );
        assert!(result.is_none());
        assert_eq!(secondary.calls.get(), 0);

        // Nothing scored at all still falls back under the same policy
        let empty = ScriptedMatcher::new(Tier::MultiScale, MatcherOutcome::Nothing);
        let result = arbitrate(
            &empty,
            &secondary,
            FallbackPolicy::SkipOnNearMiss,
            &reference,
            &screen,
        );
        assert_eq!(result.map(|c| c.tier), Some(Tier::Keypoint));
    }

    #[test]
    fn test_step_walks_states() {
        let (reference, screen) = inputs();
        let primary = ScriptedMatcher::new(Tier::MultiScale, MatcherOutcome::Nothing);
        let secondary = ScriptedMatcher::new(Tier::Keypoint, MatcherOutcome::Nothing);
        let mut arbiter = Arbiter::new(&primary, &secondary, FallbackPolicy::Always);

        assert_eq!(arbiter.state(), &ArbiterState::TryMultiScale);
        arbiter.step(&reference, &screen);
        assert_eq!(arbiter.state(), &ArbiterState::TryKeypoint);
        arbiter.step(&reference, &screen);
        assert_eq!(arbiter.state(), &ArbiterState::NotFound);
        arbiter.step(&reference, &screen);
        assert_eq!(arbiter.state(), &ArbiterState::NotFound);
        assert_eq!(secondary.calls.get(), 1);
    }

    #[test]
    fn test_multiscale_outcome_conversion() {
        let near: MatcherOutcome = MultiScaleOutcome::BelowThreshold {
            best_score: 0.5,
            scale: 1.0,
        }
        .into();
        assert_eq!(near, MatcherOutcome::NearMiss { best_score: 0.5 });
        assert_eq!(
            MatcherOutcome::from(MultiScaleOutcome::NoCandidate),
            MatcherOutcome::Nothing
        );
    }
}
