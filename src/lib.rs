pub mod automation;
pub mod locator;

pub use locator::{
    IconLocator, LocalizationResult, LocateConfig, LocateError, LocateReport, MatchCandidate,
    Tier, locate_icon,
};
