use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for localization calls.
pub type LocateResult<T> = Result<T, LocateError>;

/// The error type surfaced to callers of the localization engine.
///
/// Only conditions that make a call meaningless end up here. A matcher
/// that finds nothing, or finds something below threshold, is a
/// `NotFound` result and not an error.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Failed to load {role} image {path:?}: {source}")]
    ImageLoad {
        role: ImageRole,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image {path:?} has zero size ({width}x{height})")]
    EmptyImage {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("Invalid locator configuration: {0}")]
    InvalidConfig(String),
}

impl LocateError {
    /// True when the failure came from reading or decoding an input image
    pub fn is_image_load(&self) -> bool {
        matches!(
            self,
            LocateError::ImageLoad { .. } | LocateError::EmptyImage { .. }
        )
    }
}

/// Which input an image error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Reference,
    Screen,
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRole::Reference => write!(f, "reference"),
            ImageRole::Screen => write!(f, "screen"),
        }
    }
}

/// Internal failure of the keypoint stage.
///
/// The arbiter reports this as "matcher found nothing".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeypointError {
    #[error("No features detected in the {side} image")]
    NoFeaturesDetected { side: ImageRole },

    #[error("Only {accepted} good matches, {required} required")]
    TooFewMatches { accepted: usize, required: usize },
}

/// Failure to write a diagnostic image. Logged, never propagated past the engine.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Failed to create diagnostics directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open diagnostic file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write diagnostic file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode diagnostic image {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Gave up finding a free diagnostic file name after {attempts} attempts")]
    NameExhausted { attempts: u32 },
}

/// Failure to read a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] LocateError),
}
