//! Image loading into the matchers' common representation

use super::error::{ImageRole, LocateError, LocateResult};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// The icon being searched for. Loaded once, reused across attempts.
#[derive(Debug, Clone)]
pub struct ReferenceIcon {
    pub path: PathBuf,
    pub gray: GrayImage,
    pub width: u32,
    pub height: u32,
}

impl ReferenceIcon {
    pub fn load<P: AsRef<Path>>(path: P) -> LocateResult<Self> {
        let path = path.as_ref();
        let image = open_image(path, ImageRole::Reference)?;
        Ok(Self::from_image(path, &image))
    }

    /// Build from an already decoded image
    pub fn from_image(path: impl Into<PathBuf>, image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        Self {
            path: path.into(),
            width: gray.width(),
            height: gray.height(),
            gray,
        }
    }
}

/// One capture of the screen: the search space.
#[derive(Debug, Clone)]
pub struct ScreenCapture {
    pub path: PathBuf,
    pub color: RgbImage,
    pub gray: GrayImage,
}

impl ScreenCapture {
    pub fn load<P: AsRef<Path>>(path: P) -> LocateResult<Self> {
        let path = path.as_ref();
        let image = open_image(path, ImageRole::Screen)?;
        Ok(Self::from_image(path, &image))
    }

    pub fn from_image(path: impl Into<PathBuf>, image: &DynamicImage) -> Self {
        Self {
            path: path.into(),
            color: image.to_rgb8(),
            gray: image.to_luma8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

fn open_image(path: &Path, role: ImageRole) -> LocateResult<DynamicImage> {
    let image = image::open(path).map_err(|source| LocateError::ImageLoad {
        role,
        path: path.to_path_buf(),
        source,
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(LocateError::EmptyImage {
            path: path.to_path_buf(),
            width: image.width(),
            height: image.height(),
        });
    }

    log::debug!(
        "🖼️ Loaded {} image {} ({}x{})",
        role,
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}
