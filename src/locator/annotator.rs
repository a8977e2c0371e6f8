//! Diagnostic images: the winning match drawn onto a copy of the screen

use super::error::AnnotateError;
use super::loader::ScreenCapture;
use super::types::MatchCandidate;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_RADIUS: i32 = 4;
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Draw the candidate's region (2 px outline) and center marker on a clone of the screen
pub fn render(screen: &ScreenCapture, candidate: &MatchCandidate) -> RgbImage {
    let mut canvas = screen.color.clone();
    let region = candidate.region;

    for inset in 0..2u32 {
        let width = region.width().saturating_sub(2 * inset);
        let height = region.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.min_x + inset) as i32, (region.min_y + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(&mut canvas, rect, OUTLINE_COLOR);
    }

    let (cx, cy) = candidate.center;
    draw_filled_circle_mut(&mut canvas, (cx as i32, cy as i32), MARKER_RADIUS, MARKER_COLOR);
    canvas
}

/// Write an annotated copy of `screen` into `dir` and return its path.
///
/// Never overwrites: an existing name gets a `_1`, `_2`, ... suffix.
pub fn annotate(
    screen: &ScreenCapture,
    candidate: &MatchCandidate,
    dir: &Path,
) -> Result<PathBuf, AnnotateError> {
    std::fs::create_dir_all(dir).map_err(|source| AnnotateError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let canvas = render(screen, candidate);
    let stem = format!("annotated_{}_{}", candidate.tier.tag(), timestamp());

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}.png")
        } else {
            format!("{stem}_{attempt}.png")
        };
        let path = dir.join(name);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(AnnotateError::Open { path, source }),
        };

        let mut writer = BufWriter::new(file);
        if let Err(source) = canvas.write_to(&mut writer, ImageFormat::Png) {
            drop(writer);
            let _ = std::fs::remove_file(&path);
            return Err(AnnotateError::Encode { path, source });
        }
        writer
            .flush()
            .map_err(|source| AnnotateError::Write {
                path: path.clone(),
                source,
            })?;

        log::info!("🖍️ Diagnostic image written to {}", path.display());
        return Ok(path);
    }

    Err(AnnotateError::NameExhausted {
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// UTC `yyyymmdd-HHMMSS-mmm`
fn timestamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}-{:03}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}
