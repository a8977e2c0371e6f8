//! Scenario tests for the localization engine on synthetic screens

use crate::locator::{
    IconLocator, LocalizationResult, LocateConfig, LocateError, ReferenceIcon, ScreenCapture,
    Tier, locate_icon,
};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use std::path::PathBuf;

const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

/// 32x32 icon: a light tile with four colored blocks, surrounded by a
/// 3 px margin in the screen background color
fn synthetic_icon() -> RgbImage {
    let mut icon = RgbImage::from_pixel(32, 32, BACKGROUND);
    draw_filled_rect_mut(&mut icon, Rect::at(3, 3).of_size(26, 26), Rgb([230, 230, 230]));
    draw_filled_rect_mut(&mut icon, Rect::at(4, 4).of_size(10, 10), Rgb([20, 60, 220]));
    draw_filled_rect_mut(&mut icon, Rect::at(18, 6).of_size(10, 6), Rgb([220, 30, 30]));
    draw_filled_rect_mut(&mut icon, Rect::at(8, 18).of_size(18, 4), Rgb([30, 170, 60]));
    draw_filled_rect_mut(&mut icon, Rect::at(20, 24).of_size(6, 6), Rgb([0, 0, 0]));
    icon
}

fn screen_with(icon: &RgbImage, width: u32, height: u32, x: i64, y: i64) -> RgbImage {
    let mut screen = RgbImage::from_pixel(width, height, BACKGROUND);
    imageops::overlay(&mut screen, icon, x, y);
    screen
}

fn reference(icon: &RgbImage) -> ReferenceIcon {
    ReferenceIcon::from_image("icon.png", &DynamicImage::ImageRgb8(icon.clone()))
}

fn capture(screen: RgbImage) -> ScreenCapture {
    ScreenCapture::from_image("screen.png", &DynamicImage::ImageRgb8(screen))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("icon-locator-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn assert_near(result: LocalizationResult, expected: (u32, u32), tolerance: u32) {
    let (x, y) = result
        .point()
        .unwrap_or_else(|| panic!("expected a match near {expected:?}, got {result}"));
    assert!(
        x.abs_diff(expected.0) <= tolerance && y.abs_diff(expected.1) <= tolerance,
        "({x},{y}) not within {tolerance}px of {expected:?}"
    );
}

#[test]
fn test_end_to_end_full_hd_screen() {
    let dir = scratch_dir("e2e");
    let icon_path = dir.join("icon.png");
    let screen_path = dir.join("screen.png");
    let icon = synthetic_icon();
    icon.save(&icon_path).unwrap();
    screen_with(&icon, 1920, 1080, 400, 300).save(&screen_path).unwrap();

    let config = LocateConfig::default()
        .with_scales(vec![1.0])
        .with_threshold(0.7);
    let result = locate_icon(&icon_path, &screen_path, &config).unwrap();

    assert_eq!(result.tier(), Some(Tier::MultiScale));
    assert_near(result, (416, 316), 2);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_native_scale_meets_threshold() {
    let icon = synthetic_icon();
    let locator = IconLocator::new(LocateConfig::default()).unwrap();

    let report = locator.locate_in(&reference(&icon), &capture(screen_with(&icon, 320, 240, 60, 90)));

    let candidate = report.candidate.unwrap();
    assert_eq!(candidate.tier, Tier::MultiScale);
    assert!(candidate.confidence >= 0.7, "confidence {}", candidate.confidence);
    assert_eq!(candidate.scale, Some(1.0));
    assert_near(report.result, (76, 106), 2);
    assert!(report.diagnostic_image.is_none());
}

#[test]
fn test_icon_rendered_at_150_percent() {
    let icon = synthetic_icon();
    let enlarged = imageops::resize(&icon, 48, 48, FilterType::Nearest);
    let config = LocateConfig::default()
        .with_scales(vec![1.0, 1.5])
        .with_threshold(0.5);
    let locator = IconLocator::new(config).unwrap();

    let report = locator.locate_in(&reference(&icon), &capture(screen_with(&enlarged, 400, 300, 150, 100)));

    assert_near(report.result, (174, 124), 5);
}

#[test]
fn test_keypoint_fallback_when_no_scale_fits() {
    let icon = synthetic_icon();
    let config = LocateConfig {
        min_good_matches: 4,
        descriptor_ratio: 0.9,
        ..LocateConfig::default().with_scales(vec![10.0])
    };
    let locator = IconLocator::new(config).unwrap();

    let report = locator.locate_in(&reference(&icon), &capture(screen_with(&icon, 240, 180, 100, 70)));

    let candidate = report.candidate.expect("keypoint fallback should locate the icon");
    assert_eq!(candidate.tier, Tier::Keypoint);
    assert!(candidate.confidence >= 4.0);
    let (x, y) = candidate.center;
    assert!((100..132).contains(&x) && (70..102).contains(&y), "center ({x},{y})");
}

#[test]
fn test_missing_icon_is_not_found_every_time() {
    let icon = synthetic_icon();
    let mut screen = RgbImage::from_pixel(320, 240, BACKGROUND);
    draw_filled_circle_mut(&mut screen, (200, 120), 60, Rgb([120, 120, 200]));
    let locator = IconLocator::new(LocateConfig::default()).unwrap();
    let reference = reference(&icon);
    let screen = capture(screen);

    let first = locator.locate_in(&reference, &screen);
    let second = locator.locate_in(&reference, &screen);

    assert_eq!(first.result, LocalizationResult::NotFound);
    assert_eq!(second.result, LocalizationResult::NotFound);
    assert!(first.candidate.is_none());
}

#[test]
fn test_solid_reference_is_not_found() {
    let solid = RgbImage::from_pixel(32, 32, Rgb([200, 200, 200]));
    let icon = synthetic_icon();
    let locator = IconLocator::new(LocateConfig::default()).unwrap();

    let report = locator.locate_in(&reference(&solid), &capture(screen_with(&icon, 240, 180, 50, 50)));

    assert_eq!(report.result, LocalizationResult::NotFound);
}

#[test]
fn test_identical_inputs_give_identical_results() {
    let icon = synthetic_icon();
    let locator = IconLocator::new(LocateConfig::default()).unwrap();
    let reference = reference(&icon);
    let screen = capture(screen_with(&icon, 300, 200, 123, 45));

    let first = locator.locate_in(&reference, &screen);
    let second = locator.locate_in(&reference, &screen);

    assert_eq!(first.result, second.result);
    assert_eq!(first.candidate, second.candidate);
    assert!(first.result.is_found());
}

#[test]
fn test_each_found_writes_one_new_diagnostic() {
    let dir = scratch_dir("diagnostics");
    let icon = synthetic_icon();
    let config = LocateConfig::default()
        .with_scales(vec![1.0])
        .with_diagnostics_dir(&dir);
    let locator = IconLocator::new(config).unwrap();
    let reference = reference(&icon);
    let screen = capture(screen_with(&icon, 200, 150, 20, 30));

    let first = locator.locate_in(&reference, &screen);
    let second = locator.locate_in(&reference, &screen);

    let first_path = first.diagnostic_image.unwrap();
    let second_path = second.diagnostic_image.unwrap();
    assert_ne!(first_path, second_path);
    assert!(first_path.starts_with(&dir));
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);

    let annotated = image::open(&first_path).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (200, 150));
    assert_eq!(annotated.get_pixel(36, 46), &Rgb([0, 255, 0]));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_not_found_writes_no_diagnostic() {
    let dir = scratch_dir("no-diagnostics");
    let icon = synthetic_icon();
    let locator =
        IconLocator::new(LocateConfig::default().with_diagnostics_dir(&dir)).unwrap();

    let report = locator.locate_in(
        &reference(&icon),
        &capture(RgbImage::from_pixel(100, 100, BACKGROUND)),
    );

    assert!(report.diagnostic_image.is_none());
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unreadable_images_are_errors() {
    let dir = scratch_dir("unreadable");
    let icon_path = dir.join("icon.png");
    synthetic_icon().save(&icon_path).unwrap();

    let missing_reference = locate_icon(dir.join("nope.png"), &icon_path, &LocateConfig::default());
    assert!(missing_reference.unwrap_err().is_image_load());

    let missing_screen = locate_icon(&icon_path, dir.join("nope.png"), &LocateConfig::default());
    assert!(missing_screen.unwrap_err().is_image_load());

    let bad_config = LocateConfig::default().with_scales(vec![]);
    assert!(matches!(
        locate_icon(&icon_path, &icon_path, &bad_config),
        Err(LocateError::InvalidConfig(_))
    ));
    let _ = std::fs::remove_dir_all(&dir);
}
