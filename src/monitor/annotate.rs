//! Raster annotation of monitor frames
//!
//! Used by the headless runner to write annotated PNGs. Text labels need a
//! font and are only drawn by the dashboard.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use super::{FrameReport, SlotStatus};
use crate::slots::{Slot, SlotCollection};
use crate::vision::Detection;

pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const VACANT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CORNER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const CORNER_RADIUS: i32 = 3;

/// Draw a slot as a closed polyline with corner markers
pub fn draw_slot(image: &mut RgbImage, slot: &Slot, color: Rgb<u8>) {
    let points = slot.points();
    for (i, start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            image,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            color,
        );
    }
    for corner in points {
        draw_filled_circle_mut(image, (corner.x, corner.y), CORNER_RADIUS, CORNER_COLOR);
    }
}

/// Draw a detection's box and center
pub fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let bbox = &detection.bbox;
    let width = (bbox.width().round() as u32).max(1);
    let height = (bbox.height().round() as u32).max(1);
    let rect = Rect::at(bbox.x1 as i32, bbox.y1 as i32).of_size(width, height);
    draw_hollow_rect_mut(image, rect, DETECTION_COLOR);
    draw_filled_circle_mut(
        image,
        (detection.center.x, detection.center.y),
        CORNER_RADIUS,
        DETECTION_COLOR,
    );
}

/// Draw slots colored by status and, optionally, the detections
pub fn annotate(
    image: &mut RgbImage,
    slots: &SlotCollection,
    report: &FrameReport,
    show_detections: bool,
) {
    if show_detections {
        for detection in &report.detections {
            draw_detection(image, detection);
        }
    }

    for (slot, status) in slots.iter().zip(&report.occupancy.statuses) {
        let color = match status {
            SlotStatus::Occupied => OCCUPIED_COLOR,
            SlotStatus::Vacant => VACANT_COLOR,
        };
        draw_slot(image, slot, color);
    }
}

/// Render an annotated copy of the report's frame and write it as PNG
///
/// Files are named `frame_<index>.png` inside `dir`.
pub fn save_annotated(
    dir: &Path,
    slots: &SlotCollection,
    report: &FrameReport,
    show_detections: bool,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let mut image = report.frame.to_rgb_image();
    annotate(&mut image, slots, report, show_detections);

    let path = dir.join(format!("frame_{:06}.png", report.frame.index));
    image
        .save(&path)
        .with_context(|| format!("Failed to write annotated frame {:?}", path))?;
    Ok(path)
}
