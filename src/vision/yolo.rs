//! YOLOv8 detector on ONNX Runtime
//!
//! Frames are letterboxed into a square gray canvas, normalized to CHW
//! floats and run through the model. The raw `[1, 4 + classes, N]` output is
//! decoded into boxes in frame pixels, filtered by confidence and reduced
//! with class-wise NMS.

use std::collections::BTreeMap;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::value::Tensor;
use tracing::{debug, info, warn};

use super::models::OnnxSession;
use super::{non_maximum_suppression, BoundingBox, Detector, DetectorError, COCO_CLASSES};
use crate::config::DetectorSettings;
use crate::video::Frame;

/// Fill value of the letterbox padding
const PAD_VALUE: u8 = 114;

/// Mapping between frame pixels and network input pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    /// Fit a `width` x `height` frame inside a `size` x `size` canvas, centered
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, size);
        let pad_x = ((size - scaled_width) / 2) as f32;
        let pad_y = ((size - scaled_height) / 2) as f32;

        Self {
            scale,
            pad_x,
            pad_y,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a network-space coordinate back to frame pixels
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Letterbox an RGB image and lay it out as a `[1, 3, size, size]` tensor
pub fn preprocess(image: &RgbImage, size: u32) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::new(image.width(), image.height(), size);

    let resized = imageops::resize(
        image,
        letterbox.scaled_width,
        letterbox.scaled_height,
        FilterType::Triangle,
    );
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::overlay(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let side = size as usize;
    let input = Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });

    (input, letterbox)
}

/// Decode raw YOLOv8 output into boxes in frame pixels
///
/// Accepts both `[1, 4 + classes, N]` and the transposed `[1, N, 4 + classes]`
/// layout. Boxes are clamped to the frame, filtered by `confidence_threshold`
/// and passed through class-wise NMS.
pub fn decode_output(
    data: &[f32],
    dims: &[i64],
    letterbox: &Letterbox,
    confidence_threshold: f32,
    iou_threshold: f32,
    class_names: &[String],
    frame_size: (u32, u32),
) -> Result<Vec<BoundingBox>, DetectorError> {
    let [batch, a, b] = dims else {
        return Err(DetectorError::InvalidOutput(format!(
            "expected a 3-d output tensor, got shape {:?}",
            dims
        )));
    };
    if *batch != 1 || *a <= 0 || *b <= 0 {
        return Err(DetectorError::InvalidOutput(format!(
            "unsupported output shape {:?}",
            dims
        )));
    }

    let (a, b) = (*a as usize, *b as usize);
    let expected_attributes = 4 + class_names.len();
    let channels_first = if a == expected_attributes {
        true
    } else if b == expected_attributes || a < 5 {
        false
    } else {
        // Anchor counts are in the thousands, attribute counts are 4 + classes
        b < 5 || a <= b
    };
    let (attributes, anchors) = if channels_first { (a, b) } else { (b, a) };

    if attributes < 5 {
        return Err(DetectorError::InvalidOutput(format!(
            "output has {} attributes per box, need at least 5",
            attributes
        )));
    }
    if data.len() != attributes * anchors {
        return Err(DetectorError::InvalidOutput(format!(
            "output has {} values, shape {:?} needs {}",
            data.len(),
            dims,
            attributes * anchors
        )));
    }

    let value = |attr: usize, anchor: usize| {
        if channels_first {
            data[attr * anchors + anchor]
        } else {
            data[anchor * attributes + attr]
        }
    };

    let (frame_w, frame_h) = (frame_size.0 as f32, frame_size.1 as f32);
    let mut boxes = Vec::new();

    for anchor in 0..anchors {
        let (class_id, score) = (4..attributes)
            .map(|attr| (attr - 4, value(attr, anchor)))
            .fold((0, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if score < confidence_threshold {
            continue;
        }

        let cx = value(0, anchor);
        let cy = value(1, anchor);
        let w = value(2, anchor);
        let h = value(3, anchor);

        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);

        let class = class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id));

        boxes.push(BoundingBox {
            x1: x1.clamp(0.0, frame_w),
            y1: y1.clamp(0.0, frame_h),
            x2: x2.clamp(0.0, frame_w),
            y2: y2.clamp(0.0, frame_h),
            class,
            confidence: score,
        });
    }

    let candidates = boxes.len();
    let kept = non_maximum_suppression(boxes, iou_threshold);
    debug!("Decoded {} candidate boxes, {} after NMS", candidates, kept.len());
    Ok(kept)
}

/// Parse the Ultralytics `names` metadata, e.g. `{0: 'person', 1: 'bicycle'}`
///
/// Returns `None` unless ids form the contiguous range `0..n`.
pub fn parse_class_names(input: &str) -> Option<Vec<String>> {
    let trimmed = input.trim().trim_start_matches('{').trim_end_matches('}');

    let mut names = BTreeMap::new();
    for entry in trimmed.split(", ") {
        let (index, name) = entry.split_once(':')?;
        let index: usize = index.trim().parse().ok()?;
        let name = name.trim().trim_matches(|c: char| c == '\'' || c == '"');
        names.insert(index, name.to_string());
    }

    let contiguous = names.keys().enumerate().all(|(expected, id)| expected == *id);
    if names.is_empty() || !contiguous {
        return None;
    }
    Some(names.into_values().collect())
}

/// YOLOv8 object detector
pub struct YoloDetector {
    session: OnnxSession,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl YoloDetector {
    /// Load a YOLOv8 ONNX export
    pub fn new(model_path: &Path, settings: &DetectorSettings) -> Result<Self, DetectorError> {
        if settings.input_size == 0 || settings.input_size % 32 != 0 {
            return Err(DetectorError::InvalidModel(format!(
                "input size {} is not a positive multiple of 32",
                settings.input_size
            )));
        }

        let session = OnnxSession::new(model_path, settings.intra_threads)?;
        if session.input_names().is_empty() || session.output_names().is_empty() {
            return Err(DetectorError::InvalidModel(
                "model has no inputs or outputs".to_string(),
            ));
        }

        let class_names = session
            .session()
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .and_then(|names| parse_class_names(&names));

        let class_names = match class_names {
            Some(names) => {
                info!("Model provides {} class names", names.len());
                names
            }
            None => {
                warn!("Model has no usable class metadata, using COCO class names");
                COCO_CLASSES.iter().map(|c| c.to_string()).collect()
            }
        };

        Ok(Self {
            session,
            input_size: settings.input_size,
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            class_names,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

impl Detector for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DetectorError::InvalidFrame(format!(
                "frame {} is empty",
                frame.index
            )));
        }

        let image = frame.to_rgb_image();
        let (input, letterbox) = preprocess(&image, self.input_size);
        let tensor = Tensor::from_array(input)?;

        let input_name = self.session.input_names()[0].clone();
        let outputs = self
            .session
            .session_mut()
            .run(ort::inputs![input_name.as_str() => tensor])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        decode_output(
            data,
            &dims,
            &letterbox,
            self.confidence_threshold,
            self.iou_threshold,
            &self.class_names,
            frame.dimensions(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn identity() -> Letterbox {
        Letterbox::new(640, 640, 640)
    }

    #[test]
    fn test_letterbox_wide_frame_pads_vertically() {
        let lb = Letterbox::new(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!((lb.scaled_width, lb.scaled_height), (640, 360));
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 140.0);

        let (x, y) = lb.to_frame(320.0, 320.0);
        assert!((x - 640.0).abs() < 1e-3);
        assert!((y - 360.0).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 0, 0]));
        let (input, lb) = preprocess(&image, 64);

        assert_eq!(input.shape(), &[1, 3, 64, 64]);
        assert_eq!(lb.pad_y, 16.0);
        // Padding row is gray
        assert!((input[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 1e-6);
        // Image row is red
        assert!((input[[0, 0, 32, 10]] - 1.0).abs() < 1e-2);
        assert!(input[[0, 1, 32, 10]].abs() < 1e-2);
    }

    #[test]
    fn test_decode_channels_first_output() {
        // Two classes, three anchors: attributes are [cx, cy, w, h, c0, c1]
        let anchors = 3;
        #[rustfmt::skip]
        let data = vec![
            100.0, 300.0, 500.0, // cx
            100.0, 300.0, 500.0, // cy
             20.0,  40.0,  10.0, // w
             20.0,  40.0,  10.0, // h
              0.9,   0.1,  0.05, // class 0
              0.1,   0.8,  0.10, // class 1
        ];
        let boxes = decode_output(
            &data,
            &[1, 6, anchors],
            &identity(),
            0.25,
            0.45,
            &names(&["car", "truck"]),
            (640, 640),
        )
        .unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class, "car");
        assert_eq!((boxes[0].x1, boxes[0].y1, boxes[0].x2, boxes[0].y2), (90.0, 90.0, 110.0, 110.0));
        assert_eq!(boxes[1].class, "truck");
        assert!((boxes[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_transposed_output() {
        #[rustfmt::skip]
        let data = vec![
            // cx, cy, w, h, c0, c1 per anchor
            50.0, 60.0, 10.0, 10.0, 0.2, 0.7,
            10.0, 10.0,  4.0,  4.0, 0.1, 0.1,
        ];
        let boxes = decode_output(
            &data,
            &[1, 2, 6],
            &identity(),
            0.25,
            0.45,
            &names(&["car", "bus"]),
            (640, 640),
        )
        .unwrap();

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class, "bus");
        assert_eq!(boxes[0].center().x, 50);
    }

    #[test]
    fn test_decode_undoes_letterbox_and_clamps() {
        let lb = Letterbox::new(1280, 720, 640);
        #[rustfmt::skip]
        let data = vec![
            320.0, 5.0,
            320.0, 145.0,
             40.0, 20.0,
             20.0, 20.0,
              0.9, 0.9,
        ];
        let boxes = decode_output(&data, &[1, 5, 2], &lb, 0.25, 0.45, &names(&["car"]), (1280, 720))
            .unwrap();

        assert_eq!(boxes.len(), 2);
        let centered = boxes.iter().find(|b| b.x1 > 500.0).unwrap();
        assert!((centered.x1 - 600.0).abs() < 1e-3);
        assert!((centered.y1 - 340.0).abs() < 1e-3);

        // Box straddling the left edge is clamped to the frame
        let edge = boxes.iter().find(|b| b.x1 < 500.0).unwrap();
        assert_eq!(edge.x1, 0.0);
    }

    #[test]
    fn test_decode_drops_low_confidence_and_overlaps() {
        #[rustfmt::skip]
        let data = vec![
            100.0, 101.0, 300.0,
            100.0, 101.0, 300.0,
             50.0,  50.0,  50.0,
             50.0,  50.0,  50.0,
              0.9,   0.6,  0.2,
        ];
        let boxes =
            decode_output(&data, &[1, 5, 3], &identity(), 0.25, 0.45, &names(&["car"]), (640, 640))
                .unwrap();

        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_unknown_class_id_gets_placeholder_label() {
        let data = vec![10.0, 10.0, 4.0, 4.0, 0.1, 0.9];
        let boxes =
            decode_output(&data, &[1, 6, 1], &identity(), 0.25, 0.45, &names(&["car"]), (640, 640))
                .unwrap();
        assert_eq!(boxes[0].class, "class_1");
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let data = vec![0.0; 12];
        assert!(decode_output(&data, &[6, 2], &identity(), 0.25, 0.45, &[], (640, 640)).is_err());
        assert!(decode_output(&data, &[1, 3, 4], &identity(), 0.25, 0.45, &[], (640, 640)).is_err());
        assert!(decode_output(&data, &[1, 6, 3], &identity(), 0.25, 0.45, &[], (640, 640)).is_err());
    }

    #[test]
    fn test_parse_class_names() {
        let parsed = parse_class_names("{0: 'person', 1: 'bicycle', 2: 'car'}").unwrap();
        assert_eq!(parsed, names(&["person", "bicycle", "car"]));
    }

    #[test]
    fn test_parse_class_names_rejects_gaps_and_garbage() {
        assert!(parse_class_names("{0: 'person', 2: 'car'}").is_none());
        assert!(parse_class_names("not a dict").is_none());
        assert!(parse_class_names("{}").is_none());
    }
}
