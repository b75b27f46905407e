//! Vision Layer
//!
//! Runs an object detector on decoded frames and reduces vehicle boxes to
//! center-point detections for the occupancy test. The detector itself is
//! behind the [`Detector`] trait; the shipped backend is a YOLOv8 ONNX model
//! run with ONNX Runtime.

pub mod models;
pub mod yolo;

use thiserror::Error;

use crate::slots::Point;
use crate::video::Frame;

pub use models::{ModelManager, OnnxSession};
pub use yolo::YoloDetector;

/// Default allow-list of vehicle-like classes
pub const DEFAULT_VEHICLE_CLASSES: &[&str] = &["car", "truck", "bus", "motorcycle", "bicycle"];

/// Errors raised by detector backends
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("ONNX Runtime error")]
    Ort(#[from] ort::Error),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("unexpected model output: {0}")]
    InvalidOutput(String),
}

/// Axis-aligned detector output box in frame pixels
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class: String,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.union(other);
        if union <= 0.0 {
            0.0
        } else {
            self.intersection(other) / union
        }
    }

    /// Center point with corners truncated to whole pixels first
    pub fn center(&self) -> Point {
        let x1 = self.x1 as i32;
        let y1 = self.y1 as i32;
        let x2 = self.x2 as i32;
        let y2 = self.y2 as i32;
        Point::new((x1 + x2) / 2, (y1 + y2) / 2)
    }
}

/// A vehicle detection reduced to its label and center point
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub center: Point,
    /// Source box, kept for rendering
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self {
            label: bbox.class.clone(),
            center: bbox.center(),
            bbox: bbox.clone(),
        }
    }
}

/// Object detector backend
pub trait Detector {
    /// Backend identifier
    fn name(&self) -> &str;

    /// Run detection on a frame, returning boxes in frame pixel coordinates
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
        (**self).detect(frame)
    }
}

/// Keep only allow-listed classes and reduce each box to a detection
pub fn vehicle_detections<S: AsRef<str>>(boxes: &[BoundingBox], allow_list: &[S]) -> Vec<Detection> {
    boxes
        .iter()
        .filter(|b| allow_list.iter().any(|class| class.as_ref() == b.class))
        .map(Detection::from_box)
        .collect()
}

/// Greedy class-wise non-maximum suppression
///
/// Boxes are kept in descending confidence order; a box is dropped when it
/// overlaps an already kept box of the same class by at least `iou_threshold`.
pub fn non_maximum_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept
            .iter()
            .any(|k| k.class == candidate.class && k.iou(&candidate) >= iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// COCO class names in YOLOv8 class-id order
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(class: &str, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x1,
            y1,
            x2,
            y2,
            class: class.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_center_truncates_like_integer_pixels() {
        let b = bbox("car", 10.9, 20.2, 31.7, 41.0, 0.9);
        // (10 + 31) / 2 = 20, (20 + 41) / 2 = 30
        assert_eq!(b.center(), Point::new(20, 30));
    }

    #[test]
    fn test_iou_of_disjoint_boxes_is_zero() {
        let a = bbox("car", 0.0, 0.0, 10.0, 10.0, 0.9);
        let b = bbox("car", 20.0, 20.0, 30.0, 30.0, 0.9);
        assert_eq!(a.intersection(&b), 0.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_of_identical_boxes_is_one() {
        let a = bbox("car", 0.0, 0.0, 10.0, 10.0, 0.9);
        assert!((a.iou(&a.clone()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vehicle_filter_drops_other_classes() {
        let boxes = vec![
            bbox("car", 0.0, 0.0, 10.0, 10.0, 0.9),
            bbox("person", 0.0, 0.0, 4.0, 10.0, 0.8),
            bbox("truck", 20.0, 20.0, 60.0, 40.0, 0.7),
            bbox("dog", 5.0, 5.0, 8.0, 8.0, 0.6),
        ];

        let detections = vehicle_detections(&boxes, DEFAULT_VEHICLE_CLASSES);
        let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["car", "truck"]);
        assert_eq!(detections[1].center, Point::new(40, 30));
    }

    #[test]
    fn test_vehicle_filter_with_owned_allow_list() {
        let allow = vec!["bus".to_string()];
        let boxes = vec![bbox("car", 0.0, 0.0, 1.0, 1.0, 0.9), bbox("bus", 0.0, 0.0, 1.0, 1.0, 0.9)];
        assert_eq!(vehicle_detections(&boxes, allow.as_slice()).len(), 1);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping_same_class() {
        let boxes = vec![
            bbox("car", 0.0, 0.0, 10.0, 10.0, 0.6),
            bbox("car", 1.0, 1.0, 11.0, 11.0, 0.9),
            bbox("car", 50.0, 50.0, 60.0, 60.0, 0.5),
        ];

        let kept = non_maximum_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_nms_is_class_wise() {
        let boxes = vec![
            bbox("car", 0.0, 0.0, 10.0, 10.0, 0.9),
            bbox("truck", 0.0, 0.0, 10.0, 10.0, 0.8),
        ];
        assert_eq!(non_maximum_suppression(boxes, 0.45).len(), 2);
    }

    #[test]
    fn test_coco_vehicle_ids() {
        assert_eq!(COCO_CLASSES[1], "bicycle");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES[3], "motorcycle");
        assert_eq!(COCO_CLASSES[5], "bus");
        assert_eq!(COCO_CLASSES[7], "truck");
    }
}
