//! Frame display with screen/frame coordinate mapping
//!
//! Frames are drawn scaled to fit the available space with their aspect
//! ratio preserved. Everything the user points at is converted back to
//! frame pixels before it reaches the slot model.

use egui::{pos2, vec2, Color32, ColorImage, Pos2, Rect, Response, Sense, Stroke, TextureHandle};

use crate::slots::{Point, Slot};
use crate::video::Frame;

/// Placement of a frame on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// Screen rectangle the frame is drawn into
    pub rect: Rect,
    /// Screen points per frame pixel
    pub scale: f32,
    pub frame_size: (u32, u32),
}

impl FrameTransform {
    /// Largest aspect-preserving fit of `frame_size` inside `available`, centered
    pub fn fit(available: Rect, frame_size: (u32, u32)) -> Self {
        let (w, h) = (frame_size.0.max(1) as f32, frame_size.1.max(1) as f32);
        let scale = (available.width() / w).min(available.height() / h).max(f32::EPSILON);
        let rect = Rect::from_center_size(available.center(), vec2(w * scale, h * scale));
        Self {
            rect,
            scale,
            frame_size,
        }
    }

    pub fn to_screen(&self, point: Point) -> Pos2 {
        self.rect.min + vec2(point.x as f32, point.y as f32) * self.scale
    }

    /// Frame pixel under a screen position, clamped to the frame
    pub fn to_frame(&self, pos: Pos2) -> Point {
        let local = (pos - self.rect.min) / self.scale;
        let max_x = self.frame_size.0.saturating_sub(1) as f32;
        let max_y = self.frame_size.1.saturating_sub(1) as f32;
        Point::new(
            local.x.round().clamp(0.0, max_x) as i32,
            local.y.round().clamp(0.0, max_y) as i32,
        )
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        self.rect.contains(pos)
    }

    /// Frame-space rectangle in screen coordinates
    pub fn rect_to_screen(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Rect {
        Rect::from_two_pos(
            self.rect.min + vec2(x1, y1) * self.scale,
            self.rect.min + vec2(x2, y2) * self.scale,
        )
    }
}

/// Convert a BGR frame into an egui image
pub fn frame_to_color_image(frame: &Frame) -> ColorImage {
    ColorImage::from_rgb(
        [frame.width as usize, frame.height as usize],
        &frame.to_rgb_bytes(),
    )
}

/// Upload or replace the texture holding the current frame
pub fn update_texture(
    ctx: &egui::Context,
    texture: &mut Option<TextureHandle>,
    name: &str,
    image: ColorImage,
) {
    match texture {
        Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
        None => *texture = Some(ctx.load_texture(name, image, egui::TextureOptions::LINEAR)),
    }
}

/// Draw the texture scaled into the remaining space of `ui`
pub fn show_frame(
    ui: &mut egui::Ui,
    texture: &TextureHandle,
    frame_size: (u32, u32),
    sense: Sense,
) -> (Response, FrameTransform) {
    let available = ui.available_rect_before_wrap();
    let transform = FrameTransform::fit(available, frame_size);
    let response = ui.allocate_rect(transform.rect, sense);
    ui.painter().image(
        texture.id(),
        transform.rect,
        Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
        Color32::WHITE,
    );
    (response, transform)
}

/// Draw a slot as a closed outline with filled corner markers
pub fn paint_slot(
    painter: &egui::Painter,
    transform: &FrameTransform,
    slot: &Slot,
    outline: Color32,
    corners: Color32,
) {
    let points: Vec<Pos2> = slot.points().iter().map(|p| transform.to_screen(*p)).collect();
    painter.add(egui::Shape::closed_line(points.clone(), Stroke::new(2.0, outline)));
    for point in points {
        painter.circle_filled(point, 5.0, corners);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_wide_frame_letterboxes_vertically() {
        let available = Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 800.0));
        let transform = FrameTransform::fit(available, (1600, 800));

        assert!((transform.scale - 0.5).abs() < 1e-6);
        assert_eq!(transform.rect.min, pos2(0.0, 200.0));
        assert_eq!(transform.rect.max, pos2(800.0, 600.0));
    }

    #[test]
    fn test_screen_frame_round_trip() {
        let available = Rect::from_min_size(pos2(100.0, 50.0), vec2(640.0, 360.0));
        let transform = FrameTransform::fit(available, (1280, 720));

        let point = Point::new(640, 360);
        let screen = transform.to_screen(point);
        assert_eq!(screen, pos2(420.0, 230.0));
        assert_eq!(transform.to_frame(screen), point);
    }

    #[test]
    fn test_to_frame_clamps_outside_positions() {
        let available = Rect::from_min_size(pos2(0.0, 0.0), vec2(100.0, 100.0));
        let transform = FrameTransform::fit(available, (100, 100));

        assert_eq!(transform.to_frame(pos2(-20.0, 150.0)), Point::new(0, 99));
    }

    #[test]
    fn test_frame_to_color_image_swaps_channels() {
        let frame = Frame::from_bgr(vec![10, 20, 30], 1, 1, 0).unwrap();
        let image = frame_to_color_image(&frame);
        assert_eq!(image.size, [1, 1]);
        assert_eq!(image.pixels[0], Color32::from_rgb(30, 20, 10));
    }
}
