//! Dashboard theme and styling
//!
//! Dark theme shared by the monitor dashboard and the slot editor, plus the
//! overlay colors used to draw slots and detections.

use egui::{Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Dark color palette
pub struct ThemeColors;

impl ThemeColors {
    // Background colors
    pub const BG_DARK: Color32 = Color32::from_rgb(18, 18, 24);
    pub const BG_MEDIUM: Color32 = Color32::from_rgb(28, 28, 36);
    pub const BG_LIGHT: Color32 = Color32::from_rgb(38, 38, 48);
    pub const BG_HOVER: Color32 = Color32::from_rgb(48, 48, 60);

    // Accent colors
    pub const ACCENT_PRIMARY: Color32 = Color32::from_rgb(88, 166, 255);
    pub const ACCENT_WARNING: Color32 = Color32::from_rgb(255, 193, 7);
    pub const ACCENT_ERROR: Color32 = Color32::from_rgb(231, 76, 60);

    // Text colors
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(240, 240, 245);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(160, 160, 175);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(100, 100, 115);

    // Border colors
    pub const BORDER: Color32 = Color32::from_rgb(50, 50, 65);

    // Occupancy colors
    pub const STATUS_VACANT: Color32 = Color32::from_rgb(46, 204, 113);
    pub const STATUS_OCCUPIED: Color32 = Color32::from_rgb(231, 76, 60);
}

/// Colors drawn over video frames
pub struct OverlayColors;

impl OverlayColors {
    pub const DETECTION: Color32 = Color32::from_rgb(0, 255, 255);
    pub const OCCUPIED: Color32 = Color32::from_rgb(255, 0, 0);
    pub const VACANT: Color32 = Color32::from_rgb(0, 255, 0);
    /// Slot being drawn in the editor
    pub const IN_PROGRESS: Color32 = Color32::from_rgb(255, 255, 0);
    pub const IN_PROGRESS_CORNER: Color32 = Color32::WHITE;
    /// Committed slot in the editor
    pub const SLOT: Color32 = Color32::from_rgb(255, 0, 255);
    pub const SLOT_CORNER: Color32 = Color32::from_rgb(0, 255, 0);
    pub const SLOT_LABEL: Color32 = Color32::from_rgb(255, 255, 0);
}

/// Apply the dark theme to egui
///
/// Both windows call this once on their first update.
pub fn apply_theme(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = Visuals::dark();

    visuals.window_fill = ThemeColors::BG_MEDIUM;
    visuals.panel_fill = ThemeColors::BG_DARK;
    visuals.faint_bg_color = ThemeColors::BG_LIGHT;
    visuals.extreme_bg_color = ThemeColors::BG_DARK;

    let widgets = &mut visuals.widgets;
    let states = [
        (&mut widgets.noninteractive, ThemeColors::BG_MEDIUM, ThemeColors::TEXT_SECONDARY),
        (&mut widgets.inactive, ThemeColors::BG_LIGHT, ThemeColors::TEXT_PRIMARY),
        (&mut widgets.hovered, ThemeColors::BG_HOVER, ThemeColors::TEXT_PRIMARY),
        (&mut widgets.active, ThemeColors::ACCENT_PRIMARY, ThemeColors::TEXT_PRIMARY),
        (&mut widgets.open, ThemeColors::BG_HOVER, ThemeColors::TEXT_PRIMARY),
    ];
    for (state, fill, text) in states {
        state.bg_fill = fill;
        state.weak_bg_fill = fill;
        state.fg_stroke = Stroke::new(1.0, text);
        state.rounding = Rounding::same(4.0);
    }

    visuals.selection.bg_fill = color_with_alpha(ThemeColors::ACCENT_PRIMARY, 77);
    visuals.selection.stroke = Stroke::new(1.0, ThemeColors::ACCENT_PRIMARY);
    visuals.window_rounding = Rounding::same(6.0);
    visuals.window_stroke = Stroke::new(1.0, ThemeColors::BORDER);
    visuals.menu_rounding = Rounding::same(4.0);
    style.visuals = visuals;

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.button_padding = egui::vec2(14.0, 6.0);

    // Counters and slot labels are read at a distance
    style.text_styles = [
        (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
        (TextStyle::Button, FontId::new(15.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(24.0, FontFamily::Proportional)),
    ]
    .into();

    ctx.set_style(style);
}

/// Same color with a different alpha
pub fn color_with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_with_alpha_keeps_channels() {
        let color = color_with_alpha(Color32::from_rgb(255, 0, 0), 255);
        assert_eq!(color, Color32::from_rgb(255, 0, 0));
        assert_eq!(color_with_alpha(ThemeColors::ACCENT_PRIMARY, 0).a(), 0);
    }

    #[test]
    fn test_occupancy_colors_differ() {
        assert_ne!(OverlayColors::OCCUPIED, OverlayColors::VACANT);
        assert_ne!(ThemeColors::STATUS_OCCUPIED, ThemeColors::STATUS_VACANT);
    }
}
