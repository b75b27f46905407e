//! Status card component for displaying a single counter

use egui::{Color32, RichText, Rounding, Vec2};
use crate::dashboard::theme::ThemeColors;

/// A card displaying one labeled value
pub struct StatusCard {
    pub title: String,
    pub value: String,
    pub status: CardStatus,
    pub caption: Option<String>,
}

/// Accent of a card
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardStatus {
    Neutral,
    Good,
    Alert,
    Idle,
}

impl CardStatus {
    pub fn color(&self) -> Color32 {
        match self {
            CardStatus::Neutral => ThemeColors::ACCENT_PRIMARY,
            CardStatus::Good => ThemeColors::STATUS_VACANT,
            CardStatus::Alert => ThemeColors::STATUS_OCCUPIED,
            CardStatus::Idle => ThemeColors::TEXT_MUTED,
        }
    }
}

impl StatusCard {
    pub fn new(title: impl Into<String>, value: impl Into<String>, status: CardStatus) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            status,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(ThemeColors::BG_MEDIUM)
            .rounding(Rounding::same(8.0))
            .inner_margin(16.0)
            .show(ui, |ui| {
                ui.set_min_width(160.0);

                ui.horizontal(|ui| {
                    // Status indicator dot
                    let dot_rect = egui::Rect::from_center_size(
                        ui.cursor().left_top() + Vec2::new(6.0, 10.0),
                        Vec2::splat(8.0),
                    );
                    ui.painter().circle_filled(dot_rect.center(), 4.0, self.status.color());
                    ui.add_space(16.0);

                    ui.vertical(|ui| {
                        ui.label(
                            RichText::new(&self.title)
                                .size(12.0)
                                .color(ThemeColors::TEXT_MUTED)
                        );

                        ui.add_space(4.0);

                        ui.label(
                            RichText::new(&self.value)
                                .size(28.0)
                                .color(self.status.color())
                                .strong()
                        );

                        if let Some(caption) = &self.caption {
                            ui.add_space(4.0);
                            ui.label(
                                RichText::new(caption)
                                    .size(11.0)
                                    .color(ThemeColors::TEXT_SECONDARY)
                            );
                        }
                    });
                });
            });
    }
}
