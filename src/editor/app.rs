//! Slot editor window
//!
//! Shows a freeze-frame of the video and feeds pointer and keyboard input
//! into an [`EditorSession`].

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use eframe::egui;
use egui::{Color32, ColorImage, Event, FontId, Key, PointerButton, RichText, Sense, TextureHandle};
use tracing::{error, info};

use super::session::{EditorSession, PointerEvent};
use crate::dashboard::components::{paint_slot, show_frame, update_texture, FrameTransform};
use crate::dashboard::theme::{self, OverlayColors, ThemeColors};
use crate::slots::SlotStore;

/// How the editor window was closed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditorOutcome {
    /// Slots were written to this file
    Saved(PathBuf),
    /// Closed without writing
    #[default]
    Discarded,
}

pub const KEY_HELP: &str = "[s] Save   [q] Quit   [c] Copy last   [Del] / right-click Delete last";

/// The slot editor application
pub struct EditorApp {
    session: EditorSession,
    store: SlotStore,
    /// Video name the slot file is keyed by
    video: String,
    pending_image: Option<ColorImage>,
    frame_size: (u32, u32),
    texture: Option<TextureHandle>,
    transform: Option<FrameTransform>,
    theme_applied: bool,
    status: Option<(String, Color32)>,
    outcome: Rc<RefCell<EditorOutcome>>,
}

impl EditorApp {
    pub fn new(
        session: EditorSession,
        store: SlotStore,
        video: String,
        image: ColorImage,
        outcome: Rc<RefCell<EditorOutcome>>,
    ) -> Self {
        let frame_size = (image.size[0] as u32, image.size[1] as u32);
        Self {
            session,
            store,
            video,
            pending_image: Some(image),
            frame_size,
            texture: None,
            transform: None,
            theme_applied: false,
            status: None,
            outcome,
        }
    }

    /// Create eframe options for the editor window
    pub fn options(title: &str, frame_size: (u32, u32)) -> eframe::NativeOptions {
        let width = (frame_size.0 as f32).clamp(640.0, 1600.0);
        let height = (frame_size.1 as f32).clamp(360.0, 900.0) + 60.0;
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([width, height])
                .with_min_inner_size([480.0, 320.0])
                .with_title(title),
            ..Default::default()
        }
    }

    fn save(&mut self, ctx: &egui::Context) {
        match self.store.save(&self.video, self.session.slots()) {
            Ok(path) => {
                info!("Saved {} slots to {:?}", self.session.slots().len(), path);
                *self.outcome.borrow_mut() = EditorOutcome::Saved(path);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            Err(e) => {
                error!("Failed to save slots: {}", e);
                self.status = Some((format!("Save failed: {}", e), ThemeColors::ACCENT_ERROR));
            }
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (save, quit, copy, delete) = ctx.input(|i| {
            (
                i.key_pressed(Key::S),
                i.key_pressed(Key::Q) || i.key_pressed(Key::Escape),
                i.key_pressed(Key::C),
                i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace),
            )
        });

        if copy && self.session.copy_last().is_some() {
            info!("Copied last slot as slot {}", self.session.slots().len());
        }
        if delete {
            self.delete_last();
        }

        if !self.session.is_idle() {
            return;
        }
        if save {
            self.save(ctx);
        } else if quit {
            info!("Exiting without saving changes");
            *self.outcome.borrow_mut() = EditorOutcome::Discarded;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn delete_last(&mut self) {
        if self.session.delete_last().is_some() {
            info!("Deleted last slot, {} remaining", self.session.slots().len());
        }
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, transform: FrameTransform) {
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed: true,
                    ..
                } if transform.contains(pos) => {
                    self.session.handle(PointerEvent::Press(transform.to_frame(pos)));
                }
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed: false,
                    ..
                } => {
                    self.session.handle(PointerEvent::Release(transform.to_frame(pos)));
                }
                Event::PointerButton {
                    pos,
                    button: PointerButton::Secondary,
                    pressed: true,
                    ..
                } if transform.contains(pos) => self.delete_last(),
                Event::PointerMoved(pos) => {
                    self.session.handle(PointerEvent::Move(transform.to_frame(pos)));
                }
                _ => {}
            }
        }
    }

    fn paint(&self, painter: &egui::Painter, transform: &FrameTransform) {
        if let Some(shape) = self.session.in_progress() {
            paint_slot(
                painter,
                transform,
                &shape,
                OverlayColors::IN_PROGRESS,
                OverlayColors::IN_PROGRESS_CORNER,
            );
        }

        for (i, slot) in self.session.slots().iter().enumerate() {
            paint_slot(painter, transform, slot, OverlayColors::SLOT, OverlayColors::SLOT_CORNER);
            painter.text(
                transform.to_screen(slot.first_point()),
                egui::Align2::LEFT_BOTTOM,
                format!("Slot {}", i + 1),
                FontId::proportional(14.0),
                OverlayColors::SLOT_LABEL,
            );
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme once
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        if let Some(image) = self.pending_image.take() {
            update_texture(ctx, &mut self.texture, "editor_frame", image);
        }

        // Pointer input is mapped through last frame's layout
        if let Some(transform) = self.transform {
            self.handle_pointer(ctx, transform);
        }
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("editor_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(&self.video).strong().color(ThemeColors::TEXT_PRIMARY));
                ui.label(
                    RichText::new(format!("{} slots", self.session.slots().len()))
                        .color(ThemeColors::TEXT_SECONDARY),
                );
                ui.separator();
                ui.label(RichText::new(KEY_HELP).size(13.0).color(ThemeColors::TEXT_MUTED));
            });
            if let Some((message, color)) = &self.status {
                ui.label(RichText::new(message).color(*color));
            }
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(ThemeColors::BG_DARK))
            .show(ctx, |ui| {
                let Some(texture) = self.texture.clone() else {
                    ui.spinner();
                    return;
                };
                let (response, transform) =
                    show_frame(ui, &texture, self.frame_size, Sense::click_and_drag());
                self.transform = Some(transform);
                self.paint(ui.painter(), &transform);

                if response.hovered() {
                    ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
                }
            });
    }
}
