//! Monitor dashboard application
//!
//! Pick a catalog video or an uploaded file, start the monitor and watch the
//! annotated frames and counters. One frame is processed per UI update.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui;
use egui::{FontId, RichText, Sense, TextureHandle};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::dashboard::components::{
    frame_to_color_image, paint_slot, show_frame, update_texture, CardStatus, StatusCard,
};
use crate::dashboard::theme::{self, OverlayColors, ThemeColors};
use crate::monitor::{load_slots_or_empty, MonitorSession, OccupancyReport, SlotStatus};
use crate::slots::{storage_key, SlotCollection, SlotStore};
use crate::video::{open_source, FrameSource};
use crate::vision::{Detection, YoloDetector};

/// Which video the next run reads
#[derive(Debug, Clone, PartialEq)]
pub enum VideoChoice {
    /// Index into the configured catalog
    Catalog(usize),
    /// A local file copied into a temporary upload
    Upload,
}

type ActiveSession = MonitorSession<Box<dyn FrameSource>, YoloDetector>;

/// A running monitor and the resources it keeps alive
struct MonitorRun {
    session: ActiveSession,
    label: String,
    /// Removed from disk when the run is dropped
    _upload: Option<NamedTempFile>,
}

/// What the last processed frame showed
struct DisplayState {
    frame_size: (u32, u32),
    detections: Vec<Detection>,
    occupancy: OccupancyReport,
    slots: SlotCollection,
}

/// Message shown under the controls
struct Notice {
    text: String,
    color: egui::Color32,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: ThemeColors::TEXT_SECONDARY,
        }
    }

    fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: ThemeColors::ACCENT_WARNING,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: ThemeColors::ACCENT_ERROR,
        }
    }
}

/// The monitor dashboard application
pub struct MonitorApp {
    config: AppConfig,
    store: SlotStore,
    model_path: PathBuf,
    choice: VideoChoice,
    upload_path: String,
    /// Loaded lazily on the first start and reused across runs
    detector: Option<YoloDetector>,
    run: Option<MonitorRun>,
    display: Option<DisplayState>,
    texture: Option<TextureHandle>,
    notices: Vec<Notice>,
    theme_applied: bool,
}

impl MonitorApp {
    pub fn new(config: AppConfig, model_path: PathBuf, initial: Option<VideoChoice>) -> Self {
        let store = SlotStore::new(config.storage.slot_dir.clone());
        let choice = initial.unwrap_or(if config.videos.is_empty() {
            VideoChoice::Upload
        } else {
            VideoChoice::Catalog(0)
        });

        Self {
            config,
            store,
            model_path,
            choice,
            upload_path: String::new(),
            detector: None,
            run: None,
            display: None,
            texture: None,
            notices: Vec::new(),
            theme_applied: false,
        }
    }

    /// Create eframe options for the dashboard window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 860.0])
                .with_min_inner_size([800.0, 560.0])
                .with_title("Parking Monitor"),
            ..Default::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    fn choice_label(&self, choice: &VideoChoice) -> String {
        match choice {
            VideoChoice::Catalog(i) => self
                .config
                .videos
                .get(*i)
                .map(|v| v.label.clone())
                .unwrap_or_else(|| format!("Video {}", i + 1)),
            VideoChoice::Upload => "Upload a file...".to_string(),
        }
    }

    /// Start monitoring the selected video
    pub fn start(&mut self) {
        self.notices.clear();
        match self.open_run() {
            Ok(run) => {
                info!("Started monitoring {}", run.label);
                if run.session.slots().is_empty() {
                    self.notices.push(Notice::warning(format!(
                        "No slots defined for {}. Run `parking-monitor edit` first; counts will stay at 0.",
                        run.label
                    )));
                }
                self.display = None;
                self.run = Some(run);
            }
            Err(e) => {
                error!("Failed to start monitor: {:#}", e);
                self.notices.push(Notice::error(format!("{:#}", e)));
            }
        }
    }

    /// Stop the current run, releasing the source and any upload
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            info!(
                "Stopped monitoring {} after {} frames",
                run.label,
                run.session.frames_processed()
            );
            self.detector = Some(run.session.into_detector());
        }
    }

    fn open_run(&mut self) -> Result<MonitorRun> {
        let (label, slot_name, source_path, upload) = match &self.choice {
            VideoChoice::Catalog(i) => {
                let entry = self
                    .config
                    .videos
                    .get(*i)
                    .context("Selected video is not in the catalog")?;
                let name = entry.path.to_string_lossy().into_owned();
                (entry.label.clone(), name, entry.path.clone(), None)
            }
            VideoChoice::Upload => {
                let original = PathBuf::from(self.upload_path.trim());
                if original.as_os_str().is_empty() {
                    anyhow::bail!("Enter the path of a video to upload");
                }
                let upload = copy_to_upload(&original)?;
                let name = original
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let path = upload.path().to_path_buf();
                (name.clone(), name, path, Some(upload))
            }
        };

        let slots = load_slots_or_empty(&self.store, &slot_name)
            .with_context(|| format!("Slot file for {} is unreadable", label))?;
        let source = open_source(&source_path)
            .with_context(|| format!("Failed to open video {:?}", source_path))?;

        let detector = match self.detector.take() {
            Some(detector) => detector,
            None => YoloDetector::new(&self.model_path, &self.config.detector)
                .with_context(|| format!("Failed to load detector model {:?}", self.model_path))?,
        };

        let session = MonitorSession::new(
            source,
            detector,
            slots,
            self.config.detector.vehicle_classes.clone(),
        );

        Ok(MonitorRun {
            session,
            label,
            _upload: upload,
        })
    }

    /// Process one frame of the active run
    fn advance(&mut self, ctx: &egui::Context) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        match run.session.next() {
            Some(Ok(report)) => {
                let image = frame_to_color_image(&report.frame);
                update_texture(ctx, &mut self.texture, "monitor_frame", image);
                self.display = Some(DisplayState {
                    frame_size: report.frame.dimensions(),
                    detections: report.detections,
                    occupancy: report.occupancy,
                    slots: run.session.slots().clone(),
                });
                ctx.request_repaint();
            }
            Some(Err(e)) => {
                error!("Monitor stopped: {}", e);
                self.notices.push(Notice::error(format!("Monitor stopped: {}", e)));
                self.stop();
            }
            None => {
                self.notices.push(Notice::info("End of video"));
                self.stop();
            }
        }
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("Video").color(ThemeColors::TEXT_SECONDARY));

            let running = self.is_running();
            ui.add_enabled_ui(!running, |ui| {
                let mut choice = self.choice.clone();
                egui::ComboBox::from_id_salt("video_choice")
                    .selected_text(self.choice_label(&choice))
                    .width(200.0)
                    .show_ui(ui, |ui| {
                        for i in 0..self.config.videos.len() {
                            let option = VideoChoice::Catalog(i);
                            let label = self.choice_label(&option);
                            ui.selectable_value(&mut choice, option, label);
                        }
                        ui.selectable_value(&mut choice, VideoChoice::Upload, "Upload a file...");
                    });
                self.choice = choice;

                if self.choice == VideoChoice::Upload {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.upload_path)
                            .hint_text("path/to/video.mp4")
                            .desired_width(280.0),
                    );
                }
            });

            if running {
                if ui.button("Stop").clicked() {
                    self.stop();
                }
            } else if ui.button("Start").clicked() {
                self.start();
            }
        });

        for notice in &self.notices {
            ui.label(RichText::new(&notice.text).color(notice.color));
        }
    }

    fn render_counters(&self, ui: &mut egui::Ui) {
        let (total, vacant, occupied) = match &self.display {
            Some(display) => (
                display.occupancy.total().to_string(),
                display.occupancy.vacant.to_string(),
                display.occupancy.occupied.to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };

        ui.horizontal(|ui| {
            StatusCard::new("Total slots", total, CardStatus::Neutral).show(ui);
            StatusCard::new("Vacant", vacant, CardStatus::Good).show(ui);
            StatusCard::new("Occupied", occupied, CardStatus::Alert).show(ui);

            let caption = match &self.run {
                Some(run) => format!("{} - frame {}", run.label, run.session.frames_processed()),
                None => "Stopped".to_string(),
            };
            StatusCard::new("Status", if self.is_running() { "Running" } else { "Idle" }, CardStatus::Idle)
                .with_caption(caption)
                .show(ui);
        });
    }

    fn render_frame(&self, ui: &mut egui::Ui) {
        let (Some(texture), Some(display)) = (&self.texture, &self.display) else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Press Start to begin monitoring").color(ThemeColors::TEXT_MUTED));
            });
            return;
        };

        let (_, transform) = show_frame(ui, texture, display.frame_size, Sense::hover());
        let painter = ui.painter();

        if self.config.monitor.show_detections {
            for detection in &display.detections {
                let b = &detection.bbox;
                let rect = transform.rect_to_screen(b.x1, b.y1, b.x2, b.y2);
                painter.rect_stroke(rect, 0.0, egui::Stroke::new(2.0, OverlayColors::DETECTION));
                painter.text(
                    rect.left_top(),
                    egui::Align2::LEFT_BOTTOM,
                    &detection.label,
                    FontId::proportional(13.0),
                    OverlayColors::DETECTION,
                );
                painter.circle_filled(transform.to_screen(detection.center), 3.0, OverlayColors::DETECTION);
            }
        }

        for (i, (slot, status)) in display
            .slots
            .iter()
            .zip(&display.occupancy.statuses)
            .enumerate()
        {
            let color = match status {
                SlotStatus::Occupied => OverlayColors::OCCUPIED,
                SlotStatus::Vacant => OverlayColors::VACANT,
            };
            paint_slot(painter, &transform, slot, color, color);
            painter.text(
                transform.to_screen(slot.first_point()),
                egui::Align2::LEFT_BOTTOM,
                format!("{}: {}", i + 1, status.label()),
                FontId::proportional(13.0),
                color,
            );
        }
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme once
        if !self.theme_applied {
            theme::apply_theme(ctx);
            self.theme_applied = true;
        }

        self.advance(ctx);

        egui::TopBottomPanel::top("controls")
            .frame(egui::Frame::none().fill(ThemeColors::BG_DARK).inner_margin(16.0))
            .show(ctx, |ui| {
                ui.heading("Parking Monitor");
                ui.add_space(8.0);
                self.render_controls(ui);
                ui.add_space(8.0);
                self.render_counters(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_frame(ui);
        });
    }
}

/// Copy a local file into a temporary upload that keeps its extension
fn copy_to_upload(original: &Path) -> Result<NamedTempFile> {
    let bytes = std::fs::read(original)
        .with_context(|| format!("Failed to read uploaded file {:?}", original))?;

    let suffix = original
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut upload = tempfile::Builder::new()
        .prefix("parking-upload-")
        .suffix(&suffix)
        .tempfile()
        .context("Failed to create temporary upload file")?;
    upload.write_all(&bytes)?;
    upload.flush()?;

    info!(
        "Uploaded {:?} ({} bytes) as {:?}, slots keyed by {}",
        original,
        bytes.len(),
        upload.path(),
        storage_key(&original.to_string_lossy())
    );
    Ok(upload)
}

/// Run the dashboard application
pub fn run_dashboard(config: AppConfig, model_path: PathBuf, initial: Option<VideoChoice>) -> Result<()> {
    if config.videos.is_empty() {
        warn!("Video catalog is empty; only uploads are available");
    }
    let app = MonitorApp::new(config, model_path, initial);
    eframe::run_native(
        "Parking Monitor",
        MonitorApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("Dashboard window failed: {}", e))
}
