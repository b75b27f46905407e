//! Interactive Slot Editor
//!
//! Draw, drag, copy and delete quadrilateral slots over the first frame of a
//! video, then save them to the slot store.

pub mod app;
pub mod session;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::EditorSettings;
use crate::dashboard::components::frame_to_color_image;
use crate::slots::{SlotCollection, SlotStore};
use crate::video::first_frame;

pub use app::{EditorApp, EditorOutcome};
pub use session::{EditorSession, Gesture, PointerEvent};

/// Open the editor window for a video and block until it closes
///
/// `video` is the name the slot file is keyed by; `source` is where frames are
/// read from. A malformed existing slot file aborts before the window opens.
pub fn run_editor(
    video: &str,
    source: &Path,
    store: SlotStore,
    settings: EditorSettings,
) -> Result<EditorOutcome> {
    let frame = first_frame(source)
        .with_context(|| format!("Failed to read the first frame of {:?}", source))?;

    let slots = match store
        .load(video)
        .with_context(|| format!("Refusing to edit {}: existing slot file is unreadable", video))?
    {
        Some(slots) => {
            info!("Loaded {} existing slots from {:?}", slots.len(), store.path_for(video));
            slots
        }
        None => {
            info!("No existing slots found for {}, drawing new", video);
            SlotCollection::new()
        }
    };

    let session = EditorSession::new(slots, settings);
    let outcome = Rc::new(RefCell::new(EditorOutcome::Discarded));
    let title = format!("Slot Editor - {}", video);
    let options = EditorApp::options(&title, frame.dimensions());
    let app = EditorApp::new(
        session,
        store,
        video.to_string(),
        frame_to_color_image(&frame),
        Rc::clone(&outcome),
    );

    eframe::run_native(&title, options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("Editor window failed: {}", e))?;

    let outcome = outcome.borrow().clone();
    Ok(outcome)
}
