//! Occupancy Monitor
//!
//! Pulls frames from a [`FrameSource`], runs the [`Detector`] on each one and
//! classifies every slot as occupied or vacant. [`MonitorSession`] is an
//! iterator of per-frame reports; the dashboard and the headless runner only
//! render what it yields.

pub mod annotate;
pub mod headless;
pub mod occupancy;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::slots::{SlotCollection, SlotStore, SlotStoreError};
use crate::video::{Frame, FrameSource, SourceError};
use crate::vision::{vehicle_detections, Detection, Detector, DetectorError};

pub use headless::{run_headless, HeadlessOptions, HeadlessSummary};
pub use occupancy::{evaluate, OccupancyReport, SlotStatus};

/// Errors that end a monitor run
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
}

/// Everything known about one processed frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub occupancy: OccupancyReport,
}

/// Frame-by-frame occupancy pipeline
pub struct MonitorSession<S, D> {
    source: S,
    detector: D,
    slots: SlotCollection,
    vehicle_classes: Vec<String>,
    frames_processed: u64,
    finished: bool,
}

impl<S: FrameSource, D: Detector> MonitorSession<S, D> {
    pub fn new(source: S, detector: D, slots: SlotCollection, vehicle_classes: Vec<String>) -> Self {
        info!(
            "Monitoring {} with {} slots using {}",
            source.name(),
            slots.len(),
            detector.name()
        );
        Self {
            source,
            detector,
            slots,
            vehicle_classes,
            frames_processed: 0,
            finished: false,
        }
    }

    pub fn slots(&self) -> &SlotCollection {
        &self.slots
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// End the run and hand the detector back for reuse
    pub fn into_detector(self) -> D {
        self.detector
    }

    /// Process the next frame, or `Ok(None)` at end of stream
    pub fn step(&mut self) -> Result<Option<FrameReport>, MonitorError> {
        let Some(frame) = self.source.next_frame()? else {
            info!(
                "End of stream for {} after {} frames",
                self.source.name(),
                self.frames_processed
            );
            return Ok(None);
        };

        let boxes = self.detector.detect(&frame)?;
        let detections = vehicle_detections(&boxes, self.vehicle_classes.as_slice());
        let occupancy = evaluate(&self.slots, &detections);

        debug!(
            "Frame {}: {} boxes, {} vehicles, {}/{} occupied",
            frame.index,
            boxes.len(),
            detections.len(),
            occupancy.occupied,
            occupancy.total()
        );

        self.frames_processed += 1;
        Ok(Some(FrameReport {
            frame,
            detections,
            occupancy,
        }))
    }
}

impl<S: FrameSource, D: Detector> Iterator for MonitorSession<S, D> {
    type Item = Result<FrameReport, MonitorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.step() {
            Ok(Some(report)) => Some(Ok(report)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: FrameSource, D: Detector> std::iter::FusedIterator for MonitorSession<S, D> {}

/// Load the slots for a video, treating a missing file as an empty collection
pub fn load_slots_or_empty(store: &SlotStore, video: &str) -> Result<SlotCollection, SlotStoreError> {
    match store.load(video)? {
        Some(slots) => {
            info!("Loaded {} slots for {}", slots.len(), video);
            Ok(slots)
        }
        None => {
            warn!(
                "No slot file at {:?}; every frame will report 0 slots",
                store.path_for(video)
            );
            Ok(SlotCollection::new())
        }
    }
}
