//! Headless monitor runner
//!
//! Logs the counts of every frame and optionally writes annotated PNGs.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use super::annotate::save_annotated;
use super::{MonitorSession, OccupancyReport};
use crate::video::FrameSource;
use crate::vision::Detector;

#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Write annotated frames here
    pub save_dir: Option<PathBuf>,
    pub show_detections: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessSummary {
    pub frames: u64,
    pub saved_frames: u64,
    /// Counts of the last processed frame
    pub last: Option<OccupancyReport>,
}

/// Drive a monitor session to the end of its source or the frame limit
pub fn run_headless<S: FrameSource, D: Detector>(
    session: &mut MonitorSession<S, D>,
    options: &HeadlessOptions,
) -> Result<HeadlessSummary> {
    let mut summary = HeadlessSummary::default();

    while options.max_frames.map_or(true, |max| summary.frames < max) {
        let Some(report) = session.next() else {
            break;
        };
        let report = report?;

        info!(
            frame = report.frame.index,
            total = report.occupancy.total(),
            vacant = report.occupancy.vacant,
            occupied = report.occupancy.occupied,
            "Occupancy"
        );

        if let Some(dir) = &options.save_dir {
            match save_annotated(dir, session.slots(), &report, options.show_detections) {
                Ok(_) => summary.saved_frames += 1,
                Err(e) => warn!("Skipping annotated frame {}: {:#}", report.frame.index, e),
            }
        }

        summary.frames += 1;
        summary.last = Some(report.occupancy);
    }

    info!("Processed {} frames from {}", summary.frames, session.source_name());
    Ok(summary)
}
