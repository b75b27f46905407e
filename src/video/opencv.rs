//! Video file frame source using OpenCV.
//!
//! Decodes local video files with `VideoCapture`. OpenCV already produces
//! 8-bit BGR frames, so pixels are copied out as-is.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio;
use tracing::{debug, info};

use super::{Frame, FrameSource, SourceError};

pub struct OpenCvSource {
    capture: videoio::VideoCapture,
    path: PathBuf,
    name: String,
    frame_count: u64,
}

impl OpenCvSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let open_err = |reason: String| SourceError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let path_str = path
            .to_str()
            .ok_or_else(|| open_err("path is not valid UTF-8".to_string()))?;

        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| open_err(e.to_string()))?;

        let opened = capture.is_opened().map_err(|e| open_err(e.to_string()))?;
        if !opened {
            return Err(open_err("OpenCV could not open the file".to_string()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let total = capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        info!("Opened {:?} ({:.1} fps, ~{} frames)", path, fps, total as i64);

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            capture,
            path: path.to_path_buf(),
            name,
            frame_count: 0,
        })
    }
}

impl FrameSource for OpenCvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let decode_err = |e: opencv::Error| SourceError::Decode(format!("{:?}: {}", self.path, e));

        let mut mat = Mat::default();
        let grabbed = self.capture.read(&mut mat).map_err(decode_err)?;
        if !grabbed || mat.rows() == 0 {
            debug!("End of stream for {:?} after {} frames", self.path, self.frame_count);
            return Ok(None);
        }

        if mat.channels() != 3 {
            return Err(SourceError::Decode(format!(
                "expected 3-channel BGR frame, got {} channels",
                mat.channels()
            )));
        }

        let mat = if mat.is_continuous() {
            mat
        } else {
            mat.try_clone().map_err(decode_err)?
        };

        let data = mat.data_bytes().map_err(decode_err)?.to_vec();
        let frame = Frame::from_bgr(data, mat.cols() as u32, mat.rows() as u32, self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }
}
