//! Video Source Layer
//!
//! Pull-based frame sources. A source yields BGR frames in order until it
//! reports end of stream with `Ok(None)`. Sources are finite and cannot be
//! restarted; open a new one to read again.
//!
//! Backends:
//! - Image sequences (a directory of frames, or one still image)
//! - Video files through OpenCV (feature: video-opencv)

pub mod frame;
#[cfg(feature = "video-opencv")]
pub mod opencv;
pub mod sequence;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub use frame::Frame;
pub use sequence::ImageSequenceSource;

/// File extensions decoded as still images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// File extensions decoded as video
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "m4v", "webm"];

/// Errors raised while opening or reading a frame source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("video source not found: {0:?}")]
    NotFound(PathBuf),
    #[error("unsupported video source {path:?}: {reason}")]
    Unsupported { path: PathBuf, reason: String },
    #[error("failed to open video source {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

/// A sequential source of frames
pub trait FrameSource {
    /// Human-readable source name for logs and the UI
    fn name(&self) -> &str;

    /// Read the next frame, or `Ok(None)` at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Consume the source as an iterator of frames
    fn into_frames(self) -> Frames<Self>
    where
        Self: Sized,
    {
        Frames::new(self)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }
}

/// Iterator over a frame source
///
/// Stops for good after end of stream or the first error.
pub struct Frames<S> {
    source: S,
    finished: bool,
}

impl<S: FrameSource> Frames<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            finished: false,
        }
    }
}

impl<S: FrameSource> Iterator for Frames<S> {
    type Item = Result<Frame, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
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

impl<S: FrameSource> std::iter::FusedIterator for Frames<S> {}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Open the appropriate frame source for a path
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    if path.is_dir() {
        info!("Opening image sequence directory {:?}", path);
        return Ok(Box::new(ImageSequenceSource::from_dir(path)?));
    }

    if has_extension(path, IMAGE_EXTENSIONS) {
        info!("Opening still image {:?}", path);
        return Ok(Box::new(ImageSequenceSource::from_file(path)));
    }

    if has_extension(path, VIDEO_EXTENSIONS) {
        #[cfg(feature = "video-opencv")]
        {
            info!("Opening video file {:?} with OpenCV", path);
            return Ok(Box::new(opencv::OpenCvSource::open(path)?));
        }
        #[cfg(not(feature = "video-opencv"))]
        {
            return Err(SourceError::Unsupported {
                path: path.to_path_buf(),
                reason: "video files require the video-opencv feature".to_string(),
            });
        }
    }

    Err(SourceError::Unsupported {
        path: path.to_path_buf(),
        reason: "not a directory, image or known video file".to_string(),
    })
}

/// Read the first frame of a source, used as the editor's freeze-frame
pub fn first_frame(path: &Path) -> Result<Frame, SourceError> {
    let mut source = open_source(path)?;
    source.next_frame()?.ok_or_else(|| SourceError::Open {
        path: path.to_path_buf(),
        reason: "source contains no frames".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// Source that yields a fixed number of blank frames, then fails once
    struct CountingSource {
        remaining: u32,
        fail_after: bool,
        produced: u64,
    }

    impl FrameSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            if self.remaining == 0 {
                if self.fail_after {
                    return Err(SourceError::Decode("boom".to_string()));
                }
                return Ok(None);
            }
            self.remaining -= 1;
            let frame = Frame::from_bgr(vec![0; 3], 1, 1, self.produced)?;
            self.produced += 1;
            Ok(Some(frame))
        }
    }

    #[test]
    fn test_frames_iterator_ends_at_end_of_stream() {
        let source = CountingSource {
            remaining: 3,
            fail_after: false,
            produced: 0,
        };
        let indices: Vec<u64> = source
            .into_frames()
            .map(|frame| frame.unwrap().index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_frames_iterator_stops_after_error() {
        let source = CountingSource {
            remaining: 1,
            fail_after: true,
            produced: 0,
        };
        let mut frames = source.into_frames();
        assert!(frames.next().unwrap().is_ok());
        assert!(frames.next().unwrap().is_err());
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_open_missing_path_is_not_found() {
        let result = open_source(Path::new("/nonexistent/lot.mp4"));
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_open_unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        assert!(matches!(
            open_source(&path),
            Err(SourceError::Unsupported { .. })
        ));
    }

    #[cfg(not(feature = "video-opencv"))]
    #[test]
    fn test_video_without_feature_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("easy1.mp4");
        std::fs::write(&path, b"not really a video").unwrap();

        assert!(matches!(
            open_source(&path),
            Err(SourceError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_first_frame_of_still_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lot.png");
        let mut image = RgbImage::new(4, 3);
        image.put_pixel(1, 1, Rgb([255, 0, 0]));
        image.save(&path).unwrap();

        let frame = first_frame(&path).unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.index, 0);
        // Pixel (1, 1) of a 4-wide frame, red stored as BGR
        let idx = (4 + 1) * 3;
        assert_eq!(&frame.data[idx..idx + 3], &[0, 0, 255]);
    }

    #[test]
    fn test_has_extension_is_case_insensitive() {
        assert!(has_extension(Path::new("a/B.MP4"), VIDEO_EXTENSIONS));
        assert!(has_extension(Path::new("frame.JPG"), IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("frame"), IMAGE_EXTENSIONS));
    }
}
