//! Image sequence frame source
//!
//! Reads a directory of frame images in lexicographic file-name order, or a
//! single still image as a one-frame stream.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{has_extension, Frame, FrameSource, SourceError, IMAGE_EXTENSIONS};

/// Frame source over image files on disk
pub struct ImageSequenceSource {
    name: String,
    files: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    /// Every image file in `dir`, sorted by file name
    pub fn from_dir(dir: &Path) -> Result<Self, SourceError> {
        let open_err = |reason: String| SourceError::Open {
            path: dir.to_path_buf(),
            reason,
        };

        let entries = std::fs::read_dir(dir).map_err(|e| open_err(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| open_err(e.to_string()))?.path();
            if path.is_file() && has_extension(&path, IMAGE_EXTENSIONS) {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(open_err("directory contains no image files".to_string()));
        }

        files.sort();
        debug!("Image sequence {:?} has {} frames", dir, files.len());

        Ok(Self {
            name: display_name(dir),
            files,
            position: 0,
        })
    }

    /// A single still image as a one-frame stream
    pub fn from_file(path: &Path) -> Self {
        Self {
            name: display_name(path),
            files: vec![path.to_path_buf()],
            position: 0,
        }
    }

    /// Total number of frames in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };

        let image = image::open(path)
            .map_err(|e| SourceError::Decode(format!("{:?}: {}", path, e)))?
            .to_rgb8();

        let frame = Frame::from_rgb_image(&image, self.position as u64);
        self.position += 1;
        Ok(Some(frame))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        let image = RgbImage::from_pixel(2, 2, Rgb([shade, shade, shade]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_directory_frames_in_name_order() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "frame_002.png", 20);
        write_frame(dir.path(), "frame_000.png", 0);
        write_frame(dir.path(), "frame_001.png", 10);
        std::fs::write(dir.path().join("readme.txt"), "skip me").unwrap();

        let source = ImageSequenceSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.len(), 3);

        let shades: Vec<u8> = source
            .into_frames()
            .map(|frame| frame.unwrap().data[0])
            .collect();
        assert_eq!(shades, vec![0, 10, 20]);
    }

    #[test]
    fn test_still_image_is_single_frame() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "lot.png", 50);

        let mut source = ImageSequenceSource::from_file(&dir.path().join("lot.png"));
        assert_eq!(source.name(), "lot.png");
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        // Not restartable
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ImageSequenceSource::from_dir(dir.path()),
            Err(SourceError::Open { .. })
        ));
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let mut source = ImageSequenceSource::from_file(&path);
        assert!(matches!(source.next_frame(), Err(SourceError::Decode(_))));
    }
}
