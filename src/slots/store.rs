//! Slot file persistence
//!
//! One JSON file per source video, named after the video's storage key:
//! `parking_slots_<key>.json`. The file holds a flat array of slots, each an
//! array of four `[x, y]` integer pairs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::{Point, Slot, SlotCollection};

/// Prefix of every slot file name
pub const SLOT_FILE_PREFIX: &str = "parking_slots_";

/// Extension of every slot file
pub const SLOT_FILE_EXTENSION: &str = "json";

/// Errors raised while reading or writing slot files
#[derive(Debug, Error)]
pub enum SlotStoreError {
    #[error("failed to access slot file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse slot file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("slot {index} in {path:?} has {points} points, expected 4")]
    MalformedSlot {
        path: PathBuf,
        index: usize,
        points: usize,
    },
}

/// Storage key for a video identifier
///
/// The final path component without its extension. Both `/` and `\` are
/// treated as separators so catalog entries written on another platform map
/// to the same key.
pub fn storage_key(video: &str) -> String {
    let name = video
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };

    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}

/// File name of the slot file for a storage key
pub fn slot_file_name(key: &str) -> String {
    format!("{SLOT_FILE_PREFIX}{key}.{SLOT_FILE_EXTENSION}")
}

/// Directory of slot files shared by the editor and the monitor
#[derive(Debug, Clone)]
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slot file path for a video identifier
    pub fn path_for(&self, video: &str) -> PathBuf {
        self.dir.join(slot_file_name(&storage_key(video)))
    }

    pub fn exists(&self, video: &str) -> bool {
        self.path_for(video).is_file()
    }

    /// Load the slots for a video
    ///
    /// Returns `Ok(None)` when no slot file exists yet.
    pub fn load(&self, video: &str) -> Result<Option<SlotCollection>, SlotStoreError> {
        let path = self.path_for(video);
        if !path.is_file() {
            debug!("No slot file at {:?}", path);
            return Ok(None);
        }

        let slots = read_slot_file(&path)?;
        info!("Loaded {} slots from {:?}", slots.len(), path);
        Ok(Some(slots))
    }

    /// Save the slots for a video, replacing any previous file
    ///
    /// Returns the path written.
    pub fn save(&self, video: &str, slots: &SlotCollection) -> Result<PathBuf, SlotStoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| SlotStoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(video);
        write_slot_file(&path, slots)?;
        info!("Saved {} slots to {:?}", slots.len(), path);
        Ok(path)
    }
}

/// Read and validate a slot file
pub fn read_slot_file(path: &Path) -> Result<SlotCollection, SlotStoreError> {
    let content = fs::read_to_string(path).map_err(|source| SlotStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_slots(&content).map_err(|err| match err {
        ParseFailure::Json(source) => SlotStoreError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Arity { index, points } => SlotStoreError::MalformedSlot {
            path: path.to_path_buf(),
            index,
            points,
        },
    })
}

/// Write a slot file through a temp file and rename
pub fn write_slot_file(path: &Path, slots: &SlotCollection) -> Result<(), SlotStoreError> {
    let io_err = |source| SlotStoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut content = serde_json::to_string(slots).map_err(|source| SlotStoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    content.push('\n');

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    drop(file);

    fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(())
}

enum ParseFailure {
    Json(serde_json::Error),
    Arity { index: usize, points: usize },
}

/// Parse slot JSON, rejecting any entry without exactly four points
fn parse_slots(content: &str) -> Result<SlotCollection, ParseFailure> {
    let raw: Vec<Vec<Point>> = serde_json::from_str(content).map_err(ParseFailure::Json)?;

    raw.into_iter()
        .enumerate()
        .map(|(index, points)| {
            Slot::try_from(points).map_err(|points| ParseFailure::Arity {
                index,
                points: points.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_slots() -> SlotCollection {
        SlotCollection::from(vec![
            Slot::rectangle(Point::new(10, 10), Point::new(50, 50)),
            Slot::new([
                Point::new(100, 120),
                Point::new(180, 118),
                Point::new(185, 200),
                Point::new(98, 205),
            ]),
        ])
    }

    #[test]
    fn test_storage_key_strips_directory_and_extension() {
        assert_eq!(storage_key("videos/easy1.mp4"), "easy1");
        assert_eq!(storage_key(r"G:\Car-Parking\video.mp4\easy2.mp4"), "easy2");
        assert_eq!(storage_key("easy3"), "easy3");
        assert_eq!(storage_key("frames/lot_a/"), "lot_a");
        assert_eq!(storage_key("archive.tar.gz"), "archive.tar");
        assert_eq!(storage_key(".hidden"), ".hidden");
        assert_eq!(storage_key(""), "unnamed");
    }

    #[test]
    fn test_path_for_uses_prefix() {
        let store = SlotStore::new("/data/slots");
        assert_eq!(
            store.path_for("videos/easy1.mp4"),
            PathBuf::from("/data/slots/parking_slots_easy1.json")
        );
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path().join("parking_slots"));
        let slots = sample_slots();

        let written = store.save("videos/easy1.mp4", &slots).unwrap();
        assert!(written.is_file());

        let loaded = store.load("videos/easy1.mp4").unwrap().unwrap();
        assert_eq!(loaded, slots);
    }

    #[test]
    fn test_empty_collection_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());

        store.save("lot.mp4", &SlotCollection::new()).unwrap();
        let loaded = store.load("lot.mp4").unwrap().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());

        store.save("lot.mp4", &sample_slots()).unwrap();
        let fewer: SlotCollection = sample_slots().iter().take(1).copied().collect();
        store.save("lot.mp4", &fewer).unwrap();

        assert_eq!(store.load("lot.mp4").unwrap().unwrap(), fewer);
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());
        assert!(store.load("nothing.mp4").unwrap().is_none());
        assert!(!store.exists("nothing.mp4"));
    }

    #[test]
    fn test_malformed_slot_is_rejected_with_index() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());
        let path = store.path_for("bad.mp4");
        std::fs::write(
            &path,
            "[[[0,0],[1,0],[1,1],[0,1]],[[5,5],[6,5],[6,6]]]",
        )
        .unwrap();

        match store.load("bad.mp4") {
            Err(SlotStoreError::MalformedSlot { index, points, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(points, 3);
            }
            other => panic!("expected MalformedSlot, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());
        std::fs::write(store.path_for("junk.mp4"), "not json").unwrap();

        assert!(matches!(
            store.load("junk.mp4"),
            Err(SlotStoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_non_integer_coordinates_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::new(dir.path());
        std::fs::write(
            store.path_for("float.mp4"),
            "[[[0.5,0],[1,0],[1,1],[0,1]]]",
        )
        .unwrap();

        assert!(matches!(
            store.load("float.mp4"),
            Err(SlotStoreError::Parse { .. })
        ));
    }
}
