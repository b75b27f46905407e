//! Parking Monitor - parking slot editor and occupancy monitor
//!
//! Draw quadrilateral parking slots over a video frame, then watch the video
//! with a vehicle detector and count which slots are occupied.

mod config;
mod dashboard;
mod editor;
mod monitor;
mod slots;
mod storage;
mod video;
mod vision;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{AppConfig, VideoEntry};
use crate::dashboard::VideoChoice;
use crate::editor::EditorOutcome;
use crate::monitor::{load_slots_or_empty, run_headless, HeadlessOptions, MonitorSession};
use crate::slots::{storage_key, SlotStore};
use crate::vision::{ModelManager, YoloDetector};

/// Parking Monitor - slot editor and occupancy monitor
#[derive(Parser, Debug)]
#[command(name = "parking-monitor")]
#[command(about = "Draw parking slots on a video and monitor their occupancy")]
struct Args {
    /// Configuration file (default: platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding slot files (overrides the configuration)
    #[arg(long, global = true)]
    slot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw and edit parking slots on the first frame of a video
    Edit {
        /// Catalog label, 1-based catalog number, or path (prompts when omitted)
        video: Option<String>,
    },
    /// Detect vehicles and report slot occupancy
    Monitor {
        /// Catalog label, 1-based catalog number, or path
        #[arg(short, long)]
        video: Option<String>,

        /// Log counts instead of opening the dashboard
        #[arg(long)]
        headless: bool,

        /// Stop after this many frames (headless only)
        #[arg(long)]
        max_frames: Option<u64>,

        /// Write annotated frames to this directory (headless only)
        #[arg(long)]
        save_frames: Option<PathBuf>,
    },
    /// List the video catalog and which videos have slot files
    Videos,
}

/// A video picked from the catalog or given as a path
#[derive(Debug, Clone, PartialEq)]
struct ResolvedVideo {
    label: String,
    path: PathBuf,
    /// Position in the catalog, if it came from there
    catalog_index: Option<usize>,
}

impl ResolvedVideo {
    /// Name the slot file is keyed by
    fn slot_name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(dir) = args.slot_dir {
        config.storage.slot_dir = dir;
    }
    let store = SlotStore::new(config.storage.slot_dir.clone());

    match args.command {
        Command::Edit { video } => {
            let video = match video {
                Some(arg) => resolve_video(&config, &arg)?,
                None => prompt_for_video(&config)?,
            };
            info!("Loading video: {:?}", video.path);

            let outcome = editor::run_editor(&video.slot_name(), &video.path, store, config.editor)?;
            match outcome {
                EditorOutcome::Saved(path) => println!("Saved slots to {}", path.display()),
                EditorOutcome::Discarded => println!("Exited without saving changes"),
            }
        }
        Command::Monitor {
            video,
            headless,
            max_frames,
            save_frames,
        } => {
            let video = video.map(|arg| resolve_video(&config, &arg)).transpose()?;
            let model_path = ModelManager::new()?
                .ensure_model(&config.detector.model_source())
                .context("No detector model available")?;

            if headless {
                let video = video.context("--headless needs --video")?;
                let options = HeadlessOptions {
                    max_frames,
                    save_dir: save_frames,
                    show_detections: config.monitor.show_detections,
                };
                run_monitor_headless(&config, &store, &video, &model_path, &options)?;
            } else {
                if max_frames.is_some() || save_frames.is_some() {
                    warn!("--max-frames and --save-frames only apply with --headless");
                }
                let initial = video.map(|video| match video.catalog_index {
                    Some(i) => VideoChoice::Catalog(i),
                    None => {
                        config.videos.push(VideoEntry::new(video.label, video.path));
                        VideoChoice::Catalog(config.videos.len() - 1)
                    }
                });
                dashboard::run_dashboard(config, model_path, initial)?;
            }
        }
        Command::Videos => list_videos(&config, &store),
    }

    Ok(())
}

/// Load configuration from file or create default
///
/// An explicit path must be readable. The default location is created with
/// default settings on first run, and falls back to defaults if unreadable.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    let config_path = match storage::get_config_dir() {
        Ok(dir) => dir.join("config.toml"),
        Err(e) => {
            warn!("No configuration directory ({}), using defaults", e);
            return Ok(AppConfig::default());
        }
    };

    if config_path.exists() {
        match config::load_config(&config_path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
            Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
        }
    } else {
        let config = AppConfig::default();
        match config::save_config(&config, &config_path) {
            Ok(()) => info!("Wrote default configuration to {:?}", config_path),
            Err(e) => warn!("Could not write default configuration: {:#}", e),
        }
        return Ok(config);
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Resolve a catalog label, 1-based catalog number, or file path
fn resolve_video(config: &AppConfig, arg: &str) -> Result<ResolvedVideo> {
    let arg = arg.trim();

    if let Some((index, _)) = config.find_video(arg) {
        return Ok(from_catalog(config, index));
    }

    if let Ok(number) = arg.parse::<usize>() {
        if (1..=config.videos.len()).contains(&number) {
            return Ok(from_catalog(config, number - 1));
        }
    }

    let path = PathBuf::from(arg);
    if path.exists() {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| arg.to_string());
        return Ok(ResolvedVideo {
            label,
            path,
            catalog_index: None,
        });
    }

    anyhow::bail!("{:?} is not a catalog video or an existing path", arg)
}

fn from_catalog(config: &AppConfig, index: usize) -> ResolvedVideo {
    let entry = &config.videos[index];
    ResolvedVideo {
        label: entry.label.clone(),
        path: entry.path.clone(),
        catalog_index: Some(index),
    }
}

/// Ask on stdin which catalog video to edit
fn prompt_for_video(config: &AppConfig) -> Result<ResolvedVideo> {
    if config.videos.is_empty() {
        anyhow::bail!("The video catalog is empty; pass a video path or add [[videos]] to the configuration");
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    choose_video(config, &mut stdin.lock(), &mut stdout)
}

fn choose_video(config: &AppConfig, input: &mut impl BufRead, output: &mut impl Write) -> Result<ResolvedVideo> {
    writeln!(output, "Select a video:")?;
    for (i, entry) in config.videos.iter().enumerate() {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(output, "{}. {} ({})", i + 1, entry.label, name)?;
    }
    write!(output, "Enter choice (1-{}): ", config.videos.len())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let choice = line.trim();

    match choice.parse::<usize>() {
        Ok(n) if (1..=config.videos.len()).contains(&n) => Ok(from_catalog(config, n - 1)),
        _ => anyhow::bail!("Invalid selection {:?}", choice),
    }
}

fn run_monitor_headless(
    config: &AppConfig,
    store: &SlotStore,
    video: &ResolvedVideo,
    model_path: &Path,
    options: &HeadlessOptions,
) -> Result<()> {
    let slots = load_slots_or_empty(store, &video.slot_name())?;
    let source = crate::video::open_source(&video.path)
        .with_context(|| format!("Failed to open video {:?}", video.path))?;
    let detector = YoloDetector::new(model_path, &config.detector)?;

    let mut session = MonitorSession::new(
        source,
        detector,
        slots,
        config.detector.vehicle_classes.clone(),
    );
    let summary = run_headless(&mut session, options)?;

    match summary.last {
        Some(last) => println!(
            "{}: {} frames, last frame {} total / {} vacant / {} occupied",
            video.label,
            summary.frames,
            last.total(),
            last.vacant,
            last.occupied
        ),
        None => println!("{}: no frames processed", video.label),
    }
    if let Some(dir) = &options.save_dir {
        println!("Wrote {} annotated frames to {}", summary.saved_frames, dir.display());
    }
    Ok(())
}

fn list_videos(config: &AppConfig, store: &SlotStore) {
    if config.videos.is_empty() {
        println!("No videos configured. Add [[videos]] entries to the configuration file.");
        return;
    }

    println!("Videos (slot files in {}):", store.dir().display());
    for (i, entry) in config.videos.iter().enumerate() {
        let name = entry.path.to_string_lossy();
        let slots = match store.load(&name) {
            Ok(Some(slots)) => format!("{} slots", slots.len()),
            Ok(None) => "no slot file".to_string(),
            Err(e) => format!("unreadable slot file: {}", e),
        };
        println!(
            "  [{}] {} - {:?} (key: {}, {})",
            i + 1,
            entry.label,
            entry.path,
            storage_key(&name),
            slots
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn catalog() -> AppConfig {
        let mut config = AppConfig::default();
        config.videos = vec![
            VideoEntry::new("Easy 1", "videos/easy1.mp4"),
            VideoEntry::new("Easy 2", "videos/easy2.mp4"),
        ];
        config
    }

    #[test]
    fn test_resolve_by_label_and_number() {
        let config = catalog();

        let by_label = resolve_video(&config, "easy 2").unwrap();
        assert_eq!(by_label.path, PathBuf::from("videos/easy2.mp4"));
        assert_eq!(by_label.catalog_index, Some(1));

        let by_number = resolve_video(&config, "1").unwrap();
        assert_eq!(by_number.label, "Easy 1");
        assert_eq!(storage_key(&by_number.slot_name()), "easy1");
    }

    #[test]
    fn test_resolve_existing_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lot.png");
        std::fs::write(&path, b"png").unwrap();

        let video = resolve_video(&catalog(), path.to_str().unwrap()).unwrap();
        assert_eq!(video.label, "lot.png");
        assert_eq!(video.catalog_index, None);
    }

    #[test]
    fn test_resolve_unknown_video_fails() {
        assert!(resolve_video(&catalog(), "Hard 9").is_err());
        assert!(resolve_video(&catalog(), "3").is_err());
    }

    #[test]
    fn test_choose_video_from_prompt() {
        let mut input = Cursor::new("2\n");
        let mut output = Vec::new();

        let video = choose_video(&catalog(), &mut input, &mut output).unwrap();
        assert_eq!(video.label, "Easy 2");

        let prompt = String::from_utf8(output).unwrap();
        assert!(prompt.contains("1. Easy 1 (easy1.mp4)"));
        assert!(prompt.contains("Enter choice (1-2)"));
    }

    #[test]
    fn test_choose_video_rejects_invalid_choice() {
        for answer in ["0\n", "7\n", "abc\n", "\n"] {
            let mut input = Cursor::new(answer);
            let mut output = Vec::new();
            assert!(choose_video(&catalog(), &mut input, &mut output).is_err());
        }
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        assert!(load_or_create_config(Some(Path::new("/nonexistent/config.toml"))).is_err());
    }
}
