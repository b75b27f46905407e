//! Model management for ONNX Runtime
//!
//! Resolves, downloads and loads detector models.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ort::session::{builder::GraphOptimizationLevel, Session};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Environment variable that disables model downloads
pub const OFFLINE_ENV: &str = "PARKING_MONITOR_OFFLINE";

/// Where to find a model and how to fetch it when missing
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    /// Model file path, absolute or relative to the models directory
    pub path: PathBuf,
    /// Download URL used when the file is missing
    pub url: Option<String>,
    /// Expected SHA-256 of the downloaded file (lowercase hex)
    pub sha256: Option<String>,
}

/// Model manager for locating and downloading ONNX models
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager rooted in the application data directory
    pub fn new() -> Result<Self> {
        let data_dir = crate::storage::get_data_dir()?;
        Self::with_dir(data_dir.join("models"))
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;
        Ok(Self { models_dir })
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Candidate locations for a model path, in lookup order
    fn candidates(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_absolute() {
            vec![path.to_path_buf()]
        } else {
            vec![path.to_path_buf(), self.models_dir.join(path)]
        }
    }

    /// Find an existing model file without downloading
    pub fn locate(&self, path: &Path) -> Option<PathBuf> {
        self.candidates(path).into_iter().find(|p| p.is_file())
    }

    /// Return a usable model path, downloading it if needed
    pub fn ensure_model(&self, source: &ModelSource) -> Result<PathBuf> {
        if let Some(found) = self.locate(&source.path) {
            info!("Model available at {:?}", found);
            return Ok(found);
        }

        let Some(url) = source.url.as_deref() else {
            anyhow::bail!(
                "Model {:?} not found (looked in the working directory and {:?}) and no model_url is configured",
                source.path,
                self.models_dir
            );
        };

        let target = if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.models_dir.join(&source.path)
        };

        info!("Downloading model to {:?}...", target);
        self.download_model(url, &target, source.sha256.as_deref())?;
        Ok(target)
    }

    /// Download a model file (blocking)
    pub fn download_model(&self, url: &str, path: &Path, expected_sha256: Option<&str>) -> Result<()> {
        // Check if we're in offline mode
        if std::env::var(OFFLINE_ENV).is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create a tokio runtime for async download
        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(async { download_file_async(url, path, expected_sha256).await })?;

        info!("Successfully downloaded model to {:?}", path);
        Ok(())
    }
}

/// Async download implementation
async fn download_file_async(url: &str, path: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let total_size = response.content_length();
    debug!("Download size: {:?} bytes", total_size);

    // Create temp file for download
    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;

        file.write_all(&chunk).context("Failed to write to temp file")?;

        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }

    file.flush().context("Failed to flush temp file")?;
    drop(file);
    debug!("Downloaded {} bytes from {}", downloaded, url);

    // Verify checksum if available
    let hash = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected_sha256 {
        if !checksum_matches(&hash, expected) {
            std::fs::remove_file(&temp_path).ok();
            anyhow::bail!(
                "Checksum mismatch for {:?}: expected {}, got {}",
                path,
                expected,
                hash
            );
        }
        info!("Checksum verified for {:?}", path);
    }

    // Move temp file to final location
    std::fs::rename(&temp_path, path).context("Failed to move downloaded file to final location")?;

    Ok(())
}

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn checksum_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, ort::Error> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        // Get input/output names
        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    /// Get the underlying session for metadata queries
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the underlying session mutably for running inference
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Get input names
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Get output names
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
