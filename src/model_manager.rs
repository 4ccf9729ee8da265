use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

/// Name of the pipeline artifact inside a model directory.
pub const PIPELINE_FILE: &str = "pipeline.json";
/// Name of the label mapping artifact inside a model directory.
pub const LABELS_FILE: &str = "labels.json";
/// Model used when none is named.
pub const DEFAULT_MODEL_NAME: &str = "language-detection";
/// Environment variable overriding the cache root.
pub const CACHE_ENV: &str = "LANGSNIFF_CACHE";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_name}")]
    HashMismatch {
        file_name: String,
        expected: String,
        actual: String,
    },
}

impl From<ModelError> for crate::ClassifierError {
    fn from(err: ModelError) -> Self {
        crate::ClassifierError::ArtifactLoad {
            artifact: "model".to_string(),
            reason: err.to_string(),
        }
    }
}

/// One file of a model, where to fetch it and its expected SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub file_name: String,
    pub url: String,
    pub sha256: String,
}

/// Manifest describing a downloadable model.
///
/// Must list `pipeline.json` and `labels.json`; any further files (such as an ONNX
/// estimator referenced by the pipeline) are stored next to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub files: Vec<ArtifactFile>,
}

impl ModelInfo {
    /// Reads a manifest from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let info: Self = serde_json::from_str(&json)
            .map_err(|e| ModelError::InvalidManifest(e.to_string()))?;
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !is_plain_file_name(&self.name) {
            return Err(ModelError::InvalidManifest(format!("invalid model name '{}'", self.name)));
        }
        for file in &self.files {
            if !is_plain_file_name(&file.file_name) {
                return Err(ModelError::InvalidManifest(format!(
                    "invalid file name '{}'",
                    file.file_name
                )));
            }
        }
        for required in [PIPELINE_FILE, LABELS_FILE] {
            if !self.files.iter().any(|f| f.file_name == required) {
                return Err(ModelError::InvalidManifest(format!(
                    "manifest does not list {}",
                    required
                )));
            }
        }
        Ok(())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(CACHE_ENV) {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("langsniff").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("langsniff").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("langsniff").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_dir(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }

    pub fn get_pipeline_path(&self, name: &str) -> PathBuf {
        self.get_model_dir(name).join(PIPELINE_FILE)
    }

    pub fn get_labels_path(&self, name: &str) -> PathBuf {
        self.get_model_dir(name).join(LABELS_FILE)
    }

    pub fn is_model_downloaded(&self, name: &str) -> bool {
        let pipeline_path = self.get_pipeline_path(name);
        let labels_path = self.get_labels_path(name);
        log::debug!("Checking if model '{}' is downloaded:", name);
        log::debug!("  Pipeline path: {:?} (exists: {})", pipeline_path, pipeline_path.exists());
        log::debug!("  Labels path: {:?} (exists: {})", labels_path, labels_path.exists());
        pipeline_path.exists() && labels_path.exists()
    }

    pub async fn download_model(&self, info: &ModelInfo) -> Result<(), ModelError> {
        info.validate()?;
        let _lock = self.download_lock.lock().await;

        let model_dir = self.get_model_dir(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        for file in &info.files {
            let path = model_dir.join(&file.file_name);
            let result = if path.exists() && self.verify_file(&path, &file.sha256)? {
                log::info!("Existing {} verified successfully", file.file_name);
                Ok(())
            } else {
                if path.exists() {
                    log::warn!("{} failed verification, redownloading", file.file_name);
                }
                self.download_and_verify_file(file, &path).await
            };

            if let Err(e) = result {
                log::error!("Failed to set up {}: {}", file.file_name, e);
                // Cleanup on failure
                let _ = self.remove_download(info);
                return Err(e);
            }
        }

        log::info!("Model '{}' ready to use", info.name);
        Ok(())
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!(
            "Verifying {:?}: {} bytes, hash {} (expected {})",
            path,
            bytes.len(),
            hash,
            expected_hash
        );
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    pub fn verify_model(&self, info: &ModelInfo) -> Result<bool, ModelError> {
        let model_dir = self.get_model_dir(&info.name);
        log::info!("Verifying model '{}' in {:?}", info.name, model_dir);

        for file in &info.files {
            let path = model_dir.join(&file.file_name);
            if !path.exists() {
                log::info!("{} does not exist", file.file_name);
                return Ok(false);
            }
            if !self.verify_file(&path, &file.sha256)? {
                log::info!("{} hash verification failed", file.file_name);
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn download_and_verify_file(
        &self,
        file: &ArtifactFile,
        path: &Path,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} from {} to {:?}", file.file_name, file.url, path);
        let response = reqwest::get(&file.url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if !hash.eq_ignore_ascii_case(&file.sha256) {
            log::error!("{} hash mismatch: expected {}, got {}", file.file_name, file.sha256, hash);
            return Err(ModelError::HashMismatch {
                file_name: file.file_name.clone(),
                expected: file.sha256.clone(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;

        // Verify after writing
        if !self.verify_file(path, &file.sha256)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} downloaded and verified successfully", file.file_name);
        Ok(())
    }

    pub fn remove_download(&self, info: &ModelInfo) -> Result<(), ModelError> {
        let model_dir = self.get_model_dir(&info.name);
        for file in &info.files {
            let path = model_dir.join(&file.file_name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, info: &ModelInfo) -> Result<(), ModelError> {
        log::info!("Checking if model '{}' is downloaded...", info.name);
        if !self.is_model_downloaded(&info.name) {
            log::info!("Model not found, downloading...");
            self.download_model(info).await?;
        } else if !self.verify_model(info)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(info)?;
            self.download_model(info).await?;
        } else {
            log::info!("Model verification successful");
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
