//! Model artifact download and on-disk cache management.
//!
//! The pipeline reads model files through `ModelManager::ensure_model`
//! only: first use downloads the artifact into the cache directory,
//! later uses are a path lookup. Cache eviction is left to the user.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const WHISPER_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Supported whisper transcription models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WhisperModel {
    WhisperTiny,
    WhisperTinyEn,
    WhisperBase,
    WhisperBaseEn,
    #[default]
    WhisperSmall,
    WhisperSmallEn,
    WhisperMedium,
    WhisperLargeV3Turbo,
}

impl WhisperModel {
    /// Stable identifier, also the config/CLI spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::WhisperTiny => "whisper-tiny",
            WhisperModel::WhisperTinyEn => "whisper-tiny-en",
            WhisperModel::WhisperBase => "whisper-base",
            WhisperModel::WhisperBaseEn => "whisper-base-en",
            WhisperModel::WhisperSmall => "whisper-small",
            WhisperModel::WhisperSmallEn => "whisper-small-en",
            WhisperModel::WhisperMedium => "whisper-medium",
            WhisperModel::WhisperLargeV3Turbo => "whisper-large-v3-turbo",
        }
    }

    /// All known models, for CLI listings.
    pub fn all() -> &'static [WhisperModel] {
        &[
            WhisperModel::WhisperTiny,
            WhisperModel::WhisperTinyEn,
            WhisperModel::WhisperBase,
            WhisperModel::WhisperBaseEn,
            WhisperModel::WhisperSmall,
            WhisperModel::WhisperSmallEn,
            WhisperModel::WhisperMedium,
            WhisperModel::WhisperLargeV3Turbo,
        ]
    }

    /// Get model metadata.
    fn info(&self) -> ModelInfo {
        match self {
            WhisperModel::WhisperTiny => ModelInfo {
                filename: "ggml-tiny.bin",
                url: format!("{}/ggml-tiny.bin", WHISPER_BASE_URL),
                size_bytes: Some(77_691_713),
            },
            WhisperModel::WhisperTinyEn => ModelInfo {
                filename: "ggml-tiny.en.bin",
                url: format!("{}/ggml-tiny.en.bin", WHISPER_BASE_URL),
                size_bytes: Some(77_704_715),
            },
            WhisperModel::WhisperBase => ModelInfo {
                filename: "ggml-base.bin",
                url: format!("{}/ggml-base.bin", WHISPER_BASE_URL),
                size_bytes: Some(147_951_465),
            },
            WhisperModel::WhisperBaseEn => ModelInfo {
                filename: "ggml-base.en.bin",
                url: format!("{}/ggml-base.en.bin", WHISPER_BASE_URL),
                size_bytes: Some(147_964_211),
            },
            WhisperModel::WhisperSmall => ModelInfo {
                filename: "ggml-small.bin",
                url: format!("{}/ggml-small.bin", WHISPER_BASE_URL),
                size_bytes: Some(487_601_967),
            },
            WhisperModel::WhisperSmallEn => ModelInfo {
                filename: "ggml-small.en.bin",
                url: format!("{}/ggml-small.en.bin", WHISPER_BASE_URL),
                size_bytes: Some(487_614_201),
            },
            WhisperModel::WhisperMedium => ModelInfo {
                filename: "ggml-medium.bin",
                url: format!("{}/ggml-medium.bin", WHISPER_BASE_URL),
                size_bytes: Some(1_533_774_781),
            },
            WhisperModel::WhisperLargeV3Turbo => ModelInfo {
                filename: "ggml-large-v3-turbo.bin",
                url: format!("{}/ggml-large-v3-turbo.bin", WHISPER_BASE_URL),
                size_bytes: Some(1_624_592_891),
            },
        }
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WhisperModel::all()
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = WhisperModel::all().iter().map(|m| m.as_str()).collect();
                format!("Unknown model: {}. Available: {}", s, known.join(", "))
            })
    }
}

/// Metadata for a downloadable model.
struct ModelInfo {
    /// Filename to save as.
    filename: &'static str,
    /// Download URL.
    url: String,
    /// Expected file size for validation (optional).
    size_bytes: Option<u64>,
}

/// Manages model downloads and storage.
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a new ModelManager using the default models directory.
    ///
    /// Default: `~/.local/share/tickerscribe/models/`
    pub fn new() -> Result<Self> {
        Ok(Self {
            models_dir: crate::dirs::models_dir()?,
        })
    }

    /// Create a ModelManager with a custom models directory.
    pub fn with_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Get the models directory path.
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Whether a model artifact is already present in the cache.
    pub fn is_cached(&self, model: WhisperModel) -> bool {
        self.models_dir.join(model.info().filename).exists()
    }

    /// Ensure a model is available, downloading if necessary.
    ///
    /// Returns the path to the model file.
    pub async fn ensure_model(&self, model: WhisperModel) -> Result<PathBuf> {
        let info = model.info();
        let model_path = self.models_dir.join(info.filename);

        if model_path.exists() {
            // Validate size if known
            if let Some(expected_size) = info.size_bytes {
                let metadata = fs::metadata(&model_path)
                    .await
                    .context("Failed to read model metadata")?;
                let actual_size = metadata.len();

                if actual_size != expected_size {
                    warn!(
                        model = %model,
                        expected = expected_size,
                        actual = actual_size,
                        "Model size mismatch, re-downloading"
                    );
                    fs::remove_file(&model_path)
                        .await
                        .context("Failed to remove corrupted model")?;
                } else {
                    debug!(path = %model_path.display(), "Model already exists");
                    return Ok(model_path);
                }
            } else {
                debug!(path = %model_path.display(), "Model already exists");
                return Ok(model_path);
            }
        }

        // Download the model
        self.download_model(&info, &model_path).await?;
        Ok(model_path)
    }

    /// Download a model from its URL.
    async fn download_model(&self, info: &ModelInfo, dest: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create models directory")?;
        }

        info!(
            url = %info.url,
            dest = %dest.display(),
            "Downloading model"
        );

        let response = reqwest::get(&info.url)
            .await
            .with_context(|| format!("Failed to download model from {}", info.url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download model: HTTP {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        if let Some(expected) = info.size_bytes {
            if bytes.len() as u64 != expected {
                anyhow::bail!(
                    "Downloaded model size mismatch: expected {}, got {}",
                    expected,
                    bytes.len()
                );
            }
        }

        // Write to temporary file first, then rename (atomic)
        let temp_path = dest.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .context("Failed to create temporary model file")?;
        file.write_all(&bytes)
            .await
            .context("Failed to write model file")?;
        file.sync_all().await.context("Failed to sync model file")?;

        fs::rename(&temp_path, dest)
            .await
            .context("Failed to finalize model file")?;

        info!(
            path = %dest.display(),
            size = bytes.len(),
            "Model downloaded successfully"
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
