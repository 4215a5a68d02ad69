//! Single-slot model registry.
//!
//! Model memory footprints are large enough that only one model per
//! kind may be resident: the registry caches exactly one transcriber
//! and one chat-model session, evicting the held handle whenever a
//! different identifier is requested. This is a deliberate single-slot
//! cache, not an LRU. Loaders are injectable so tests can substitute
//! fakes for the heavyweight backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{Config, Device};
use crate::error::PipelineError;
use crate::extract::{ChatModel, OllamaChat};
use crate::models::{ModelManager, WhisperModel};
use crate::transcribe::{SharedTranscriber, Transcriber, WhisperTranscriber};

/// Which model kind a spec addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Transcription,
    ExtractionLlm,
}

/// Identity of a loadable model: kind, identifier and compute device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub identifier: String,
    pub device: Device,
}

impl ModelSpec {
    pub fn transcription(identifier: impl Into<String>, device: Device) -> Self {
        Self {
            kind: ModelKind::Transcription,
            identifier: identifier.into(),
            device,
        }
    }

    pub fn extraction_llm(identifier: impl Into<String>) -> Self {
        Self {
            kind: ModelKind::ExtractionLlm,
            identifier: identifier.into(),
            // Device placement is the serving side's concern for LLM sessions
            device: Device::Cpu,
        }
    }
}

/// Loads transcription models. Injectable for tests.
#[async_trait]
pub trait TranscriberLoader: Send + Sync {
    async fn load(&self, spec: &ModelSpec) -> Result<Box<dyn Transcriber>, PipelineError>;
}

/// Loads (or probes) LLM chat sessions. Injectable for tests.
#[async_trait]
pub trait ChatModelLoader: Send + Sync {
    async fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn ChatModel>, PipelineError>;
}

/// One cached handle guarded by an async mutex. Concurrent acquires
/// with different identifiers serialize here and cannot race to
/// install two handles.
struct ModelSlot<T> {
    slot: tokio::sync::Mutex<Option<(ModelSpec, T)>>,
}

impl<T: Clone> ModelSlot<T> {
    fn new() -> Self {
        Self {
            slot: tokio::sync::Mutex::new(None),
        }
    }

    async fn acquire<F, Fut>(&self, spec: &ModelSpec, load: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut guard = self.slot.lock().await;

        if let Some((held, handle)) = guard.as_ref() {
            if held == spec {
                debug!(identifier = %spec.identifier, "Model cache hit");
                return Ok(handle.clone());
            }
            info!(
                evicted = %held.identifier,
                requested = %spec.identifier,
                "Evicting cached model"
            );
        }

        // Release the previous handle before loading: two models of one
        // kind cannot be resident simultaneously.
        *guard = None;

        let handle = load().await?;
        *guard = Some((spec.clone(), handle.clone()));
        Ok(handle)
    }
}

/// Owns lazily-initialized, cached handles to the transcription and
/// extraction models.
pub struct ModelRegistry {
    transcription: ModelSlot<SharedTranscriber>,
    extraction: ModelSlot<Arc<dyn ChatModel>>,
    transcriber_loader: Box<dyn TranscriberLoader>,
    chat_loader: Box<dyn ChatModelLoader>,
}

impl ModelRegistry {
    /// Default wiring: whisper models through the artifact cache,
    /// chat sessions against the configured Ollama server.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let manager = ModelManager::new()?;
        let language = if config.model.language == "auto" {
            None
        } else {
            Some(config.model.language.clone())
        };
        Ok(Self::with_loaders(
            Box::new(WhisperLoader { manager, language }),
            Box::new(OllamaLoader {
                base_url: config.extraction.ollama_url.clone(),
            }),
        ))
    }

    /// Build a registry with custom loaders.
    pub fn with_loaders(
        transcriber_loader: Box<dyn TranscriberLoader>,
        chat_loader: Box<dyn ChatModelLoader>,
    ) -> Self {
        Self {
            transcription: ModelSlot::new(),
            extraction: ModelSlot::new(),
            transcriber_loader,
            chat_loader,
        }
    }

    /// Return the cached transcriber when the requested model matches
    /// the held handle, otherwise evict and load.
    pub async fn acquire_transcriber(
        &self,
        spec: &ModelSpec,
    ) -> Result<SharedTranscriber, PipelineError> {
        validate(spec, ModelKind::Transcription)?;
        self.transcription
            .acquire(spec, || async {
                let model = self.transcriber_loader.load(spec).await?;
                Ok(Arc::new(Mutex::new(model)) as SharedTranscriber)
            })
            .await
    }

    /// Return the cached chat session when the requested model matches
    /// the held handle, otherwise evict and load.
    pub async fn acquire_chat_model(
        &self,
        spec: &ModelSpec,
    ) -> Result<Arc<dyn ChatModel>, PipelineError> {
        validate(spec, ModelKind::ExtractionLlm)?;
        self.extraction
            .acquire(spec, || self.chat_loader.load(spec))
            .await
    }
}

fn validate(spec: &ModelSpec, expected: ModelKind) -> Result<(), PipelineError> {
    if spec.identifier.trim().is_empty() {
        return Err(PipelineError::ModelUnavailable(
            "model identifier must not be empty".to_string(),
        ));
    }
    if spec.kind != expected {
        return Err(PipelineError::ModelUnavailable(format!(
            "wrong model kind for this slot: {:?}",
            spec.kind
        )));
    }
    Ok(())
}

/// Production transcriber loader: GGML artifact from the on-disk cache,
/// whisper.cpp context on the blocking pool.
struct WhisperLoader {
    manager: ModelManager,
    language: Option<String>,
}

#[async_trait]
impl TranscriberLoader for WhisperLoader {
    async fn load(&self, spec: &ModelSpec) -> Result<Box<dyn Transcriber>, PipelineError> {
        let model: WhisperModel = spec
            .identifier
            .parse()
            .map_err(PipelineError::ModelUnavailable)?;

        let path = self
            .manager
            .ensure_model(model)
            .await
            .map_err(|e| PipelineError::ModelUnavailable(format!("{e:#}")))?;

        let language = self.language.clone();
        let device = spec.device;
        let transcriber = tokio::task::spawn_blocking(move || {
            WhisperTranscriber::new(&path, language, device)
        })
        .await
        .map_err(|e| PipelineError::ModelUnavailable(format!("model load task panicked: {e}")))?
        .map_err(|e| PipelineError::ModelUnavailable(format!("{e:#}")))?;

        Ok(Box::new(transcriber))
    }
}

/// Production chat loader: probes the Ollama server for the model.
struct OllamaLoader {
    base_url: String,
}

#[async_trait]
impl ChatModelLoader for OllamaLoader {
    async fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn ChatModel>, PipelineError> {
        let session = OllamaChat::connect(&self.base_url, &spec.identifier)
            .await
            .map_err(|e| PipelineError::ModelUnavailable(format!("{e:#}")))?;
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
