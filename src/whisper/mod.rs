//! # Whisper Backend
//!
//! Bridges the model manager's backend contract to the candle Whisper
//! implementation. Loading, inference and disposal all run on blocking
//! threads; the manager takes care of scheduling them there.

pub mod audio;
pub mod model;

use crate::backend::{BackendError, InferencePayload, ModelHandle, SpeechBackend};
use candle_core::Device;
use model::WhisperModel;
use std::any::Any;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A loaded Whisper model as held by the manager.
///
/// The candle decoder mutates its KV caches during generation, so the
/// model sits behind a mutex and the backend reports itself as
/// non-reentrant.
pub struct WhisperHandle {
    inner: Mutex<WhisperModel>,
}

impl ModelHandle for WhisperHandle {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct WhisperBackend {
    device: Device,
}

impl WhisperBackend {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl SpeechBackend for WhisperBackend {
    fn load(&self, model_name: &str) -> Result<Arc<dyn ModelHandle>, BackendError> {
        let model = WhisperModel::load(model_name, self.device.clone())
            .map_err(|e| BackendError::Load(e.to_string()))?;
        Ok(Arc::new(WhisperHandle {
            inner: Mutex::new(model),
        }))
    }

    fn transcribe(
        &self,
        handle: &dyn ModelHandle,
        payload: &InferencePayload,
    ) -> Result<String, BackendError> {
        let handle = handle
            .as_any()
            .downcast_ref::<WhisperHandle>()
            .ok_or_else(|| {
                BackendError::Inference("handle is not a Whisper model".to_string())
            })?;

        let samples = audio::decode_wav(&payload.audio).map_err(BackendError::Inference)?;

        let mut model = handle.inner.lock().unwrap();
        let text = model
            .transcribe(
                &samples,
                payload.language.as_deref(),
                payload.prompt.as_deref(),
            )
            .map_err(|e| BackendError::Inference(e.to_string()))?;

        info!(
            model = model.repo_id(),
            file = %payload.filename,
            samples = samples.len(),
            "transcription complete"
        );
        Ok(text)
    }

    fn dispose(&self, handle: Arc<dyn ModelHandle>) -> Result<(), BackendError> {
        // Dropping the last Arc frees the weights. In-flight inference
        // calls hold their own clone, so release can be deferred.
        if Arc::strong_count(&handle) > 1 {
            warn!("model still referenced, memory release deferred until last use");
        }
        drop(handle);
        Ok(())
    }

    fn reentrant(&self) -> bool {
        false
    }
}
