//! # Backend Capability Contracts
//!
//! Defines the three capabilities the model manager consumes from an
//! inference backend: loading a model, running inference against it, and
//! disposing of it. The manager never looks inside the model handle; it
//! only moves it between the backend and its own lifecycle bookkeeping.
//!
//! All three operations are blocking and are expected to be invoked through
//! `tokio::task::spawn_blocking` so the async control path stays responsive.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a loaded model.
///
/// Backends downcast through `as_any` to recover their concrete type when
/// the manager hands the model back for inference.
pub trait ModelHandle: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
}

/// A single transcription request as seen by the backend.
#[derive(Debug, Clone)]
pub struct InferencePayload {
    /// Raw uploaded audio bytes (container format, usually WAV).
    pub audio: Vec<u8>,

    /// Client-supplied filename, used to guess the container format.
    pub filename: String,

    /// Optional ISO 639-1 language hint ("en", "de", ...).
    pub language: Option<String>,

    /// Optional text prompt to bias decoding.
    pub prompt: Option<String>,
}

/// Errors produced by a backend capability.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// The model could not be constructed (download, weights, device).
    Load(String),

    /// Inference ran but failed, or the input could not be decoded.
    Inference(String),

    /// Disposal did not complete cleanly. Never fatal to the manager.
    Dispose(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Load(msg) => write!(f, "model load failed: {}", msg),
            BackendError::Inference(msg) => write!(f, "inference failed: {}", msg),
            BackendError::Dispose(msg) => write!(f, "model disposal failed: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// The Loader/Worker/Disposer capability set supplied by an inference
/// backend.
///
/// ## Contracts:
/// - `load` is potentially slow and potentially failing; it must either
///   return a fully usable handle or an error, never a partial one.
/// - `transcribe` must reject unusable output itself where it can; the
///   manager additionally rejects empty text.
/// - `dispose` is best-effort. The manager logs its errors and moves on,
///   because a retained model is worse than a noisy cleanup failure.
pub trait SpeechBackend: Send + Sync + 'static {
    /// Construct the model named by `model_name`. Blocking.
    fn load(&self, model_name: &str) -> Result<Arc<dyn ModelHandle>, BackendError>;

    /// Run inference against a previously loaded model. Blocking.
    fn transcribe(
        &self,
        model: &dyn ModelHandle,
        payload: &InferencePayload,
    ) -> Result<String, BackendError>;

    /// Release the model's resources. Blocking, best-effort.
    fn dispose(&self, model: Arc<dyn ModelHandle>) -> Result<(), BackendError>;

    /// Whether two inference calls may run concurrently against the same
    /// handle. The manager serializes the Worker when this returns false
    /// unless the configuration overrides the policy.
    fn reentrant(&self) -> bool {
        false
    }
}
