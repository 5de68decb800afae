//! # Model Manager
//!
//! Owns the single lazily loaded speech-to-text model and coordinates the
//! three concerns around it: loading on first use, running inference, and
//! evicting the model after a configurable idle period.
//!
//! ## Lifecycle guarantees:
//! - **At most one load**: concurrent `ensure_loaded` calls arriving while a
//!   load is in flight share one outcome (the same handle or the same error)
//!   instead of each constructing a model.
//! - **Serialized transitions**: load and unload funnel through the same
//!   state mutex, so a model is never disposed mid-construction and never
//!   double-disposed.
//! - **Responsive status**: the blocking backend calls run on the blocking
//!   pool; `get_status` only takes a short lock and never waits for them.

use crate::backend::{InferencePayload, ModelHandle, SpeechBackend};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Coarse lifecycle state of the managed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Unloaded,
    Loading,
    Loaded,
}

/// Read-only projection of the manager state, safe to take at any time.
///
/// The fields are captured under a single lock, so a snapshot never reports
/// `loaded: true` without a `last_loaded` timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub model_name: String,
    pub state: ManagerState,
    pub loaded: bool,
    pub idle_unload_seconds: i64,
    pub last_loaded: Option<DateTime<Utc>>,
}

/// Errors surfaced to callers of the manager.
///
/// Disposal problems are deliberately absent: `unload` logs them and
/// completes, because a retained model is worse than a noisy cleanup.
#[derive(Debug, Clone)]
pub enum ManagerError {
    /// The backend could not construct the model.
    ResourceUnavailable(String),

    /// The backend failed to produce usable output for a request.
    InferenceFailed(String),

    /// Runtime-level failure (a worker task panicked or was torn down).
    Internal(String),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::ResourceUnavailable(msg) => {
                write!(f, "model unavailable: {}", msg)
            }
            ManagerError::InferenceFailed(msg) => write!(f, "transcription failed: {}", msg),
            ManagerError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ManagerError {}

/// In-flight load shared by every caller that arrives before it resolves.
type LoadFuture = Shared<BoxFuture<'static, Result<Arc<dyn ModelHandle>, ManagerError>>>;

/// Mutable manager state. Only touched while holding the mutex, and the
/// mutex is never held across an await.
struct ManagerInner {
    model: Option<Arc<dyn ModelHandle>>,
    loading: Option<LoadFuture>,
    last_loaded: Option<DateTime<Utc>>,
    idle_timer: Option<JoinHandle<()>>,
    /// Bumped on every (re)arm. A fired timer task checks this under the
    /// lock and stands down if a later use re-armed while it was firing,
    /// since `abort` cannot stop a task that already finished its sleep.
    timer_epoch: u64,
}

struct ManagerCore {
    model_name: String,
    idle_unload: Option<Duration>,
    backend: Arc<dyn SpeechBackend>,
    /// Single-permit gate around inference when the worker must not be
    /// entered concurrently. `None` means parallel inference is allowed.
    inference_gate: Option<Semaphore>,
    inner: Mutex<ManagerInner>,
}

/// Handle to the manager. Cheap to clone; all clones share one model slot.
#[derive(Clone)]
pub struct ModelManager {
    core: Arc<ManagerCore>,
}

impl ModelManager {
    /// Create a manager for `model_name`. An `idle_unload_seconds` of zero
    /// or less disables idle eviction entirely.
    pub fn new(
        model_name: impl Into<String>,
        idle_unload_seconds: i64,
        serialize_inference: bool,
        backend: Arc<dyn SpeechBackend>,
    ) -> Self {
        let idle_unload = if idle_unload_seconds > 0 {
            Some(Duration::from_secs(idle_unload_seconds as u64))
        } else {
            None
        };
        Self::with_idle_timeout(model_name, idle_unload, serialize_inference, backend)
    }

    /// Like [`ModelManager::new`] but with sub-second control over the idle
    /// timeout. `None` disables eviction.
    pub fn with_idle_timeout(
        model_name: impl Into<String>,
        idle_unload: Option<Duration>,
        serialize_inference: bool,
        backend: Arc<dyn SpeechBackend>,
    ) -> Self {
        // A non-reentrant backend forces the gate regardless of the
        // configured policy; the flag can only make things stricter.
        let gated = serialize_inference || !backend.reentrant();
        Self {
            core: Arc::new(ManagerCore {
                model_name: model_name.into(),
                idle_unload,
                backend,
                inference_gate: gated.then(|| Semaphore::new(1)),
                inner: Mutex::new(ManagerInner {
                    model: None,
                    loading: None,
                    last_loaded: None,
                    idle_timer: None,
                    timer_epoch: 0,
                }),
            }),
        }
    }

    /// Return a ready-to-use model handle, loading it if necessary.
    ///
    /// Every successful call resets the idle eviction countdown. If a load
    /// is already in flight, this waits for that load instead of starting
    /// another one; a failed load leaves the manager unloaded so the next
    /// call retries from scratch.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn ModelHandle>, ManagerError> {
        let pending = {
            let mut inner = self.core.inner.lock().unwrap();
            if let Some(model) = inner.model.clone() {
                self.arm_idle_timer(&mut inner);
                return Ok(model);
            }
            match &inner.loading {
                Some(load) => load.clone(),
                None => {
                    let load = self.spawn_load();
                    inner.loading = Some(load.clone());
                    load
                }
            }
        };

        let model = pending.await?;

        // Each waiter counts as a use of its own, so re-arm the countdown.
        let mut inner = self.core.inner.lock().unwrap();
        if inner.model.is_some() {
            self.arm_idle_timer(&mut inner);
        }
        Ok(model)
    }

    /// Dispose the currently loaded model, if any. Idempotent.
    ///
    /// A pending idle timer is cancelled first so an explicit unload is not
    /// followed by a stale automatic one. If a load is mid-construction we
    /// wait for it to settle before disposing its result.
    pub async fn unload(&self) {
        let pending = {
            let mut inner = self.core.inner.lock().unwrap();
            if let Some(timer) = inner.idle_timer.take() {
                timer.abort();
            }
            inner.loading.clone()
        };
        if let Some(load) = pending {
            let _ = load.await;
        }

        let model = {
            let mut inner = self.core.inner.lock().unwrap();
            // The load we just waited for may have armed a fresh timer.
            if let Some(timer) = inner.idle_timer.take() {
                timer.abort();
            }
            inner.model.take()
        };
        let Some(model) = model else {
            return;
        };

        tracing::info!(model = %self.core.model_name, "unloading model");
        self.dispose_model(model).await;
    }

    /// Hand the model to the Disposer on the blocking pool. Disposal
    /// errors are logged and swallowed; the state transition to unloaded
    /// already happened.
    async fn dispose_model(&self, model: Arc<dyn ModelHandle>) {
        let backend = self.core.backend.clone();
        match tokio::task::spawn_blocking(move || backend.dispose(model)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "model disposal reported an error"),
            Err(e) => tracing::warn!(error = %e, "model disposal task did not complete"),
        }
    }

    /// Take a consistent snapshot of the manager state without waiting on
    /// any in-flight load, unload, or inference.
    pub fn get_status(&self) -> StatusSnapshot {
        let inner = self.core.inner.lock().unwrap();
        let state = if inner.model.is_some() {
            ManagerState::Loaded
        } else if inner.loading.is_some() {
            ManagerState::Loading
        } else {
            ManagerState::Unloaded
        };
        StatusSnapshot {
            model_name: self.core.model_name.clone(),
            state,
            loaded: state == ManagerState::Loaded,
            idle_unload_seconds: self
                .core
                .idle_unload
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            last_loaded: inner.last_loaded,
        }
    }

    /// Transcribe an uploaded payload, loading the model first if needed.
    ///
    /// Empty worker output is treated as a failure rather than silently
    /// returned to the client.
    pub async fn transcribe(&self, payload: InferencePayload) -> Result<String, ManagerError> {
        let model = self.ensure_loaded().await?;

        let _permit = match &self.core.inference_gate {
            Some(gate) => Some(gate.acquire().await.map_err(|_| {
                ManagerError::Internal("inference gate closed".to_string())
            })?),
            None => None,
        };

        tracing::debug!(
            filename = %payload.filename,
            bytes = payload.audio.len(),
            language = payload.language.as_deref().unwrap_or("auto"),
            "running transcription"
        );
        let backend = self.core.backend.clone();
        let text = tokio::task::spawn_blocking(move || backend.transcribe(model.as_ref(), &payload))
            .await
            .map_err(|e| ManagerError::Internal(format!("inference task failed: {}", e)))?
            .map_err(|e| ManagerError::InferenceFailed(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ManagerError::InferenceFailed(
                "model returned no transcription output".to_string(),
            ));
        }
        Ok(text)
    }

    /// Start the load on a detached task so it completes even if every
    /// waiting caller goes away, and wrap it in a shared future so all
    /// callers observe one outcome.
    fn spawn_load(&self) -> LoadFuture {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let backend = manager.core.backend.clone();
            let name = manager.core.model_name.clone();
            tracing::info!(model = %name, "loading model");
            let started = Instant::now();

            let outcome = match tokio::task::spawn_blocking(move || backend.load(&name)).await {
                Ok(Ok(model)) => Ok(model),
                Ok(Err(e)) => Err(ManagerError::ResourceUnavailable(e.to_string())),
                Err(e) => Err(ManagerError::Internal(format!("load task failed: {}", e))),
            };

            let mut inner = manager.core.inner.lock().unwrap();
            inner.loading = None;
            match &outcome {
                Ok(model) => {
                    inner.model = Some(model.clone());
                    inner.last_loaded = Some(Utc::now());
                    manager.arm_idle_timer(&mut inner);
                    tracing::info!(
                        model = %manager.core.model_name,
                        elapsed_s = started.elapsed().as_secs_f64(),
                        "model loaded"
                    );
                }
                Err(e) => {
                    tracing::error!(model = %manager.core.model_name, error = %e, "model load failed");
                }
            }
            outcome
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ManagerError::Internal(format!("load task panicked: {}", e))),
            }
        }
        .boxed()
        .shared()
    }

    /// (Re)schedule idle eviction, cancelling any previously armed timer.
    /// The countdown restarts on every use; it is not a fixed deadline from
    /// first load. No-op when eviction is disabled.
    ///
    /// `abort` only stops a timer that is still sleeping. A task that has
    /// already woken and is waiting on the state lock keeps running, so the
    /// epoch check below is what actually decides whether it may evict.
    fn arm_idle_timer(&self, inner: &mut ManagerInner) {
        let Some(idle) = self.core.idle_unload else {
            return;
        };
        if let Some(previous) = inner.idle_timer.take() {
            previous.abort();
        }
        inner.timer_epoch = inner.timer_epoch.wrapping_add(1);
        let epoch = inner.timer_epoch;
        let manager = self.clone();
        inner.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let model = {
                let mut inner = manager.core.inner.lock().unwrap();
                // Stale fire: a later use re-armed while this task was
                // waking up. The model stays and the newer timer owns
                // eviction.
                if inner.timer_epoch != epoch {
                    return;
                }
                inner.idle_timer = None;
                inner.model.take()
            };
            let Some(model) = model else {
                return;
            };
            tracing::info!(
                model = %manager.core.model_name,
                idle_s = idle.as_secs_f64(),
                "model idle, releasing it"
            );
            manager.dispose_model(model).await;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockModel;

    impl ModelHandle for MockModel {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Configurable in-memory backend for lifecycle tests.
    struct MockBackend {
        load_calls: AtomicUsize,
        dispose_calls: AtomicUsize,
        /// Number of upcoming load calls that should fail.
        fail_loads: AtomicUsize,
        fail_dispose: AtomicBool,
        load_delay: Duration,
        transcribe_delay: Duration,
        transcript: String,
        inflight: AtomicUsize,
        max_inflight: AtomicUsize,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                load_calls: AtomicUsize::new(0),
                dispose_calls: AtomicUsize::new(0),
                fail_loads: AtomicUsize::new(0),
                fail_dispose: AtomicBool::new(false),
                load_delay: Duration::ZERO,
                transcribe_delay: Duration::ZERO,
                transcript: "hello world".to_string(),
                inflight: AtomicUsize::new(0),
                max_inflight: AtomicUsize::new(0),
            }
        }

        fn with_load_delay(mut self, delay: Duration) -> Self {
            self.load_delay = delay;
            self
        }

        fn with_transcribe_delay(mut self, delay: Duration) -> Self {
            self.transcribe_delay = delay;
            self
        }

        fn with_transcript(mut self, text: &str) -> Self {
            self.transcript = text.to_string();
            self
        }

        fn failing_loads(self, count: usize) -> Self {
            self.fail_loads.store(count, Ordering::SeqCst);
            self
        }

        fn failing_dispose(self) -> Self {
            self.fail_dispose.store(true, Ordering::SeqCst);
            self
        }
    }

    impl SpeechBackend for MockBackend {
        fn load(&self, _model_name: &str) -> Result<Arc<dyn ModelHandle>, BackendError> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            if !self.load_delay.is_zero() {
                std::thread::sleep(self.load_delay);
            }
            let remaining = self.fail_loads.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_loads.store(remaining - 1, Ordering::SeqCst);
                return Err(BackendError::Load("backend offline".to_string()));
            }
            Ok(Arc::new(MockModel))
        }

        fn transcribe(
            &self,
            _model: &dyn ModelHandle,
            _payload: &InferencePayload,
        ) -> Result<String, BackendError> {
            let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inflight.fetch_max(current, Ordering::SeqCst);
            if !self.transcribe_delay.is_zero() {
                std::thread::sleep(self.transcribe_delay);
            }
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.transcript.clone())
        }

        fn dispose(&self, _model: Arc<dyn ModelHandle>) -> Result<(), BackendError> {
            self.dispose_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_dispose.load(Ordering::SeqCst) {
                return Err(BackendError::Dispose("release failed".to_string()));
            }
            Ok(())
        }

        // The mock itself is safe to enter concurrently, so gating is
        // driven purely by the serialize_inference flag in these tests.
        fn reentrant(&self) -> bool {
            true
        }
    }

    fn manager_with(
        backend: Arc<MockBackend>,
        idle: Option<Duration>,
        serialize: bool,
    ) -> ModelManager {
        ModelManager::with_idle_timeout("mock-model", idle, serialize, backend)
    }

    fn payload() -> InferencePayload {
        InferencePayload {
            audio: vec![0u8; 64],
            filename: "clip.wav".to_string(),
            language: None,
            prompt: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_load() {
        let backend = Arc::new(MockBackend::new().with_load_delay(Duration::from_millis(100)));
        let manager = manager_with(backend.clone(), None, false);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.ensure_loaded().await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 1);
        assert!(manager.get_status().loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failure() {
        let backend = Arc::new(
            MockBackend::new()
                .with_load_delay(Duration::from_millis(50))
                .failing_loads(1),
        );
        let manager = manager_with(backend.clone(), None, false);

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.ensure_loaded().await }));
        }
        for task in tasks {
            let result = task.await.unwrap();
            assert!(matches!(result, Err(ManagerError::ResourceUnavailable(_))));
        }
        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.get_status().state, ManagerState::Unloaded);

        // A failed load must not wedge the manager; the next call retries.
        assert!(manager.ensure_loaded().await.is_ok());
        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 2);
        assert!(manager.get_status().loaded);
    }

    #[tokio::test]
    async fn unload_is_idempotent() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(backend.clone(), None, false);

        manager.ensure_loaded().await.unwrap();
        manager.unload().await;
        manager.unload().await;

        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
        assert!(!manager.get_status().loaded);
    }

    #[tokio::test]
    async fn disposal_failure_does_not_fail_unload() {
        let backend = Arc::new(MockBackend::new().failing_dispose());
        let manager = manager_with(backend.clone(), None, false);

        manager.ensure_loaded().await.unwrap();
        manager.unload().await;

        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
        assert!(!manager.get_status().loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn idle_timer_restarts_on_every_use() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(
            backend.clone(),
            Some(Duration::from_millis(500)),
            false,
        );

        manager.ensure_loaded().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        manager.ensure_loaded().await.unwrap();

        // 300ms past the re-arm: well inside the 500ms window.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(manager.get_status().loaded);
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 0);

        // Another 500ms pushes us past the window with no further use.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!manager.get_status().loaded);
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn eviction_disabled_without_timeout() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(backend.clone(), None, false);

        manager.ensure_loaded().await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(manager.get_status().loaded);
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn explicit_unload_cancels_pending_timer() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(
            backend.clone(),
            Some(Duration::from_millis(200)),
            false,
        );

        manager.ensure_loaded().await.unwrap();
        manager.unload().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        // The cancelled timer must not fire a second disposal.
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
        assert!(!manager.get_status().loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rearm_during_timer_fire_keeps_model_loaded() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(backend.clone(), Some(Duration::from_millis(50)), false);
        manager.ensure_loaded().await.unwrap();

        // Hold the state lock past the deadline so the fired timer task
        // wakes up and blocks on it, then re-arm before releasing. The
        // abort inside the re-arm lands after the stale task's sleep, so
        // only the epoch check can stop it from evicting.
        {
            let mut inner = manager.core.inner.lock().unwrap();
            std::thread::sleep(Duration::from_millis(100));
            manager.arm_idle_timer(&mut inner);
        }

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(manager.get_status().loaded, "stale timer evicted a just-reused model");
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 0);

        // The re-armed window still wins eventually.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!manager.get_status().loaded);
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unload_waits_for_inflight_load() {
        let backend = Arc::new(MockBackend::new().with_load_delay(Duration::from_millis(200)));
        let manager = manager_with(backend.clone(), None, false);

        let loader = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_loaded().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.unload().await;

        assert!(loader.await.unwrap().is_ok());
        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.dispose_calls.load(Ordering::SeqCst), 1);
        assert!(!manager.get_status().loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn status_is_never_torn() {
        let backend = Arc::new(MockBackend::new().with_load_delay(Duration::from_millis(300)));
        let manager = manager_with(backend.clone(), None, false);

        let before = manager.get_status();
        assert_eq!(before.state, ManagerState::Unloaded);
        assert!(!before.loaded);
        assert!(before.last_loaded.is_none());

        let loader = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.ensure_loaded().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Mid-load the snapshot is available immediately and reports the
        // load in progress without a loaded timestamp.
        let during = manager.get_status();
        assert_eq!(during.state, ManagerState::Loading);
        assert!(!during.loaded);
        assert!(during.last_loaded.is_none());

        loader.await.unwrap().unwrap();
        let after = manager.get_status();
        assert!(after.loaded);
        assert!(after.last_loaded.is_some());

        // Unload clears the model but keeps the last-loaded timestamp for
        // status reporting.
        manager.unload().await;
        let unloaded = manager.get_status();
        assert!(!unloaded.loaded);
        assert!(unloaded.last_loaded.is_some());
    }

    #[tokio::test]
    async fn transcribe_loads_on_demand() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with(backend.clone(), None, false);

        let text = manager.transcribe(payload()).await.unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 1);

        manager.transcribe(payload()).await.unwrap();
        assert_eq!(backend.load_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_transcription_is_an_error() {
        let backend = Arc::new(MockBackend::new().with_transcript("   "));
        let manager = manager_with(backend.clone(), None, false);

        let result = manager.transcribe(payload()).await;
        assert!(matches!(result, Err(ManagerError::InferenceFailed(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn inference_is_serialized_when_configured() {
        let backend = Arc::new(
            MockBackend::new().with_transcribe_delay(Duration::from_millis(50)),
        );
        let manager = manager_with(backend.clone(), None, true);

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.transcribe(payload()).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(backend.max_inflight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn inference_runs_in_parallel_when_allowed() {
        let backend = Arc::new(
            MockBackend::new().with_transcribe_delay(Duration::from_millis(200)),
        );
        let manager = manager_with(backend.clone(), None, false);
        manager.ensure_loaded().await.unwrap();

        let started = Instant::now();
        let (a, b) = tokio::join!(
            manager.transcribe(payload()),
            manager.transcribe(payload())
        );
        a.unwrap();
        b.unwrap();

        // Two 200ms jobs back to back would take 400ms; in parallel they
        // finish well under that.
        assert!(started.elapsed() < Duration::from_millis(380));
    }
}
