use crate::core::blink_counter::{BlinkCounter, BlinkDetector};
use crate::core::config::Config;
use crate::core::database::Database;
use crate::core::frame_slot::{latest_frame_slot, LatestFrame};
use crate::core::landmark_extractor::LandmarkExtractor;
use crate::core::pose_comparator::PoseComparator;
use crate::core::pose_store::PoseStore;
use crate::core::snapshot::write_snapshot;
use crate::models::pose::{PoseError, PoseMatch, PoseResult, PoseSnapshot};
use crate::platform::camera::FrameSource;
use crate::platform::pose::LandmarkModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

// ==============================================================================
// Stream Token
// ==============================================================================

/// Identifies one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamToken(Uuid);

impl StreamToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==============================================================================
// Stream Controller
// ==============================================================================

enum StreamState {
    Idle,
    Streaming(Session),
}

struct Session {
    token: StreamToken,
    commands: mpsc::Sender<WorkerCommand>,
    latest: LatestFrame,
    worker: JoinHandle<()>,
}

/// Owns the camera session and the pose worker, and fronts the reference
/// pose store.
///
/// Frames flow from the [`FrameSource`] into a single latest-frame slot.
/// Detection requests go to one worker task per session, which always
/// reads the most recent frame. Stopping a session marks it stale first,
/// so a detection still running at that point resolves to
/// [`PoseError::Superseded`] instead of a late result.
pub struct StreamController {
    source: Mutex<Box<dyn FrameSource>>,
    extractor: LandmarkExtractor,
    store: PoseStore,
    comparator: OnceLock<PoseComparator>,
    blink_counter: Arc<BlinkCounter>,
    blink_detector: Option<Arc<dyn BlinkDetector>>,
    config: Config,
    generation: Arc<AtomicU64>,
    // Serializes start and stop; `state` is only held briefly
    lifecycle: Mutex<()>,
    state: Mutex<StreamState>,
}

impl StreamController {
    pub fn new(
        source: Box<dyn FrameSource>,
        model: Arc<dyn LandmarkModel>,
        store: PoseStore,
        config: Config,
    ) -> PoseResult<Self> {
        config
            .validate()
            .map_err(|e| PoseError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            source: Mutex::new(source),
            extractor: config.extractor(model),
            store,
            comparator: OnceLock::new(),
            blink_counter: Arc::new(BlinkCounter::new()),
            blink_detector: None,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            lifecycle: Mutex::new(()),
            state: Mutex::new(StreamState::Idle),
        })
    }

    /// Controller persisting to the SQLite store at `config.store_path`
    pub async fn open(
        source: Box<dyn FrameSource>,
        model: Arc<dyn LandmarkModel>,
        config: Config,
    ) -> PoseResult<Self> {
        let db = Database::open(&config.store_path)
            .await
            .map_err(|e| PoseError::StoreError(e.to_string()))?;

        Self::new(source, model, PoseStore::new(Arc::new(db)), config)
    }

    pub fn with_blink_detector(mut self, detector: Arc<dyn BlinkDetector>) -> Self {
        self.blink_detector = Some(detector);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model_info(&self) -> String {
        self.extractor.model_info()
    }

    pub async fn is_streaming(&self) -> bool {
        matches!(*self.state.lock().await, StreamState::Streaming(_))
    }

    pub async fn current_token(&self) -> Option<StreamToken> {
        match &*self.state.lock().await {
            StreamState::Streaming(session) => Some(session.token),
            StreamState::Idle => None,
        }
    }

    /// Acquire the camera and spawn the pose worker
    pub async fn start_streaming(&self) -> PoseResult<StreamToken> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut state = self.state.lock().await;
        if matches!(*state, StreamState::Streaming(_)) {
            return Err(PoseError::AlreadyRunning);
        }

        let comparator = match self.comparator.get() {
            Some(_) => None,
            None => Some(self.config.comparator()?),
        };

        let (sink, latest) = latest_frame_slot();
        self.source.lock().await.start(sink).await.map_err(|e| {
            tracing::warn!(error = %e, "Camera unavailable");
            PoseError::SourceUnavailable(e.to_string())
        })?;

        if let Some(comparator) = comparator {
            let _ = self.comparator.set(comparator);
        }

        let session = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (commands, receiver) = mpsc::channel(self.config.command_queue_depth);

        let worker = PoseWorker {
            extractor: self.extractor.clone(),
            blink_detector: self.blink_detector.clone(),
            blink_counter: self.blink_counter.clone(),
            latest: latest.clone(),
            generation: self.generation.clone(),
            session,
            timeout: self.config.extraction_timeout(),
        };
        let worker = tokio::spawn(worker.run(receiver));

        let token = StreamToken::new();
        *state = StreamState::Streaming(Session {
            token,
            commands,
            latest,
            worker,
        });

        tracing::info!(token = %token, model = %self.extractor.model_info(), "Started streaming");
        Ok(token)
    }

    /// Stop the session and release the camera. Calling this while idle is a
    /// no-op.
    ///
    /// Waits for an extraction already in progress. The controller reads as
    /// idle during that wait; only `start_streaming` queues behind it.
    pub async fn stop_streaming(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, StreamState::Idle) {
                StreamState::Streaming(session) => session,
                StreamState::Idle => return,
            }
        };

        // Anything the worker finishes from here on belongs to a stale session
        self.generation.fetch_add(1, Ordering::SeqCst);

        let Session {
            token,
            commands,
            worker,
            ..
        } = session;
        drop(commands);

        if let Err(e) = worker.await {
            tracing::warn!(token = %token, error = %e, "Pose worker ended abnormally");
        }

        if let Err(e) = self.source.lock().await.stop().await {
            tracing::warn!(token = %token, error = %e, "Failed to release camera");
        }

        tracing::info!(token = %token, "Stopped streaming");
    }

    /// Extract the pose from the most recent frame. `Ok(None)` means no frame
    /// has arrived yet; an empty snapshot means nobody is in view.
    pub async fn detect_pose(&self) -> PoseResult<Option<PoseSnapshot>> {
        let commands = self.session_commands().await?;

        let (reply, response) = oneshot::channel();
        commands
            .send(WorkerCommand::Detect { reply })
            .await
            .map_err(|_| PoseError::Superseded)?;
        drop(commands);

        response.await.map_err(|_| PoseError::Superseded)?
    }

    /// Similarity of `current` to `reference` in `[0.0, 1.0]`
    pub fn compare_poses(&self, reference: &PoseSnapshot, current: &PoseSnapshot) -> PoseResult<f64> {
        Ok(self.comparator()?.compare(reference, current))
    }

    pub fn compare_detailed(
        &self,
        reference: &PoseSnapshot,
        current: &PoseSnapshot,
    ) -> PoseResult<PoseMatch> {
        Ok(self.comparator()?.compare_detailed(reference, current))
    }

    /// Whether `current` matches `reference` at the configured threshold
    pub fn is_in_position(&self, reference: &PoseSnapshot, current: &PoseSnapshot) -> PoseResult<bool> {
        let result = self.compare_detailed(reference, current)?;
        Ok(result.is_in_position(self.config.match_threshold))
    }

    pub async fn save_reference_pose(&self, snapshot: &PoseSnapshot) -> PoseResult<()> {
        self.store.save_reference(snapshot).await
    }

    pub async fn load_reference_pose(&self) -> PoseResult<Option<PoseSnapshot>> {
        self.store.load_reference().await
    }

    pub async fn has_reference_pose(&self) -> bool {
        self.store.has_reference().await
    }

    /// Save the current frame as the reference snapshot image and remember
    /// its path
    pub async fn capture_snapshot(&self) -> PoseResult<PathBuf> {
        let frame = match &*self.state.lock().await {
            StreamState::Streaming(session) => session.latest.latest(),
            StreamState::Idle => return Err(PoseError::NotStreaming),
        };
        let frame = frame.ok_or(PoseError::NoFrame)?;

        let dir = self.config.snapshot_dir.clone();
        let path = tokio::task::spawn_blocking(move || write_snapshot(&frame, &dir))
            .await
            .map_err(|e| PoseError::SnapshotError(format!("Snapshot task failed: {}", e)))??;

        self.store.save_snapshot_path(&path).await?;
        Ok(path)
    }

    pub async fn load_snapshot_path(&self) -> Option<PathBuf> {
        self.store.load_snapshot_path().await
    }

    /// Run the blink classifier on the most recent frame and return the
    /// running blink count
    pub async fn detect_blink(&self) -> PoseResult<u64> {
        let commands = self.session_commands().await?;
        if self.blink_detector.is_none() {
            return Err(PoseError::NotInitialized);
        }

        let (reply, response) = oneshot::channel();
        commands
            .send(WorkerCommand::DetectBlink { reply })
            .await
            .map_err(|_| PoseError::Superseded)?;
        drop(commands);

        response.await.map_err(|_| PoseError::Superseded)?
    }

    pub fn reset_blink_count(&self) {
        self.blink_counter.reset();
    }

    pub fn blink_count(&self) -> u64 {
        self.blink_counter.current()
    }

    fn comparator(&self) -> PoseResult<&PoseComparator> {
        self.comparator.get().ok_or(PoseError::NotInitialized)
    }

    async fn session_commands(&self) -> PoseResult<mpsc::Sender<WorkerCommand>> {
        match &*self.state.lock().await {
            StreamState::Streaming(session) => Ok(session.commands.clone()),
            StreamState::Idle => Err(PoseError::NotStreaming),
        }
    }
}

// ==============================================================================
// Pose Worker
// ==============================================================================

enum WorkerCommand {
    Detect {
        reply: oneshot::Sender<PoseResult<Option<PoseSnapshot>>>,
    },
    DetectBlink {
        reply: oneshot::Sender<PoseResult<u64>>,
    },
}

struct PoseWorker {
    extractor: LandmarkExtractor,
    blink_detector: Option<Arc<dyn BlinkDetector>>,
    blink_counter: Arc<BlinkCounter>,
    latest: LatestFrame,
    generation: Arc<AtomicU64>,
    session: u64,
    timeout: Option<Duration>,
}

impl PoseWorker {
    /// Serve commands until every sender is gone
    async fn run(self, mut commands: mpsc::Receiver<WorkerCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                WorkerCommand::Detect { reply } => {
                    let result = self.detect().await;
                    let _ = reply.send(self.unless_stale(result));
                }
                WorkerCommand::DetectBlink { reply } => {
                    let result = self.detect_blink().await;
                    let _ = reply.send(self.unless_stale(result));
                }
            }
        }

        tracing::debug!(session = self.session, "Pose worker finished");
    }

    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.session
    }

    fn unless_stale<T>(&self, result: PoseResult<T>) -> PoseResult<T> {
        if self.is_current() {
            result
        } else {
            Err(PoseError::Superseded)
        }
    }

    async fn detect(&self) -> PoseResult<Option<PoseSnapshot>> {
        if !self.is_current() {
            return Err(PoseError::Superseded);
        }

        let frame = match self.latest.latest() {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let extractor = self.extractor.clone();
        let start_time = Instant::now();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&frame));

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| {
                    tracing::warn!(timeout_ms = limit.as_millis() as u64, "Landmark extraction timed out");
                    PoseError::ExtractionTimeout(limit)
                })?,
            None => task.await,
        };

        let snapshot = joined
            .map_err(|e| PoseError::DetectionFailed(format!("Extraction task failed: {}", e)))??;

        tracing::debug!(
            joints = snapshot.joints.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Extracted pose"
        );
        Ok(Some(snapshot))
    }

    async fn detect_blink(&self) -> PoseResult<u64> {
        if !self.is_current() {
            return Err(PoseError::Superseded);
        }

        let detector = self
            .blink_detector
            .clone()
            .ok_or(PoseError::NotInitialized)?;

        let frame = match self.latest.latest() {
            Some(frame) => frame,
            None => return Ok(self.blink_counter.current()),
        };

        let blinked = tokio::task::spawn_blocking(move || detector.detect_blink(&frame))
            .await
            .map_err(|e| PoseError::DetectionFailed(format!("Blink task failed: {}", e)))??;

        if blinked && self.is_current() {
            let count = self.blink_counter.record_blink();
            tracing::debug!(count, "Blink detected");
            Ok(count)
        } else {
            Ok(self.blink_counter.current())
        }
    }
}
