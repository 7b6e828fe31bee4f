use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use studio_contracts::events::{EventPayload, EventWriter};
use studio_contracts::gallery::{Gallery, GeneratedItem};

use crate::client::ImageResult;
use crate::error::{GenerationError, GenerationResult};
use crate::poller::{ChannelPacer, PollOutcome, PollSettings, TaskPoller};
use crate::request::{GenerationRequest, Mode};
use crate::{map_object, truncate_text, GenerationBackend};

pub const VIDEO_SUBMITTED_LABEL: &str = "Video task submitted. Processing...";

const EVENT_URL_CHARS: usize = 160;
/// How long `cancel` and drop wait for the poll worker before detaching it.
const STOP_GRACE: Duration = Duration::from_millis(250);

type ProgressListener = Arc<dyn Fn(&str) + Send + Sync>;

/// What `submit` handed back: a finished image, or the task now being polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Image(GeneratedItem),
    VideoTask { task_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub is_generating: bool,
    pub status_label: Option<String>,
    pub error: Option<GenerationError>,
    pub active_task: Option<String>,
    pub items: Vec<GeneratedItem>,
}

#[derive(Debug, Default)]
struct SessionState {
    is_generating: bool,
    status_label: Option<String>,
    error: Option<GenerationError>,
    active_task: Option<String>,
    gallery: Gallery,
}

impl SessionState {
    fn finish_ok(&mut self, item: GeneratedItem) -> Option<String> {
        self.gallery.prepend(item);
        self.release();
        self.error = None;
        self.gallery.save().err().map(|err| format!("gallery save failed: {err}"))
    }

    fn finish_err(&mut self, err: GenerationError) {
        self.release();
        self.error = Some(err);
    }

    fn release(&mut self) {
        self.is_generating = false;
        self.status_label = None;
        self.active_task = None;
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn emit_failure(events: &EventWriter, err: &GenerationError, mut payload: EventPayload) {
    payload.insert("error".to_string(), json!(err.message()));
    payload.insert("error_kind".to_string(), json!(err.kind().as_str()));
    if let Some(status) = err.status_code() {
        payload.insert("status_code".to_string(), json!(status));
    }
    let event_type = if err.is_benign() {
        "generation_cancelled"
    } else {
        "generation_failed"
    };
    let _ = events.emit(event_type, payload);
}

/// One generation at a time over a `GenerationBackend`.
///
/// Images resolve inside `submit`. Videos return once the task is accepted;
/// the poll loop then runs on a worker thread owned by the session. `wait`
/// joins it. `cancel` and drop stop it and join when it exits promptly; a
/// worker stuck in a status request is detached and exits without touching
/// session state once the request returns.
pub struct GenerationSession {
    backend: Arc<dyn GenerationBackend>,
    events: EventWriter,
    settings: PollSettings,
    state: Arc<Mutex<SessionState>>,
    listener: Option<ProgressListener>,
    worker: Option<WorkerHandle>,
}

impl GenerationSession {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        events: EventWriter,
        settings: PollSettings,
        gallery: Gallery,
    ) -> Self {
        let _ = events.emit(
            "session_started",
            map_object(json!({
                "backend": backend.name(),
                "gallery_path": gallery.path().map(|path| path.display().to_string()),
                "items": gallery.len(),
                "poll_interval_ms": settings.interval.as_millis() as u64,
                "poll_max_attempts": settings.max_attempts,
            })),
        );
        Self {
            backend,
            events,
            settings,
            state: Arc::new(Mutex::new(SessionState {
                gallery,
                ..SessionState::default()
            })),
            listener: None,
            worker: None,
        }
    }

    /// Called with every progress label, from whichever thread set it.
    pub fn with_progress_listener(mut self, listener: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn is_generating(&self) -> bool {
        lock_state(&self.state).is_generating
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock_state(&self.state);
        SessionSnapshot {
            is_generating: state.is_generating,
            status_label: state.status_label.clone(),
            error: state.error.clone(),
            active_task: state.active_task.clone(),
            items: state.gallery.items().to_vec(),
        }
    }

    pub fn submit(&mut self, request: GenerationRequest) -> GenerationResult<Submission> {
        {
            let mut state = lock_state(&self.state);
            if state.is_generating {
                return Err(GenerationError::busy());
            }
            if let Err(err) = request.validate() {
                state.error = Some(err.clone());
                return Err(err);
            }
            state.is_generating = true;
            state.error = None;
            state.status_label = Some(request.mode.initial_status_label().to_string());
        }
        self.reap_worker();
        self.notify(request.mode.initial_status_label());
        let _ = self.events.emit(
            "generation_started",
            map_object(json!({
                "mode": request.mode.as_str(),
                "prompt": request.prompt,
                "backend": self.backend.name(),
            })),
        );

        match request.mode {
            Mode::Image | Mode::Edit => self.run_image(&request),
            Mode::Video => self.start_video(request),
        }
    }

    /// Stops any poll loop and releases the gate. Nothing is sent upstream;
    /// the remote task is abandoned. Returns whether a generation was in flight.
    pub fn cancel(&mut self) -> bool {
        self.stop_worker("cancelled");
        let mut state = lock_state(&self.state);
        let was_generating = state.is_generating;
        state.release();
        was_generating
    }

    /// Blocks until the current poll loop (if any) resolves.
    pub fn wait(&mut self) -> SessionSnapshot {
        if let Some(mut worker) = self.worker.take() {
            worker.join();
        }
        self.snapshot()
    }

    fn run_image(&mut self, request: &GenerationRequest) -> GenerationResult<Submission> {
        let result = match (request.mode, request.input_image.as_deref()) {
            (Mode::Edit, Some(image)) => self.backend.edit_image(&request.prompt, image),
            (Mode::Edit, None) => Err(GenerationError::invalid_request(
                "Image editing requires an input image",
            )),
            _ => self.backend.generate_image(&request.prompt),
        };
        let image = match result {
            Ok(image) => image,
            Err(err) => return Err(self.fail(request.mode, None, err)),
        };

        let url = image.display_url();
        let kind = request.mode.item_kind();
        let item = GeneratedItem::new(kind, url.clone(), request.prompt.clone());
        let warning = lock_state(&self.state).finish_ok(item.clone());
        let _ = self.events.emit(
            "image_created",
            map_object(json!({
                "mode": request.mode.as_str(),
                "item_id": item.id,
                "inline": matches!(image, ImageResult::Inline { .. }),
                "url": truncate_text(&url, EVENT_URL_CHARS),
                "warnings": warning.into_iter().collect::<Vec<_>>(),
            })),
        );
        Ok(Submission::Image(item))
    }

    fn start_video(&mut self, request: GenerationRequest) -> GenerationResult<Submission> {
        let task = match self.backend.submit_video(&request) {
            Ok(task) => task,
            Err(err) => return Err(self.fail(Mode::Video, None, err)),
        };
        let task_id = task.task_id.clone();
        {
            let mut state = lock_state(&self.state);
            state.status_label = Some(VIDEO_SUBMITTED_LABEL.to_string());
            state.active_task = Some(task_id.clone());
        }
        self.notify(VIDEO_SUBMITTED_LABEL);
        let _ = self.events.emit(
            "task_submitted",
            map_object(json!({
                "task_id": task_id,
                "status": task.status.as_str(),
            })),
        );

        let (tx, rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker = PollWorker {
            backend: Arc::clone(&self.backend),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            listener: self.listener.clone(),
            stop_flag: Arc::clone(&stop_flag),
            settings: self.settings,
            task_id: task_id.clone(),
            prompt: request.prompt,
            _exit: exit_tx,
        };
        let handle = match thread::Builder::new()
            .name("studio-video-poll".to_string())
            .spawn(move || worker.run(rx))
        {
            Ok(handle) => handle,
            Err(err) => {
                let err = GenerationError::transport(format!("Poll thread spawn failed: {err}"));
                return Err(self.fail(Mode::Video, Some(task_id.as_str()), err));
            }
        };
        self.worker = Some(WorkerHandle {
            task_id: task_id.clone(),
            stop_flag,
            wake: Some(tx),
            exited: exit_rx,
            handle: Some(handle),
        });
        Ok(Submission::VideoTask { task_id })
    }

    fn fail(&self, mode: Mode, task_id: Option<&str>, err: GenerationError) -> GenerationError {
        lock_state(&self.state).finish_err(err.clone());
        emit_failure(
            &self.events,
            &err,
            map_object(json!({"mode": mode.as_str(), "task_id": task_id})),
        );
        err
    }

    fn notify(&self, label: &str) {
        if let Some(listener) = self.listener.as_ref() {
            listener(label);
        }
    }

    fn reap_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.join();
        }
    }

    fn stop_worker(&mut self, reason: &str) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        let running = worker
            .handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        worker.stop_flag.store(true, Ordering::SeqCst);
        worker.wake.take();
        let exited = worker.wait_exit(STOP_GRACE);
        if exited {
            worker.join();
        } else {
            drop(worker.handle.take());
        }
        if running {
            let _ = self.events.emit(
                "poll_stopped",
                map_object(json!({
                    "task_id": worker.task_id,
                    "reason": reason,
                    "detached": !exited,
                })),
            );
        }
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        self.stop_worker("teardown");
    }
}

struct WorkerHandle {
    task_id: String,
    stop_flag: Arc<AtomicBool>,
    wake: Option<mpsc::Sender<()>>,
    /// Disconnects when the worker drops its `PollWorker`.
    exited: mpsc::Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    fn wait_exit(&self, grace: Duration) -> bool {
        !matches!(
            self.exited.recv_timeout(grace),
            Err(mpsc::RecvTimeoutError::Timeout)
        )
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct PollWorker {
    backend: Arc<dyn GenerationBackend>,
    events: EventWriter,
    state: Arc<Mutex<SessionState>>,
    listener: Option<ProgressListener>,
    stop_flag: Arc<AtomicBool>,
    settings: PollSettings,
    task_id: String,
    prompt: String,
    _exit: mpsc::Sender<()>,
}

impl PollWorker {
    fn run(self, rx: mpsc::Receiver<()>) {
        let mut pacer = ChannelPacer::new(rx, Arc::clone(&self.stop_flag));
        let mut poller = TaskPoller::new(self.task_id.clone(), self.settings);
        let outcome = poller.run(self.backend.as_ref(), &mut pacer, |poller, label| {
            self.progress(poller, label)
        });

        match outcome {
            Ok(PollOutcome::Completed { url, attempts }) => self.complete(url, attempts),
            Ok(PollOutcome::Stopped { .. }) => {}
            Err(err) => self.fail(err, poller.attempts()),
        }
    }

    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    fn progress(&self, poller: &TaskPoller, label: &str) {
        {
            let mut state = lock_state(&self.state);
            if self.stopped() {
                return;
            }
            state.status_label = Some(label.to_string());
        }
        if let Some(listener) = self.listener.as_ref() {
            listener(label);
        }
        let _ = self.events.emit(
            "task_progress",
            map_object(json!({
                "task_id": self.task_id,
                "attempt": poller.attempts(),
                "status": poller.last_status().as_str(),
                "label": label,
            })),
        );
    }

    fn complete(&self, url: String, attempts: u32) {
        let item = GeneratedItem::new(Mode::Video.item_kind(), url.clone(), self.prompt.clone());
        let warning = {
            let mut state = lock_state(&self.state);
            if self.stopped() {
                return;
            }
            state.finish_ok(item.clone())
        };
        let _ = self.events.emit(
            "generation_completed",
            map_object(json!({
                "mode": Mode::Video.as_str(),
                "task_id": self.task_id,
                "item_id": item.id,
                "url": truncate_text(&url, EVENT_URL_CHARS),
                "attempts": attempts,
                "warnings": warning.into_iter().collect::<Vec<_>>(),
            })),
        );
    }

    fn fail(&self, err: GenerationError, attempts: u32) {
        {
            let mut state = lock_state(&self.state);
            if self.stopped() {
                return;
            }
            state.finish_err(err.clone());
        }
        let mut payload = map_object(json!({
            "mode": Mode::Video.as_str(),
            "task_id": self.task_id,
        }));
        payload.insert("attempts".to_string(), Value::from(attempts));
        emit_failure(&self.events, &err, payload);
    }
}
