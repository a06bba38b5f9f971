use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::camera::{FrameSource, WebcamSource};
use crate::client::{HttpTransport, InferenceTransport};
use crate::config::RelayConfig;
use crate::error::{CaptureError, StartError};
use crate::overlay::{render_result, OverlaySurface};
use crate::protocol::{fit_frame, EncodedFrame, FramePayload};
use crate::state::{step, Phase, Signal};
use crate::surface::PixelSurface;

/// Point-in-time view of the relay, suitable for the status line and the
/// control socket's `Status` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phase: String,
    pub active: bool,
    pub interval_ms: u64,
    pub frames_sent: u64,
    pub faces_last: usize,
    pub last_inference_ms: Option<f64>,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SessionStats {
    last_inference_ms: Option<f64>,
    last_error: Option<String>,
}

/// State shared between the controller, the relay thread, and any handles.
/// The live phase sits in an atomic so status queries never block the loop.
#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    phase: AtomicU8,
    interval_ms: AtomicU64,
    frames_sent: AtomicU64,
    faces_last: AtomicUsize,
    consecutive_errors: AtomicU32,
    stats: Mutex<SessionStats>,
}

impl Shared {
    fn new(interval_ms: u64) -> Self {
        Self {
            running: AtomicBool::new(false),
            phase: AtomicU8::new(Phase::Idle as u8),
            interval_ms: AtomicU64::new(interval_ms.max(1)),
            frames_sent: AtomicU64::new(0),
            faces_last: AtomicUsize::new(0),
            consecutive_errors: AtomicU32::new(0),
            stats: Mutex::new(SessionStats::default()),
        }
    }
}

fn advance(shared: &Shared, signal: Signal) -> Phase {
    let current = Phase::from_u8(shared.phase.load(Ordering::Relaxed));
    let next = step(current, signal);
    shared.phase.store(next as u8, Ordering::Relaxed);
    trace!(?current, ?signal, ?next, "phase transition");
    next
}

fn snapshot(shared: &Shared) -> StatusSnapshot {
    let stats = shared.stats.lock().unwrap();
    StatusSnapshot {
        phase: Phase::from_u8(shared.phase.load(Ordering::Relaxed))
            .label()
            .to_string(),
        active: shared.running.load(Ordering::SeqCst),
        interval_ms: shared.interval_ms.load(Ordering::Relaxed),
        frames_sent: shared.frames_sent.load(Ordering::Relaxed),
        faces_last: shared.faces_last.load(Ordering::Relaxed),
        last_inference_ms: stats.last_inference_ms,
        consecutive_errors: shared.consecutive_errors.load(Ordering::Relaxed),
        last_error: stats.last_error.clone(),
    }
}

/// Cheap, cloneable view of a session, safe to hand to other threads. Can
/// adjust the interval, query status, and ask the session to wind down, but
/// only [`RelayController::stop`] joins the relay thread.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    shared: Arc<Shared>,
    stop_tx: Sender<()>,
}

impl RelayHandle {
    /// Applies at the next re-arm; no restart needed. Clamped to >= 1 ms.
    pub fn set_interval(&self, interval_ms: u64) {
        debug!(interval_ms, "updating interval");
        self.shared
            .interval_ms
            .store(interval_ms.max(1), Ordering::Relaxed);
    }

    pub fn status(&self) -> StatusSnapshot {
        snapshot(&self.shared)
    }

    pub fn is_active(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Flags the session for shutdown and wakes a pending tick. The loop
    /// finishes its in-flight round-trip (discarding the result) and exits.
    pub fn request_stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.try_send(());
    }
}

struct Worker {
    thread: JoinHandle<()>,
    stop_tx: Sender<()>,
}

/// Owns at most one capture session at a time and is the only place allowed
/// to start or stop one.
pub struct RelayController {
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Default for RelayController {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new(crate::config::DEFAULT_INTERVAL_MS)),
            worker: None,
        }
    }

    /// Starts a session wired to the real camera, HTTP endpoint, and pixel
    /// surface described by `config`.
    pub fn start(&mut self, config: &RelayConfig) -> Result<RelayHandle, StartError> {
        let surface: Box<dyn OverlaySurface + Send> = match &config.save {
            Some(path) => Box::new(PixelSurface::with_sink(
                config.width,
                config.height,
                path.clone(),
                90,
            )),
            None => Box::new(PixelSurface::new(config.width, config.height)),
        };
        let transport = Box::new(HttpTransport::new(config.endpoint.clone()));
        let (index, width, height) = (config.camera_index, config.width, config.height);
        self.start_with(
            config.consent,
            config.interval_ms,
            config.quality,
            move || {
                WebcamSource::open(index, width, height)
                    .map(|source| Box::new(source) as Box<dyn FrameSource + Send>)
            },
            transport,
            surface,
        )
    }

    /// Starts a session over caller-supplied collaborators. The frame source
    /// is opened inside the relay thread; `source_factory` is never invoked
    /// when consent is missing or a session is already active. Open failures
    /// are reported synchronously.
    pub fn start_with<F>(
        &mut self,
        consent_given: bool,
        interval_ms: u64,
        quality: u8,
        source_factory: F,
        transport: Box<dyn InferenceTransport + Send>,
        mut surface: Box<dyn OverlaySurface + Send>,
    ) -> Result<RelayHandle, StartError>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource + Send>, CaptureError> + Send + 'static,
    {
        if !consent_given {
            return Err(StartError::ConsentRequired);
        }
        if let Some(worker) = self.worker.take() {
            if self.shared.running.load(Ordering::SeqCst) {
                self.worker = Some(worker);
                return Err(StartError::AlreadyActive);
            }
            // the previous loop exited on its own; reap it
            let _ = worker.thread.join();
        }

        self.shared
            .interval_ms
            .store(interval_ms.max(1), Ordering::Relaxed);
        self.shared.frames_sent.store(0, Ordering::Relaxed);
        self.shared.faces_last.store(0, Ordering::Relaxed);
        self.shared.consecutive_errors.store(0, Ordering::Relaxed);
        *self.shared.stats.lock().unwrap() = SessionStats::default();
        advance(&self.shared, Signal::StartRequested);
        self.shared.running.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = bounded::<Result<(), CaptureError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let thread = std::thread::spawn(move || {
            let mut source = match source_factory() {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(()));
                    source
                }
                Err(e) => {
                    shared.running.store(false, Ordering::SeqCst);
                    advance(&shared, Signal::CaptureFailed);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            advance(&shared, Signal::SourceReady);
            let exit = relay_loop(
                &shared,
                &stop_rx,
                source.as_mut(),
                transport.as_ref(),
                surface.as_mut(),
                quality,
            );
            // single teardown path: the source drops here, releasing the
            // camera, and the surface never outlives it un-cleared
            match exit {
                Ok(()) => {
                    advance(&shared, Signal::StopRequested);
                }
                Err(e) => {
                    error!("capture failed, ending session: {e}");
                    shared.stats.lock().unwrap().last_error = Some(e.to_string());
                    advance(&shared, Signal::CaptureFailed);
                }
            }
            surface.clear();
            shared.running.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(interval_ms, "relay session started");
                self.worker = Some(Worker {
                    thread,
                    stop_tx: stop_tx.clone(),
                });
                Ok(RelayHandle {
                    shared: self.shared.clone(),
                    stop_tx,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(StartError::CameraUnavailable(e))
            }
            Err(_) => {
                let _ = thread.join();
                Err(StartError::CameraUnavailable(CaptureError::Open {
                    device: "camera".into(),
                    reason: "relay thread died before opening the device".into(),
                }))
            }
        }
    }

    /// Idempotent. Wakes a pending tick, lets an in-flight round-trip settle
    /// (its result is discarded), and joins the relay thread.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.try_send(());
            if worker.thread.join().is_err() {
                error!("relay thread panicked");
            }
            info!("relay session stopped");
        }
        self.shared.phase.store(Phase::Idle as u8, Ordering::Relaxed);
    }

    pub fn set_interval(&self, interval_ms: u64) {
        debug!(interval_ms, "updating interval");
        self.shared
            .interval_ms
            .store(interval_ms.max(1), Ordering::Relaxed);
    }

    pub fn status(&self) -> StatusSnapshot {
        snapshot(&self.shared)
    }

    pub fn is_active(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for RelayController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One capture session: capture, transmit, render, wait, repeat. The first
/// capture happens immediately; every later one is re-armed only after the
/// previous round-trip settles, so at most one request is ever outstanding.
/// Returns `Err` only for unrecoverable capture failures; transport failures
/// are recorded and survived.
fn relay_loop(
    shared: &Shared,
    stop_rx: &Receiver<()>,
    source: &mut dyn FrameSource,
    transport: &dyn InferenceTransport,
    surface: &mut dyn OverlaySurface,
    quality: u8,
) -> Result<(), CaptureError> {
    let (width, height) = source.dimensions();
    surface.resize(width, height);
    debug!(width, height, "overlay matched to the camera format");

    while shared.running.load(Ordering::SeqCst) {
        let frame = source.grab()?;
        let fitted = fit_frame(&frame, surface.dimensions());
        let encoded = EncodedFrame::encode(&fitted, quality)?;
        let payload = match FramePayload::new(encoded, surface.dimensions()) {
            Ok(payload) => payload,
            Err(mismatch) => {
                // unreachable after fit_frame, but treated as a cycle error
                warn!("skipping frame: {mismatch}");
                shared.consecutive_errors.fetch_add(1, Ordering::Relaxed);
                shared.stats.lock().unwrap().last_error = Some(mismatch.to_string());
                if !wait_for_next_tick(shared, stop_rx) {
                    return Ok(());
                }
                continue;
            }
        };

        advance(shared, Signal::FrameSent);
        trace!("sending frame");
        let outcome = transport.infer(&payload);
        advance(shared, Signal::RoundTripSettled);

        if !shared.running.load(Ordering::SeqCst) {
            trace!("round-trip settled after stop, discarding result");
            return Ok(());
        }

        match outcome {
            Ok(result) => {
                render_result(surface, &result);
                surface.present(&fitted);
                shared.frames_sent.fetch_add(1, Ordering::Relaxed);
                shared.faces_last.store(result.faces.len(), Ordering::Relaxed);
                shared.consecutive_errors.store(0, Ordering::Relaxed);
                let mut stats = shared.stats.lock().unwrap();
                stats.last_inference_ms = result.inference_time_ms;
                stats.last_error = None;
                trace!(faces = result.faces.len(), "result rendered");
            }
            Err(e) => {
                let errors = shared.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(consecutive = errors, "round-trip failed: {e}");
                shared.stats.lock().unwrap().last_error = Some(e.to_string());
            }
        }

        if !wait_for_next_tick(shared, stop_rx) {
            return Ok(());
        }
    }
    Ok(())
}

/// Sleeps out the configured interval, reading it fresh each time so live
/// interval changes apply at the next re-arm. Returns `false` when woken by
/// a stop request.
fn wait_for_next_tick(shared: &Shared, stop_rx: &Receiver<()>) -> bool {
    let delay = Duration::from_millis(shared.interval_ms.load(Ordering::Relaxed));
    match stop_rx.recv_timeout(delay) {
        Err(RecvTimeoutError::Timeout) => {
            advance(shared, Signal::TimerFired);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_stable_field_names() {
        let shared = Shared::new(250);
        shared.frames_sent.store(3, Ordering::Relaxed);
        let value = serde_json::to_value(snapshot(&shared)).unwrap();
        assert_eq!(value["phase"], "stopped");
        assert_eq!(value["interval_ms"], 250);
        assert_eq!(value["frames_sent"], 3);
        assert_eq!(value["last_error"], serde_json::Value::Null);
    }

    #[test]
    fn interval_is_clamped_to_at_least_one() {
        let controller = RelayController::new();
        controller.set_interval(0);
        assert_eq!(controller.status().interval_ms, 1);
    }

    #[test]
    fn stop_without_a_session_is_a_no_op() {
        let mut controller = RelayController::new();
        controller.stop();
        controller.stop();
        assert!(!controller.is_active());
        assert_eq!(controller.status().phase, "stopped");
    }
}
