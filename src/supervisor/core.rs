//! Supervisor implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backend::{CaptureBackend, Selector, StartOptions};
use crate::error::Result;
use crate::hub::BroadcastHub;

use super::pipeline;
use super::state::{CaptureSession, SupervisorState};

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay before a crash-restart attempt
    pub restart_backoff: Duration,
    /// Read size for the capture stdout, one chunk per read
    pub read_buffer_size: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_backoff: Duration::from_secs(5),
            read_buffer_size: 16 * 1024,
        }
    }
}

impl SupervisorConfig {
    /// Set the crash-restart backoff
    pub fn restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Set the stdout read size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

struct Inner {
    state: SupervisorState,
    session: Option<CaptureSession>,
    /// Pending crash-restart timer, aborted by `stop()`
    restart_task: Option<JoinHandle<()>>,
    /// Options from the most recent start, reused for re-selection
    last_options: StartOptions,
}

/// Owner of the single active capture session
///
/// All state transitions happen under one lock; reader, stderr, and
/// exit-watcher tasks only re-enter through `on_exit` with a generation
/// token, so notifications from torn-down sessions are discarded.
pub struct CaptureSupervisor {
    hub: Arc<BroadcastHub>,
    selector: Arc<dyn Selector>,
    config: SupervisorConfig,
    inner: Mutex<Inner>,
    next_generation: AtomicU64,
}

impl CaptureSupervisor {
    /// Create a supervisor bound to a hub and a backend selector
    pub fn new(
        hub: Arc<BroadcastHub>,
        selector: Arc<dyn Selector>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            hub,
            selector,
            config,
            inner: Mutex::new(Inner {
                state: SupervisorState::Idle,
                session: None,
                restart_task: None,
                last_options: StartOptions::default(),
            }),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Current state
    pub async fn state(&self) -> SupervisorState {
        self.inner.lock().await.state
    }

    /// Whether a capture session is starting or running
    pub async fn is_active(&self) -> bool {
        matches!(
            self.inner.lock().await.state,
            SupervisorState::Starting | SupervisorState::Running
        )
    }

    /// Snapshot of the active session, if any
    pub async fn session(&self) -> Option<CaptureSession> {
        self.inner.lock().await.session.clone()
    }

    /// Start a capture session
    ///
    /// Valid only from `Idle`; in any other state this is a no-op. A spawn
    /// failure transitions straight back to `Idle` and is returned to the
    /// caller, never retried automatically.
    pub async fn start(self: &Arc<Self>, backend: CaptureBackend, opts: StartOptions) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.state != SupervisorState::Idle {
            tracing::debug!(state = %inner.state, "Start requested while capture active, ignoring");
            return Ok(());
        }

        inner.last_options = opts;
        self.launch(&mut inner, backend, 0)
    }

    /// Stop the active capture session
    ///
    /// Cancels any pending restart, signals every pipeline stage, and
    /// transitions to `Idle` without waiting for the exit notification.
    /// Idempotent from `Idle`.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(task) = inner.restart_task.take() {
            task.abort();
            tracing::debug!("Pending restart cancelled");
        }

        match inner.state {
            SupervisorState::Idle => {}
            SupervisorState::Crashed => {
                tracing::info!("Stop requested, abandoning crashed session");
                inner.state = SupervisorState::Idle;
                inner.session = None;
            }
            SupervisorState::Starting | SupervisorState::Running | SupervisorState::Stopping => {
                inner.state = SupervisorState::Stopping;
                if let Some(session) = &inner.session {
                    tracing::info!(
                        backend = %session.backend,
                        uptime_secs = session.started_at.elapsed().as_secs(),
                        "Stopping capture pipeline"
                    );
                    for pid in &session.pids {
                        pipeline::terminate(*pid);
                    }
                }
                self.hub.detach();
                // Optimistic transition; the exit watcher sees a cleared
                // session and ignores the notification
                inner.state = SupervisorState::Idle;
                inner.session = None;
            }
        }
    }

    /// Spawn the pipeline and move to `Running`
    ///
    /// Called with the state lock held, from `start` or from the restart
    /// path. Spawn itself is synchronous, so `Starting` is never observable
    /// from outside the lock.
    fn launch(
        self: &Arc<Self>,
        inner: &mut Inner,
        backend: CaptureBackend,
        restart_attempts: u32,
    ) -> Result<()> {
        inner.state = SupervisorState::Starting;
        tracing::info!(backend = %backend.kind, stages = backend.pipeline.len(), "Starting capture pipeline");
        for stage in &backend.pipeline {
            tracing::debug!(stage = %stage, "Pipeline stage");
        }

        let launched = match pipeline::spawn(&backend) {
            Ok(launched) => launched,
            Err(e) => {
                inner.state = SupervisorState::Idle;
                tracing::error!(error = %e, "Capture launch failed");
                return Err(e);
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        inner.session = Some(CaptureSession {
            backend: backend.kind,
            pids: launched.pids.clone(),
            started_at: Instant::now(),
            last_exit: None,
            restart_attempts,
            generation,
        });

        self.hub.attach();

        // Reader: capture stdout → hub, one chunk per read
        let hub = Arc::clone(&self.hub);
        let mut stdout = launched.stdout;
        let read_size = self.config.read_buffer_size;
        tokio::spawn(async move {
            let mut buf = BytesMut::with_capacity(read_size);
            loop {
                buf.reserve(read_size);
                match stdout.read_buf(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => hub.publish(buf.split().freeze()).await,
                }
            }
        });

        for (stage, stderr) in launched.stderrs {
            tokio::spawn(pipeline::drain_stderr(stage, stderr));
        }

        let supervisor = Arc::clone(self);
        let children = launched.children;
        tokio::spawn(async move {
            supervisor.watch_exit(children, generation).await;
        });

        inner.state = SupervisorState::Running;
        tracing::info!(backend = %backend.kind, generation, "Capture pipeline running");
        Ok(())
    }

    /// Wait for the pipeline to finish and reconcile state
    ///
    /// The final stage drives the pipeline; once it exits, upstream stages
    /// are killed and reaped.
    async fn watch_exit(self: Arc<Self>, mut children: Vec<Child>, generation: u64) {
        let Some(mut last) = children.pop() else {
            return;
        };

        let status = last.wait().await;

        for mut upstream in children {
            let _ = upstream.start_kill();
            let _ = upstream.wait().await;
        }

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to collect pipeline exit status");
                None
            }
        };

        self.on_exit(generation, code).await;
    }

    /// Handle a pipeline exit notification
    async fn on_exit(self: &Arc<Self>, generation: u64, code: Option<i32>) {
        let mut inner = self.inner.lock().await;

        let attempts = match &mut inner.session {
            Some(session) if session.generation == generation => {
                session.last_exit = code;
                session.restart_attempts
            }
            _ => {
                // Already stopped or replaced
                tracing::debug!(generation, ?code, "Exit notification for a superseded session");
                return;
            }
        };

        self.hub.detach();

        match code {
            Some(0) => {
                tracing::info!("Capture pipeline exited cleanly");
                inner.state = SupervisorState::Idle;
                inner.session = None;
            }
            None => {
                // Killed by signal, somebody meant it
                tracing::info!("Capture pipeline terminated by signal");
                inner.state = SupervisorState::Idle;
                inner.session = None;
            }
            Some(code) => {
                tracing::warn!(
                    code,
                    attempt = attempts + 1,
                    backoff_secs = self.config.restart_backoff.as_secs_f32(),
                    "Capture pipeline crashed, scheduling restart"
                );
                inner.state = SupervisorState::Crashed;
                self.schedule_restart(&mut inner, attempts + 1);
            }
        }
    }

    /// Arm the backoff timer for a restart attempt
    fn schedule_restart(self: &Arc<Self>, inner: &mut Inner, attempts: u32) {
        let supervisor = Arc::clone(self);
        let backoff = self.config.restart_backoff;
        inner.restart_task = Some(tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            supervisor.restart(attempts).await;
        }));
    }

    /// Re-select a backend and relaunch after a crash
    ///
    /// Retries indefinitely: a failed re-selection or re-spawn goes back to
    /// `Crashed` and arms the next timer, so transient camera glitches heal
    /// without operator action.
    async fn restart(self: &Arc<Self>, attempts: u32) {
        let mut inner = self.inner.lock().await;

        if inner.state != SupervisorState::Crashed {
            tracing::debug!(state = %inner.state, "Restart timer fired in a non-crashed state, ignoring");
            return;
        }

        inner.restart_task = None;
        inner.state = SupervisorState::Idle;
        inner.session = None;

        tracing::info!(attempt = attempts, "Restarting capture after crash");

        let backend = match self.selector.select(inner.last_options) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(error = %e, attempt = attempts, "Backend re-selection failed, retrying");
                inner.state = SupervisorState::Crashed;
                self.schedule_restart(&mut inner, attempts + 1);
                return;
            }
        };

        if let Err(e) = self.launch(&mut inner, backend, attempts) {
            tracing::warn!(error = %e, attempt = attempts, "Relaunch failed, retrying");
            inner.state = SupervisorState::Crashed;
            self.schedule_restart(&mut inner, attempts + 1);
        }
    }
}
