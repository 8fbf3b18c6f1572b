//! Pipeline spawning and process plumbing
//!
//! Spawns the one or two stages of a backend's command pipeline with
//! explicit argument vectors, wiring stdout of each stage into stdin of the
//! next. The final stage's stdout is the video byte stream.

use std::io;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::backend::CaptureBackend;
use crate::error::{Result, StreamError};

/// A spawned capture pipeline
pub struct CapturePipeline {
    /// All stage processes, first to last
    pub children: Vec<Child>,
    /// Final stage stdout, the video stream
    pub stdout: ChildStdout,
    /// Per-stage stderr handles with the stage program name
    pub stderrs: Vec<(String, ChildStderr)>,
    /// Stage process ids
    pub pids: Vec<u32>,
}

/// Spawn every stage of the backend's pipeline
///
/// On any spawn failure the already-started stages are killed and the whole
/// launch fails with `CaptureLaunchFailed`.
pub fn spawn(backend: &CaptureBackend) -> Result<CapturePipeline> {
    let stages = &backend.pipeline;
    let mut children: Vec<Child> = Vec::with_capacity(stages.len());
    let mut stderrs = Vec::with_capacity(stages.len());
    let mut upstream: Option<ChildStdout> = None;

    for (index, spec) in stages.iter().enumerate() {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop if a watcher task is dropped before reaping
            .kill_on_drop(true);

        match upstream.take() {
            Some(out) => {
                let stdin: Stdio = out.try_into().map_err(StreamError::CaptureLaunchFailed)?;
                cmd.stdin(stdin);
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(stage = %spec.program, error = %e, "Pipeline stage failed to spawn");
                for started in &mut children {
                    let _ = started.start_kill();
                }
                return Err(StreamError::CaptureLaunchFailed(e));
            }
        };

        if let Some(stderr) = child.stderr.take() {
            stderrs.push((spec.program.clone(), stderr));
        }

        if index + 1 < stages.len() {
            upstream = child.stdout.take();
        }

        children.push(child);
    }

    let pids = children.iter().filter_map(Child::id).collect();

    let stdout = children
        .last_mut()
        .and_then(|child| child.stdout.take())
        .ok_or_else(|| {
            StreamError::CaptureLaunchFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipeline produced no stdout",
            ))
        })?;

    Ok(CapturePipeline {
        children,
        stdout,
        stderrs,
        pids,
    })
}

/// Ask a stage to terminate gracefully
pub fn terminate(pid: u32) {
    // SIGTERM so the capture utility can flush and release the camera;
    // tokio's kill is SIGKILL
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

/// Drain one stage's stderr into the log
///
/// Encoder progress lines are routine output, not faults, and stay at TRACE
/// so default log levels don't drown in them.
pub async fn drain_stderr(stage: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("frame=") || line.contains("fps=") {
            tracing::trace!(stage = %stage, "{}", line);
        } else {
            tracing::debug!(stage = %stage, "{}", line);
        }
    }
}
