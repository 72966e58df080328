//! Blocking invocation of external collaborator programs.
//!
//! # Responsibility
//! - Spawn a configured program with piped stdout/stderr and capture both.
//! - Enforce an optional wall-clock limit, killing and reaping the child
//!   when it is exceeded.
//!
//! # Invariants
//! - Pipes are drained on helper threads so a chatty child never blocks on a
//!   full pipe while we wait for it.
//! - After a kill the child is reaped within `REAP_TIMEOUT`, or an error is
//!   returned; this function never blocks forever once a timeout is set.
//! - Captured streams are capped at `MAX_CAPTURE_BYTES` each.

use crate::config::CommandConfig;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const MAX_CAPTURE_BYTES: usize = 4 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REAP_TIMEOUT: Duration = Duration::from_secs(5);
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit status and output of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The child exceeded its time limit and was killed.
    pub timed_out: bool,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug)]
pub enum ProcessError {
    Spawn {
        program: String,
        source: std::io::Error,
    },
    Wait {
        program: String,
        source: std::io::Error,
    },
    ReapTimeout {
        program: String,
        timeout_secs: u64,
    },
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => write!(f, "failed to start `{program}`: {source}"),
            Self::Wait { program, source } => {
                write!(f, "failed waiting for `{program}`: {source}")
            }
            Self::ReapTimeout {
                program,
                timeout_secs,
            } => write!(
                f,
                "`{program}` could not be reaped within {timeout_secs}s after kill"
            ),
        }
    }
}

impl Error for ProcessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Wait { source, .. } => Some(source),
            Self::ReapTimeout { .. } => None,
        }
    }
}

/// Runs `command` (plus `extra_args` and `envs`) to completion.
///
/// With `timeout = None` this blocks until the child exits.
pub fn run_captured(
    command: &CommandConfig,
    extra_args: &[String],
    envs: &[(&str, &str)],
    timeout: Option<Duration>,
) -> Result<CapturedOutput, ProcessError> {
    let program = command.program.clone();
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = command.working_dir.as_ref() {
        cmd.current_dir(dir);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let stdout = child.stdout.take().map(spawn_drain);
    let stderr = child.stderr.take().map(spawn_drain);

    let (status, timed_out) = wait_with_deadline(&mut child, timeout, &program)?;

    Ok(CapturedOutput {
        exit_code: status.code(),
        stdout: collect(stdout),
        stderr: collect(stderr),
        timed_out,
    })
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
    program: &str,
) -> Result<(ExitStatus, bool), ProcessError> {
    let wait_error = |source| ProcessError::Wait {
        program: program.to_string(),
        source,
    };

    let Some(limit) = timeout else {
        return child.wait().map(|status| (status, false)).map_err(wait_error);
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            return bounded_reap(child, program).map(|status| (status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn bounded_reap(child: &mut Child, program: &str) -> Result<ExitStatus, ProcessError> {
    let reap_deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                return Err(ProcessError::Wait {
                    program: program.to_string(),
                    source,
                })
            }
        }
        if Instant::now() >= reap_deadline {
            return Err(ProcessError::ReapTimeout {
                program: program.to_string(),
                timeout_secs: REAP_TIMEOUT.as_secs(),
            });
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn spawn_drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut chunk = [0_u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                    captured.extend_from_slice(&chunk[..read.min(room)]);
                }
            }
        }
        let _ = tx.send(captured);
    });
    rx
}

// A grandchild that inherited the pipe can keep it open after the child
// exits; give up on the stream rather than hang the run.
fn collect(receiver: Option<mpsc::Receiver<Vec<u8>>>) -> Vec<u8> {
    receiver
        .and_then(|rx| rx.recv_timeout(PIPE_DRAIN_TIMEOUT).ok())
        .unwrap_or_default()
}
