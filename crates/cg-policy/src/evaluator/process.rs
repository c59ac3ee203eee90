// process.rs — Run a child process under a hard timeout.
//
// stdout and stderr are drained on their own threads so a chatty child
// cannot block on a full pipe while we poll for exit. On timeout the child
// is killed and reaped before returning. Collecting the drained output is
// bounded by the same deadline: a grandchild that inherited the pipes can
// keep them open after the child exits, and that counts as a timeout too.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EvaluationError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion, or kill it once `timeout` elapses.
pub fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<ProcessOutput, EvaluationError> {
    let program = command.get_program().to_string_lossy().into_owned();

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EvaluationError::Spawn {
            program: program.clone(),
            source,
        })?;

    let (tx, rx) = mpsc::channel();
    let mut pending = 0;
    if let Some(pipe) = child.stdout.take() {
        drain(Pipe::Stdout, pipe, tx.clone());
        pending += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        drain(Pipe::Stderr, pipe, tx.clone());
        pending += 1;
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(program = %program, ?timeout, "killed child process after timeout");
            return Err(EvaluationError::Timeout {
                program,
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let Some((stdout, stderr)) = collect(&rx, pending, deadline) else {
        tracing::debug!(
            program = %program,
            ?timeout,
            "child exited but its output pipes stayed open past the deadline"
        );
        return Err(EvaluationError::Timeout {
            program,
            after: timeout,
        });
    };

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(which: Pipe, mut pipe: R, tx: Sender<(Pipe, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        // The receiver is gone once the caller has given up waiting.
        let _ = tx.send((which, buf));
    });
}

/// Wait for `pending` drained pipes until `deadline`. `None` if any pipe
/// is still open when the deadline passes.
fn collect(
    rx: &Receiver<(Pipe, Vec<u8>)>,
    mut pending: usize,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Pipe::Stdout, bytes)) => stdout = bytes,
            Ok((Pipe::Stderr, bytes)) => stderr = bytes,
            Err(RecvTimeoutError::Timeout) => return None,
            // Every reader finished; nothing more will arrive.
            Err(RecvTimeoutError::Disconnected) => break,
        }
        pending -= 1;
    }
    Some((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_and_status() {
        let out = run_with_timeout(sh("echo out; echo err >&2; exit 3"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.status.code(), Some(3));
    }

    #[test]
    fn times_out_and_kills() {
        let started = Instant::now();
        let err = run_with_timeout(sh("sleep 5"), Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, EvaluationError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn pipe_held_open_by_grandchild_times_out() {
        let started = Instant::now();
        let err = run_with_timeout(sh("sleep 5 & echo done"), Duration::from_millis(300))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run_with_timeout(
            Command::new("codeguard-no-such-binary"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, EvaluationError::Spawn { .. }));
    }
}
