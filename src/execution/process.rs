//! Process Runner
//!
//! Spawns one external module process, optionally feeds it an input
//! payload over stdin, and exposes its combined standard-output/error as
//! a line stream delivered as the process writes, not buffered until
//! exit.
//!
//! Modules are invoked as `<executable>` with no arguments. Reader
//! threads drain both output pipes into one channel; the child is always
//! reaped (exit status collected) before the runner reports completion.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use thiserror::Error;

/// Errors raised while launching or reaping a module process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch '{executable}': {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },

    #[error("failed to write input to '{executable}': {source}")]
    Input {
        executable: String,
        source: std::io::Error,
    },

    #[error("failed to collect exit status: {0}")]
    Wait(#[from] std::io::Error),
}

/// A running module process with a live output line stream.
pub struct RunningProcess {
    child: Arc<Mutex<Child>>,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl RunningProcess {
    /// Launches `executable` with no arguments.
    ///
    /// When `input` is given, stdin is piped, the payload written, and
    /// the stream closed before any output is read; otherwise the child
    /// gets a null stdin. A launch failure (missing file, permission
    /// denied) is returned as [`ProcessError::Spawn`], never surfaced as
    /// a line of output.
    pub fn spawn(executable: &str, input: Option<&str>) -> Result<Self, ProcessError> {
        let mut command = Command::new(executable);
        command
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            executable: executable.to_string(),
            source,
        })?;

        debug!("Launched '{}' (pid {})", executable, child.id());

        if let Some(payload) = input {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(source) = stdin.write_all(payload.as_bytes()) {
                    // The child must not leak even when feeding it fails
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Input {
                        executable: executable.to_string(),
                        source,
                    });
                }
                // Dropping the handle closes the stream before reading begins
            }
        }

        let (sender, lines) = channel();
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, sender));
        }

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            lines,
            readers,
        })
    }

    /// The stream of output lines, ending when the process closes both
    /// output pipes.
    pub fn lines(&self) -> &Receiver<String> {
        &self.lines
    }

    /// Forcibly ends the process. Safe to call more than once; the exit
    /// status must still be collected with [`wait`](Self::wait).
    pub fn terminate(&self) {
        if let Ok(mut child) = self.child.lock() {
            if let Err(e) = child.kill() {
                // Already-exited children report InvalidInput here
                debug!("Terminate found process already gone: {}", e);
            } else {
                warn!("Terminated process (pid {})", child.id());
            }
        }
    }

    /// Joins the reader threads and reaps the child, returning its exit
    /// status.
    pub fn wait(self) -> Result<ExitStatus, ProcessError> {
        for reader in self.readers {
            let _ = reader.join();
        }

        let mut child = self
            .child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(child.wait()?)
    }
}

/// Drains one output pipe line by line into the shared channel.
fn spawn_line_reader<R>(pipe: R, sink: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    if sink.send(text).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        path
    }

    fn collect_lines(process: &RunningProcess) -> Vec<String> {
        process.lines().iter().collect()
    }

    #[test]
    fn test_streams_output_lines() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "emit.sh", "echo one\necho two");

        let process = RunningProcess::spawn(script.to_str().unwrap(), None).unwrap();
        let lines = collect_lines(&process);
        let status = process.wait().unwrap();

        assert_eq!(lines, vec!["one", "two"]);
        assert!(status.success());
    }

    #[test]
    fn test_nonzero_exit() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "fail.sh", "echo before failure\nexit 3");

        let process = RunningProcess::spawn(script.to_str().unwrap(), None).unwrap();
        let lines = collect_lines(&process);
        let status = process.wait().unwrap();

        assert_eq!(lines, vec!["before failure"]);
        assert!(!status.success());
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_input_payload_reaches_stdin() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "reader.sh", "read value\necho \"got $value\"");

        let process = RunningProcess::spawn(script.to_str().unwrap(), Some("5\n")).unwrap();
        let lines = collect_lines(&process);
        let status = process.wait().unwrap();

        assert_eq!(lines, vec!["got 5"]);
        assert!(status.success());
    }

    #[test]
    fn test_stdin_closed_after_payload() {
        let temp_dir = tempdir().unwrap();
        // `cat` only ends when stdin is closed; a left-open pipe would hang
        let script = write_script(temp_dir.path(), "drain.sh", "cat");

        let process =
            RunningProcess::spawn(script.to_str().unwrap(), Some("a\nb\n")).unwrap();
        let lines = collect_lines(&process);
        let status = process.wait().unwrap();

        assert_eq!(lines, vec!["a", "b"]);
        assert!(status.success());
    }

    #[test]
    fn test_stderr_is_merged_into_stream() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "warn.sh", "echo oops >&2");

        let process = RunningProcess::spawn(script.to_str().unwrap(), None).unwrap();
        let lines = collect_lines(&process);
        process.wait().unwrap();

        assert_eq!(lines, vec!["oops"]);
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let result = RunningProcess::spawn("/nonexistent/module", None);
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[test]
    fn test_terminate_ends_long_running_process() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "hang.sh", "echo started\nexec sleep 30");

        let process = RunningProcess::spawn(script.to_str().unwrap(), None).unwrap();
        let first = process.lines().recv().unwrap();
        assert_eq!(first, "started");

        process.terminate();
        let status = process.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_terminate_after_exit_is_harmless() {
        let temp_dir = tempdir().unwrap();
        let script = write_script(temp_dir.path(), "quick.sh", "true");

        let process = RunningProcess::spawn(script.to_str().unwrap(), None).unwrap();
        let _ = collect_lines(&process);

        process.terminate();
        process.terminate();
        assert!(process.wait().is_ok());
    }
}
