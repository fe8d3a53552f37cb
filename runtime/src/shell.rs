//! Subprocess execution for script actions.
//!
//! Commands run through `bash -c`. Stdout and stderr are drained on
//! background threads so a chatty child cannot deadlock on a full pipe
//! buffer, and a timeout kills only the subprocess it was set on.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

/// How many trailing stderr lines a [`ShellError::NonZero`] carries.
const STDERR_TAIL_LINES: usize = 8;

/// One shell invocation.
///
/// # Examples
///
/// ```no_run
/// use chore_runtime::ShellRequest;
///
/// let out = ShellRequest::new("echo hello").run().unwrap();
/// assert_eq!(out.stdout, "hello");
/// ```
#[derive(Debug, Clone)]
pub struct ShellRequest {
    /// The command line, passed verbatim to `bash -c`.
    pub command: String,
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Kill the subprocess after this long.
    pub timeout: Option<Duration>,
    /// Echo output lines as they arrive (they are captured either way).
    pub stream: bool,
    /// Treat a non-zero exit as an error. Opting out returns the output
    /// regardless of exit status.
    pub check: bool,
    /// Prefix for streamed lines, useful when several tasks stream at once.
    pub prefix: String,
}

/// Captured result of a completed subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// Verbatim stdout, trailing whitespace trimmed.
    pub stdout: String,
    /// Verbatim stderr, trailing whitespace trimmed.
    pub stderr: String,
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    /// Whether the process exited zero.
    pub success: bool,
}

/// Subprocess failure.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The command exited non-zero and the request did not opt out of
    /// checking.
    #[error("command exited with code {exit_code}: {stderr_tail}")]
    NonZero {
        exit_code: i32,
        /// Last few stderr lines, for error reports.
        stderr_tail: String,
    },
    /// The configured timeout elapsed; the subprocess was killed.
    #[error("command timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
    /// Spawning or waiting on the subprocess failed.
    #[error("shell i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
            stream: false,
            check: true,
            prefix: String::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn tolerant(mut self) -> Self {
        self.check = false;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Runs the command to completion.
    pub fn run(&self) -> Result<ShellOutput, ShellError> {
        debug!(command = %self.command, "running shell command");

        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let mut child = command.spawn()?;
        let stdout_thread = child.stdout.take().map(|pipe| {
            drain(pipe, self.stream, false, self.prefix.clone())
        });
        let stderr_thread = child.stderr.take().map(|pipe| {
            drain(pipe, self.stream, true, self.prefix.clone())
        });

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    debug!(command = %self.command, ?timeout, "killing timed-out command");
                    child.kill().ok();
                    child.wait()?;
                    // The pipes close once the child dies, so the drain
                    // threads finish on their own.
                    if let Some(t) = stdout_thread {
                        t.join().ok();
                    }
                    if let Some(t) = stderr_thread {
                        t.join().ok();
                    }
                    return Err(ShellError::TimedOut { timeout });
                }
            },
            None => child.wait()?,
        };

        let stdout = stdout_thread
            .and_then(|t| t.join().ok())
            .unwrap_or_default();
        let stderr = stderr_thread
            .and_then(|t| t.join().ok())
            .unwrap_or_default();

        let exit_code = status.code().unwrap_or(-1);
        let output = ShellOutput {
            stdout: stdout.trim_end().to_string(),
            stderr: stderr.trim_end().to_string(),
            exit_code,
            success: status.success(),
        };

        if !output.success && self.check {
            return Err(ShellError::NonZero {
                exit_code,
                stderr_tail: stderr_tail(&output.stderr),
            });
        }
        Ok(output)
    }
}

/// Reads a pipe to completion on its own thread, optionally echoing each
/// line as it arrives.
fn drain<R: Read + Send + 'static>(
    pipe: R,
    stream: bool,
    is_stderr: bool,
    prefix: String,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut captured = String::new();
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if stream {
                if prefix.is_empty() {
                    if is_stderr {
                        eprintln!("{line}");
                    } else {
                        println!("{line}");
                    }
                } else if is_stderr {
                    eprintln!("{prefix} | {line}");
                } else {
                    println!("{prefix} | {line}");
                }
            }
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
