//! External parser process backend.
//!
//! A full parser for a language can run as a separate process. The request
//! is a file path on the command line (`<parser> [args..] --file <path>`),
//! the response is one JSON document on standard output:
//!
//! ```json
//! {"functions": [{"name": "add", "startLine": 1, "endLine": 3,
//!                 "signature": "int add(int a, int b)", "type": "function"}],
//!  "testCalls": ["add"], "testMentions": ["adds numbers"]}
//! ```
//!
//! or `{"error": "..."}`. Anything else, a nonzero exit status, or a run
//! longer than the timeout is a failure scoped to that one file.
//!
//! On unix the parser runs in its own process group. The whole group is
//! killed when it times out, when the pass is cancelled, and when the guard
//! holding it is dropped, so launcher scripts cannot leave workers behind.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use super::{CancellationFlag, FunctionDefinition, TestSignals};
use crate::error::{AnalysisError, Result};

/// Timeout applied when none is configured.
pub const DEFAULT_PARSER_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for a pipe to reach end of file once the process group
/// is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Successful parser response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserOutput {
    pub functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub test_calls: Vec<String>,
    #[serde(default)]
    pub test_mentions: Vec<String>,
}

impl ParserOutput {
    /// Function definitions with a valid line span.
    pub fn into_functions(self, path: &Path) -> Vec<FunctionDefinition> {
        self.functions
            .into_iter()
            .filter(|f| {
                let valid = f.has_valid_span();
                if !valid {
                    debug!(
                        "dropping {} from {}: invalid span {}..{}",
                        f.name,
                        path.display(),
                        f.start_line,
                        f.end_line
                    );
                }
                valid
            })
            .collect()
    }

    /// Test signals exactly as reported by the parser.
    pub fn into_signals(self) -> TestSignals {
        TestSignals {
            calls: self.test_calls.into_iter().collect(),
            mentions: self.test_mentions.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParserResponse {
    Failure { error: String },
    Success(ParserOutput),
}

/// Handle to an external parser executable.
#[derive(Debug, Clone)]
pub struct ExternalParser {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    cancel: Option<CancellationFlag>,
}

impl ExternalParser {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_PARSER_TIMEOUT,
            cancel: None,
        }
    }

    /// Arguments placed before `--file <path>`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-file timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Kill in-flight invocations once `flag` is set.
    pub fn cancel_on(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run the parser on one file and decode its response.
    pub fn parse_file(&self, path: &Path) -> Result<ParserOutput> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(AnalysisError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let target = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        debug!("running {} on {}", self.program.display(), target.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--file")
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| AnalysisError::ExternalProcess {
                path: path.to_path_buf(),
                message: format!("cannot start {}: {}", self.program.display(), e),
                stderr: String::new(),
            })?;

        // Drain both pipes while polling for exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let mut guard = ChildGuard::new(child);
        let outcome = guard.wait(self.timeout, self.cancel.as_ref());
        // Kills whatever is left of the group, so the pipes reach EOF.
        drop(guard);

        let stdout = collect(stdout);
        let stderr = String::from_utf8_lossy(&collect(stderr)).into_owned();

        match outcome {
            Err(e) => Err(AnalysisError::ExternalProcess {
                path: path.to_path_buf(),
                message: format!("waiting for parser: {}", e),
                stderr,
            }),
            Ok(WaitOutcome::TimedOut) => Err(AnalysisError::Timeout {
                path: path.to_path_buf(),
                after: self.timeout,
                stderr,
            }),
            Ok(WaitOutcome::Cancelled) => Err(AnalysisError::Cancelled {
                path: path.to_path_buf(),
            }),
            Ok(WaitOutcome::Exited(status)) if !status.success() => {
                Err(AnalysisError::ExternalProcess {
                    path: path.to_path_buf(),
                    message: format!("parser exited with {}", status),
                    stderr,
                })
            }
            Ok(WaitOutcome::Exited(_)) => decode_response(path, &stdout, stderr),
        }
    }
}

fn decode_response(path: &Path, stdout: &[u8], stderr: String) -> Result<ParserOutput> {
    match serde_json::from_slice::<ParserResponse>(stdout) {
        Ok(ParserResponse::Success(output)) => Ok(output),
        Ok(ParserResponse::Failure { error }) => Err(AnalysisError::ExternalProcess {
            path: path.to_path_buf(),
            message: error,
            stderr,
        }),
        Err(e) => Err(AnalysisError::ExternalProcess {
            path: path.to_path_buf(),
            message: format!("invalid parser output: {}", e),
            stderr,
        }),
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Owns a running child and its process group.
///
/// The child is killed unless it was reaped normally. The group is always
/// killed on drop, which takes down any processes the child left running.
struct ChildGuard {
    child: Option<Child>,
    group: Option<u32>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let group = cfg!(unix).then(|| child.id());
        Self {
            child: Some(child),
            group,
        }
    }

    fn wait(
        &mut self,
        timeout: Duration,
        cancel: Option<&CancellationFlag>,
    ) -> io::Result<WaitOutcome> {
        let start = Instant::now();
        loop {
            let status = match self.child.as_mut() {
                Some(child) => child.try_wait()?,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "process already reaped",
                    ))
                }
            };

            if let Some(status) = status {
                self.child = None;
                return Ok(WaitOutcome::Exited(status));
            }
            if cancel.is_some_and(|c| c.is_cancelled()) {
                self.kill();
                return Ok(WaitOutcome::Cancelled);
            }
            if start.elapsed() >= timeout {
                self.kill();
                return Ok(WaitOutcome::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        if let Some(group) = self.group.take() {
            kill_group(group);
        }
        if let Some(mut child) = self.child.take() {
            child.kill().ok();
            child.wait().ok();
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(group: u32) {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return;
    };
    // A negative pid addresses every process in the group. ESRCH (group
    // already empty) is expected and ignored.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).ok();
        tx.send(buf).ok();
    });
    rx
}

/// Pipe contents, or nothing if a process outside the group still holds
/// the pipe open after the grace period.
fn collect(pipe: Option<Receiver<Vec<u8>>>) -> Vec<u8> {
    pipe.and_then(|rx| rx.recv_timeout(DRAIN_GRACE).ok())
        .unwrap_or_default()
}
