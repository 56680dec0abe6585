// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Spawns external commands and exposes two completion abstractions: a
//! boolean-future yielding success/failure, and a string-array-future
//! yielding newline-delimited output.

use std::ffi::OsStr;
use std::process::Stdio as StdStdio;

use log::warn;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// How to wire up one of the child's standard streams.
pub enum Stdio {
    /// Inherit the parent's stream.
    Inherit,
    /// Attach `/dev/null`-equivalent.
    Null,
    /// Attach an already-open file (e.g. the closure bundle being imported,
    /// or the temp file an export writes to).
    File(std::fs::File),
}

impl From<Stdio> for StdStdio {
    fn from(value: Stdio) -> Self {
        match value {
            Stdio::Inherit => StdStdio::inherit(),
            Stdio::Null => StdStdio::null(),
            Stdio::File(f) => StdStdio::from(f),
        }
    }
}

/// A child process failed to start, or terminated abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait on {program:?}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program:?} exited with non-zero status ({status})")]
    NonZeroExit { program: String, status: String },
    #[error("{program:?} was terminated by a signal")]
    Signalled { program: String },
    #[error("failed to read stdout of {program:?}: {source}")]
    ReadStdout {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program:?} was cancelled")]
    Cancelled { program: String },
}

fn build_command(argv: &[impl AsRef<OsStr>]) -> Option<Command> {
    let (program, args) = argv.split_first()?;
    let mut cmd = Command::new(program);
    cmd.args(args.iter());
    Some(cmd)
}

fn program_name(argv: &[impl AsRef<OsStr>]) -> String {
    argv.first()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Handle to a spawned child whose eventual boolean outcome can be awaited.
pub struct BoolFuture {
    program: String,
    child: tokio::process::Child,
}

impl BoolFuture {
    /// Spawn `argv`, wiring `stdin`/`stdout`/`stderr` as given. `stderr`
    /// defaults to the parent's stream if `None`.
    pub fn spawn(
        argv: &[impl AsRef<OsStr>],
        stdin: Stdio,
        stdout: Stdio,
        stderr: Option<Stdio>,
    ) -> Result<Self, ProcessError> {
        let program = program_name(argv);
        let mut cmd = build_command(argv).ok_or_else(|| ProcessError::Spawn {
            program: program.clone(),
            source: std::io::Error::other("empty argument vector"),
        })?;
        cmd.stdin(StdStdio::from(stdin))
            .stdout(StdStdio::from(stdout))
            .stderr(stderr.map(StdStdio::from).unwrap_or_else(StdStdio::inherit));

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        Ok(Self { program, child })
    }

    /// Await the child's exit, yielding `Ok(())` iff it exited with status
    /// zero.
    pub async fn wait(mut self) -> Result<(), ProcessError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| ProcessError::Wait {
                program: self.program.clone(),
                source,
            })?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ProcessError::NonZeroExit {
                program: self.program,
                status: code.to_string(),
            }),
            None => Err(ProcessError::Signalled {
                program: self.program,
            }),
        }
    }

    /// Await the child's exit as `wait` does, but race it against `cancel`.
    /// If `cancel` fires first, the child is sent `SIGTERM`, reaped, and
    /// `ProcessError::Cancelled` is returned; no new work is started after
    /// cancellation has been observed.
    pub async fn wait_cancellable(mut self, cancel: &CancellationToken) -> Result<(), ProcessError> {
        let status = tokio::select! {
            status = self.child.wait() => status,
            _ = cancel.cancelled() => {
                warn!(
                    "cancelling {:?} (pid {:?}): sending SIGTERM",
                    self.program,
                    self.id()
                );
                let _ = self.terminate();
                let _ = self.child.wait().await;
                return Err(ProcessError::Cancelled {
                    program: self.program,
                });
            }
        };

        let status = status.map_err(|source| ProcessError::Wait {
            program: self.program.clone(),
            source,
        })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ProcessError::NonZeroExit {
                program: self.program,
                status: code.to_string(),
            }),
            None => Err(ProcessError::Signalled {
                program: self.program,
            }),
        }
    }

    /// The OS process id, if the child hasn't already been waited on.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send `SIGTERM` (or the platform's nearest equivalent) to the child,
    /// used for cancellation.
    pub fn terminate(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                let pid = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            Ok(())
        }
    }
}

/// Handle to a spawned child whose stdout is captured and eventually split
/// into a list of strings.
pub struct StrvFuture {
    program: String,
    child: tokio::process::Child,
    delimiter: char,
}

impl StrvFuture {
    /// Spawn `argv` with stdout piped back to the parent and split on
    /// `delimiter` once the child exits.
    pub fn spawn(
        argv: &[impl AsRef<OsStr>],
        stdin: Stdio,
        stderr: Option<Stdio>,
        delimiter: char,
    ) -> Result<Self, ProcessError> {
        let program = program_name(argv);
        let mut cmd = build_command(argv).ok_or_else(|| ProcessError::Spawn {
            program: program.clone(),
            source: std::io::Error::other("empty argument vector"),
        })?;
        cmd.stdin(StdStdio::from(stdin))
            .stdout(StdStdio::piped())
            .stderr(stderr.map(StdStdio::from).unwrap_or_else(StdStdio::inherit));

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        Ok(Self {
            program,
            child,
            delimiter,
        })
    }

    /// Await the child's exit and return its stdout split on `delimiter`,
    /// with a single trailing empty token discarded.
    pub async fn wait(mut self) -> Result<Vec<String>, ProcessError> {
        let mut stdout = self.child.stdout.take();
        let mut buf = String::new();
        if let Some(stdout) = stdout.as_mut() {
            stdout
                .read_to_string(&mut buf)
                .await
                .map_err(|source| ProcessError::ReadStdout {
                    program: self.program.clone(),
                    source,
                })?;
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|source| ProcessError::Wait {
                program: self.program.clone(),
                source,
            })?;

        match status.code() {
            Some(0) => Ok(split_discard_trailing_empty(&buf, self.delimiter)),
            Some(code) => Err(ProcessError::NonZeroExit {
                program: self.program,
                status: code.to_string(),
            }),
            None => Err(ProcessError::Signalled {
                program: self.program,
            }),
        }
    }

    /// Await the child's exit as `wait` does, but race the read-and-wait
    /// pipeline against `cancel`. If `cancel` fires first, the child is
    /// sent `SIGTERM`, reaped, and `ProcessError::Cancelled` is returned;
    /// any partial stdout captured so far is discarded.
    pub async fn wait_cancellable(
        mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProcessError> {
        let mut stdout = self.child.stdout.take();
        let mut buf = String::new();

        let read_and_wait = async {
            if let Some(stdout) = stdout.as_mut() {
                stdout.read_to_string(&mut buf).await?;
            }
            self.child.wait().await
        };

        let status = tokio::select! {
            status = read_and_wait => status,
            _ = cancel.cancelled() => {
                warn!(
                    "cancelling {:?} (pid {:?}): sending SIGTERM",
                    self.program,
                    self.id()
                );
                let _ = self.terminate();
                let _ = self.child.wait().await;
                return Err(ProcessError::Cancelled {
                    program: self.program,
                });
            }
        };

        let status = status.map_err(|source| ProcessError::Wait {
            program: self.program.clone(),
            source,
        })?;

        match status.code() {
            Some(0) => Ok(split_discard_trailing_empty(&buf, self.delimiter)),
            Some(code) => Err(ProcessError::NonZeroExit {
                program: self.program,
                status: code.to_string(),
            }),
            None => Err(ProcessError::Signalled {
                program: self.program,
            }),
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn terminate(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                let pid = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            Ok(())
        }
    }
}

fn split_discard_trailing_empty(s: &str, delimiter: char) -> Vec<String> {
    let mut parts: Vec<String> = s.split(delimiter).map(str::to_string).collect();
    if parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts
}
