use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ImportError, Result};

/// Exit status of a client run. `code` is `None` when the process was killed
/// by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    code: Option<i32>,
}

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus { code: Some(0) };
    pub const FAILURE: ExitStatus = ExitStatus { code: Some(1) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Runs an external program with `stdin` as its standard input and waits for
/// it to exit. Output streams are left to the implementation.
#[async_trait]
pub trait CommandSpawner: Send + Sync {
    async fn spawn(&self, program: &Path, args: &[String], stdin: &[u8]) -> Result<ExitStatus>;
}

/// Spawns real processes with Tokio, inheriting stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[async_trait]
impl CommandSpawner for TokioSpawner {
    async fn spawn(&self, program: &Path, args: &[String], stdin: &[u8]) -> Result<ExitStatus> {
        let program_buf: PathBuf = program.to_path_buf();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ImportError::Spawn {
                program: program_buf.clone(),
                source,
            })?;

        let mut input = child.stdin.take().ok_or_else(|| ImportError::Feed {
            program: program_buf.clone(),
            source: std::io::Error::new(ErrorKind::BrokenPipe, "stdin was not captured"),
        })?;

        // Feed and wait together so a client that stops reading early cannot
        // block the write forever. Dropping `input` closes the pipe.
        let feed = async move {
            let res = input.write_all(stdin).await;
            drop(input);
            res
        };
        let (fed, waited) = futures::join!(feed, child.wait());

        match fed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(program = %program_buf.display(), "client closed stdin before reading all input");
            }
            Err(source) => {
                return Err(ImportError::Feed {
                    program: program_buf,
                    source,
                });
            }
        }

        let status = waited.map_err(|source| ImportError::Wait {
            program: program_buf,
            source,
        })?;
        Ok(status.into())
    }
}
