//! External-command backend.
//!
//! The request is written as JSON to the command's stdin from a separate
//! thread while stdout is drained; the first structured frame found on
//! stdout is the answer. A command may stop reading stdin early, so a
//! broken pipe is not an error on its own. A non-zero exit status is an
//! invocation failure.

use super::{parse, AnalysisRequest, Oracle};
use anyhow::{bail, Context};
use serde_json::Value as Json;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

pub struct CommandOracle {
    command: String,
    cwd: PathBuf,
}

impl CommandOracle {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        CommandOracle {
            command: command.into(),
            cwd: cwd.into(),
        }
    }
}

impl Oracle for CommandOracle {
    fn identity(&self) -> String {
        format!("command:{}", self.command)
    }

    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start oracle command `{}`", self.command))?;
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(&payload) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let out = child
            .wait_with_output()
            .context("failed to wait for oracle command")?;
        let written = match writer {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("oracle command stdin writer panicked"))?,
            None => Ok(()),
        };
        if !out.status.success() {
            bail!("oracle command `{}` exited with {}", self.command, out.status);
        }
        if let Err(e) = written {
            tracing::warn!(command = %self.command, "failed to write request to oracle command: {e}");
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(parse::first_frame(&stdout))
    }
}
