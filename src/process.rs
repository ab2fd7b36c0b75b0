//! Child process execution with multiplexed output capture.
//!
//! Spawns an external command with both output streams piped, drains
//! them concurrently line by line (neither stream can starve the other),
//! strips terminal escape sequences, and returns the exit code together
//! with the ordered, stream-tagged line log. Stdout lines are logged at
//! debug level, stderr lines at warn level, so stderr stays visible even
//! on a successful run. Interrupted reads are retried by the runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Matches ANSI color and cursor-control escape sequences.
static ANSI_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("invalid ANSI escape regex")
});

/// Which stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "STDOUT"),
            Stream::Stderr => write!(f, "STDERR"),
        }
    }
}

/// Result of running a child process to completion.
#[derive(Debug)]
pub struct RunOutput {
    /// Exit code, or -1 if the child was terminated by a signal.
    pub code: i32,
    /// Every captured line in completion order, tagged with its stream.
    pub lines: Vec<(Stream, String)>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `argv` with an environment overlay on top of the inherited
/// environment. An empty overlay inherits everything unchanged.
///
/// Returns once the child has exited and both streams are fully
/// drained; a trailing partial line on either stream is flushed as a
/// final line.
pub async fn run(argv: &[String], env: &BTreeMap<String, String>) -> Result<RunOutput> {
    let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !env.is_empty() {
        cmd.envs(env);
    }

    let run_error = |source| Error::Process {
        program: program.clone(),
        source,
    };

    let mut child = cmd.spawn().map_err(run_error)?;
    let stdout = child.stdout.take().expect("child stdout was piped");
    let stderr = child.stderr.take().expect("child stderr was piped");

    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();

    let mut lines = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;

    // One task, two cooperatively polled readers: whichever stream has a
    // complete line ready is drained next.
    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout.next_line(), if stdout_open => match line.map_err(run_error)? {
                Some(line) => record(&mut lines, Stream::Stdout, line),
                None => stdout_open = false,
            },
            line = stderr.next_line(), if stderr_open => match line.map_err(run_error)? {
                Some(line) => record(&mut lines, Stream::Stderr, line),
                None => stderr_open = false,
            },
        }
    }

    let status = child.wait().await.map_err(run_error)?;

    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        lines,
    })
}

/// Strip escape sequences, log the line at its stream's severity, and
/// append it to the capture log.
fn record(lines: &mut Vec<(Stream, String)>, stream: Stream, raw: String) {
    let line = ANSI_ESCAPE_RE.replace_all(&raw, "").into_owned();
    match stream {
        Stream::Stdout => debug!("{}: {}", stream, line),
        Stream::Stderr => warn!("{}: {}", stream, line),
    }
    lines.push((stream, line));
}
