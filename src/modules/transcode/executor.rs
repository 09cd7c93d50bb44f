use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::command::{convert_args, thumbnail_args};
use super::job::TranscodeOutcome;

/// Only the tail of stderr is kept; ffmpeg prints progress for the whole encode.
const DIAGNOSTIC_LIMIT: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("input file {0} does not exist or is not a regular file")]
    MissingInput(PathBuf),

    #[error("output file {0} already exists, not overwriting")]
    OutputExists(PathBuf),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for transcoder: {0}")]
    Wait(#[source] io::Error),

    #[error("transcoder exited with {}: {diagnostic}", exit_label(.code))]
    Exit {
        code: Option<i32>,
        diagnostic: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl TranscodeError {
    /// Text reported alongside a failed outcome: the captured stderr for exit failures.
    pub fn diagnostic_text(&self) -> String {
        match self {
            TranscodeError::Exit { diagnostic, .. } if !diagnostic.is_empty() => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

/// Runs the external transcoder binary.
#[derive(Clone, Debug)]
pub struct TranscodeExecutor {
    binary: PathBuf,
}

impl TranscodeExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Never overwrites: an existing `output` fails the conversion without spawning.
    pub async fn convert(&self, input: &Path, arguments: &[String], output: &Path) -> TranscodeOutcome {
        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            let error = TranscodeError::OutputExists(output.to_path_buf());
            warn!("{}", error);
            return TranscodeOutcome::failure(error.diagnostic_text());
        }
        self.invoke(input, convert_args(input, arguments, output), output).await
    }

    pub async fn extract_thumbnail(&self, input: &Path, thumbnail: &Path) -> TranscodeOutcome {
        self.invoke(input, thumbnail_args(input, thumbnail), thumbnail).await
    }

    async fn invoke(&self, input: &Path, args: Vec<OsString>, target: &Path) -> TranscodeOutcome {
        let result = match tokio::fs::metadata(input).await {
            Ok(meta) if meta.is_file() => self.run(args).await,
            _ => Err(TranscodeError::MissingInput(input.to_path_buf())),
        };

        match result {
            Ok(()) => TranscodeOutcome::success(target.to_path_buf()),
            Err(e) => TranscodeOutcome::failure(e.diagnostic_text()),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), TranscodeError> {
        debug!("Spawning {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        // Drain stderr on its own task so a full pipe can never stall the child.
        let drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_tail(stderr, DIAGNOSTIC_LIMIT)));

        let status = child.wait().await.map_err(TranscodeError::Wait)?;

        let diagnostic = match drain {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            debug!("Transcoder finished: {}", diagnostic.lines().last().unwrap_or_default());
            return Ok(());
        }

        Err(TranscodeError::Exit {
            code: status.code(),
            diagnostic: diagnostic.trim().to_string(),
        })
    }
}

/// Reads `reader` to the end, keeping at most the last `limit` bytes.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > limit * 2 {
                    kept.drain(..kept.len() - limit);
                }
            }
        }
    }

    if kept.len() > limit {
        kept.drain(..kept.len() - limit);
    }

    String::from_utf8_lossy(&kept).into_owned()
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for ffmpeg.
    pub(crate) fn fake_ffmpeg(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn input_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("a.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let dir = TempDir::new().unwrap();
        let executor = TranscodeExecutor::new(fake_ffmpeg(&dir, "echo 'frame=1' >&2\nexit 0"));
        let output = dir.path().join("out.mp4");

        let outcome = executor
            .convert(&input_file(&dir), &["-vf".to_string(), "scale=640:-2".to_string()], &output)
            .await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.output_path, Some(output));
        assert_eq!(outcome.diagnostic_text, None);
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let executor = TranscodeExecutor::new(fake_ffmpeg(&dir, "echo 'invalid codec' >&2\nexit 1"));

        let outcome = executor
            .convert(&input_file(&dir), &[], &dir.path().join("out.mp4"))
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.output_path, None);
        assert_eq!(outcome.diagnostic_text.as_deref(), Some("invalid codec"));
    }

    #[tokio::test]
    async fn passes_argv_in_contract_order() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("argv.log");
        let executor = TranscodeExecutor::new(fake_ffmpeg(
            &dir,
            &format!("printf '%s\\n' \"$@\" > {}\nexit 0", log.display()),
        ));
        let input = input_file(&dir);
        let thumb = dir.path().join("t.jpg");

        executor.extract_thumbnail(&input, &thumb).await;

        let argv = std::fs::read_to_string(&log).unwrap();
        let argv: Vec<&str> = argv.lines().collect();
        assert_eq!(
            argv,
            vec!["-i", input.to_str().unwrap(), "-ss", "1", "-vframes", "1", thumb.to_str().unwrap()]
        );
    }

    #[tokio::test]
    async fn large_stderr_does_not_deadlock() {
        let dir = TempDir::new().unwrap();
        // Far more than a pipe buffer; waiting for exit before reading would hang here.
        let executor = TranscodeExecutor::new(fake_ffmpeg(
            &dir,
            "i=0\nwhile [ $i -lt 20000 ]; do echo \"frame=$i fps=30 progress line padding padding\" >&2; i=$((i+1)); done\necho 'final error' >&2\nexit 3",
        ));

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            executor.convert(&input_file(&dir), &[], &dir.path().join("out.mp4")),
        )
        .await
        .expect("transcoder call stalled");

        assert!(!outcome.succeeded);
        let diagnostic = outcome.diagnostic_text.unwrap();
        assert!(diagnostic.ends_with("final error"));
        assert!(diagnostic.len() <= DIAGNOSTIC_LIMIT);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let executor = TranscodeExecutor::new(dir.path().join("no-such-ffmpeg"));

        let outcome = executor
            .convert(&input_file(&dir), &[], &dir.path().join("out.mp4"))
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.diagnostic_text.unwrap().starts_with("failed to spawn"));
    }

    #[tokio::test]
    async fn missing_input_never_spawns() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("spawned");
        let executor = TranscodeExecutor::new(fake_ffmpeg(&dir, &format!("touch {}", marker.display())));

        let outcome = executor
            .convert(&dir.path().join("absent.mp4"), &[], &dir.path().join("out.mp4"))
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.diagnostic_text.unwrap().contains("does not exist"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn existing_output_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("spawned");
        let executor = TranscodeExecutor::new(fake_ffmpeg(&dir, &format!("touch {}", marker.display())));
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"earlier run").unwrap();

        let outcome = executor.convert(&input_file(&dir), &[], &output).await;

        assert!(!outcome.succeeded);
        assert!(outcome.diagnostic_text.unwrap().contains("already exists"));
        assert!(!marker.exists());
        assert_eq!(std::fs::read(&output).unwrap(), b"earlier run");
    }

    #[tokio::test]
    async fn read_tail_keeps_the_end() {
        let data = b"0123456789".repeat(10);
        let tail = read_tail(&data[..], 15).await;
        assert_eq!(tail, "567890123456789");
    }
}
