//! Supervised fetch-and-transcode runs of the external tool.

use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use super::events::{JobEvent, ProgressUpdate, COMPLETED_MESSAGE};
use super::filename::artifact_stem;
use super::progress::{ProgressTracker, LAUNCH_PERCENT};
use crate::metadata::{MetadataResolver, UpstreamError};

const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub tool_path: PathBuf,
    pub output_dir: PathBuf,
    pub audio_format: String,
}

impl ConversionSettings {
    pub fn new(tool_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
            output_dir: output_dir.into(),
            audio_format: "mp3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub filename: String,
    pub title: String,
    #[serde(skip)]
    pub filepath: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Metadata(#[from] UpstreamError),

    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download process exited with {}", describe_exit(.code))]
    ProcessFailed {
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("output missing: {}", .0.display())]
    OutputMissing(PathBuf),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Reads one line, replacing invalid UTF-8.
async fn next_lossy_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

fn report(sink: Option<&UnboundedSender<JobEvent>>, update: ProgressUpdate) {
    if let Some(sink) = sink {
        // Best effort, the subscriber may be gone.
        let _ = sink.send(JobEvent::Progress(update));
    }
}

pub struct ConversionRunner {
    resolver: Arc<MetadataResolver>,
    settings: ConversionSettings,
}

impl ConversionRunner {
    pub fn new(resolver: Arc<MetadataResolver>, settings: ConversionSettings) -> Self {
        Self { resolver, settings }
    }

    /// Runs one conversion in the background.
    ///
    /// The receiver yields progress events and then exactly one `Finished`,
    /// unless the job task dies, in which case the channel just closes.
    pub fn spawn(self: &Arc<Self>, url: impl Into<String>) -> UnboundedReceiver<JobEvent> {
        let (tx, rx) = unbounded_channel();
        let runner = Arc::clone(self);
        let url = url.into();
        tokio::spawn(async move {
            let result = runner.run(&url, Some(&tx)).await;
            let _ = tx.send(JobEvent::Finished(result));
        });
        rx
    }

    /// Converts `url` into an audio file in the output directory.
    pub async fn run(
        &self,
        url: &str,
        sink: Option<&UnboundedSender<JobEvent>>,
    ) -> Result<ConversionResult, ConversionError> {
        report(sink, ProgressUpdate::new(10, "Fetching track info..."));
        let item = self.resolver.resolve_single(url).await?;
        let stem = artifact_stem(&item.full_title);
        let filename = format!("{}.{}", stem, self.settings.audio_format);
        let filepath = self.settings.output_dir.join(&filename);
        let template = self.settings.output_dir.join(format!("{}.%(ext)s", stem));

        report(
            sink,
            ProgressUpdate::new(LAUNCH_PERCENT, "Starting download..."),
        );
        info!("Converting {} into {}", url, filepath.display());

        let mut child = Command::new(&self.settings.tool_path)
            .arg("-x")
            .args(["--audio-format", self.settings.audio_format.as_str()])
            .args(["--audio-quality", "0"])
            .arg("--newline")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                tool: self.settings.tool_path.display().to_string(),
                source,
            })?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
                    debug!("[tool stderr] {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut tracker = ProgressTracker::default();
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
                debug!("[tool] {}", line);
                if let Some(update) = tracker.observe(&line) {
                    report(sink, update);
                }
            }
        }

        let status = child.wait().await?;
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            error!(
                "Conversion of {} failed with {:?}: {}",
                url,
                status.code(),
                stderr_tail
            );
            return Err(ConversionError::ProcessFailed {
                code: status.code(),
                stderr_tail,
            });
        }

        if !tokio::fs::try_exists(&filepath).await.unwrap_or(false) {
            error!("Tool exited cleanly but {} is missing", filepath.display());
            return Err(ConversionError::OutputMissing(filepath));
        }

        report(sink, ProgressUpdate::new(100, COMPLETED_MESSAGE));
        info!("Converted {} to {}", url, filename);
        Ok(ConversionResult {
            filename,
            title: item.full_title,
            filepath,
        })
    }
}
