//! Serving converted artifacts, deleted shortly after a complete transfer.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::Stream;
use std::path::{Path as FsPath, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::server::json_error;
use super::state::ServerState;

const CHUNK_SIZE: usize = 4096 * 16;

/// Accepts only a bare file name, no separators or parent references.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && FsPath::new(name).file_name().map(|n| n == name).unwrap_or(false)
}

fn schedule_delete(path: PathBuf, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!("Removed transferred file {}", path.display()),
            Err(err) => debug!("Could not remove {}: {}", path.display(), err),
        }
    });
}

/// Passes chunks through and schedules deletion once the inner stream ends.
struct DeleteWhenDone<S> {
    inner: S,
    path: Option<PathBuf>,
    delay: Duration,
}

impl<S> Stream for DeleteWhenDone<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(None) = polled {
            if let Some(path) = self.path.take() {
                schedule_delete(path, self.delay);
            }
        }
        polled
    }
}

pub async fn fetch_artifact(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
) -> Response {
    if !is_plain_filename(&filename) {
        warn!("Rejected artifact name {:?}", filename);
        return json_error(StatusCode::NOT_FOUND, "File not found");
    }
    let path = state.downloads_dir.join(&filename);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(_) => return json_error(StatusCode::NOT_FOUND, "File not found"),
    };
    debug!("Serving {}", path.display());

    let stream = DeleteWhenDone {
        inner: ReaderStream::with_capacity(file, CHUNK_SIZE),
        path: Some(path),
        delay: state.config.post_transfer_delete,
    };

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[test]
    fn only_plain_names_are_served() {
        assert!(is_plain_filename("Alice_-_Song.mp3"));
        assert!(!is_plain_filename("../secret.mp3"));
        assert!(!is_plain_filename("nested/file.mp3"));
        assert!(!is_plain_filename("..\\file.mp3"));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename(""));
    }

    #[tokio::test]
    async fn file_is_deleted_after_stream_ends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"audio bytes").unwrap();

        let file = File::open(&path).await.unwrap();
        let mut stream = DeleteWhenDone {
            inner: ReaderStream::new(file),
            path: Some(path.clone()),
            delay: Duration::from_millis(10),
        };
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, b"audio bytes");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
    }
}
