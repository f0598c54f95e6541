use std::path::Path;
use std::sync::{Mutex, PoisonError};

use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use reqwest::header::ETAG;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use upkeep_source::{DownloadOutcome, ProgressFn, SourceError};

use crate::probe::{content_length, header_text};

/// Bytes written between two progress reports.
pub const DOWNLOAD_BLOCK_SIZE: usize = 8 * 1024;

const DOWNLOAD_PREFIX: &str = "download-";
const DOWNLOAD_SUFFIX: &str = ".appimage";

/// Owner of the in-flight transfer handle of one source.
///
/// At most one transfer is tracked; the handle is released when the transfer
/// finishes, fails, or is cancelled.
#[derive(Debug, Default)]
pub struct Transfer {
    active: Mutex<Option<CancellationToken>>,
}

struct ActiveTransfer<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Transfer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Abort the active transfer. Does nothing when idle.
    pub fn cancel(&self) {
        let token = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            info!("Cancelling active download");
            token.cancel();
        }
    }

    fn begin(&self) -> ActiveTransfer<'_> {
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        ActiveTransfer {
            slot: &self.active,
            token,
        }
    }

    /// Stream `url` into a fresh file inside `download_dir`.
    ///
    /// # Errors
    /// Returns [`SourceError::Cancelled`] if [`cancel`](Self::cancel) is
    /// called mid-transfer, [`SourceError::DownloadInterrupted`] if fewer
    /// bytes arrive than advertised, and network or IO errors otherwise. No
    /// file is left behind on error.
    pub async fn download(
        &self,
        client: &reqwest::Client,
        url: &str,
        download_dir: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<DownloadOutcome, SourceError> {
        info!("Downloading file from {url}");
        let active = self.begin();
        let token = active.token.clone();

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(SourceError::Cancelled),
            response = client.get(url).send() => response
                .map_err(|error| SourceError::network_request_from("download", error))?,
        };

        if !response.status().is_success() {
            return Err(SourceError::network_status("download", response.status()));
        }

        let fingerprint = header_text(response.headers(), ETAG);
        let total = content_length(response.headers());

        tokio::fs::create_dir_all(download_dir).await?;
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .suffix(DOWNLOAD_SUFFIX)
            .tempfile_in(download_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let written =
            write_stream(response.bytes_stream(), &mut file, total, &token, on_progress).await?;
        file.flush().await?;
        drop(file);

        check_complete(written, total)?;

        let path = temp_path.keep().map_err(|error| SourceError::from(error.error))?;
        info!("Download complete: {written} bytes into {}", path.display());
        drop(active);

        Ok(DownloadOutcome { path, fingerprint })
    }
}

/// Copy `stream` into `writer` in [`DOWNLOAD_BLOCK_SIZE`] blocks, reporting
/// progress after each block when `total` is known.
pub(crate) async fn write_stream<S, B, E, W>(
    stream: S,
    writer: &mut W,
    total: Option<u64>,
    token: &CancellationToken,
    on_progress: ProgressFn<'_>,
) -> Result<u64, SourceError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let total = total.filter(|size| *size > 0);
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(SourceError::Cancelled),
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(error)) => {
                warn!("Download stream failed after {written} bytes: {error}");
                return Err(match total {
                    Some(expected) if written < expected => SourceError::DownloadInterrupted {
                        expected,
                        actual: written,
                    },
                    _ => SourceError::network_request_from("download stream", error),
                });
            }
            None => break,
        };

        for block in chunk.as_ref().chunks(DOWNLOAD_BLOCK_SIZE) {
            writer.write_all(block).await?;
            written += block.len() as u64;

            if token.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            if let Some(total) = total {
                on_progress(progress_fraction(written, total));
            }
        }
    }

    Ok(written)
}

fn check_complete(written: u64, total: Option<u64>) -> Result<(), SourceError> {
    match total {
        Some(expected) if written < expected => {
            warn!("Download ended early: {written} of {expected} bytes");
            Err(SourceError::DownloadInterrupted {
                expected,
                actual: written,
            })
        }
        _ => Ok(()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn progress_fraction(written: u64, total: u64) -> f64 {
    (written as f64 / total as f64).min(1.0)
}

/// Remove the shared download directory and everything in it.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_download_dir(download_dir: &Path) -> Result<(), SourceError> {
    if download_dir.exists() {
        debug!("Removing download directory {}", download_dir.display());
        std::fs::remove_dir_all(download_dir)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn downloaded_files(download_dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(download_dir)
        .map(|entries| entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    use futures_util::stream;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn chunks(sizes: &[usize]) -> Vec<Result<Vec<u8>, String>> {
        sizes.iter().map(|size| Ok(vec![7_u8; *size])).collect()
    }

    #[tokio::test]
    async fn write_stream_reports_monotonic_fractions() {
        let reported = StdMutex::new(Vec::new());
        let mut sink = Vec::new();
        let token = CancellationToken::new();

        let written = write_stream(
            stream::iter(chunks(&[500, 300, 200])),
            &mut sink,
            Some(1000),
            &token,
            &|fraction: f64| reported.lock().expect("lock").push(fraction),
        )
        .await
        .expect("stream should copy");

        let reported = reported.into_inner().expect("lock");
        assert_eq!(written, 1000);
        assert_eq!(sink.len(), 1000);
        assert_eq!(reported.last().copied(), Some(1.0));
        assert!(reported.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(reported.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[tokio::test]
    async fn write_stream_splits_large_chunks_into_blocks() {
        let calls = StdMutex::new(0_usize);
        let mut sink = Vec::new();

        write_stream(
            stream::iter(chunks(&[DOWNLOAD_BLOCK_SIZE * 2 + 1])),
            &mut sink,
            Some((DOWNLOAD_BLOCK_SIZE * 2 + 1) as u64),
            &CancellationToken::new(),
            &|_: f64| *calls.lock().expect("lock") += 1,
        )
        .await
        .expect("stream should copy");

        assert_eq!(*calls.lock().expect("lock"), 3);
    }

    #[tokio::test]
    async fn write_stream_skips_progress_without_total() {
        let calls = StdMutex::new(0_usize);
        let mut sink = Vec::new();

        for total in [None, Some(0)] {
            write_stream(
                stream::iter(chunks(&[10, 10])),
                &mut sink,
                total,
                &CancellationToken::new(),
                &|_: f64| *calls.lock().expect("lock") += 1,
            )
            .await
            .expect("stream should copy");
        }

        assert_eq!(*calls.lock().expect("lock"), 0);
    }

    #[tokio::test]
    async fn short_stream_is_interrupted() {
        let mut sink = Vec::new();
        let token = CancellationToken::new();

        let written = write_stream(
            stream::iter(chunks(&[900])),
            &mut sink,
            Some(1000),
            &token,
            &|_: f64| {},
        )
        .await
        .expect("stream itself ends cleanly");

        assert_eq!(
            check_complete(written, Some(1000)),
            Err(SourceError::DownloadInterrupted {
                expected: 1000,
                actual: 900
            })
        );
        assert_eq!(check_complete(written, None), Ok(()));
    }

    #[tokio::test]
    async fn stream_error_before_total_is_interrupted() {
        let mut sink = Vec::new();
        let items: Vec<Result<Vec<u8>, String>> =
            vec![Ok(vec![1_u8; 900]), Err("connection reset".to_string())];

        let result = write_stream(
            stream::iter(items),
            &mut sink,
            Some(1000),
            &CancellationToken::new(),
            &|_: f64| {},
        )
        .await;

        assert_eq!(
            result,
            Err(SourceError::DownloadInterrupted {
                expected: 1000,
                actual: 900
            })
        );
    }

    #[tokio::test]
    async fn cancellation_stops_stream_without_more_progress() {
        let token = CancellationToken::new();
        let calls = Arc::new(StdMutex::new(0_usize));
        let first: Vec<Result<Vec<u8>, String>> = vec![Ok(vec![0_u8; 100])];
        let endless = stream::iter(first).chain(stream::pending());
        let mut sink = Vec::new();

        let cancel_token = token.clone();
        let progress_calls = Arc::clone(&calls);
        let on_progress = move |_: f64| {
            *progress_calls.lock().expect("lock") += 1;
            cancel_token.cancel();
        };

        let result = write_stream(endless, &mut sink, Some(1000), &token, &on_progress).await;

        assert_eq!(result, Err(SourceError::Cancelled));
        assert_eq!(*calls.lock().expect("lock"), 1);
    }

    #[test]
    fn cancel_is_idempotent_when_idle() {
        let transfer = Transfer::new();

        transfer.cancel();
        transfer.cancel();

        assert!(!transfer.is_active());
    }

    #[tokio::test]
    async fn download_writes_file_and_returns_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.AppImage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"abc123\"")
                    .set_body_bytes(vec![9_u8; 20_000]),
            )
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let download_dir = dir.path().join("downloads");
        let reported = StdMutex::new(Vec::new());
        let transfer = Transfer::new();

        let outcome = transfer
            .download(
                &reqwest::Client::new(),
                &format!("{}/app.AppImage", server.uri()),
                &download_dir,
                &|fraction: f64| reported.lock().expect("lock").push(fraction),
            )
            .await
            .expect("download should succeed");

        assert_eq!(outcome.fingerprint, "\"abc123\"");
        assert!(outcome.path.starts_with(&download_dir));
        assert_eq!(
            std::fs::metadata(&outcome.path).expect("file exists").len(),
            20_000
        );
        assert_eq!(reported.lock().expect("lock").last().copied(), Some(1.0));
        assert!(!transfer.is_active());
    }

    #[tokio::test]
    async fn failed_status_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let transfer = Transfer::new();

        let result = transfer
            .download(
                &reqwest::Client::new(),
                &format!("{}/missing", server.uri()),
                dir.path(),
                &|_: f64| {},
            )
            .await;

        assert!(matches!(result, Err(SourceError::NetworkFailure { .. })));
        assert!(downloaded_files(dir.path()).is_empty());
        assert!(!transfer.is_active());
    }

    #[tokio::test]
    async fn truncated_body_is_interrupted_and_leaves_no_file() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("client should connect");
            let mut request = [0_u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n")
                .await
                .expect("headers should be written");
            socket
                .write_all(&[3_u8; 900])
                .await
                .expect("body should be written");
            socket.shutdown().await.expect("socket should shut down");
        });
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let reported = StdMutex::new(Vec::new());
        let transfer = Transfer::new();

        let result = transfer
            .download(
                &reqwest::Client::new(),
                &format!("http://{addr}/short.AppImage"),
                dir.path(),
                &|fraction: f64| reported.lock().expect("lock").push(fraction),
            )
            .await;
        server.await.expect("server task should finish");

        assert_eq!(
            result,
            Err(SourceError::DownloadInterrupted {
                expected: 1000,
                actual: 900
            })
        );
        assert!(downloaded_files(dir.path()).is_empty());
        assert!(
            reported
                .into_inner()
                .expect("lock")
                .iter()
                .all(|fraction| *fraction < 1.0)
        );
        assert!(!transfer.is_active());
    }

    #[tokio::test]
    async fn cancelling_a_live_download_removes_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1_u8; 64])
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let transfer = Arc::new(Transfer::new());
        let url = format!("{}/slow.AppImage", server.uri());

        let canceller = Arc::clone(&transfer);
        let cancel_task = tokio::spawn(async move {
            while !canceller.is_active() {
                tokio::task::yield_now().await;
            }
            canceller.cancel();
        });

        let result = transfer
            .download(&reqwest::Client::new(), &url, dir.path(), &|_: f64| {})
            .await;
        cancel_task.await.expect("cancel task should finish");

        assert_eq!(result, Err(SourceError::Cancelled));
        assert!(downloaded_files(dir.path()).is_empty());
        assert!(!transfer.is_active());
    }

    #[test]
    fn remove_download_dir_handles_missing_and_present() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let download_dir = dir.path().join("downloads");

        remove_download_dir(&download_dir).expect("missing dir is fine");
        std::fs::create_dir_all(download_dir.join("nested")).expect("dir should be created");
        std::fs::write(download_dir.join("nested/file"), b"x").expect("file should be written");
        remove_download_dir(&download_dir).expect("dir should be removed");

        assert!(!download_dir.exists());
    }
}
