//! Download pipeline: pick single-file or zip-bundle strategy, wait for the
//! bundle if needed, then stream the body to disk while reporting progress.
//!
//! Progress is pushed into a bounded queue (`progress_channel`). The producer
//! emits zero or more `Progress` events followed by exactly one terminal event.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::putio::{BundleStatus, DownloadSource, FileId, FileService, ZipId};
use crate::tasks::JobId;

/// Read size for the streaming copy.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Capacity of the progress queue between the copy task and the UI loop.
pub const PROGRESS_QUEUE: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct DownloadPolicy {
    /// Delay between bundle status polls
    pub poll_interval: Duration,
    /// Status polls before a bundle is declared timed out
    pub max_attempts: u32,
    /// Minimum wall-clock gap between two progress events
    pub progress_interval: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_attempts: 300,
            progress_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub written: u64,
    pub total: u64,
    /// Bytes per second averaged since the copy began
    pub speed: f64,
}

#[derive(Debug)]
pub enum DownloadEvent {
    Progress(Progress),
    Complete { path: PathBuf, written: u64 },
    Failed(Error),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadEvent::Progress(_))
    }
}

/// Consumer half of a transfer's progress queue.
pub struct ProgressStream {
    job: JobId,
    rx: mpsc::Receiver<DownloadEvent>,
    finished: bool,
}

impl ProgressStream {
    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pull one event without waiting. A producer that vanished without a
    /// terminal event is reported as a failure so the job never hangs.
    pub fn try_next(&mut self) -> Option<DownloadEvent> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(ev) => {
                if ev.is_terminal() {
                    self.finished = true;
                }
                Some(ev)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(DownloadEvent::Failed(Error::Service(
                    "download task ended unexpectedly".into(),
                )))
            }
        }
    }

    pub async fn next(&mut self) -> Option<DownloadEvent> {
        if self.finished {
            return None;
        }
        let ev = self.rx.recv().await;
        if ev.as_ref().map_or(true, DownloadEvent::is_terminal) {
            self.finished = true;
        }
        ev
    }
}

pub fn progress_channel(job: JobId) -> (mpsc::Sender<DownloadEvent>, ProgressStream) {
    let (tx, rx) = mpsc::channel(PROGRESS_QUEUE);
    (tx, ProgressStream { job, rx, finished: false })
}

pub fn bundle_filename(zip_id: ZipId) -> String {
    format!("putio-{}.zip", zip_id)
}

/// Last path component of a remote name, so it cannot leave the download
/// directory. Names with no usable component become `putio-{id}`.
pub fn local_name(remote: &str, id: FileId) -> String {
    match Path::new(remote).file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => format!("putio-{}", id),
    }
}

/// Resolve what to download: one file directly, several through a zip bundle.
pub async fn prepare(
    service: &dyn FileService,
    ids: &[FileId],
    policy: &DownloadPolicy,
) -> Result<DownloadSource> {
    match ids {
        [] => Err(Error::Validation("nothing selected".into())),
        [id] => {
            let url = service.file_url(*id).await?;
            let file = service.file_info(*id).await?;
            debug!("single download id={} name={} size={}", id, file.name, file.size);
            Ok(DownloadSource { url, filename: local_name(&file.name, *id), total: file.size })
        }
        _ => {
            let zip_id = service.create_zip(ids).await?;
            info!("zip {} requested for {} files", zip_id, ids.len());
            let (url, size) = wait_for_bundle(service, zip_id, policy).await?;
            Ok(DownloadSource { url, filename: bundle_filename(zip_id), total: size })
        }
    }
}

/// Poll a bundle until it carries a URL. Failed polls count as "not ready".
pub async fn wait_for_bundle(
    service: &dyn FileService,
    zip_id: ZipId,
    policy: &DownloadPolicy,
) -> Result<(String, u64)> {
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.poll_interval).await;
        match service.zip_status(zip_id).await {
            Ok(BundleStatus::Ready { url, size }) => {
                info!("zip {} ready after {} polls", zip_id, attempt);
                return Ok((url, size));
            }
            Ok(BundleStatus::Pending) => {}
            Err(e) => debug!("zip {} poll {} failed: {}", zip_id, attempt, e),
        }
    }
    Err(Error::Timeout("zip creation".into()))
}

/// Fetch `source` into `dir` and report through `events`. Always ends with
/// exactly one terminal event.
pub async fn transfer(
    service: &dyn FileService,
    source: &DownloadSource,
    dir: &Path,
    policy: &DownloadPolicy,
    events: mpsc::Sender<DownloadEvent>,
) {
    let terminal = match fetch(service, source, dir, policy, &events).await {
        Ok((path, written)) => {
            info!("saved {} ({} bytes)", path.display(), written);
            DownloadEvent::Complete { path, written }
        }
        Err(e) => {
            warn!("download of {} failed: {}", source.filename, e);
            DownloadEvent::Failed(e)
        }
    };
    let _ = events.send(terminal).await;
}

async fn fetch(
    service: &dyn FileService,
    source: &DownloadSource,
    dir: &Path,
    policy: &DownloadPolicy,
    events: &mpsc::Sender<DownloadEvent>,
) -> Result<(PathBuf, u64)> {
    let name = Path::new(&source.filename)
        .file_name()
        .filter(|n| *n == source.filename.as_str())
        .ok_or_else(|| Error::Validation(format!("refusing to write {:?}", source.filename)))?;
    let stream = service.open(&source.url).await?;
    let total = stream.content_length.unwrap_or(source.total);

    tokio::fs::create_dir_all(dir).await?;
    let dest = dir.join(name);
    let file = tokio::fs::File::create(&dest).await?;

    let written = copy_stream(stream.reader, file, total, policy.progress_interval, events).await?;
    Ok((dest, written))
}

/// Chunked copy with throttled progress. Speed is bytes written divided by
/// time since the copy began. The final byte count is left to the terminal
/// event, so `total` is only ever reported once.
///
/// On error the destination keeps whatever was written so far.
pub async fn copy_stream<R, W>(
    mut reader: R,
    mut out: W,
    total: u64,
    interval: Duration,
    events: &mpsc::Sender<DownloadEvent>,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let start = Instant::now();
    let mut last_report = start;

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| Error::Transport(format!("reading response: {}", e)))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await?;
        written += n as u64;

        let finished = total > 0 && written >= total;
        if !finished && last_report.elapsed() >= interval {
            let elapsed = start.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 { written as f64 / elapsed } else { 0.0 };
            let _ = events
                .send(DownloadEvent::Progress(Progress { written, total, speed }))
                .await;
            last_report = Instant::now();
        }
    }
    out.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Reader that hands out pre-cut pieces, one per read call.
    struct Pieces(VecDeque<Vec<u8>>);

    impl AsyncRead for Pieces {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(mut front) = self.0.pop_front() {
                let n = front.len().min(buf.remaining());
                buf.put_slice(&front[..n]);
                if n < front.len() {
                    let rest = front.split_off(n);
                    self.0.push_front(rest);
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    fn split(total: usize, sizes: &[usize]) -> Pieces {
        let mut out = VecDeque::new();
        let mut left = total;
        let mut i = 0;
        while left > 0 {
            let n = sizes[i % sizes.len()].min(left);
            out.push_back(vec![(i % 251) as u8; n]);
            left -= n;
            i += 1;
        }
        Pieces(out)
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_total_reported_once() {
        for sizes in [&[1usize][..], &[7, 300, 65536, 3], &[100_000], &[4096, 1]] {
            let total = 250_000usize;
            let (tx, mut stream) = progress_channel(1);
            let mut sink = Vec::new();
            let written = {
                let producer = copy_stream(
                    split(total, sizes),
                    &mut sink,
                    total as u64,
                    Duration::ZERO,
                    &tx,
                );
                // Drain concurrently so the bounded queue never blocks the copy
                let consumer = async {
                    let mut seen = Vec::new();
                    while let Ok(Some(ev)) =
                        tokio::time::timeout(Duration::from_millis(50), stream.next()).await
                    {
                        seen.push(ev);
                    }
                    seen
                };
                let (written, seen) = tokio::join!(producer, consumer);
                let mut last = 0;
                for ev in &seen {
                    match ev {
                        DownloadEvent::Progress(p) => {
                            assert!(p.written >= last);
                            assert!(p.written < total as u64);
                            assert_eq!(p.total, total as u64);
                            last = p.written;
                        }
                        other => panic!("unexpected event {:?}", other),
                    }
                }
                written.unwrap()
            };
            assert_eq!(written, total as u64);
            assert_eq!(sink.len(), total);
        }
    }

    #[tokio::test]
    async fn throttle_suppresses_progress_on_fast_streams() {
        let (tx, mut stream) = progress_channel(1);
        let mut sink = Vec::new();
        let n = copy_stream(
            split(10_000, &[10]),
            &mut sink,
            10_000,
            Duration::from_secs(3600),
            &tx,
        )
        .await
        .unwrap();
        assert_eq!(n, 10_000);
        drop(tx);
        assert!(stream.try_next().map_or(true, |ev| ev.is_terminal()));
    }

    #[tokio::test]
    async fn unknown_total_still_copies_everything() {
        let (tx, _stream) = progress_channel(1);
        let mut sink = Vec::new();
        let n = copy_stream(split(5_000, &[333]), &mut sink, 0, Duration::from_secs(60), &tx)
            .await
            .unwrap();
        assert_eq!(n, 5_000);
    }

    struct Broken {
        sent: bool,
    }

    impl AsyncRead for Broken {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
            }
            self.sent = true;
            buf.put_slice(&[1, 2, 3, 4]);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_error_aborts_and_keeps_partial_output() {
        let (tx, _stream) = progress_channel(1);
        let mut sink = Vec::new();
        let err = copy_stream(Broken { sent: false }, &mut sink, 100, Duration::ZERO, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(sink, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn vanished_producer_reads_as_failure() {
        let (tx, mut stream) = progress_channel(7);
        drop(tx);
        assert_eq!(stream.job(), 7);
        assert!(matches!(stream.try_next(), Some(DownloadEvent::Failed(_))));
        assert!(stream.is_finished());
        assert!(stream.try_next().is_none());
    }

    #[test]
    fn bundle_names_follow_zip_id() {
        assert_eq!(bundle_filename(42), "putio-42.zip");
    }

    #[test]
    fn remote_names_stay_inside_the_download_dir() {
        assert_eq!(local_name("clip.mkv", 5), "clip.mkv");
        assert_eq!(local_name("../../.bashrc", 5), ".bashrc");
        assert_eq!(local_name("/etc/passwd", 5), "passwd");
        assert_eq!(local_name("..", 5), "putio-5");
        assert_eq!(local_name("/", 9), "putio-9");
        assert_eq!(local_name("", 9), "putio-9");
    }
}
