//! Background task scheduling
//!
//! The UI loop never touches the network. It hands a `Task` to the
//! `Scheduler`, which runs it on the tokio runtime and posts exactly one
//! `Msg` back. Transfers additionally register a `ProgressStream` that the
//! `Inbox` drains alongside the main queue.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use crossterm::event::KeyEvent;
use log::{debug, warn};
use tokio::runtime::Handle;

use crate::download::{self, DownloadEvent, DownloadPolicy, ProgressStream};
use crate::error::Result;
use crate::putio::{DownloadSource, Entry, FileId, FileService};

/// Identifies one delete/rename/download job so late results can be told apart.
pub type JobId = u64;

/// Work the loop wants done off-thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    List { parent_id: FileId },
    Delete { job: JobId, ids: Vec<FileId> },
    Rename { job: JobId, id: FileId, name: String },
    PrepareDownload { job: JobId, ids: Vec<FileId> },
    Transfer { job: JobId, source: DownloadSource, dir: PathBuf },
}

/// Everything that can reach the loop.
#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Listed { parent_id: FileId, result: Result<Vec<Entry>> },
    Deleted { job: JobId, result: Result<()> },
    Renamed { job: JobId, result: Result<()> },
    DownloadReady { job: JobId, result: Result<DownloadSource> },
    Download { job: JobId, event: DownloadEvent },
}

pub struct Scheduler {
    rt: Handle,
    service: Arc<dyn FileService>,
    policy: DownloadPolicy,
    tx: Sender<Msg>,
    streams: Sender<ProgressStream>,
}

/// Consumer side: one message at a time, in arrival order per source.
pub struct Inbox {
    rx: Receiver<Msg>,
    streams: Receiver<ProgressStream>,
    active: Option<ProgressStream>,
}

pub fn channel_pair(
    rt: Handle,
    service: Arc<dyn FileService>,
    policy: DownloadPolicy,
) -> (Scheduler, Inbox) {
    let (tx, rx) = channel();
    let (stx, srx) = channel();
    (
        Scheduler { rt, service, policy, tx, streams: stx },
        Inbox { rx, streams: srx, active: None },
    )
}

impl Scheduler {
    pub fn schedule(&self, task: Task) {
        debug!("schedule {:?}", task);
        let service = self.service.clone();
        let tx = self.tx.clone();
        let policy = self.policy;
        match task {
            Task::List { parent_id } => {
                self.rt.spawn(async move {
                    let result = service.list(parent_id).await;
                    let _ = tx.send(Msg::Listed { parent_id, result });
                });
            }
            Task::Delete { job, ids } => {
                self.rt.spawn(async move {
                    let result = service.delete(&ids).await;
                    let _ = tx.send(Msg::Deleted { job, result });
                });
            }
            Task::Rename { job, id, name } => {
                self.rt.spawn(async move {
                    let result = service.rename(id, &name).await;
                    let _ = tx.send(Msg::Renamed { job, result });
                });
            }
            Task::PrepareDownload { job, ids } => {
                self.rt.spawn(async move {
                    let result = download::prepare(service.as_ref(), &ids, &policy).await;
                    let _ = tx.send(Msg::DownloadReady { job, result });
                });
            }
            Task::Transfer { job, source, dir } => {
                let (events, stream) = download::progress_channel(job);
                if self.streams.send(stream).is_err() {
                    warn!("inbox gone, dropping transfer for job {}", job);
                    return;
                }
                self.rt.spawn(async move {
                    download::transfer(service.as_ref(), &source, &dir, &policy, events).await;
                });
            }
        }
    }
}

impl Inbox {
    pub fn try_next(&mut self) -> Option<Msg> {
        while let Ok(stream) = self.streams.try_recv() {
            self.active = Some(stream);
        }
        match self.rx.try_recv() {
            Ok(msg) => return Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
        let stream = self.active.as_mut()?;
        let job = stream.job();
        let event = stream.try_next();
        if stream.is_finished() {
            self.active = None;
        }
        event.map(|event| Msg::Download { job, event })
    }

    /// True while a transfer may still produce events.
    pub fn has_stream(&self) -> bool {
        self.active.is_some()
    }
}
