//! Workflow state machine
//!
//! `App::update` folds one `Msg` into state and says what the loop should do
//! next. It never performs I/O itself; all remote work goes out as a `Task`.

use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info, warn};

use super::keys::{is_interrupt, Action, KeyMap};
use super::nav::{Navigation, Selection};
use crate::download::DownloadEvent;
use crate::putio::{FileId, ROOT_ID};
use crate::tasks::{JobId, Msg, Task};

/// Longest name the rename field accepts, in chars.
pub const NAME_LIMIT: usize = 255;

/// What the loop should do after an update.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Idle,
    Schedule(Task),
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteState {
    Running,
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenamePhase {
    Editing,
    Running,
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPhase {
    Preparing,
    Downloading,
    Complete(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub job: JobId,
    pub count: usize,
    pub dir: PathBuf,
    pub phase: DownloadPhase,
    pub filename: String,
    pub written: u64,
    /// 0 until known
    pub total: u64,
    /// Bytes per second, averaged since the transfer began
    pub speed: f64,
}

impl DownloadJob {
    fn new(job: JobId, count: usize, dir: PathBuf) -> Self {
        Self {
            job,
            count,
            dir,
            phase: DownloadPhase::Preparing,
            filename: String::new(),
            written: 0,
            total: 0,
            speed: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, DownloadPhase::Complete(_) | DownloadPhase::Failed(_))
    }

    /// Completed fraction in 0..=1, 0 while the total is unknown.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.written as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Browsing,
    ConfirmingDelete { ids: Vec<FileId> },
    Deleting { job: JobId, count: usize, state: DeleteState },
    /// `cursor` is a char index into `buffer`.
    Renaming { job: JobId, id: FileId, buffer: String, cursor: usize, phase: RenamePhase },
    Downloading(DownloadJob),
    /// Dismissible banner over the browsing view
    Error(String),
}

pub struct App<'a> {
    keys: &'a KeyMap,
    pub nav: Navigation,
    pub selection: Selection,
    pub mode: Mode,
    download_dir: PathBuf,
    next_job: JobId,
    spinner: usize,
}

impl<'a> App<'a> {
    pub fn new(keys: &'a KeyMap, download_dir: PathBuf) -> Self {
        Self {
            keys,
            nav: Navigation::new(),
            selection: Selection::default(),
            mode: Mode::Browsing,
            download_dir,
            next_job: 1,
            spinner: 0,
        }
    }

    /// The first task: list the account root.
    pub fn start(&mut self) -> Task {
        Task::List { parent_id: self.nav.begin_load(ROOT_ID) }
    }

    pub fn keys(&self) -> &KeyMap {
        self.keys
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn spinner(&self) -> usize {
        self.spinner
    }

    pub fn tick(&mut self) {
        self.spinner = self.spinner.wrapping_add(1);
    }

    /// Quitting is refused anywhere in the delete flow, including its result
    /// screen, which only an explicit dismissal leaves.
    pub fn quit_suppressed(&self) -> bool {
        matches!(self.mode, Mode::ConfirmingDelete { .. } | Mode::Deleting { .. })
    }

    fn job(&mut self) -> JobId {
        let job = self.next_job;
        self.next_job += 1;
        job
    }

    pub fn update(&mut self, msg: Msg) -> Outcome {
        match msg {
            Msg::Key(ev) => self.on_key(ev),
            Msg::Listed { parent_id, result } => {
                match result {
                    Ok(entries) => {
                        if !self.nav.install(parent_id, entries) {
                            debug!("discarding stale listing of {}", parent_id);
                        }
                    }
                    Err(e) => {
                        if self.nav.abort(parent_id) {
                            warn!("listing {} failed: {}", parent_id, e);
                            if matches!(self.mode, Mode::Browsing | Mode::Error(_)) {
                                self.mode = Mode::Error(e.to_string());
                            }
                        } else {
                            debug!("discarding stale listing error for {}", parent_id);
                        }
                    }
                }
                Outcome::Idle
            }
            Msg::Deleted { job, result } => {
                match &mut self.mode {
                    Mode::Deleting { job: live, state, .. }
                        if *live == job && *state == DeleteState::Running =>
                    {
                        *state = match result {
                            Ok(()) => DeleteState::Done,
                            Err(e) => {
                                warn!("delete job {} failed: {}", job, e);
                                DeleteState::Failed(e.to_string())
                            }
                        };
                    }
                    _ => debug!("ignoring late delete result for job {}", job),
                }
                Outcome::Idle
            }
            Msg::Renamed { job, result } => {
                match &mut self.mode {
                    Mode::Renaming { job: live, phase, .. }
                        if *live == job && *phase == RenamePhase::Running =>
                    {
                        *phase = match result {
                            Ok(()) => RenamePhase::Done,
                            Err(e) => {
                                warn!("rename job {} failed: {}", job, e);
                                RenamePhase::Failed(e.to_string())
                            }
                        };
                    }
                    _ => debug!("ignoring late rename result for job {}", job),
                }
                Outcome::Idle
            }
            Msg::DownloadReady { job, result } => match &mut self.mode {
                Mode::Downloading(dl) if dl.job == job && dl.phase == DownloadPhase::Preparing => {
                    match result {
                        Ok(source) => {
                            info!("job {}: fetching {} ({} bytes)", job, source.filename, source.total);
                            dl.filename = source.filename.clone();
                            dl.total = source.total;
                            dl.phase = DownloadPhase::Downloading;
                            Outcome::Schedule(Task::Transfer { job, source, dir: dl.dir.clone() })
                        }
                        Err(e) => {
                            warn!("job {}: preparing download failed: {}", job, e);
                            dl.phase = DownloadPhase::Failed(e.to_string());
                            Outcome::Idle
                        }
                    }
                }
                _ => {
                    debug!("ignoring late download source for job {}", job);
                    Outcome::Idle
                }
            },
            Msg::Download { job, event } => {
                match &mut self.mode {
                    Mode::Downloading(dl)
                        if dl.job == job && dl.phase == DownloadPhase::Downloading =>
                    {
                        match event {
                            DownloadEvent::Progress(p) => {
                                dl.written = p.written;
                                if p.total > 0 {
                                    dl.total = p.total;
                                }
                                dl.speed = p.speed;
                            }
                            DownloadEvent::Complete { path, written } => {
                                info!("job {}: saved {}", job, path.display());
                                dl.written = written;
                                if dl.total == 0 {
                                    dl.total = written;
                                }
                                dl.phase = DownloadPhase::Complete(path);
                            }
                            DownloadEvent::Failed(e) => {
                                warn!("job {}: transfer failed: {}", job, e);
                                dl.phase = DownloadPhase::Failed(e.to_string());
                            }
                        }
                    }
                    _ => debug!("ignoring transfer event for job {}", job),
                }
                Outcome::Idle
            }
        }
    }

    fn on_key(&mut self, ev: KeyEvent) -> Outcome {
        if let Mode::Renaming { phase: RenamePhase::Editing, .. } = self.mode {
            return self.on_edit_key(ev);
        }
        let Some(action) = self.keys.action(&ev) else {
            return Outcome::Idle;
        };
        if action == Action::Quit {
            if self.quit_suppressed() {
                return Outcome::Idle;
            }
            return Outcome::Quit;
        }
        let dismiss = matches!(action, Action::Dismiss | Action::Confirm | Action::Open);

        match &self.mode {
            Mode::Browsing => self.on_browse(action),
            Mode::Error(_) => {
                if dismiss {
                    self.mode = Mode::Browsing;
                }
                Outcome::Idle
            }
            Mode::ConfirmingDelete { ids } => match action {
                Action::Confirm => {
                    let ids = ids.clone();
                    let job = self.job();
                    info!("job {}: deleting {} item(s)", job, ids.len());
                    self.mode = Mode::Deleting { job, count: ids.len(), state: DeleteState::Running };
                    Outcome::Schedule(Task::Delete { job, ids })
                }
                Action::Dismiss => {
                    self.mode = Mode::Browsing;
                    Outcome::Idle
                }
                _ => Outcome::Idle,
            },
            Mode::Deleting { state, .. } => {
                if dismiss && *state != DeleteState::Running {
                    self.selection.clear();
                    self.back_to_browsing_and_reload()
                } else {
                    Outcome::Idle
                }
            }
            Mode::Renaming { phase, .. } => match phase {
                RenamePhase::Done | RenamePhase::Failed(_) if dismiss => {
                    self.back_to_browsing_and_reload()
                }
                _ => Outcome::Idle,
            },
            Mode::Downloading(dl) => {
                if dismiss && dl.is_finished() {
                    self.mode = Mode::Browsing;
                }
                Outcome::Idle
            }
        }
    }

    fn back_to_browsing_and_reload(&mut self) -> Outcome {
        self.mode = Mode::Browsing;
        Outcome::Schedule(Task::List { parent_id: self.nav.reload() })
    }

    fn on_browse(&mut self, action: Action) -> Outcome {
        if self.nav.is_loading() {
            return Outcome::Idle;
        }
        match action {
            Action::Up => self.nav.move_up(),
            Action::Down => self.nav.move_down(),
            Action::Top => self.nav.top(),
            Action::Bottom => self.nav.bottom(),
            Action::Toggle => self.nav.toggle_at_cursor(&mut self.selection),
            Action::ToggleAll => self.nav.toggle_all(&mut self.selection),
            Action::Open => {
                if let Some(parent_id) = self.nav.descend() {
                    return Outcome::Schedule(Task::List { parent_id });
                }
            }
            Action::Back => {
                if let Some(parent_id) = self.nav.ascend() {
                    self.selection.clear();
                    return Outcome::Schedule(Task::List { parent_id });
                }
            }
            Action::Delete => {
                let ids = self.nav.effective_selection(&self.selection);
                if !ids.is_empty() {
                    self.mode = Mode::ConfirmingDelete { ids };
                }
            }
            Action::Rename => {
                let ids = self.nav.effective_selection(&self.selection);
                if let [id] = ids[..] {
                    if let Some(entry) = self.nav.find(id) {
                        let buffer: String = entry.name.chars().take(NAME_LIMIT).collect();
                        let cursor = buffer.chars().count();
                        let job = self.job();
                        self.mode =
                            Mode::Renaming { job, id, buffer, cursor, phase: RenamePhase::Editing };
                    }
                }
            }
            Action::Download => {
                let ids = self.nav.effective_selection(&self.selection);
                if !ids.is_empty() {
                    let job = self.job();
                    info!("job {}: download of {} item(s) requested", job, ids.len());
                    self.mode =
                        Mode::Downloading(DownloadJob::new(job, ids.len(), self.download_dir.clone()));
                    return Outcome::Schedule(Task::PrepareDownload { job, ids });
                }
            }
            Action::Confirm | Action::Dismiss | Action::Quit => {}
        }
        Outcome::Idle
    }

    fn on_edit_key(&mut self, ev: KeyEvent) -> Outcome {
        if is_interrupt(&ev) {
            return Outcome::Quit;
        }
        let Mode::Renaming { job, id, buffer, cursor, phase } = &mut self.mode else {
            return Outcome::Idle;
        };
        let len = buffer.chars().count();
        match ev.code {
            KeyCode::Esc => {
                self.mode = Mode::Browsing;
            }
            KeyCode::Enter => {
                let name = buffer.trim().to_string();
                if name.is_empty() {
                    return Outcome::Idle;
                }
                *cursor = name.chars().count();
                *buffer = name.clone();
                *phase = RenamePhase::Running;
                return Outcome::Schedule(Task::Rename { job: *job, id: *id, name });
            }
            KeyCode::Left => *cursor = cursor.saturating_sub(1),
            KeyCode::Right => *cursor = (*cursor + 1).min(len),
            KeyCode::Home => *cursor = 0,
            KeyCode::End => *cursor = len,
            KeyCode::Backspace if *cursor > 0 => {
                *cursor -= 1;
                buffer.remove(byte_offset(buffer, *cursor));
            }
            KeyCode::Delete if *cursor < len => {
                buffer.remove(byte_offset(buffer, *cursor));
            }
            KeyCode::Char(c) if !ev.modifiers.contains(KeyModifiers::CONTROL) => {
                if len < NAME_LIMIT {
                    buffer.insert(byte_offset(buffer, *cursor), c);
                    *cursor += 1;
                }
            }
            _ => {}
        }
        Outcome::Idle
    }
}

/// Byte position of the `index`-th char, or the end of `s`.
pub fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map_or(s.len(), |(at, _)| at)
}
