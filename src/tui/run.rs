use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};

use super::app::{App, Outcome};
use super::keys::KeyMap;
use super::ui;
use crate::tasks::{Inbox, Msg, Scheduler};

const FRAME: Duration = Duration::from_millis(50);

/// Terminal guard that ensures proper cleanup on drop
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = io::stdout().flush();
}

/// Feed one message through the state machine. Returns false on quit.
pub fn dispatch(app: &mut App, scheduler: &Scheduler, msg: Msg) -> bool {
    match app.update(msg) {
        Outcome::Idle => true,
        Outcome::Schedule(task) => {
            scheduler.schedule(task);
            true
        }
        Outcome::Quit => false,
    }
}

/// Drain everything the background tasks have posted. Returns false on quit.
pub fn pump(app: &mut App, scheduler: &Scheduler, inbox: &mut Inbox) -> bool {
    while let Some(msg) = inbox.try_next() {
        if !dispatch(app, scheduler, msg) {
            return false;
        }
    }
    true
}

pub fn run(keys: &KeyMap, download_dir: PathBuf, scheduler: Scheduler, mut inbox: Inbox) -> Result<()> {
    // Install panic hook to restore terminal on panic
    let original_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        original_panic(info);
    }));

    let _guard = TerminalGuard;
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::new(keys, download_dir);
    scheduler.schedule(app.start());

    loop {
        if !pump(&mut app, &scheduler, &mut inbox) {
            break;
        }
        app.tick();
        terminal.draw(|f| ui::draw(f, &app))?;

        if event::poll(FRAME)? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press && !dispatch(&mut app, &scheduler, Msg::Key(k)) {
                    break;
                }
            }
        }
    }

    info!("quit requested");
    terminal.show_cursor()?;
    Ok(())
}
