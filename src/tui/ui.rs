use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{byte_offset, App, DeleteState, DownloadJob, DownloadPhase, Mode, RenamePhase};
use super::keys::Action;
use super::theme::Theme;
use crate::putio::Entry;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_ASCII: [&str; 4] = ["|", "/", "-", "\\"];

const BROWSE_HINTS: &[Action] = &[
    Action::Up,
    Action::Down,
    Action::Open,
    Action::Back,
    Action::Toggle,
    Action::ToggleAll,
    Action::Download,
    Action::Delete,
    Action::Rename,
    Action::Quit,
];

pub fn draw(f: &mut Frame, app: &App) {
    let background = Block::default().style(Style::default().bg(Theme::BASE));
    f.render_widget(background, f.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.size());

    draw_title(f, chunks[0], app);
    draw_listing(f, chunks[1], app);
    draw_status(f, chunks[2], app);
    draw_hints(f, chunks[3], app);

    match &app.mode {
        Mode::Browsing => {}
        Mode::ConfirmingDelete { ids } => draw_confirm(f, ids.len()),
        Mode::Deleting { count, state, .. } => draw_deleting(f, app, *count, state),
        Mode::Renaming { buffer, cursor, phase, .. } => draw_rename(f, app, buffer, *cursor, phase),
        Mode::Downloading(job) => draw_download(f, app, job),
        Mode::Error(msg) => draw_error(f, msg),
    }
}

pub fn is_ascii_mode() -> bool {
    std::env::var("TELEPUT_ASCII").is_ok() || std::env::var("TERM").map_or(false, |t| t.contains("dumb"))
}

fn spinner(app: &App) -> &'static str {
    if is_ascii_mode() {
        SPINNER_ASCII[app.spinner() % SPINNER_ASCII.len()]
    } else {
        SPINNER[app.spinner() % SPINNER.len()]
    }
}

/// Root label followed by the names of the directories entered.
pub fn breadcrumbs(trail: &[String]) -> Vec<String> {
    std::iter::once("Your Files".to_string())
        .chain(trail.iter().cloned())
        .collect()
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let crumbs = breadcrumbs(app.nav.trail());
    let mut spans = vec![Span::styled(" teleput", Theme::title())];
    if crumbs.len() > 1 {
        spans.push(Span::styled(" │ ", Theme::crumb()));
        let last = crumbs.len() - 1;
        for (i, c) in crumbs.into_iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" / ", Theme::crumb()));
            }
            let style = if i == last { Theme::crumb_current() } else { Theme::crumb() };
            spans.push(Span::styled(c, style));
        }
    }
    let p = Paragraph::new(Line::from(spans)).style(Theme::crumb());
    f.render_widget(p, area);
}

fn draw_listing(f: &mut Frame, area: Rect, app: &App) {
    if app.nav.is_loading() {
        let text = format!("{} Loading...", spinner(app));
        f.render_widget(placeholder(text, Theme::muted(), area), area);
        return;
    }
    let entries = app.nav.entries();
    if entries.is_empty() {
        f.render_widget(placeholder("Empty folder".into(), Theme::size(), area), area);
        return;
    }

    let ascii = is_ascii_mode();
    let name_width = (area.width as usize).saturating_sub(18).max(10);
    let items: Vec<ListItem> = entries
        .iter()
        .map(|e| {
            let marked = app.selection.contains(e.id);
            let mark = match (marked, ascii) {
                (true, false) => "● ",
                (true, true) => "* ",
                (false, _) => "  ",
            };
            let name_style = if marked {
                Theme::selected()
            } else if e.is_dir {
                Theme::dir()
            } else {
                Theme::file()
            };
            let mut spans = vec![
                Span::styled(mark, Theme::selected()),
                Span::raw(format!("{} ", file_icon(e, ascii))),
            ];
            if e.is_dir {
                spans.push(Span::styled(e.name.clone(), name_style));
            } else {
                spans.push(Span::styled(fit(&e.name, name_width), name_style));
                spans.push(Span::styled(format!(" {:>10}", human_size(e.size)), Theme::size()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::NONE))
        .highlight_style(Theme::cursor())
        .highlight_symbol(if ascii { "> " } else { "▸ " });
    let mut state = ListState::default().with_selected(Some(app.nav.cursor()));
    f.render_stateful_widget(list, area, &mut state);
}

fn placeholder(text: String, style: Style, area: Rect) -> Paragraph<'static> {
    let pad = (area.height / 3) as usize;
    let mut lines = vec![Line::from(""); pad];
    lines.push(Line::from(Span::styled(text, style)));
    Paragraph::new(lines).alignment(Alignment::Center)
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let mut left = format!(" {} items", app.nav.entries().len());
    if !app.selection.is_empty() {
        left.push_str(&format!(" │ {} selected", app.selection.len()));
    }
    let right = format!("↓ {} ", app.download_dir().display());
    let gap = (area.width as usize)
        .saturating_sub(left.width() + right.width())
        .max(1);
    let text = format!("{}{}{}", left, " ".repeat(gap), right);
    f.render_widget(Paragraph::new(text).style(Theme::status()), area);
}

fn draw_hints(f: &mut Frame, area: Rect, app: &App) {
    let hints = app
        .keys()
        .hints(BROWSE_HINTS)
        .into_iter()
        .map(|(k, label)| format!("{} {}", k, label))
        .collect::<Vec<_>>()
        .join(" │ ");
    f.render_widget(Paragraph::new(format!(" {}", hints)).style(Theme::hint()), area);
}

fn dialog<'a>(title: &'a str, accent: ratatui::style::Color) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title(Span::styled(format!(" {} ", title), Theme::dialog(accent)))
        .style(Style::default().bg(Theme::BASE).fg(Theme::TEXT))
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "item" } else { "items" }
}

fn check(ascii: bool) -> &'static str {
    if ascii { "[OK]" } else { "✓" }
}

fn cross(ascii: bool) -> &'static str {
    if ascii { "[FAIL]" } else { "✗" }
}

fn draw_confirm(f: &mut Frame, count: usize) {
    let area = centered_rect(50, 25, f.size());
    f.render_widget(Clear, area);
    let lines = vec![
        Line::from(""),
        Line::from(format!("Delete {} {}?", count, plural(count))),
        Line::from(""),
        Line::from(Span::styled("y to confirm, Esc to cancel", Theme::hint())),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(dialog("Confirm Delete", Theme::RED));
    f.render_widget(p, area);
}

fn draw_deleting(f: &mut Frame, app: &App, count: usize, state: &DeleteState) {
    let area = centered_rect(50, 25, f.size());
    f.render_widget(Clear, area);
    let ascii = is_ascii_mode();
    let mut lines = vec![Line::from("")];
    match state {
        DeleteState::Running => {
            lines.push(Line::from(format!("{} Deleting {} {}...", spinner(app), count, plural(count))));
        }
        DeleteState::Done => {
            lines.push(Line::from(Span::styled(
                format!("{} Deleted {} {}", check(ascii), count, plural(count)),
                Style::default().fg(Theme::GREEN),
            )));
        }
        DeleteState::Failed(err) => {
            lines.push(Line::from(Span::styled(
                format!("{} {}", cross(ascii), err),
                Style::default().fg(Theme::RED),
            )));
        }
    }
    if *state != DeleteState::Running {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Press Esc to return", Theme::hint())));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(dialog("Delete", Theme::RED));
    f.render_widget(p, area);
}

fn draw_rename(f: &mut Frame, app: &App, buffer: &str, cursor: usize, phase: &RenamePhase) {
    let area = centered_rect(60, 25, f.size());
    f.render_widget(Clear, area);
    let ascii = is_ascii_mode();
    let mut lines = vec![Line::from("")];
    match phase {
        RenamePhase::Editing => {
            let mut spans = vec![Span::styled("> ", Style::default().fg(Theme::MAUVE))];
            spans.extend(caret_spans(buffer, cursor));
            lines.push(Line::from(spans));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Enter to confirm, Esc to cancel", Theme::hint())));
        }
        RenamePhase::Running => {
            lines.push(Line::from(format!("{} Renaming...", spinner(app))));
        }
        RenamePhase::Done => {
            lines.push(Line::from(Span::styled(
                format!("{} Renamed", check(ascii)),
                Style::default().fg(Theme::GREEN),
            )));
        }
        RenamePhase::Failed(err) => {
            lines.push(Line::from(Span::styled(
                format!("{} {}", cross(ascii), err),
                Style::default().fg(Theme::RED),
            )));
        }
    }
    if matches!(phase, RenamePhase::Done | RenamePhase::Failed(_)) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Press Esc to return", Theme::hint())));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(dialog("Rename", Theme::MAUVE));
    f.render_widget(p, area);
}

/// Edit line with the char under `cursor` highlighted, or a block past the end.
fn caret_spans(buffer: &str, cursor: usize) -> Vec<Span<'static>> {
    let at = byte_offset(buffer, cursor);
    let (before, rest) = buffer.split_at(at);
    let mut chars = rest.chars();
    let caret = Style::default().fg(Theme::BASE).bg(Theme::PEACH);
    match chars.next() {
        Some(c) => vec![
            Span::raw(before.to_string()),
            Span::styled(c.to_string(), caret),
            Span::raw(chars.as_str().to_string()),
        ],
        None => vec![
            Span::raw(before.to_string()),
            Span::styled("█", Style::default().fg(Theme::PEACH)),
        ],
    }
}

fn draw_download(f: &mut Frame, app: &App, job: &DownloadJob) {
    let area = centered_rect(70, 45, f.size());
    f.render_widget(Clear, area);
    let block = dialog("Download", Theme::SAPPHIRE);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1), Constraint::Length(2)])
        .split(inner);

    let ascii = is_ascii_mode();
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<10}", label), Theme::muted()),
            Span::raw(value),
        ])
    };
    let mut lines = vec![
        row("Files", job.count.to_string()),
        row("Directory", job.dir.display().to_string()),
    ];
    if !job.filename.is_empty() {
        lines.push(row("Filename", job.filename.clone()));
    }
    let status = match &job.phase {
        DownloadPhase::Preparing if job.count > 1 => {
            Span::raw(format!("{} Preparing zip...", spinner(app)))
        }
        DownloadPhase::Preparing => Span::raw(format!("{} Preparing...", spinner(app))),
        DownloadPhase::Downloading => Span::raw(format!("{} Downloading...", spinner(app))),
        DownloadPhase::Complete(path) => Span::styled(
            format!("{} Complete: {}", check(ascii), path.display()),
            Style::default().fg(Theme::GREEN),
        ),
        DownloadPhase::Failed(err) => Span::styled(
            format!("{} {}", cross(ascii), err),
            Style::default().fg(Theme::RED),
        ),
    };
    lines.push(Line::from(vec![Span::styled(format!("{:<10}", "Status"), Theme::muted()), status]));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), rows[0]);

    if job.phase != DownloadPhase::Preparing {
        let label = format!("{:.0}%", job.ratio() * 100.0);
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Theme::MAUVE).bg(Theme::SURFACE1))
            .ratio(job.ratio())
            .label(label);
        f.render_widget(gauge, rows[1]);

        let total = if job.total > 0 { human_size(job.total) } else { "?".to_string() };
        let mut footer = format!("{} / {}", human_size(job.written), total);
        if job.phase == DownloadPhase::Downloading {
            footer.push_str(&format!("  {}", format_speed(job.speed)));
        }
        f.render_widget(Paragraph::new(Span::styled(footer, Theme::muted())), rows[2]);
    }

    if job.is_finished() {
        let hint = Rect { y: area.bottom().saturating_sub(2), height: 1, ..inner };
        f.render_widget(
            Paragraph::new(Span::styled("Press Esc to return", Theme::hint())).alignment(Alignment::Right),
            hint,
        );
    }
}

fn draw_error(f: &mut Frame, msg: &str) {
    let area = centered_rect(60, 20, f.size());
    f.render_widget(Clear, area);
    let lines = vec![
        Line::from(Span::styled(msg.to_string(), Style::default().fg(Theme::RED))),
        Line::from(""),
        Line::from(Span::styled("Press Esc to dismiss", Theme::hint())),
    ];
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(dialog("Error", Theme::RED));
    f.render_widget(p, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Icon from the directory flag and the content-type hint.
pub fn file_icon(e: &Entry, ascii: bool) -> &'static str {
    let ct = e.content_type.as_str();
    let kind = if e.is_dir {
        0
    } else if ct.starts_with("video/") {
        1
    } else if ct.starts_with("audio/") {
        2
    } else if ct.starts_with("image/") {
        3
    } else if ct.contains("zip") || ct.contains("rar") || ct.contains("tar") {
        4
    } else {
        5
    };
    let (fancy, plain) = [
        ("📁", "[D]"),
        ("🎬", "[V]"),
        ("🎵", "[A]"),
        ("🖼 ", "[I]"),
        ("📦", "[Z]"),
        ("📄", "   "),
    ][kind];
    if ascii { plain } else { fancy }
}

/// Base-1024 size with one decimal above bytes.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", human_size(bytes_per_sec.max(0.0) as u64))
}

/// Pad or truncate to exactly `width` terminal columns.
fn fit(name: &str, width: usize) -> String {
    if name.width() <= width {
        return format!("{}{}", name, " ".repeat(width - name.width()));
    }
    let mut out = String::new();
    let mut used = 0;
    for c in name.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}
