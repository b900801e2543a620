use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use folio_config::Config;
use folio_engine::history::{
    Autosave, AutosaveAction, Commit, DiffKind, DiffLine, FsRevisionStore, RevisionHistory,
    render_unified,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use relative_path::{RelativePath, RelativePathBuf};
use std::{
    env,
    fmt::Display,
    io::{Stdout, stdout},
    path::PathBuf,
    process, thread,
    time::Duration,
};

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Browse {
        notes_path: Option<PathBuf>,
        file: RelativePathBuf,
    },
    Commit {
        notes_path: Option<PathBuf>,
        file: RelativePathBuf,
        message: String,
    },
}

/// `[notes-folder] <file>` or `[notes-folder] commit <file> <message>`
fn parse_args(args: &[String]) -> Option<Invocation> {
    match args {
        [cmd, file, message] if cmd == "commit" => Some(Invocation::Commit {
            notes_path: None,
            file: RelativePathBuf::from(file.as_str()),
            message: message.clone(),
        }),
        [notes, cmd, file, message] if cmd == "commit" => Some(Invocation::Commit {
            notes_path: Some(PathBuf::from(notes)),
            file: RelativePathBuf::from(file.as_str()),
            message: message.clone(),
        }),
        [file] if file != "commit" => Some(Invocation::Browse {
            notes_path: None,
            file: RelativePathBuf::from(file.as_str()),
        }),
        [notes, file] if notes != "commit" && file != "commit" => Some(Invocation::Browse {
            notes_path: Some(PathBuf::from(notes)),
            file: RelativePathBuf::from(file.as_str()),
        }),
        _ => None,
    }
}

/// Config file settings, with the notes folder from the command line if given
fn resolve_config(notes_path: Option<PathBuf>) -> Result<Config> {
    let loaded = Config::load()?;
    match (notes_path, loaded) {
        (Some(notes_path), Some(mut config)) => {
            config.notes_path = notes_path;
            Ok(config)
        }
        (Some(notes_path), None) => Ok(Config::new(notes_path)),
        (None, Some(config)) => Ok(config),
        (None, None) => anyhow::bail!(
            "No notes path provided and no config file found at {}",
            Config::config_path().display()
        ),
    }
}

enum Row {
    Day(String),
    Commit(Commit),
}

enum Mode {
    Browse,
    ConfirmRestore(Commit),
}

struct App {
    history: RevisionHistory<FsRevisionStore>,
    file: RelativePathBuf,
    rows: Vec<Row>,
    list_state: ListState,
    diff: Vec<DiffLine>,
    minimized: bool,
    mode: Mode,
    status: Option<String>,
}

impl App {
    fn new(config: &Config, file: RelativePathBuf) -> Result<Self> {
        let store = FsRevisionStore::new(&config.notes_path, &config.history.store_dir);
        let history = RevisionHistory::new(store).with_max_cells(config.diff.max_cells);

        let mut app = Self {
            history,
            file,
            rows: Vec::new(),
            list_state: ListState::default(),
            diff: Vec::new(),
            minimized: true,
            mode: Mode::Browse,
            status: None,
        };
        app.reload()?;
        Ok(app)
    }

    fn reload(&mut self) -> Result<()> {
        let groups = self
            .history
            .grouped(Some(self.file.as_relative_path()), &Local::now())?;
        self.rows = groups
            .into_iter()
            .flat_map(|group| {
                std::iter::once(Row::Day(group.label))
                    .chain(group.commits.into_iter().map(Row::Commit))
            })
            .collect();

        let first = self.rows.iter().position(|row| matches!(row, Row::Commit(_)));
        self.list_state.select(first);
        self.update_preview();
        Ok(())
    }

    fn selected_commit(&self) -> Option<&Commit> {
        match self.rows.get(self.list_state.selected()?) {
            Some(Row::Commit(commit)) => Some(commit),
            _ => None,
        }
    }

    /// Select the next (or previous) commit row, skipping day headers and wrapping
    fn move_selection(&mut self, forward: bool) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let mut index = self.list_state.selected().unwrap_or(0);
        for _ in 0..len {
            index = if forward {
                (index + 1) % len
            } else {
                (index + len - 1) % len
            };
            if matches!(self.rows[index], Row::Commit(_)) {
                self.list_state.select(Some(index));
                self.update_preview();
                return;
            }
        }
    }

    fn update_preview(&mut self) {
        let Some(hash) = self.selected_commit().map(|c| c.hash.clone()) else {
            self.diff.clear();
            return;
        };

        let token = self.history.begin_preview();
        let live = match self.history.storage().read_live(&self.file) {
            Ok(live) => live,
            Err(e) => {
                self.status = Some(format!("Cannot read {}: {e}", self.file));
                String::new()
            }
        };
        match self.history.compare(&hash, &self.file, &live) {
            Ok(diff) => {
                if let Some(diff) = self.history.finish_preview(token, diff) {
                    self.minimized = diff.minimized;
                    self.diff = diff.lines;
                }
            }
            Err(e) => {
                self.diff.clear();
                self.status = Some(e.to_string());
            }
        }
    }

    fn request_restore(&mut self) {
        if let Some(commit) = self.selected_commit().cloned() {
            self.mode = Mode::ConfirmRestore(commit);
        }
    }

    fn confirm_restore(&mut self) {
        let Mode::ConfirmRestore(commit) = std::mem::replace(&mut self.mode, Mode::Browse) else {
            return;
        };
        let target = self.file.as_relative_path();
        match self.history.restore(&commit.hash, Some(target)) {
            Ok(()) => {
                self.status = Some(format!(
                    "Restored {} to {} ({})",
                    self.file,
                    commit.short_hash(),
                    commit.message
                ));
                self.update_preview();
            }
            Err(e) => self.status = Some(format!("Restore failed, file untouched: {e}")),
        }
    }

    fn cancel(&mut self) {
        self.mode = Mode::Browse;
    }
}

impl Invocation {
    /// The browser owns the terminal, so only warnings may reach stderr there
    fn default_log_filter(&self) -> &'static str {
        match self {
            Invocation::Browse { .. } => "warn",
            Invocation::Commit { .. } => "info",
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(invocation) = parse_args(args.get(1..).unwrap_or_default()) else {
        eprintln!("Usage: folio-cli [notes-folder] <file>");
        eprintln!("       folio-cli [notes-folder] commit <file> <message>");
        process::exit(1);
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(invocation.default_log_filter()),
    )
    .init();

    match invocation {
        Invocation::Commit {
            notes_path,
            file,
            message,
        } => {
            let config = resolve_config(notes_path)?;
            commit(&config, &file, &message)
        }
        Invocation::Browse { notes_path, file } => {
            let config = resolve_config(notes_path)?;
            if !config.notes_path.is_dir() {
                eprintln!(
                    "Error: Notes path '{}' is not a directory",
                    config.notes_path.display()
                );
                process::exit(1);
            }
            browse(&config, file)
        }
    }
}

fn commit(config: &Config, file: &RelativePath, message: &str) -> Result<()> {
    let store = FsRevisionStore::new(&config.notes_path, &config.history.store_dir);
    let author = config.history.author();
    let mut autosave = Autosave::new(config.history.autosave_retry_delay());
    autosave.mark_dirty();

    let commit = save_with_retry(
        &mut autosave,
        || store.commit(message, &author, &[file]),
        thread::sleep,
    )
    .with_context(|| format!("Failed to commit {file}"))?;
    println!("{} {}", commit.short_hash(), commit.message);
    Ok(())
}

/// Run `save`, retrying once after the autosave delay before giving up
fn save_with_retry<T, E: Display>(
    autosave: &mut Autosave,
    mut save: impl FnMut() -> Result<T, E>,
    mut wait: impl FnMut(Duration),
) -> Result<T, E> {
    loop {
        match save() {
            Ok(value) => {
                autosave.record_success();
                return Ok(value);
            }
            Err(err) => match autosave.record_failure(&err) {
                AutosaveAction::ScheduleRetry(delay) => wait(delay),
                AutosaveAction::SurfaceError(_) => return Err(err),
            },
        }
    }
}

fn browse(config: &Config, file: RelativePathBuf) -> Result<()> {
    let mut app = App::new(config, file)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match app.mode {
                Mode::ConfirmRestore(_) => match key.code {
                    KeyCode::Char('y') => app.confirm_restore(),
                    _ => app.cancel(),
                },
                Mode::Browse => match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
                    KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
                    KeyCode::Char('r') => app.request_restore(),
                    KeyCode::Char('g') => app.reload()?,
                    _ => {}
                },
            }
        }
    }
}

fn diff_line(line: &DiffLine) -> Line<'static> {
    let style = match line.kind {
        DiffKind::Added => Style::default().fg(Color::Green),
        DiffKind::Removed => Style::default().fg(Color::Red),
        DiffKind::Context => Style::default(),
    };
    Line::from(Span::styled(
        render_unified(std::slice::from_ref(line)),
        style,
    ))
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    // Commit list grouped by day
    let items: Vec<ListItem> = app
        .rows
        .iter()
        .map(|row| match row {
            Row::Day(label) => ListItem::new(Line::from(Span::styled(
                label.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))),
            Row::Commit(commit) => ListItem::new(Line::from(vec![
                Span::styled(
                    format!("  {} ", commit.date.with_timezone(&Local).format("%H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(format!("{} ", commit.message)),
                Span::styled(commit.author.clone(), Style::default().fg(Color::Cyan)),
            ])),
        })
        .collect();

    let title = format!("History: {}", app.file);
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));
    f.render_stateful_widget(list, chunks[0], &mut app.list_state);

    // Diff from the selected commit to the live file
    let content: Vec<Line> = if app.rows.is_empty() {
        vec![Line::from("No commits for this file yet")]
    } else if app.diff.iter().all(|line| line.kind == DiffKind::Context) {
        vec![Line::from("Live file matches this commit")]
    } else {
        app.diff.iter().map(diff_line).collect()
    };
    let diff_title = if app.minimized {
        "Changes since commit"
    } else {
        "Changes since commit (large file, not minimized)"
    };
    let diff =
        Paragraph::new(content).block(Block::default().borders(Borders::ALL).title(diff_title));
    f.render_widget(diff, chunks[1]);

    // Status / help line
    let footer = match (&app.mode, &app.status) {
        (Mode::ConfirmRestore(commit), _) => Line::from(Span::styled(
            format!(
                "Overwrite {} with {} ({})? y to confirm, any other key to cancel",
                app.file,
                commit.short_hash(),
                commit.message
            ),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        (Mode::Browse, Some(status)) => Line::from(status.clone()),
        (Mode::Browse, None) => Line::from(
            "q: Quit | ↑/k: Previous | ↓/j: Next | r: Restore selected | g: Reload",
        ),
    };
    f.render_widget(Paragraph::new(footer), rows[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_browse() {
        assert_eq!(
            parse_args(&args(&["notes", "journal/today.md"])),
            Some(Invocation::Browse {
                notes_path: Some(PathBuf::from("notes")),
                file: RelativePathBuf::from("journal/today.md"),
            })
        );
        assert_eq!(
            parse_args(&args(&["today.md"])),
            Some(Invocation::Browse {
                notes_path: None,
                file: RelativePathBuf::from("today.md"),
            })
        );
    }

    #[test]
    fn test_parse_commit() {
        assert_eq!(
            parse_args(&args(&["notes", "commit", "a.md", "first draft"])),
            Some(Invocation::Commit {
                notes_path: Some(PathBuf::from("notes")),
                file: RelativePathBuf::from("a.md"),
                message: "first draft".to_string(),
            })
        );
        assert_eq!(
            parse_args(&args(&["commit", "a.md", "msg"])),
            Some(Invocation::Commit {
                notes_path: None,
                file: RelativePathBuf::from("a.md"),
                message: "msg".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert_eq!(parse_args(&args(&[])), None);
        assert_eq!(parse_args(&args(&["a", "b", "c", "d", "e"])), None);
    }

    #[test]
    fn test_parse_commit_without_message() {
        assert_eq!(parse_args(&args(&["commit", "a.md"])), None);
        assert_eq!(parse_args(&args(&["notes", "commit"])), None);
        assert_eq!(parse_args(&args(&["commit"])), None);
    }

    #[test]
    fn test_browse_logs_only_warnings() {
        let browse = parse_args(&args(&["today.md"])).unwrap();
        let commit = parse_args(&args(&["commit", "a.md", "msg"])).unwrap();

        assert_eq!(browse.default_log_filter(), "warn");
        assert_eq!(commit.default_log_filter(), "info");
    }

    #[test]
    fn test_save_retries_once_after_delay() {
        let mut autosave = Autosave::new(Duration::from_secs(5));
        autosave.mark_dirty();
        let mut attempts = 0;
        let mut waits = Vec::new();

        let result = save_with_retry(
            &mut autosave,
            || {
                attempts += 1;
                if attempts == 1 { Err("disk full") } else { Ok(attempts) }
            },
            |delay| waits.push(delay),
        );

        assert_eq!(result, Ok(2));
        assert_eq!(waits, vec![Duration::from_secs(5)]);
        assert!(!autosave.has_unsaved_changes());
    }

    #[test]
    fn test_save_gives_up_after_retry() {
        let mut autosave = Autosave::new(Duration::from_secs(5));
        autosave.mark_dirty();
        let mut attempts = 0;

        let result: Result<(), &str> = save_with_retry(
            &mut autosave,
            || {
                attempts += 1;
                Err("offline")
            },
            |_| {},
        );

        assert_eq!(result, Err("offline"));
        assert_eq!(attempts, 2);
        assert!(autosave.has_unsaved_changes());
    }
}
