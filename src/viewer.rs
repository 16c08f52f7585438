use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};
use tracing::warn;

use crate::feed::{FeedController, FeedPhase, NavDirection};
use crate::models::VideoDescriptor;
use crate::player::Player;
use crate::preload::PreloadPool;
use crate::probe;
use crate::server_api;

const TICK: Duration = Duration::from_millis(100);
const STATUS_TTL: Duration = Duration::from_secs(4);

struct FetchResp {
    result: Result<Vec<VideoDescriptor>, String>,
}

/// Launch the feed viewer: spawn the fetch worker, drive the event loop,
/// and clean the clip cache up on exit.
pub fn run_viewer(server: String, cache_dir: PathBuf) -> Result<()> {
    let client = server_api::make_client()?;
    let greeting = server_api::hello(&client, &server);

    let (fetch_req_tx, fetch_req_rx) = unbounded::<()>();
    let (fetch_resp_tx, fetch_resp_rx) = unbounded::<FetchResp>();
    std::thread::spawn({
        let server = server.clone();
        move || {
            while fetch_req_rx.recv().is_ok() {
                let result =
                    server_api::fetch_videos(&client, &server).map_err(|e| format!("{e:#}"));
                if fetch_resp_tx.send(FetchResp { result }).is_err() {
                    break;
                }
            }
        }
    });

    let pool = PreloadPool::new(&server, cache_dir)?;
    let mut app = App::new(server, pool, fetch_req_tx, fetch_resp_rx);
    match greeting {
        Ok(_) => app.set_status("Connected to server"),
        Err(e) => app.set_status(format!("Server unreachable: {e:#}")),
    }
    app.kick_fetch();

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app);
    restore_terminal(&mut term)?;

    let _ = std::fs::remove_dir_all(app.pool.cache_dir());
    result
}

/// In-memory UI state: the feed, the preload window, and the playing clip.
pub(crate) struct App {
    server: String,
    feed: FeedController,
    pool: PreloadPool,
    player: Option<Player>,
    /// Cursor clip whose download has not finished yet.
    pending_url: Option<String>,
    /// Last chosen mute state, applied to every newly rendered clip.
    muted: bool,
    status: String,
    status_set: Option<Instant>,
    fetch_tx: Sender<()>,
    fetch_rx: Receiver<FetchResp>,
    last_tick: Instant,
}

impl App {
    fn new(
        server: String,
        pool: PreloadPool,
        fetch_tx: Sender<()>,
        fetch_rx: Receiver<FetchResp>,
    ) -> Self {
        Self {
            server,
            feed: FeedController::new(),
            pool,
            player: None,
            pending_url: None,
            muted: true, // autoplay starts muted
            status: String::new(),
            status_set: None,
            fetch_tx,
            fetch_rx,
            last_tick: Instant::now(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_set = Some(Instant::now());
    }

    fn kick_fetch(&mut self) {
        if self.feed.begin_fetch() && self.fetch_tx.send(()).is_err() {
            self.feed.fetch_failed();
            self.set_status("Fetch worker is not available");
        }
    }

    fn navigate(&mut self, direction: NavDirection) {
        if self.feed.navigate(direction, Instant::now()).is_some() {
            self.after_cursor_move();
        }
    }

    /// Runs after every cursor move: swap the shown clip, rebuild the
    /// preload window, and fetch more when near the end of the feed.
    fn after_cursor_move(&mut self) {
        self.render_current();
        self.maintain_window();
        if self.feed.needs_fetch() {
            self.kick_fetch();
        }
    }

    /// Swap playback to the clip at the cursor, reusing a preloaded file
    /// when one is ready.
    fn render_current(&mut self) {
        let current = self.feed.current().cloned();
        if let Some(old) = self.player.take() {
            if current.as_ref().map(|c| c.url.as_str()) == Some(old.descriptor.url.as_str()) {
                // Same clip again (end-of-feed loop): restart from the top.
                let mut player = old;
                player.position = 0.0;
                player.paused = false;
                self.player = Some(player);
                return;
            }
            let wanted = self.feed.preload_targets();
            let still_wanted = wanted.iter().any(|url| *url == old.descriptor.url);
            self.pool
                .give_back(old.descriptor.url, old.path, still_wanted);
        }

        let Some(current) = current else {
            self.pending_url = None;
            return;
        };
        if let Some(path) = self.pool.take_ready(&current.url) {
            self.start_player(current, path);
        } else {
            if self.pool.has_failed(&current.url) {
                self.pool.retry(&current.url);
            } else {
                self.pool.request(&current.url);
            }
            self.pending_url = Some(current.url);
        }
    }

    fn start_player(&mut self, descriptor: VideoDescriptor, path: PathBuf) {
        let duration = match probe::video_duration(&path) {
            Ok(duration) => Some(duration),
            Err(e) => {
                warn!("Duration probe failed for {}: {e:#}", descriptor.filename);
                None
            }
        };
        self.player = Some(Player::new(descriptor, path, duration, self.muted));
        self.pending_url = None;
    }

    fn maintain_window(&mut self) {
        let targets = self.feed.preload_targets();
        let current = self
            .player
            .as_ref()
            .map(|p| p.descriptor.url.clone())
            .or_else(|| self.pending_url.clone());
        self.pool.reconcile(&targets, current.as_deref());
    }

    fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        if let Some(player) = self.player.as_mut() {
            player.muted = self.muted;
        }
    }

    fn drain_channels(&mut self) {
        while let Ok(resp) = self.fetch_rx.try_recv() {
            match resp.result {
                Ok(batch) => {
                    let had_current = self.feed.current().is_some();
                    let appended = self.feed.apply_batch(batch);
                    if appended > 0 {
                        self.set_status(format!("Loaded {appended} new videos"));
                    }
                    if !had_current && self.feed.current().is_some() {
                        // First batch: start playback at the top.
                        self.after_cursor_move();
                    } else {
                        self.maintain_window();
                    }
                }
                Err(err) => {
                    self.feed.fetch_failed();
                    self.set_status(format!("Unable to load videos: {err}"));
                }
            }
        }

        loop {
            let done = match self.pool.done_rx.try_recv() {
                Ok(done) => done,
                Err(_) => break,
            };
            let url = done.url.clone();
            self.pool.note_done(done);
            if self.pending_url.as_deref() == Some(url.as_str()) {
                if let Some(path) = self.pool.take_ready(&url) {
                    if let Some(current) = self.feed.current().cloned() {
                        if current.url == url {
                            self.start_player(current, path);
                            continue;
                        }
                    }
                    // The cursor moved on while this was downloading.
                    self.pool.give_back(url, path, true);
                } else if self.pool.has_failed(&url) {
                    self.set_status("Unable to load video");
                    self.pending_url = None;
                }
            }
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick);
        self.last_tick = now;

        let ended = match self.player.as_mut() {
            Some(player) => {
                player.tick(dt);
                player.ended()
            }
            None => false,
        };
        if ended && self.feed.advance_on_ended().is_some() {
            if self.feed.needs_fetch() {
                self.kick_fetch();
            }
            self.render_current();
            self.maintain_window();
        }

        if let Some(set) = self.status_set {
            if now.duration_since(set) >= STATUS_TTL {
                self.status.clear();
                self.status_set = None;
            }
        }
    }
}

fn ui_loop(
    term: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        term.draw(|f| draw(f, app)).context("draw frame")?;

        if event::poll(TICK).context("poll terminal events")? {
            match event::read().context("read terminal event")? {
                CEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Up | KeyCode::Char('k') => app.navigate(NavDirection::Prev),
                    KeyCode::Down | KeyCode::Char('j') => app.navigate(NavDirection::Next),
                    KeyCode::Char(' ') => {
                        if let Some(player) = app.player.as_mut() {
                            player.toggle_pause();
                        }
                    }
                    KeyCode::Char('m') => app.toggle_mute(),
                    KeyCode::Char('r') => app.kick_fetch(),
                    _ => {}
                },
                CEvent::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.navigate(NavDirection::Prev),
                    MouseEventKind::ScrollDown => app.navigate(NavDirection::Next),
                    _ => {}
                },
                _ => {}
            }
        }

        app.drain_channels();
        app.tick();
    }
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(3),
        ])
        .split(f.area());

    let header = Paragraph::new(Line::from(format!("Video Reels  →  {}", app.server)))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let body = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} / {} ", app.feed.cursor() + 1, app.feed.len()));
    let inner = body.inner(chunks[1]);
    f.render_widget(body, chunks[1]);

    match (&app.player, app.feed.phase()) {
        (Some(player), _) => {
            let state = match (player.paused, player.muted) {
                (true, true) => "[paused] [muted]",
                (true, false) => "[paused]",
                (false, true) => "[playing] [muted]",
                (false, false) => "[playing]",
            };
            let lines = vec![
                Line::styled(
                    player.descriptor.team_name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Line::from(player.descriptor.description.clone()),
                Line::styled(
                    player.descriptor.filename.clone(),
                    Style::default().fg(Color::DarkGray),
                ),
                Line::from(state),
            ];
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4), Constraint::Length(1)])
                .split(inner);
            f.render_widget(Paragraph::new(lines), rows[0]);

            let (ratio, label) = match player.progress() {
                Some(ratio) => {
                    let total = player.duration.unwrap_or(0.0);
                    (ratio, format!("{:.0}s / {:.0}s", player.position, total))
                }
                None => (0.0, "duration unknown".to_string()),
            };
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio(ratio.clamp(0.0, 1.0))
                .label(label);
            f.render_widget(gauge, rows[1]);
        }
        (None, FeedPhase::Empty) => {
            let placeholder = Paragraph::new("Server unable to load videos")
                .style(Style::default().fg(Color::Red))
                .alignment(Alignment::Center);
            f.render_widget(placeholder, inner);
        }
        (None, _) => {
            let label = if app.pending_url.is_some() {
                "Buffering…"
            } else {
                "Loading…"
            };
            let placeholder = Paragraph::new(label).alignment(Alignment::Center);
            f.render_widget(placeholder, inner);
        }
    }

    let footer_text = if app.status.is_empty() {
        "↑/↓ navigate · space pause · m mute · r refresh · q quit".to_string()
    } else {
        app.status.clone()
    };
    let footer = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture).ok();
    terminal.show_cursor().ok();
    Ok(())
}
