// Main TUI application using ratatui
// Handles the terminal interface, gesture mapping, and display of the feed
// and the admin panel

use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::FeedConfig;
use crate::feed::navigator::{Haptics, NavigationOutcome};
use crate::feed::page::{FeedPage, TapTarget};
use crate::feed::registry::{VideoRecord, VideoRegistry};
use crate::feed::storage::KeyValueStore;
use crate::feed::viewport::ScrollViewport;
use crate::player::hls::{HlsSurface, StreamEvent, StreamSummary};
use crate::ui::admin::AdminPanel;

const FRAME_BUDGET: Duration = Duration::from_millis(16);
const MUTE_BUTTON_WIDTH: u16 = 9;
// A press that travels fewer rows than this and triggers nothing is a tap.
const TAP_SLOP_ROWS: u16 = 1;

enum AppMode {
    Feed,
    Admin,
}

struct Press {
    column: u16,
    row: u16,
    navigated: bool,
}

/// Terminal bell as the haptic channel; the pulse length cannot be honoured.
struct TerminalBell;

impl Haptics for TerminalBell {
    fn pulse(&mut self, _duration: Duration) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

pub struct FeedApp {
    config: FeedConfig,
    registry: VideoRegistry<Box<dyn KeyValueStore>>,
    feed: FeedPage<HlsSurface>,
    admin: AdminPanel,
    mode: AppMode,
    should_quit: bool,
    stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
    status_message: String,
    press: Option<Press>,
    feed_area: Rect,
}

impl FeedApp {
    pub fn new(config: FeedConfig, registry: VideoRegistry<Box<dyn KeyValueStore>>) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();

        let client = reqwest::Client::new();
        let max_bandwidth = config.max_bandwidth;
        let make_surface = Box::new(move |video: &VideoRecord| {
            HlsSurface::new(video.id.clone(), client.clone(), stream_tx.clone(), max_bandwidth)
        });

        // Real size arrives with the first draw.
        let feed_area = Rect::new(0, 0, 80, 23);
        let mut feed = FeedPage::new(&config, feed_area.height as f64 * config.cell_height_px, make_surface);
        if config.haptic_bell {
            feed = feed.with_haptics(Box::new(TerminalBell));
        }

        FeedApp {
            config,
            registry,
            feed,
            admin: AdminPanel::new(),
            mode: AppMode::Feed,
            should_quit: false,
            stream_rx,
            status_message: String::new(),
            press: None,
            feed_area,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        loop {
            self.layout(terminal.size()?);
            if matches!(self.mode, AppMode::Feed) {
                self.feed.sync(self.registry.videos(), Instant::now());
            }

            while let Ok(event) = self.stream_rx.try_recv() {
                self.apply_stream_event(event);
            }

            terminal.draw(|f| self.draw_ui(f))?;

            if event::poll(FRAME_BUDGET)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }

            if self.should_quit {
                break;
            }

            // Let manifest loads make progress between frames.
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn layout(&mut self, size: Rect) {
        // Last row is the controls footer.
        let feed_area = Rect::new(size.x, size.y, size.width, size.height.saturating_sub(1));
        if feed_area != self.feed_area {
            self.feed_area = feed_area;
            self.feed.resize(feed_area.height as f64 * self.config.cell_height_px);
        }
    }

    fn apply_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Ready { key, generation, summary } => {
                let Some(controller) = self.feed.controller_mut(&key) else {
                    return;
                };
                if controller.surface_mut().mark_ready(generation, summary) {
                    tracing::info!(id = %key, "stream ready");
                    controller.on_ready();
                }
            }
            StreamEvent::Failed { key, generation, reason } => {
                // Not shown to the user: the item simply stays paused.
                let current = self
                    .feed
                    .controller(&key)
                    .map_or(false, |c| c.surface().is_current(generation));
                if current {
                    tracing::warn!(id = %key, reason = %reason, "stream failed to load");
                }
            }
        }
    }

    fn draw_ui(&self, frame: &mut Frame) {
        match self.mode {
            AppMode::Feed => self.draw_feed(frame),
            AppMode::Admin => self.draw_admin(frame),
        }
    }

    // ==========================================
    // FEED VIEW
    // ==========================================

    fn draw_feed(&self, frame: &mut Frame) {
        let area = self.feed_area;
        let videos = self.registry.videos();

        if videos.is_empty() {
            let empty = Paragraph::new("No videos available. Check back later!")
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Feed"));
            frame.render_widget(empty, area);
        } else {
            let current = self.feed.current_index();
            let first = current.saturating_sub(1);
            let last = (current + 1).min(videos.len() - 1);
            for index in first..=last {
                if let Some((rect, skip)) = self.item_rect(index) {
                    self.draw_item(frame, index, &videos[index], rect, skip);
                }
            }
        }

        if frame.size().height <= area.height {
            return;
        }
        let footer = Rect::new(area.x, area.y + area.height, area.width, 1);
        let text = if self.status_message.is_empty() {
            "[↑/↓/wheel/drag]Next/Prev [Space/click]Play/Pause [m]Mute [o]Open [Tab]Admin [q]Quit".to_string()
        } else {
            self.status_message.clone()
        };
        frame.render_widget(Paragraph::new(text).style(Style::default().fg(Color::DarkGray)), footer);
    }

    /// Where item `index` sits on screen right now, clipped to the feed area,
    /// plus how many of its rows are hidden above the top edge.
    fn item_rect(&self, index: usize) -> Option<(Rect, u16)> {
        let area = self.feed_area;
        let cell = self.config.cell_height_px;
        let viewport = self.feed.viewport();
        if area.height == 0 || cell <= 0.0 {
            return None;
        }

        let top_px = index as f64 * viewport.viewport_height() - viewport.scroll_top();
        let top_row = (top_px / cell).round() as i32;
        let height = area.height as i32;

        let visible_top = top_row.max(0);
        let visible_bottom = (top_row + height).min(height);
        if visible_bottom <= visible_top {
            return None;
        }

        let rect = Rect::new(
            area.x,
            area.y + visible_top as u16,
            area.width,
            (visible_bottom - visible_top) as u16,
        );
        Some((rect, (visible_top - top_row) as u16))
    }

    fn mute_button_rect(item: Rect) -> Rect {
        let width = MUTE_BUTTON_WIDTH.min(item.width.saturating_sub(2));
        Rect::new(
            item.x + item.width.saturating_sub(width + 1),
            item.y + 1,
            width,
            1.min(item.height.saturating_sub(2)),
        )
    }

    fn draw_item(&self, frame: &mut Frame, index: usize, video: &VideoRecord, rect: Rect, skip: u16) {
        let total = self.registry.len();
        let controller = self.feed.controller(&video.id);
        let state = controller.map(|c| c.state());
        let surface = controller.map(|c| c.surface());
        let now = Instant::now();

        let indicator = match state {
            Some(s) if s.is_playing => "▶ Playing".to_string(),
            _ => "⏸  Paused - tap or press Space to play".to_string(),
        };

        let stream_line = match surface {
            Some(s) if s.is_loading() => "Loading stream...".to_string(),
            Some(s) => match s.summary() {
                Some(summary) => Self::describe_stream(summary),
                None => String::new(),
            },
            None => String::new(),
        };

        let time_line = match (surface, surface.and_then(|s| s.summary())) {
            (Some(s), Some(summary)) if summary.duration > 0.0 => format!(
                "{} / {}",
                Self::format_time(s.position(now)),
                Self::format_time(summary.duration)
            ),
            (Some(s), _) => Self::format_time(s.position(now)),
            _ => String::new(),
        };

        let added = chrono::DateTime::from_timestamp_millis(video.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        // Vertically centre the six content lines inside the borders.
        let padding = (self.feed_area.height as usize).saturating_sub(2 + 6) / 2;
        let mut lines = vec![String::new(); padding];
        lines.push(indicator);
        lines.push(String::new());
        lines.push(video.url.clone());
        lines.push(stream_line);
        lines.push(time_line);
        lines.push(format!("Added {}", added));

        let title_style = if self.feed.is_active(index) {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        // Hidden rows above the screen include the top border when skip > 0.
        let borders = if skip > 0 {
            Borders::LEFT | Borders::RIGHT | Borders::BOTTOM
        } else {
            Borders::ALL
        };
        let body = Paragraph::new(lines.join("\n"))
            .alignment(Alignment::Center)
            .scroll((skip.saturating_sub(1), 0))
            .block(
                Block::default()
                    .borders(borders)
                    .title(format!(" {}/{} ", index + 1, total))
                    .title_style(title_style),
            );
        frame.render_widget(body, rect);

        if skip == 0 {
            let muted = state.map_or(true, |s| s.is_muted);
            let label = if muted { "[muted]" } else { "[sound]" };
            let button = Paragraph::new(label)
                .alignment(Alignment::Right)
                .style(Style::default().fg(Color::Cyan));
            frame.render_widget(button, Self::mute_button_rect(rect));
        }
    }

    fn describe_stream(summary: &StreamSummary) -> String {
        let mut parts = Vec::new();
        if let Some(variant) = &summary.variant {
            if let Some((w, h)) = variant.resolution {
                parts.push(format!("{}x{}", w, h));
            }
            parts.push(format!("{:.1} Mbps", variant.bandwidth as f64 / 1_000_000.0));
        }
        parts.push(format!("{} segments", summary.segment_count));
        parts.join(" · ")
    }

    fn format_time(seconds: f64) -> String {
        let mins = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{:02}:{:02}", mins, secs)
    }

    // ==========================================
    // ADMIN VIEW
    // ==========================================

    fn draw_admin(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(frame.size());

        let input = Paragraph::new(format!("{}_", self.admin.input()))
            .block(Block::default().borders(Borders::ALL).title("Enter HLS (.m3u8) video URL"));
        frame.render_widget(input, chunks[0]);

        let items: Vec<ListItem> = self
            .registry
            .videos()
            .iter()
            .enumerate()
            .map(|(i, video)| {
                let style = if i == self.admin.selected() {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(video.url.clone()).style(style)
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Video List ({})", self.registry.len())),
        );
        frame.render_widget(list, chunks[1]);

        let help = if self.status_message.is_empty() {
            "[Enter]Add video [↑/↓]Select [Del]Remove selected [Esc/Tab]Back to feed".to_string()
        } else {
            self.status_message.clone()
        };
        let footer = Paragraph::new(help)
            .block(Block::default().borders(Borders::ALL).title("Video Admin Panel"));
        frame.render_widget(footer, chunks[2]);
    }

    // ==========================================
    // INPUT
    // ==========================================

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        self.status_message.clear();

        match self.mode {
            AppMode::Feed => self.handle_feed_key(key.code),
            AppMode::Admin => self.handle_admin_key(key.code),
        }
    }

    fn handle_feed_key(&mut self, key: KeyCode) {
        let now = Instant::now();
        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.feed.unmount_all();
                self.mode = AppMode::Admin;
            }
            KeyCode::Up => {
                let outcome = self.feed.key("ArrowUp", now);
                self.report(outcome);
            }
            KeyCode::Down => {
                let outcome = self.feed.key("ArrowDown", now);
                self.report(outcome);
            }
            KeyCode::Char(' ') => self.feed.tap(self.registry.videos(), TapTarget::Surface),
            KeyCode::Char('m') => self.feed.tap(self.registry.videos(), TapTarget::MuteButton),
            KeyCode::Char('o') => self.open_current(),
            _ => {}
        }
    }

    fn handle_admin_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Tab => self.mode = AppMode::Feed,
            KeyCode::Char(c) => self.admin.push_char(c),
            KeyCode::Backspace => self.admin.backspace(),
            KeyCode::Enter => match self.admin.submit(&mut self.registry) {
                Some(record) => {
                    self.status_message = format!("Added '{}' ({} total)", record.url, self.registry.len());
                }
                None => self.status_message = "Enter a URL first".to_string(),
            },
            KeyCode::Up => self.admin.select_previous(self.registry.len()),
            KeyCode::Down => self.admin.select_next(self.registry.len()),
            KeyCode::Delete => {
                if let Some(record) = self.admin.delete_selected(&mut self.registry) {
                    self.status_message = format!("Removed '{}'", record.url);
                }
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(self.mode, AppMode::Feed) {
            return;
        }

        let now = Instant::now();
        let y = mouse.row as f64 * self.config.cell_height_px;
        match mouse.kind {
            MouseEventKind::ScrollDown => {
                let outcome = self.feed.wheel(1.0, now);
                self.report(outcome);
            }
            MouseEventKind::ScrollUp => {
                let outcome = self.feed.wheel(-1.0, now);
                self.report(outcome);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                self.feed.touch_start(y, now);
                self.press = Some(Press {
                    column: mouse.column,
                    row: mouse.row,
                    navigated: false,
                });
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let outcome = self.feed.touch_move(y, now);
                if outcome.consumes_event() {
                    if let Some(press) = self.press.as_mut() {
                        press.navigated = true;
                    }
                }
                self.report(outcome);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.feed.touch_end();
                if let Some(press) = self.press.take() {
                    if !press.navigated && press.row.abs_diff(mouse.row) < TAP_SLOP_ROWS {
                        self.click(press.column, press.row);
                    }
                }
            }
            _ => {}
        }
    }

    fn click(&mut self, column: u16, row: u16) {
        let Some((rect, skip)) = self.item_rect(self.feed.current_index()) else {
            return;
        };
        let button = Self::mute_button_rect(rect);
        let on_button = skip == 0
            && row == button.y
            && column >= button.x
            && column < button.x + button.width;

        let target = if on_button {
            TapTarget::MuteButton
        } else {
            TapTarget::Surface
        };
        self.feed.tap(self.registry.videos(), target);
    }

    fn report(&mut self, outcome: NavigationOutcome) {
        if let NavigationOutcome::Navigated { to, .. } = outcome {
            self.status_message = format!("Video {}/{}", to + 1, self.registry.len());
        }
    }

    fn open_current(&mut self) {
        let Some(video) = self.registry.get(self.feed.current_index()) else {
            return;
        };
        if let Err(e) = open::that(&video.url) {
            tracing::warn!(url = %video.url, error = %e, "could not open stream externally");
            self.status_message = format!("Failed to open: {}", e);
        }
    }
}
