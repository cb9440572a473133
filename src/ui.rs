use crate::buckets::WeightBucket;
use crate::commands::{generate_id, today};
use crate::config::Config;
use crate::context::{
    GanttProvider, ProviderProps, ScrollBehavior, ScrollContainer, TimelineContext,
};
use crate::events::GanttEvent;
use crate::item::{
    add_item_at, move_event, BarGeometry, BarStyle, DragController, Interaction,
};
use crate::layout::{header_columns, row_at, select_row, sidebar_rows};
use crate::model::{Feature, FeatureSet};
use crate::section::{self, RankedFeature};
use crate::storage::{save_features, FeatureLocation};
use crate::today::TodayMarker;
use anyhow::Result;
use chrono::NaiveDate;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{debug, info, trace};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(50);
const ZOOM_STEP: u32 = 25;
const MIN_ZOOM: u32 = 25;
const MAX_ZOOM: u32 = 400;
/// Share of the remaining distance a smooth scroll covers per tick.
const SMOOTH_FACTOR: f64 = 0.35;

pub fn run(
    set: FeatureSet,
    location: FeatureLocation,
    config: Config,
    props: ProviderProps,
) -> Result<()> {
    let mut app = App::new(set, location, config, props)?;
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    set: FeatureSet,
    location: FeatureLocation,
    config: Config,
    props: ProviderProps,
    provider: GanttProvider,
    rows: Vec<RankedFeature>,
    viewport: Viewport,
    drag: DragController,
    selected: usize,
    row_offset: usize,
    today: Option<TodayMarker>,
    last_save: Instant,
    status: String,
    mode: Mode,
    sidebar_area: Rect,
    body_area: Rect,
}

enum Mode {
    Normal,
    Detail { feature_id: String },
    Adding(AddForm),
}

struct AddForm {
    name: FieldValue,
    start_at: NaiveDate,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

/// Horizontal scroll state of the timeline body. Smooth scrolls ease toward
/// their target a bit every tick; a new call simply retargets.
#[derive(Debug, Default)]
struct Viewport {
    left: f64,
    target: Option<f64>,
    max_left: f64,
}

impl Viewport {
    fn clamp(&self, x: f64) -> f64 {
        x.clamp(0.0, self.max_left)
    }

    fn set_max_left(&mut self, max_left: f64) {
        self.max_left = max_left.max(0.0);
        self.left = self.clamp(self.left);
        self.target = self.target.map(|t| self.clamp(t));
    }

    /// Returns true when the position moved.
    fn tick(&mut self) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        let remaining = target - self.left;
        if remaining.abs() < 0.5 {
            self.left = target;
            self.target = None;
        } else {
            self.left += remaining * SMOOTH_FACTOR;
        }
        true
    }

    fn destination(&self) -> f64 {
        self.target.unwrap_or(self.left)
    }
}

impl ScrollContainer for Viewport {
    fn scroll_left(&self) -> f64 {
        self.left
    }

    fn scroll_to(&mut self, left: f64, behavior: ScrollBehavior) {
        let left = self.clamp(left);
        match behavior {
            ScrollBehavior::Smooth => self.target = Some(left),
            ScrollBehavior::Instant => {
                self.left = left;
                self.target = None;
            }
        }
    }
}

/// One line of terminal cells, drawn into by column and turned into spans.
struct CellRow {
    cells: Vec<(char, Style)>,
}

impl CellRow {
    fn new(width: usize, fill: char, style: Style) -> Self {
        CellRow {
            cells: vec![(fill, style); width],
        }
    }

    fn width(&self) -> i64 {
        self.cells.len() as i64
    }

    fn put(&mut self, col: i64, ch: char, style: Style) {
        if let Some(cell) = usize::try_from(col).ok().and_then(|c| self.cells.get_mut(c)) {
            *cell = (ch, style);
        }
    }

    fn put_str(&mut self, col: i64, text: &str, style: Style, max: usize) {
        for (i, ch) in text.chars().take(max).enumerate() {
            let at = col.saturating_add(i as i64);
            if at >= self.width() {
                break;
            }
            self.put(at, ch, style);
        }
    }

    fn into_line(self) -> Line<'static> {
        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut current = String::new();
        let mut current_style: Option<Style> = None;
        for (ch, style) in self.cells {
            if current_style != Some(style) {
                if let Some(prev) = current_style {
                    spans.push(Span::styled(std::mem::take(&mut current), prev));
                }
                current_style = Some(style);
            }
            current.push(ch);
        }
        if let Some(style) = current_style {
            spans.push(Span::styled(current, style));
        }
        Line::from(spans)
    }
}

impl App {
    fn new(
        set: FeatureSet,
        location: FeatureLocation,
        config: Config,
        props: ProviderProps,
    ) -> Result<Self> {
        let mut provider = GanttProvider::new();
        provider.mount(today(), props)?;
        for (name, value) in provider.use_gantt()?.css_variables() {
            debug!("{}: {}", name, value);
        }
        let (_, rows) = section::rank(&set.features, config.weight_key.as_deref());
        let status = format!("Loaded {} features from {}", rows.len(), location.path.display());
        Ok(App {
            set,
            location,
            config,
            props,
            provider,
            rows,
            viewport: Viewport::default(),
            drag: DragController::new(),
            selected: 0,
            row_offset: 0,
            today: None,
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
            sidebar_area: Rect::default(),
            body_area: Rect::default(),
        })
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if self.today.is_none() {
                // after the first frame, so the body width is known
                self.place_today();
            }
            self.animate_scroll();
            if event::poll(TICK)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn place_today(&mut self) {
        let Ok(ctx) = self.provider.use_gantt() else {
            return;
        };
        let marker = TodayMarker::compute(ctx, today());
        let lead = self.body_area.width as f64 / 3.0;
        self.viewport
            .scroll_to(marker.left - lead, ScrollBehavior::Instant);
        debug!("today marker at {:.1}", marker.left);
        self.today = Some(marker);
    }

    fn animate_scroll(&mut self) {
        if !self.viewport.tick() {
            return;
        }
        if let Ok(ctx) = self.provider.use_gantt_mut() {
            if ctx.on_scroll(self.viewport.scroll_left(), Instant::now()) {
                trace!("scroll handled at {:?}", ctx.last_handled_scroll());
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Detail { .. } => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('o')
                ) {
                    self.mode = Mode::Normal;
                }
                Ok(false)
            }
            Mode::Adding(_) => self.handle_form_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Up | KeyCode::Char('k') => self.prev_row(),
            KeyCode::Down | KeyCode::Char('j') => self.next_row(),
            KeyCode::Left | KeyCode::Char('h') => self.pan(-1.0),
            KeyCode::Right | KeyCode::Char('l') => self.pan(1.0),
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom_by(ZOOM_STEP as i64)?,
            KeyCode::Char('-') => self.zoom_by(-(ZOOM_STEP as i64))?,
            KeyCode::Char('r') => self.change_range(true)?,
            KeyCode::Char('R') => self.change_range(false)?,
            KeyCode::Char('t') => self.scroll_to_today(),
            KeyCode::Char('M') => self.remount()?,
            KeyCode::Char('>') => self.nudge_selected(1.0)?,
            KeyCode::Char('<') => self.nudge_selected(-1.0)?,
            KeyCode::Enter => {
                if let Some(row) = self.rows.get(self.selected) {
                    let event = GanttEvent::SelectItem(row.feature.id.clone());
                    self.dispatch(event)?;
                }
            }
            KeyCode::Char('o') | KeyCode::Char(' ') => {
                if let Some(row) = self.rows.get(self.selected) {
                    let event = GanttEvent::Click(row.feature.id.clone());
                    self.dispatch(event)?;
                }
            }
            KeyCode::Char('a') => self.dispatch(GanttEvent::AddItem(today()))?,
            KeyCode::Esc => {
                if self.drag.is_active() {
                    self.drag.cancel();
                    self.status = "Drag cancelled".into();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let Mode::Adding(mut form) = std::mem::replace(&mut self.mode, Mode::Normal) else {
            return Ok(false);
        };
        match key.code {
            KeyCode::Esc => {
                self.status = "Add cancelled".into();
                return Ok(false);
            }
            KeyCode::Enter => {
                if self.create_feature(&form)? {
                    return Ok(false);
                }
            }
            KeyCode::Left => form.name.move_left(),
            KeyCode::Right => form.name.move_right(),
            KeyCode::Backspace => form.name.backspace(),
            KeyCode::Char(ch) => form.name.insert_char(ch),
            _ => {}
        }
        self.mode = Mode::Adding(form);
        Ok(false)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        if !matches!(self.mode, Mode::Normal) {
            return Ok(());
        }
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(mouse.column, mouse.row),
            MouseEventKind::Drag(MouseButton::Left) => {
                let x = self.body_x(mouse.column);
                self.drag.pointer_move(x);
                None
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let x = self.body_x(mouse.column);
                match self.provider.use_gantt() {
                    Ok(ctx) => self.drag.pointer_up(ctx, x),
                    Err(_) => None,
                }
            }
            MouseEventKind::ScrollDown => {
                self.next_row();
                None
            }
            MouseEventKind::ScrollUp => {
                self.prev_row();
                None
            }
            MouseEventKind::ScrollRight => {
                self.pan(1.0);
                None
            }
            MouseEventKind::ScrollLeft => {
                self.pan(-1.0);
                None
            }
            _ => None,
        };
        if let Some(event) = event {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn pointer_down(&mut self, column: u16, row: u16) -> Option<GanttEvent> {
        let ctx = self.provider.use_gantt().ok()?;
        if contains(self.sidebar_area, column, row) {
            let y = self.content_y(ctx, row - self.sidebar_area.y)?;
            let idx = row_at(ctx, y, self.rows.len())?;
            return sidebar_rows(ctx, self.rows.iter().map(|r| &r.feature))
                .get(idx)
                .map(select_row);
        }
        if !contains(self.body_area, column, row) {
            return None;
        }
        let x = self.body_x(column);
        let y = self.content_y(ctx, row - self.body_area.y)?;
        if let Some(idx) = row_at(ctx, y, self.rows.len()) {
            self.selected = idx;
            let feature = &self.rows[idx].feature;
            if self
                .drag
                .pointer_down(ctx, feature, self.config.interaction(), x)
            {
                return None;
            }
        }
        add_item_at(ctx, x)
    }

    /// Timeline x under a screen column. Not clamped to the body, so drags
    /// can continue past its edges.
    fn body_x(&self, column: u16) -> f64 {
        column as f64 - self.body_area.x as f64 + self.viewport.scroll_left()
    }

    /// Timeline y for a screen line relative to the top of the panel. The
    /// header stays fixed while rows scroll underneath it.
    fn content_y(&self, ctx: &TimelineContext, line: u16) -> Option<f64> {
        let layout = ctx.layout();
        let line = line as f64;
        if line < layout.header_height {
            return None;
        }
        Some(line + self.row_offset as f64 * layout.row_height)
    }

    fn dispatch(&mut self, event: GanttEvent) -> Result<()> {
        debug!("timeline event {:?}", event);
        match event {
            GanttEvent::Move {
                id,
                start_at,
                end_at,
            } => {
                self.set.move_feature(&id, start_at, end_at)?;
                let name = self.set.find(&id).map(|f| f.name.clone()).unwrap_or(id);
                self.persist(format!("Moved {} to {}", name, start_at))?;
            }
            GanttEvent::Click(id) => {
                self.mode = Mode::Detail { feature_id: id };
            }
            GanttEvent::SelectItem(id) => {
                if let Some(idx) = self.rows.iter().position(|r| r.feature.id == id) {
                    self.selected = idx;
                }
                self.scroll_to_feature(&id);
            }
            GanttEvent::AddItem(start_at) => {
                self.mode = Mode::Adding(AddForm {
                    name: FieldValue::new(""),
                    start_at,
                });
                self.status = format!("New feature on {} (Enter save, Esc cancel)", start_at);
            }
        }
        Ok(())
    }

    fn scroll_to_feature(&mut self, id: &str) {
        let Ok(ctx) = self.provider.use_gantt() else {
            return;
        };
        let Some(row) = self.rows.iter().find(|r| r.feature.id == id) else {
            return;
        };
        if let Some(target) = ctx.scroll_to_feature(&row.feature, Some(&mut self.viewport)) {
            self.status = format!("{} starts {}", row.feature.name, row.feature.start_at);
            debug!("scroll target {:.1}", target);
        }
    }

    fn scroll_to_today(&mut self) {
        let Some(marker) = &self.today else {
            return;
        };
        let lead = self.body_area.width as f64 / 3.0;
        self.viewport
            .scroll_to(marker.left - lead, ScrollBehavior::Smooth);
        self.status = marker.label.clone();
    }

    fn pan(&mut self, columns: f64) {
        let Ok(ctx) = self.provider.use_gantt() else {
            return;
        };
        let step = ctx.scaled_column_width();
        let target = self.viewport.destination() + columns * step;
        self.viewport.scroll_to(target, ScrollBehavior::Smooth);
    }

    /// Re-syncs zoom with the provider, keeping the date at the left edge in
    /// place.
    fn zoom_by(&mut self, delta: i64) -> Result<()> {
        let zoom = (self.props.zoom as i64 + delta).clamp(MIN_ZOOM as i64, MAX_ZOOM as i64) as u32;
        if zoom == self.props.zoom {
            return Ok(());
        }
        let anchor = self.left_edge_date();
        self.provider.set_zoom(zoom)?;
        self.props.zoom = zoom;
        self.restore_left_edge(anchor);
        self.status = format!("Zoom {}%", zoom);
        Ok(())
    }

    fn change_range(&mut self, forward: bool) -> Result<()> {
        let range = if forward {
            self.props.range.next()
        } else {
            self.props.range.prev()
        };
        let anchor = self.left_edge_date();
        self.provider.set_range(range)?;
        self.props.range = range;
        self.restore_left_edge(anchor);
        self.status = format!("Range {}", range);
        Ok(())
    }

    fn left_edge_date(&self) -> Option<NaiveDate> {
        self.provider
            .use_gantt()
            .ok()
            .and_then(|ctx| ctx.date_at(self.viewport.scroll_left()))
    }

    fn restore_left_edge(&mut self, anchor: Option<NaiveDate>) {
        let Ok(ctx) = self.provider.use_gantt() else {
            return;
        };
        if let Some(date) = anchor {
            self.viewport
                .set_max_left(body_max_left(ctx, self.body_area.width));
            self.viewport
                .scroll_to(ctx.offset_of(date), ScrollBehavior::Instant);
        }
        self.today = self
            .today
            .as_ref()
            .map(|marker| TodayMarker::compute(ctx, marker.date));
    }

    /// Drops the coordinate state and mounts afresh so the origin follows
    /// the current date.
    fn remount(&mut self) -> Result<()> {
        if self.provider.is_mounted() {
            self.provider.unmount();
        }
        self.drag.cancel();
        self.provider.mount(today(), self.props)?;
        self.today = None;
        let origin = self.provider.use_gantt()?.timeline_start();
        info!("timeline remounted with origin {}", origin);
        self.status = format!("Timeline origin {}", origin);
        Ok(())
    }

    fn nudge_selected(&mut self, columns: f64) -> Result<()> {
        if self.config.interaction() != Interaction::Drag {
            self.status = "Moving is disabled in click mode".into();
            return Ok(());
        }
        let event = {
            let Ok(ctx) = self.provider.use_gantt() else {
                return Ok(());
            };
            let Some(row) = self.rows.get(self.selected) else {
                return Ok(());
            };
            let feature = &row.feature;
            let target = ctx.offset_of(feature.start_at) + columns * ctx.scaled_column_width();
            ctx.date_at(target).and_then(|start| {
                move_event(feature.id.clone(), feature.start_at, feature.end_at, start)
            })
        };
        if let Some(event) = event {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn create_feature(&mut self, form: &AddForm) -> Result<bool> {
        let name = form.name.value.trim();
        if name.is_empty() {
            self.status = "A name is required".into();
            return Ok(false);
        }
        let feature = Feature::new(generate_id(), name.to_string(), form.start_at);
        let id = feature.id.clone();
        self.set.add(feature)?;
        self.persist(format!("Added {} on {}", name, form.start_at))?;
        if let Some(idx) = self.rows.iter().position(|r| r.feature.id == id) {
            self.selected = idx;
        }
        Ok(true)
    }

    fn prev_row(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn next_row(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    fn persist(&mut self, message: impl Into<String>) -> Result<()> {
        save_features(&self.location, &self.set)?;
        self.last_save = Instant::now();
        self.status = message.into();
        let selected_id = self.rows.get(self.selected).map(|r| r.feature.id.clone());
        let (_, rows) = section::rank(&self.set.features, self.config.weight_key.as_deref());
        self.rows = rows;
        if let Some(id) = selected_id {
            if let Some(idx) = self.rows.iter().position(|r| r.feature.id == id) {
                self.selected = idx;
            }
        }
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
        Ok(())
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_timeline(f, layout[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Detail { feature_id } => self.draw_detail(f, feature_id),
            Mode::Adding(form) => self.draw_add_form(f, form),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let mut spans = vec![
            Span::styled(
                "ganttline ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(&self.set.name, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(self.location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
        ];
        if let Ok(ctx) = self.provider.use_gantt() {
            spans.extend([
                Span::raw("  •  "),
                Span::styled(
                    format!("{} @ {}%", ctx.range(), ctx.zoom()),
                    Style::default().fg(Color::Magenta),
                ),
                Span::raw("  •  "),
                Span::styled(
                    format!("origin {}", ctx.timeline_start()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
        }
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_timeline(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let Ok(ctx) = self.provider.use_gantt() else {
            let msg = Paragraph::new("Timeline not mounted (press M)")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(msg, area);
            return;
        };
        let layout = ctx.layout();
        let sidebar_width = (layout.sidebar_width.round() as u16).min(area.width / 2);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(sidebar_width), Constraint::Min(10)])
            .split(area);
        self.sidebar_area = chunks[0];
        self.body_area = chunks[1];

        self.viewport
            .set_max_left(body_max_left(ctx, self.body_area.width));
        let header_lines = cells(layout.header_height) as u16;
        let row_lines = cells(layout.row_height);
        let visible = (area.height.saturating_sub(header_lines) as usize) / row_lines;
        self.row_offset = adjust_offset(self.selected, self.row_offset, visible, 1, self.rows.len());

        let sidebar = Paragraph::new(self.sidebar_lines(ctx, self.sidebar_area)).block(
            Block::default()
                .borders(Borders::RIGHT)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(sidebar, self.sidebar_area);
        f.render_widget(Paragraph::new(self.body_lines(ctx, self.body_area)), self.body_area);
    }

    fn sidebar_lines(&self, ctx: &TimelineContext, area: Rect) -> Vec<Line<'static>> {
        let layout = ctx.layout();
        let width = area.width.saturating_sub(1) as usize;
        let header_lines = cells(layout.header_height);
        let mut lines = vec![Line::from(""); header_lines];
        lines[0] = Line::from(Span::styled(
            format!("Features ({})", self.rows.len()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        if header_lines > 1 {
            lines[header_lines - 1] = Line::from(Span::styled(
                "─".repeat(width),
                Style::default().fg(Color::DarkGray),
            ));
        }
        let rows = sidebar_rows(ctx, self.rows.iter().map(|r| &r.feature));
        for (idx, (row, ranked)) in rows.iter().zip(&self.rows).enumerate().skip(self.row_offset) {
            if lines.len() >= area.height as usize {
                break;
            }
            let group = row.group.clone().unwrap_or_default();
            let name_width = width.saturating_sub(group.chars().count() + 3).max(4);
            let mut name_style = Style::default().fg(Color::White);
            if idx == self.selected {
                name_style = Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD);
            }
            lines.push(Line::from(vec![
                Span::styled("■ ", Style::default().fg(bucket_color(ranked.bucket))),
                Span::styled(
                    format!("{:<w$}", truncate_text(&row.name, name_width), w = name_width),
                    name_style,
                ),
                Span::raw(" "),
                Span::styled(group, Style::default().fg(Color::DarkGray)),
            ]));
            for _ in 1..cells(row.height) {
                lines.push(Line::from(""));
            }
        }
        lines
    }

    fn body_lines(&self, ctx: &TimelineContext, area: Rect) -> Vec<Line<'static>> {
        let layout = ctx.layout();
        let width = area.width as usize;
        let left = self.viewport.scroll_left();
        let col_of = |x: f64| (x - left).round() as i64;
        let columns = header_columns(ctx);
        let today_col = self.today.as_ref().map(|m| col_of(m.left));
        let grid_style = Style::default().fg(Color::Rgb(60, 64, 76));
        let today_style = Style::default().fg(Color::LightRed);

        let mut labels = CellRow::new(width, ' ', Style::default());
        let mut ruler = CellRow::new(width, '─', Style::default().fg(Color::DarkGray));
        for column in &columns {
            let start = col_of(column.left);
            let span = (column.width.round() as usize).saturating_sub(1);
            labels.put(start, '│', Style::default().fg(Color::DarkGray));
            labels.put_str(start + 1, &column.label, Style::default().fg(Color::Yellow), span);
            ruler.put(start, '┴', Style::default().fg(Color::DarkGray));
        }
        if let (Some(col), Some(marker)) = (today_col, self.today.as_ref()) {
            ruler.put(col, '▼', today_style.add_modifier(Modifier::BOLD));
            ruler.put_str(col + 1, &marker.label, today_style, usize::MAX);
        }

        let header_lines = cells(layout.header_height);
        let mut lines = vec![labels.into_line()];
        for _ in 2..header_lines {
            lines.push(Line::from(""));
        }
        if header_lines > 1 {
            lines.push(ruler.into_line());
        }

        for (idx, ranked) in self.rows.iter().enumerate().skip(self.row_offset) {
            if lines.len() >= area.height as usize {
                break;
            }
            let mut row = CellRow::new(width, ' ', Style::default());
            for column in &columns {
                row.put(col_of(column.left), '┊', grid_style);
            }
            if let Some(col) = today_col {
                row.put(col, '│', today_style);
            }

            let feature = &ranked.feature;
            let mut bar = BarGeometry::for_feature(ctx, feature);
            if let Some(delta) = self.drag.translation(&feature.id) {
                bar = bar.translated(delta);
            }
            let start = col_of(bar.left);
            let end = col_of(bar.right()).max(start.saturating_add(1));
            let look = bar_look(ranked, idx == self.selected);
            paint_bar(&mut row, start, end, &look, look.label_for(feature), idx == self.selected);
            lines.push(row.into_line());
            for _ in 1..cells(layout.row_height) {
                lines.push(Line::from(""));
            }
        }
        lines
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let legend: Vec<Span<'static>> = WeightBucket::ALL
            .iter()
            .flat_map(|bucket| {
                [
                    Span::styled("■ ", Style::default().fg(bucket_color(*bucket))),
                    Span::raw(format!("{}  ", bucket.label())),
                ]
            })
            .collect();
        let legend = Paragraph::new(Line::from(legend)).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("weight"),
        );
        f.render_widget(legend, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("↑↓ / j k", Style::default().fg(Color::LightCyan)),
            Span::raw(" select  "),
            Span::styled("←→ / h l", Style::default().fg(Color::LightCyan)),
            Span::raw(" pan  "),
            Span::styled("Enter", Style::default().fg(Color::LightYellow)),
            Span::raw(" jump  "),
            Span::styled("o", Style::default().fg(Color::LightYellow)),
            Span::raw(" open  "),
            Span::styled("+/-", Style::default().fg(Color::LightGreen)),
            Span::raw(" zoom  "),
            Span::styled("r/R", Style::default().fg(Color::LightGreen)),
            Span::raw(" range  "),
            Span::styled("t", Style::default().fg(Color::LightGreen)),
            Span::raw(" today  "),
            Span::styled("a", Style::default().fg(Color::LightMagenta)),
            Span::raw(" add  "),
        ];
        if self.config.interaction() == Interaction::Drag {
            spans.extend([
                Span::styled("</>", Style::default().fg(Color::LightMagenta)),
                Span::raw(" move  "),
            ]);
        }
        spans.extend([
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_detail(&self, f: &mut ratatui::Frame<'_>, feature_id: &str) {
        let area = centered_rect(60, 50, f.size());
        let Some(ranked) = self.rows.iter().find(|r| r.feature.id == feature_id) else {
            return;
        };
        let feature = &ranked.feature;
        let label = Style::default().fg(Color::Gray);
        let mut body = vec![
            Line::from(Span::styled(
                feature.name.clone(),
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled("id      ", label),
                Span::raw(feature.id.clone()),
            ]),
            Line::from(vec![
                Span::styled("dates   ", label),
                Span::raw(format!(
                    "{} → {}",
                    feature.start_at,
                    feature
                        .end_at
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "open".into())
                )),
            ]),
            Line::from(vec![
                Span::styled("weight  ", label),
                Span::raw(format!("{:.1} ", ranked.weight)),
                Span::styled(
                    ranked.bucket.label(),
                    Style::default().fg(bucket_color(ranked.bucket)),
                ),
            ]),
        ];
        if let Some(group) = feature.group_label() {
            body.push(Line::from(vec![
                Span::styled("group   ", label),
                Span::raw(group.to_string()),
            ]));
        }
        for (key, value) in &feature.metadata {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_default(),
            };
            body.push(Line::from(vec![
                Span::styled(format!("{:<8}", key), label),
                Span::raw(value),
            ]));
        }
        body.push(Line::from(""));
        body.push(Line::from(Span::styled(
            "Esc to close",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(body).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(Span::styled(
                    "Feature",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_add_form(&self, f: &mut ratatui::Frame<'_>, form: &AddForm) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from(Span::styled(
                format!("Starts {}", form.start_at),
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "Name ",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(form.name.with_caret()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(body).block(
            Block::default()
                .title(Span::styled(
                    "New Feature",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

/// Furthest the body can scroll while still filling its width.
fn body_max_left(ctx: &TimelineContext, body_width: u16) -> f64 {
    (ctx.timeline_width() - body_width as f64).max(0.0)
}

/// Whole terminal lines for a layout length, at least one.
fn cells(length: f64) -> usize {
    length.round().max(1.0) as usize
}

/// Paints a bar over columns `start..end`. Only cells on screen are visited,
/// so bars running years past the window cost no more than short ones.
fn paint_bar(
    row: &mut CellRow,
    start: i64,
    end: i64,
    look: &BarStyle<Color>,
    label: &str,
    bold: bool,
) {
    let fill = look.fill_or(Color::Gray);
    let mut bar_style = Style::default().bg(fill).fg(Color::Black);
    if bold {
        bar_style = bar_style.add_modifier(Modifier::BOLD);
    }
    for col in start.max(0)..end.min(row.width()) {
        row.put(col, ' ', bar_style);
    }
    if look.border.is_some() && end.saturating_sub(start) >= 3 {
        let edge = bar_style.fg(look.border_or(Color::White));
        row.put(start, '▏', edge);
        row.put(end.saturating_sub(1), '▕', edge);
    }
    let inside = end.saturating_sub(start) as usize;
    if label.chars().count() + 2 <= inside {
        row.put_str(start.saturating_add(1), label, bar_style, inside - 2);
    } else {
        row.put_str(end.saturating_add(1), label, Style::default().fg(fill), usize::MAX);
    }
}

/// Bars are filled by weight bucket; a `label` metadata string replaces the
/// feature name on the bar.
fn bar_look(ranked: &RankedFeature, selected: bool) -> BarStyle<Color> {
    BarStyle {
        fill: Some(bucket_color(ranked.bucket)),
        border: selected.then_some(Color::White),
        label: ranked
            .feature
            .metadata
            .get("label")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}

fn bucket_color(bucket: WeightBucket) -> Color {
    match bucket {
        WeightBucket::High => Color::LightRed,
        WeightBucket::MedHigh => Color::LightYellow,
        WeightBucket::Medium => Color::LightGreen,
        WeightBucket::Low => Color::LightBlue,
    }
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LayoutConstants;
    use crate::model::Range;

    #[test]
    fn smooth_scroll_eases_into_place_and_retargets() {
        let mut viewport = Viewport::default();
        viewport.set_max_left(500.0);
        viewport.scroll_to(100.0, ScrollBehavior::Smooth);
        assert_eq!(viewport.scroll_left(), 0.0);
        assert!(viewport.tick());
        assert!(viewport.scroll_left() > 0.0 && viewport.scroll_left() < 100.0);

        // a second call mid-flight just changes where it ends up
        viewport.scroll_to(40.0, ScrollBehavior::Smooth);
        let mut ticks = 0;
        while viewport.tick() {
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(viewport.scroll_left(), 40.0);
        assert_eq!(viewport.destination(), 40.0);
    }

    #[test]
    fn scrolling_is_clamped_to_the_timeline() {
        let mut viewport = Viewport::default();
        viewport.set_max_left(300.0);
        viewport.scroll_to(-80.0, ScrollBehavior::Instant);
        assert_eq!(viewport.scroll_left(), 0.0);
        viewport.scroll_to(9000.0, ScrollBehavior::Instant);
        assert_eq!(viewport.scroll_left(), 300.0);
        viewport.set_max_left(120.0);
        assert_eq!(viewport.scroll_left(), 120.0);
    }

    #[test]
    fn cell_rows_merge_runs_of_the_same_style() {
        let red = Style::default().fg(Color::Red);
        let mut row = CellRow::new(8, ' ', Style::default());
        row.put_str(2, "abc", red, usize::MAX);
        row.put(-1, 'x', red);
        row.put(20, 'x', red);
        let line = row.into_line();
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "abc");
        assert_eq!(line.spans[2].content, "   ");
    }

    fn terminal_provider(range: Range, zoom: u32) -> GanttProvider {
        let mut provider = GanttProvider::new();
        let props = ProviderProps {
            range,
            zoom,
            layout: LayoutConstants::terminal(),
            accepts_new_items: true,
        };
        provider.mount(date(2024, 12, 17), props).unwrap();
        provider
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn open_ended_bars_paint_only_the_visible_cells() {
        let provider = terminal_provider(Range::Daily, 400);
        let ctx = provider.use_gantt().unwrap();
        let feature = Feature::new("f".into(), "Forever".into(), date(2024, 12, 17))
            .with_end(date(9999, 12, 31));
        let bar = BarGeometry::for_feature(ctx, &feature);
        let left = bar.left - 10.0;
        let start = (bar.left - left).round() as i64;
        let end = (bar.right() - left).round() as i64;
        assert!(end > 100_000_000);

        let fill = Color::LightRed;
        let look = BarStyle {
            fill: Some(fill),
            border: Some(Color::White),
            label: None,
        };
        let mut row = CellRow::new(120, ' ', Style::default());
        paint_bar(&mut row, start, end, &look, look.label_for(&feature), true);

        assert!(row.cells[..10].iter().all(|(_, style)| style.bg.is_none()));
        assert!(row.cells[10..].iter().all(|(_, style)| style.bg == Some(fill)));
        assert_eq!(row.cells[10].0, '▏');
        let label: String = row.cells[11..18].iter().map(|(ch, _)| *ch).collect();
        assert_eq!(label, "Forever");
    }

    #[test]
    fn bars_left_of_the_body_are_clipped() {
        let look: BarStyle<Color> = BarStyle {
            fill: Some(Color::LightBlue),
            ..BarStyle::default()
        };
        let mut row = CellRow::new(20, ' ', Style::default());
        paint_bar(&mut row, -3, 2, &look, "Early", false);
        assert!(row.cells[..2].iter().all(|(_, style)| style.bg == Some(Color::LightBlue)));
        assert!(row.cells[2].1.bg.is_none());
        let after: String = row.cells[3..8].iter().map(|(ch, _)| *ch).collect();
        assert_eq!(after, "Early");
    }

    #[test]
    fn body_scroll_stops_one_screen_before_the_end() {
        let provider = terminal_provider(Range::Monthly, 100);
        let ctx = provider.use_gantt().unwrap();
        assert_eq!(ctx.timeline_width(), 18.0 * 12.0);
        assert_eq!(body_max_left(ctx, 100), 116.0);
        assert_eq!(body_max_left(ctx, 400), 0.0);
    }

    #[test]
    fn offsets_keep_the_selection_visible() {
        assert_eq!(adjust_offset(0, 0, 5, 1, 20), 0);
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(19, 7, 5, 1, 20), 15);
        assert_eq!(adjust_offset(3, 0, 0, 1, 20), 0);
    }

    #[test]
    fn long_names_are_shortened() {
        assert_eq!(truncate_text("Six Nations", 20), "Six Nations");
        assert_eq!(truncate_text("Six Nations", 6), "Six N…");
    }

    #[test]
    fn form_field_edits_around_the_caret() {
        let mut field = FieldValue::new("Tour");
        field.move_left();
        field.backspace();
        field.insert_char('é');
        assert_eq!(field.value, "Toér");
        assert_eq!(field.with_caret(), "Toé▌r");
        field.move_right();
        assert_eq!(field.cursor, field.value.len());
    }
}
