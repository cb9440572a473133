use crate::grid::{TimelineData, MONTHS_BEFORE_NOW};
use crate::model::{Feature, GanttError, Range};
use crate::offset::{self, first_of_month, month_index, OffsetParams};
use chrono::NaiveDate;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_ZOOM: u32 = 100;
pub const SCROLL_THROTTLE: Duration = Duration::from_millis(100);

/// Geometry shared by the header, sidebar and rows. Fixed for the lifetime
/// of a mount; only zoom scales it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConstants {
    pub column_width: f64,
    pub sidebar_width: f64,
    pub row_height: f64,
    pub header_height: f64,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        LayoutConstants {
            column_width: 50.0,
            sidebar_width: 300.0,
            row_height: 36.0,
            header_height: 60.0,
        }
    }
}

impl LayoutConstants {
    /// Sizing in terminal cells.
    pub fn terminal() -> Self {
        LayoutConstants {
            column_width: 12.0,
            sidebar_width: 30.0,
            row_height: 1.0,
            header_height: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Whatever owns the horizontal scroll position of the timeline.
pub trait ScrollContainer {
    fn scroll_left(&self) -> f64;
    fn scroll_to(&mut self, left: f64, behavior: ScrollBehavior);
}

/// Coordinate state for one mounted timeline. Every renderer derives its
/// geometry from the same origin so rows stay aligned.
#[derive(Debug, Clone)]
pub struct TimelineContext {
    zoom: u32,
    range: Range,
    timeline_start: NaiveDate,
    layout: LayoutConstants,
    timeline_data: TimelineData,
    accepts_new_items: bool,
    scroll_listener: ScrollListener,
}

impl TimelineContext {
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn timeline_start(&self) -> NaiveDate {
        self.timeline_start
    }

    pub fn layout(&self) -> LayoutConstants {
        self.layout
    }

    pub fn timeline_data(&self) -> &TimelineData {
        &self.timeline_data
    }

    /// Whether an add-item handler was supplied at mount.
    pub fn accepts_new_items(&self) -> bool {
        self.accepts_new_items
    }

    pub fn offset_params(&self) -> OffsetParams {
        OffsetParams {
            range: self.range,
            zoom: self.zoom as f64,
            column_width: self.layout.column_width,
        }
    }

    pub fn scaled_column_width(&self) -> f64 {
        self.layout.column_width * self.zoom as f64 / 100.0
    }

    pub fn offset_of(&self, date: NaiveDate) -> f64 {
        offset::offset(date, self.timeline_start, self.offset_params())
    }

    pub fn date_at(&self, x: f64) -> Option<NaiveDate> {
        offset::date_at(x, self.timeline_start, self.offset_params())
    }

    pub fn column_count(&self) -> usize {
        self.timeline_data.columns(self.range).len()
    }

    /// Scrollable width of the timeline body.
    pub fn timeline_width(&self) -> f64 {
        self.column_count() as f64 * self.scaled_column_width()
    }

    pub fn css_variables(&self) -> Vec<(&'static str, String)> {
        vec![
            ("--gantt-header-height", format!("{}px", self.layout.header_height)),
            ("--gantt-column-width", format!("{}px", self.scaled_column_width())),
            ("--gantt-sidebar-width", format!("{}px", self.layout.sidebar_width)),
            ("--gantt-row-height", format!("{}px", self.layout.row_height)),
        ]
    }

    /// Smooth-scrolls `container` so the feature's start is at the left edge.
    /// Without a container there is nothing to scroll.
    pub fn scroll_to_feature(
        &self,
        feature: &Feature,
        container: Option<&mut dyn ScrollContainer>,
    ) -> Option<f64> {
        let container = container?;
        let target = self.offset_of(feature.start_at);
        debug!("scrolling to feature {} at {:.1}", feature.id, target);
        container.scroll_to(target, ScrollBehavior::Smooth);
        Some(target)
    }

    /// Feed a native scroll event. Returns true when the throttled handler ran.
    pub fn on_scroll(&mut self, scroll_left: f64, now: Instant) -> bool {
        self.scroll_listener.notify(scroll_left, now)
    }

    pub fn last_handled_scroll(&self) -> Option<f64> {
        self.scroll_listener.last_position
    }
}

/// Mount/unmount lifecycle for a [`TimelineContext`].
#[derive(Debug, Default)]
pub struct GanttProvider {
    context: Option<TimelineContext>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderProps {
    pub range: Range,
    pub zoom: u32,
    pub layout: LayoutConstants,
    pub accepts_new_items: bool,
}

impl Default for ProviderProps {
    fn default() -> Self {
        ProviderProps {
            range: Range::Monthly,
            zoom: DEFAULT_ZOOM,
            layout: LayoutConstants::default(),
            accepts_new_items: false,
        }
    }
}

impl GanttProvider {
    pub fn new() -> Self {
        GanttProvider { context: None }
    }

    /// Computes the origin and the calendar grid once; they stay fixed until
    /// the next mount.
    pub fn mount(&mut self, today: NaiveDate, props: ProviderProps) -> Result<(), GanttError> {
        ensure_zoom(props.zoom)?;
        let timeline_start = timeline_start_for(today);
        debug!(
            "mounting timeline: origin {}, range {}, zoom {}",
            timeline_start, props.range, props.zoom
        );
        self.context = Some(TimelineContext {
            zoom: props.zoom,
            range: props.range,
            timeline_start,
            layout: props.layout,
            timeline_data: TimelineData::generate(timeline_start),
            accepts_new_items: props.accepts_new_items,
            scroll_listener: ScrollListener::new(SCROLL_THROTTLE),
        });
        Ok(())
    }

    pub fn unmount(&mut self) {
        if self.context.take().is_some() {
            debug!("timeline unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.context.is_some()
    }

    pub fn use_gantt(&self) -> Result<&TimelineContext, GanttError> {
        self.context.as_ref().ok_or(GanttError::NoProvider)
    }

    pub fn use_gantt_mut(&mut self) -> Result<&mut TimelineContext, GanttError> {
        self.context.as_mut().ok_or(GanttError::NoProvider)
    }

    pub fn set_zoom(&mut self, zoom: u32) -> Result<(), GanttError> {
        ensure_zoom(zoom)?;
        self.use_gantt_mut()?.zoom = zoom;
        Ok(())
    }

    pub fn set_range(&mut self, range: Range) -> Result<(), GanttError> {
        self.use_gantt_mut()?.range = range;
        Ok(())
    }
}

fn ensure_zoom(zoom: u32) -> Result<(), GanttError> {
    if zoom == 0 {
        return Err(GanttError::InvalidZoom(zoom));
    }
    Ok(())
}

/// Six calendar months before `today`, on the 1st.
pub fn timeline_start_for(today: NaiveDate) -> NaiveDate {
    first_of_month(month_index(today) - MONTHS_BEFORE_NOW).unwrap_or(today)
}

/// Lets a call through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ScrollListener {
    throttle: Throttle,
    last_position: Option<f64>,
}

impl ScrollListener {
    fn new(interval: Duration) -> Self {
        ScrollListener {
            throttle: Throttle::new(interval),
            last_position: None,
        }
    }

    // placeholder for loading further months when nearing either edge
    fn notify(&mut self, scroll_left: f64, now: Instant) -> bool {
        if !self.throttle.ready(now) {
            return false;
        }
        trace!("timeline scrolled to {:.1}", scroll_left);
        self.last_position = Some(scroll_left);
        true
    }
}
