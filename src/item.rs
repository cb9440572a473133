use crate::context::TimelineContext;
use crate::events::GanttEvent;
use crate::model::{Feature, FeatureId};
use chrono::NaiveDate;
use log::debug;

/// Pointer travel below which a press-release counts as a click.
pub const DRAG_ACTIVATION_DISTANCE: f64 = 1.0;

/// Horizontal placement of a feature bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub left: f64,
    pub width: f64,
}

impl BarGeometry {
    /// Bars are never narrower than half a column, so open-ended and
    /// zero-length features stay visible and clickable.
    pub fn for_feature(ctx: &TimelineContext, feature: &Feature) -> Self {
        let left = ctx.offset_of(feature.start_at);
        let right = ctx.offset_of(feature.end_at.unwrap_or(feature.start_at));
        BarGeometry {
            left,
            width: (right - left).max(ctx.scaled_column_width() / 2.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.left && x < self.right()
    }

    pub fn translated(&self, delta: f64) -> Self {
        BarGeometry {
            left: self.left + delta,
            width: self.width,
        }
    }
}

/// Caller overrides for drawing a bar. Unset fields fall back to whatever
/// the front end uses by default; positioning is never affected.
#[derive(Debug, Clone, PartialEq)]
pub struct BarStyle<C> {
    pub fill: Option<C>,
    pub border: Option<C>,
    pub label: Option<String>,
}

impl<C> Default for BarStyle<C> {
    fn default() -> Self {
        BarStyle {
            fill: None,
            border: None,
            label: None,
        }
    }
}

impl<C: Copy> BarStyle<C> {
    pub fn fill_or(&self, default: C) -> C {
        self.fill.unwrap_or(default)
    }

    pub fn border_or(&self, default: C) -> C {
        self.border.unwrap_or(default)
    }

    pub fn label_for<'a>(&'a self, feature: &'a Feature) -> &'a str {
        self.label.as_deref().unwrap_or(&feature.name)
    }
}

/// How a bar reacts to the pointer. Clicking and dragging are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Drag,
    Click,
    Static,
}

impl Interaction {
    pub fn from_handlers(has_move: bool, has_click: bool) -> Self {
        match (has_move, has_click) {
            (_, true) => Interaction::Click,
            (true, false) => Interaction::Drag,
            (false, false) => Interaction::Static,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    feature_id: FeatureId,
    interaction: Interaction,
    pointer_origin: f64,
    left: f64,
    start_at: NaiveDate,
    end_at: Option<NaiveDate>,
    delta: f64,
}

/// Tracks the one bar being pressed or dragged.
#[derive(Debug, Default)]
pub struct DragController {
    active: Option<ActiveDrag>,
}

impl DragController {
    pub fn new() -> Self {
        DragController { active: None }
    }

    /// Starts tracking when `x` hits the feature's bar. Static bars are
    /// ignored.
    pub fn pointer_down(
        &mut self,
        ctx: &TimelineContext,
        feature: &Feature,
        interaction: Interaction,
        x: f64,
    ) -> bool {
        if interaction == Interaction::Static {
            return false;
        }
        let geometry = BarGeometry::for_feature(ctx, feature);
        if !geometry.contains(x) {
            return false;
        }
        self.active = Some(ActiveDrag {
            feature_id: feature.id.clone(),
            interaction,
            pointer_origin: x,
            left: geometry.left,
            start_at: feature.start_at,
            end_at: feature.end_at,
            delta: 0.0,
        });
        true
    }

    /// Raw translation of the pressed bar, for drawing it under the pointer.
    pub fn pointer_move(&mut self, x: f64) -> Option<f64> {
        let drag = self.active.as_mut()?;
        if drag.interaction != Interaction::Drag {
            return None;
        }
        drag.delta = x - drag.pointer_origin;
        Some(drag.delta)
    }

    pub fn translation(&self, feature_id: &str) -> Option<f64> {
        self.active
            .as_ref()
            .filter(|d| d.feature_id == feature_id && d.interaction == Interaction::Drag)
            .map(|d| d.delta)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Ends the press. A drag resolves the dropped position back to dates,
    /// keeping the feature's length in days; a click-mode press reports a
    /// click.
    pub fn pointer_up(&mut self, ctx: &TimelineContext, x: f64) -> Option<GanttEvent> {
        let drag = self.active.take()?;
        let delta = x - drag.pointer_origin;
        match drag.interaction {
            Interaction::Click if delta.abs() < DRAG_ACTIVATION_DISTANCE => {
                Some(GanttEvent::Click(drag.feature_id))
            }
            Interaction::Drag if delta.abs() >= DRAG_ACTIVATION_DISTANCE => {
                let start_at = ctx.date_at(drag.left + delta)?;
                debug!("feature {} dropped at {}", drag.feature_id, start_at);
                move_event(drag.feature_id, drag.start_at, drag.end_at, start_at)
            }
            _ => None,
        }
    }
}

/// A move to `start_at` that keeps the feature's length in days. `None` when
/// the start doesn't change.
pub fn move_event(
    id: FeatureId,
    start_at: NaiveDate,
    end_at: Option<NaiveDate>,
    new_start: NaiveDate,
) -> Option<GanttEvent> {
    if new_start == start_at {
        return None;
    }
    let shift = new_start - start_at;
    Some(GanttEvent::Move {
        id,
        start_at: new_start,
        end_at: end_at.and_then(|end| end.checked_add_signed(shift)),
    })
}

/// Clicking empty timeline space asks the host for a new item on that date,
/// when the host accepts new items.
pub fn add_item_at(ctx: &TimelineContext, x: f64) -> Option<GanttEvent> {
    if !ctx.accepts_new_items() {
        return None;
    }
    ctx.date_at(x).map(GanttEvent::AddItem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GanttProvider, ProviderProps};
    use crate::model::Range;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider(zoom: u32, accepts_new_items: bool) -> GanttProvider {
        let mut provider = GanttProvider::new();
        let props = ProviderProps {
            range: Range::Monthly,
            zoom,
            accepts_new_items,
            ..ProviderProps::default()
        };
        provider.mount(date(2024, 12, 17), props).unwrap();
        provider
    }

    fn cup() -> Feature {
        Feature::new("c1".into(), "Cup".into(), date(2024, 7, 1)).with_end(date(2024, 9, 1))
    }

    #[test]
    fn bar_spans_start_to_end() {
        let provider = provider(100, false);
        let bar = BarGeometry::for_feature(provider.use_gantt().unwrap(), &cup());
        assert_eq!(bar.left, 50.0);
        assert_eq!(bar.width, 100.0);
        assert_eq!(bar.right(), 150.0);
    }

    #[test]
    fn zero_length_and_open_bars_get_half_a_column() {
        let provider = provider(100, false);
        let ctx = provider.use_gantt().unwrap();
        let open = Feature::new("o".into(), "Open".into(), date(2024, 7, 10));
        let same_day = open.clone().with_end(date(2024, 7, 10));
        let reversed = open.clone().with_end(date(2024, 7, 2));
        assert_eq!(BarGeometry::for_feature(ctx, &open).width, 25.0);
        assert_eq!(BarGeometry::for_feature(ctx, &same_day).width, 25.0);
        assert_eq!(BarGeometry::for_feature(ctx, &reversed).width, 25.0);
    }

    #[test]
    fn doubling_zoom_doubles_widths() {
        let small = provider(100, false);
        let large = provider(200, false);
        for feature in [cup(), Feature::new("o".into(), "Open".into(), date(2024, 7, 10))] {
            let a = BarGeometry::for_feature(small.use_gantt().unwrap(), &feature);
            let b = BarGeometry::for_feature(large.use_gantt().unwrap(), &feature);
            assert!((b.width - 2.0 * a.width).abs() < 1e-9);
        }
    }

    #[test]
    fn bar_style_overrides_fall_back_to_defaults() {
        let plain: BarStyle<u8> = BarStyle::default();
        assert_eq!(plain.fill_or(1), 1);
        assert_eq!(plain.label_for(&cup()), "Cup");

        let custom = BarStyle {
            fill: Some(7u8),
            border: Some(9),
            label: Some("Cup final".into()),
        };
        assert_eq!(custom.fill_or(1), 7);
        assert_eq!(custom.border_or(1), 9);
        assert_eq!(custom.label_for(&cup()), "Cup final");
    }

    #[test]
    fn interaction_modes_are_exclusive() {
        assert_eq!(Interaction::from_handlers(true, false), Interaction::Drag);
        assert_eq!(Interaction::from_handlers(true, true), Interaction::Click);
        assert_eq!(Interaction::from_handlers(false, true), Interaction::Click);
        assert_eq!(Interaction::from_handlers(false, false), Interaction::Static);
    }

    #[test]
    fn dropping_a_bar_snaps_to_dates_and_keeps_the_length() {
        let provider = provider(100, false);
        let ctx = provider.use_gantt().unwrap();
        let mut drag = DragController::new();
        assert!(drag.pointer_down(ctx, &cup(), Interaction::Drag, 60.0));
        assert_eq!(drag.pointer_move(85.0), Some(25.0));
        assert_eq!(drag.translation("c1"), Some(25.0));
        assert_eq!(drag.translation("other"), None);

        // one full column later: August 1st
        let event = drag.pointer_up(ctx, 110.0);
        assert_eq!(
            event,
            Some(GanttEvent::Move {
                id: "c1".into(),
                start_at: date(2024, 8, 1),
                end_at: Some(date(2024, 10, 2)),
            })
        );
        assert!(!drag.is_active());
    }

    #[test]
    fn tiny_drags_do_not_move() {
        let provider = provider(100, false);
        let ctx = provider.use_gantt().unwrap();
        let mut drag = DragController::new();
        drag.pointer_down(ctx, &cup(), Interaction::Drag, 60.0);
        assert_eq!(drag.pointer_up(ctx, 60.5), None);
    }

    #[test]
    fn click_mode_reports_clicks_and_never_drags() {
        let provider = provider(100, false);
        let ctx = provider.use_gantt().unwrap();
        let mut drag = DragController::new();
        assert!(drag.pointer_down(ctx, &cup(), Interaction::Click, 60.0));
        assert_eq!(drag.pointer_move(90.0), None);
        assert_eq!(drag.translation("c1"), None);
        assert_eq!(drag.pointer_up(ctx, 60.0), Some(GanttEvent::Click("c1".into())));

        drag.pointer_down(ctx, &cup(), Interaction::Click, 60.0);
        assert_eq!(drag.pointer_up(ctx, 90.0), None);
    }

    #[test]
    fn presses_outside_the_bar_or_on_static_bars_are_ignored() {
        let provider = provider(100, false);
        let ctx = provider.use_gantt().unwrap();
        let mut drag = DragController::new();
        assert!(!drag.pointer_down(ctx, &cup(), Interaction::Drag, 10.0));
        assert!(!drag.pointer_down(ctx, &cup(), Interaction::Static, 60.0));
        assert_eq!(drag.pointer_up(ctx, 80.0), None);
    }

    #[test]
    fn moves_keep_the_length_and_skip_no_ops() {
        let start = date(2024, 7, 1);
        let end = Some(date(2024, 7, 10));
        assert_eq!(move_event("c1".into(), start, end, start), None);
        assert_eq!(
            move_event("c1".into(), start, end, date(2024, 6, 28)),
            Some(GanttEvent::Move {
                id: "c1".into(),
                start_at: date(2024, 6, 28),
                end_at: Some(date(2024, 7, 7)),
            })
        );
        assert_eq!(
            move_event("c1".into(), start, None, date(2024, 7, 2)),
            Some(GanttEvent::Move {
                id: "c1".into(),
                start_at: date(2024, 7, 2),
                end_at: None,
            })
        );
    }

    #[test]
    fn add_item_needs_a_handler() {
        let without = provider(100, false);
        assert_eq!(add_item_at(without.use_gantt().unwrap(), 50.0), None);
        let with = provider(100, true);
        assert_eq!(
            add_item_at(with.use_gantt().unwrap(), 50.0),
            Some(GanttEvent::AddItem(date(2024, 7, 1)))
        );
    }
}
