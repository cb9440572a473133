use crate::context::TimelineContext;
use crate::events::GanttEvent;
use crate::model::Feature;

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarRow {
    pub feature_id: String,
    pub name: String,
    pub group: Option<String>,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderColumn {
    pub label: String,
    pub left: f64,
    pub width: f64,
}

/// Vertical band a feature bar is placed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBand {
    pub top: f64,
    pub height: f64,
}

/// One sidebar row per feature, in the order given, below the header.
pub fn sidebar_rows<'a>(
    ctx: &TimelineContext,
    features: impl IntoIterator<Item = &'a Feature>,
) -> Vec<SidebarRow> {
    features
        .into_iter()
        .enumerate()
        .map(|(idx, feature)| {
            let band = row_band(ctx, idx);
            SidebarRow {
                feature_id: feature.id.clone(),
                name: feature.name.clone(),
                group: feature.group_label().map(str::to_string),
                top: band.top,
                height: band.height,
            }
        })
        .collect()
}

pub fn select_row(row: &SidebarRow) -> GanttEvent {
    GanttEvent::SelectItem(row.feature_id.clone())
}

pub fn header_columns(ctx: &TimelineContext) -> Vec<HeaderColumn> {
    let width = ctx.scaled_column_width();
    ctx.timeline_data()
        .columns(ctx.range())
        .into_iter()
        .map(|column| HeaderColumn {
            left: ctx.offset_of(column.start),
            label: column.label,
            width,
        })
        .collect()
}

pub fn row_band(ctx: &TimelineContext, index: usize) -> RowBand {
    let layout = ctx.layout();
    RowBand {
        top: layout.header_height + index as f64 * layout.row_height,
        height: layout.row_height,
    }
}

/// Index of the row under a y coordinate measured from the top of the
/// timeline (header included).
pub fn row_at(ctx: &TimelineContext, y: f64, row_count: usize) -> Option<usize> {
    let layout = ctx.layout();
    if y < layout.header_height || layout.row_height <= 0.0 {
        return None;
    }
    let idx = ((y - layout.header_height) / layout.row_height).floor() as usize;
    (idx < row_count).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GanttProvider, ProviderProps};
    use crate::model::{FeatureGroup, Range};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider(range: Range, zoom: u32) -> GanttProvider {
        let mut provider = GanttProvider::new();
        let props = ProviderProps {
            range,
            zoom,
            ..ProviderProps::default()
        };
        provider.mount(date(2024, 12, 17), props).unwrap();
        provider
    }

    #[test]
    fn sidebar_has_one_fixed_height_row_per_feature() {
        let provider = provider(Range::Monthly, 100);
        let ctx = provider.use_gantt().unwrap();
        let features = vec![
            Feature::new("a".into(), "Open".into(), date(2024, 7, 1))
                .with_group(FeatureGroup::Label("Golf".into())),
            Feature::new("b".into(), "Masters".into(), date(2024, 8, 1)),
        ];
        let rows = sidebar_rows(ctx, &features);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].top, 60.0);
        assert_eq!(rows[1].top, 96.0);
        assert_eq!(rows[1].height, 36.0);
        assert_eq!(rows[0].group.as_deref(), Some("Golf"));
        assert_eq!(select_row(&rows[1]), GanttEvent::SelectItem("b".into()));
    }

    #[test]
    fn monthly_header_has_a_column_per_month() {
        let provider = provider(Range::Monthly, 150);
        let ctx = provider.use_gantt().unwrap();
        let columns = header_columns(ctx);
        assert_eq!(columns.len(), 18);
        assert_eq!(columns[0].label, "Jun 2024");
        for (idx, column) in columns.iter().enumerate() {
            assert_eq!(column.width, 75.0);
            assert!((column.left - idx as f64 * 75.0).abs() < 1e-9);
        }
    }

    #[test]
    fn weekly_columns_line_up_with_offsets() {
        let provider = provider(Range::Weekly, 100);
        let ctx = provider.use_gantt().unwrap();
        let columns = header_columns(ctx);
        assert!((columns[3].left - 150.0).abs() < 1e-9);
        assert_eq!(ctx.timeline_width(), columns.len() as f64 * 50.0);
    }

    #[test]
    fn rows_are_found_by_y() {
        let provider = provider(Range::Monthly, 100);
        let ctx = provider.use_gantt().unwrap();
        assert_eq!(row_at(ctx, 10.0, 3), None);
        assert_eq!(row_at(ctx, 60.0, 3), Some(0));
        assert_eq!(row_at(ctx, 131.9, 3), Some(1));
        assert_eq!(row_at(ctx, 500.0, 3), None);
    }
}
