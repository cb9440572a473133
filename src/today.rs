use crate::context::TimelineContext;
use crate::offset::{days_in_month, month_index};
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq)]
pub struct TodayMarker {
    pub date: NaiveDate,
    pub left: f64,
    pub label: String,
}

impl TodayMarker {
    /// Always placed on the month grid, whatever range is active.
    pub fn compute(ctx: &TimelineContext, today: NaiveDate) -> Self {
        let cw = ctx.scaled_column_width();
        let months = month_index(today) - month_index(ctx.timeline_start());
        let days = days_in_month(today.year(), today.month()) as f64;
        let inner = (today.day() - 1) as f64 / days * cw;
        TodayMarker {
            date: today,
            left: months as f64 * cw + inner,
            label: today.format("Today, %b %-d").to_string(),
        }
    }
}
