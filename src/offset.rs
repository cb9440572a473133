use crate::model::Range;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};

/// Everything besides the dates that the mapper needs. `zoom` is a
/// percentage; 100 keeps `column_width` as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetParams {
    pub range: Range,
    pub zoom: f64,
    pub column_width: f64,
}

/// Horizontal offset of `date` from `timeline_start`.
///
/// The result is a whole number of columns for the coarse unit difference
/// plus the fraction of a column that `date` sits into its own unit, so a bar
/// lands on the exact day rather than snapping to column boundaries. Dates
/// before the origin give negative offsets.
pub fn offset(date: NaiveDate, timeline_start: NaiveDate, params: OffsetParams) -> f64 {
    let scale = params.zoom / 100.0;
    let cw = params.column_width;
    let (coarse, inner) = decompose(date, timeline_start, params.range, cw);
    let (_, origin_inner) = decompose(timeline_start, timeline_start, params.range, cw);
    coarse as f64 * cw * scale + (inner - origin_inner) * scale
}

/// Inverse of [`offset`], rounded to the nearest day. `None` only when the
/// offset points outside of what `NaiveDate` can represent.
pub fn date_at(offset: f64, timeline_start: NaiveDate, params: OffsetParams) -> Option<NaiveDate> {
    let scale = params.zoom / 100.0;
    if scale <= 0.0 || params.column_width <= 0.0 || !offset.is_finite() {
        return None;
    }
    let columns = offset / scale / params.column_width;
    match params.range {
        Range::Daily => add_days(timeline_start, columns.round()),
        Range::Weekly => add_days(timeline_start, (columns * 7.0).round()),
        Range::Monthly => month_position_to_date(columns, timeline_start),
        Range::Quarterly => month_position_to_date(columns * 3.0, timeline_start),
        Range::Yearly => month_position_to_date(columns * 12.0, timeline_start),
    }
}

/// Whole units between the origin and `date`, and the in-unit position of
/// `date` in the same units as `column_width`.
fn decompose(date: NaiveDate, timeline_start: NaiveDate, range: Range, cw: f64) -> (i64, f64) {
    match range {
        Range::Daily => ((date - timeline_start).num_days(), 0.0),
        Range::Weekly => {
            // weeks are anchored at the origin, not at Monday
            let days = (date - timeline_start).num_days();
            (days.div_euclid(7), days.rem_euclid(7) as f64 / 7.0 * cw)
        }
        Range::Monthly => {
            let months = month_index(date) - month_index(timeline_start);
            (months, day_fraction(date) * cw)
        }
        Range::Quarterly => {
            let months = month_index(date) - month_index(timeline_start);
            let inner = months.rem_euclid(3) as f64 / 3.0 * cw + day_fraction(date) / 3.0 * cw;
            (months.div_euclid(3), inner)
        }
        Range::Yearly => {
            let months = month_index(date) - month_index(timeline_start);
            let inner = months.rem_euclid(12) as f64 / 12.0 * cw + day_fraction(date) / 12.0 * cw;
            (months.div_euclid(12), inner)
        }
    }
}

/// `(day_of_month - 1) / days_in_month`: 0 on the 1st, never reaching 1.
fn day_fraction(date: NaiveDate) -> f64 {
    (date.day() - 1) as f64 / days_in_month(date.year(), date.month()) as f64
}

fn month_position_to_date(months: f64, timeline_start: NaiveDate) -> Option<NaiveDate> {
    let origin = months + day_fraction(timeline_start);
    let whole = origin.floor();
    let first = first_of_month(month_index(timeline_start) + whole as i64)?;
    let days = days_in_month(first.year(), first.month());
    let day = ((origin - whole) * days as f64).round() as u32 + 1;
    if day > days {
        first_of_month(month_index(first) + 1)
    } else {
        first.with_day(day)
    }
}

fn add_days(date: NaiveDate, days: f64) -> Option<NaiveDate> {
    date.checked_add_signed(ChronoDuration::try_days(days as i64)?)
}

/// Months since year 0, so that consecutive months differ by one.
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

pub fn first_of_month(index: i64) -> Option<NaiveDate> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    NaiveDate::from_ymd_opt(year, index.rem_euclid(12) as u32 + 1, 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(30)
}
