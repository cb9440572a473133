use crate::model::Range;
use crate::offset::{days_in_month, first_of_month, month_index};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};

pub const MONTHS_BEFORE_NOW: i64 = 6;
pub const MONTHS_AFTER_NOW: i64 = 12;
pub const VISIBLE_MONTHS: i64 = MONTHS_BEFORE_NOW + MONTHS_AFTER_NOW;

/// The calendar behind the header ruler: every month of the visible window,
/// grouped by year and calendar quarter.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineData {
    pub years: Vec<YearGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearGroup {
    pub year: i32,
    pub quarters: Vec<QuarterGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterGroup {
    /// 1 to 4
    pub quarter: u32,
    pub months: Vec<MonthCell>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthCell {
    pub start: NaiveDate,
    pub days: u32,
}

/// One header column for a given range, before any geometry is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GridColumn {
    pub label: String,
    pub start: NaiveDate,
}

impl TimelineData {
    pub fn generate(timeline_start: NaiveDate) -> Self {
        let first = month_index(timeline_start);
        let mut years: Vec<YearGroup> = Vec::new();
        for cell in (first..first + VISIBLE_MONTHS)
            .filter_map(first_of_month)
            .map(|start| MonthCell {
                start,
                days: days_in_month(start.year(), start.month()),
            })
        {
            let quarter = cell.start.month0() / 3 + 1;
            if years.last().map(|y| y.year) != Some(cell.start.year()) {
                years.push(YearGroup {
                    year: cell.start.year(),
                    quarters: Vec::new(),
                });
            }
            let Some(year) = years.last_mut() else {
                continue;
            };
            if year.quarters.last().map(|q| q.quarter) != Some(quarter) {
                year.quarters.push(QuarterGroup {
                    quarter,
                    months: Vec::new(),
                });
            }
            if let Some(group) = year.quarters.last_mut() {
                group.months.push(cell);
            }
        }
        TimelineData { years }
    }

    pub fn months(&self) -> impl Iterator<Item = &MonthCell> + '_ {
        self.years
            .iter()
            .flat_map(|y| y.quarters.iter())
            .flat_map(|q| q.months.iter())
    }

    pub fn len(&self) -> usize {
        self.months().count()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.months().next().map(|m| m.start)
    }

    /// First day after the window.
    pub fn end(&self) -> Option<NaiveDate> {
        self.months()
            .last()
            .and_then(|m| m.start.checked_add_signed(ChronoDuration::days(m.days as i64)))
    }

    /// Header columns for `range`, anchored at the start of the window.
    pub fn columns(&self, range: Range) -> Vec<GridColumn> {
        let (Some(start), Some(end)) = (self.first_day(), self.end()) else {
            return Vec::new();
        };
        match range {
            Range::Monthly => self
                .months()
                .map(|m| GridColumn {
                    label: m.start.format("%b %Y").to_string(),
                    start: m.start,
                })
                .collect(),
            Range::Daily => step_days(start, end, 1)
                .map(|d| GridColumn {
                    label: d.format("%d %a").to_string(),
                    start: d,
                })
                .collect(),
            Range::Weekly => step_days(start, end, 7)
                .map(|d| GridColumn {
                    label: d.format("%d %b").to_string(),
                    start: d,
                })
                .collect(),
            Range::Quarterly => step_months(start, end, 3)
                .map(|d| GridColumn {
                    label: span_label(d, 3),
                    start: d,
                })
                .collect(),
            Range::Yearly => step_months(start, end, 12)
                .map(|d| GridColumn {
                    label: span_label(d, 12),
                    start: d,
                })
                .collect(),
        }
    }
}

fn step_days(start: NaiveDate, end: NaiveDate, step: i64) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), move |d| {
        d.checked_add_signed(ChronoDuration::days(step))
    })
    .take_while(move |d| *d < end)
}

fn step_months(start: NaiveDate, end: NaiveDate, step: i64) -> impl Iterator<Item = NaiveDate> {
    let first = month_index(start);
    (0..)
        .map(move |n| first_of_month(first + n * step))
        .take_while(move |d| d.map(|d| d < end).unwrap_or(false))
        .flatten()
}

fn span_label(start: NaiveDate, months: i64) -> String {
    match first_of_month(month_index(start) + months - 1) {
        Some(last) if last.year() == start.year() => {
            format!("{}–{}", start.format("%b"), last.format("%b %Y"))
        }
        Some(last) => format!("{}–{}", start.format("%b %y"), last.format("%b %y")),
        None => start.format("%b %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn grid_spans_eighteen_months_grouped_by_year_and_quarter() {
        let data = TimelineData::generate(date(2024, 5, 1));
        assert_eq!(data.len(), 18);
        assert_eq!(data.first_day(), Some(date(2024, 5, 1)));
        assert_eq!(data.end(), Some(date(2025, 11, 1)));

        let years: Vec<i32> = data.years.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2024, 2025]);
        let quarters: Vec<u32> = data.years[0].quarters.iter().map(|q| q.quarter).collect();
        assert_eq!(quarters, vec![2, 3, 4]);
        // May and June only
        assert_eq!(data.years[0].quarters[0].months.len(), 2);
        let feb = data.months().find(|m| m.start == date(2025, 2, 1)).unwrap();
        assert_eq!(feb.days, 28);
    }

    #[test]
    fn column_counts_per_range() {
        let data = TimelineData::generate(date(2024, 6, 1));
        assert_eq!(data.columns(Range::Monthly).len(), 18);
        assert_eq!(data.columns(Range::Quarterly).len(), 6);
        assert_eq!(data.columns(Range::Yearly).len(), 2);
        // 2024-06-01 .. 2025-12-01 is 548 days
        assert_eq!(data.columns(Range::Daily).len(), 548);
        assert_eq!(data.columns(Range::Weekly).len(), 79);
    }

    #[test]
    fn monthly_columns_are_labelled_with_month_and_year() {
        let data = TimelineData::generate(date(2024, 6, 1));
        let columns = data.columns(Range::Monthly);
        assert_eq!(columns[0].label, "Jun 2024");
        assert_eq!(columns[17].label, "Nov 2025");
        assert_eq!(data.columns(Range::Quarterly)[0].label, "Jun–Aug 2024");
        assert_eq!(data.columns(Range::Quarterly)[2].label, "Dec 24–Feb 25");
    }
}
