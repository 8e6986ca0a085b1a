use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::PaymentMethod;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(15).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Name,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub q: Option<String>,
    pub category: Option<String>,
    pub available: Option<bool>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

/// Canonical date-range presets of the transaction history view. A custom
/// `date_from`/`date_to` pair takes the place of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatePreset {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    ThisYear,
}

impl DatePreset {
    /// Resolve the preset to an inclusive [start, end] pair of calendar days.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DatePreset::Today => (today, today),
            DatePreset::Yesterday => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            DatePreset::ThisWeek => {
                let monday =
                    today - Duration::days(today.weekday().num_days_from_monday() as i64);
                (monday, today)
            }
            DatePreset::ThisMonth => (today.with_day(1).unwrap_or(today), today),
            DatePreset::ThisYear => (
                today.with_day(1).and_then(|d| d.with_month(1)).unwrap_or(today),
                today,
            ),
        }
    }
}

/// Normalize an inclusive calendar-day range to a half-open UTC instant range
/// [start-of-from, start-of-day-after-to).
pub fn day_bounds(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
    (start, end)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransactionQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub preset: Option<DatePreset>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub q: Option<String>,
}

impl TransactionQuery {
    /// Explicit dates win over a preset; a lone bound is widened to a
    /// single-day range on that bound.
    pub fn resolve_range(&self, today: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => Some(day_bounds(from, to)),
            (Some(from), None) => Some(day_bounds(from, from)),
            (None, Some(to)) => Some(day_bounds(to, to)),
            (None, None) => self.preset.map(|p| {
                let (from, to) = p.range(today);
                day_bounds(from, to)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_and_yesterday_are_single_days() {
        let today = date(2024, 6, 14);
        assert_eq!(DatePreset::Today.range(today), (today, today));
        assert_eq!(
            DatePreset::Yesterday.range(today),
            (date(2024, 6, 13), date(2024, 6, 13))
        );
    }

    #[test]
    fn this_week_starts_on_monday() {
        // 2024-06-14 is a Friday.
        let today = date(2024, 6, 14);
        assert_eq!(
            DatePreset::ThisWeek.range(today),
            (date(2024, 6, 10), today)
        );
        // A Monday is its own week start.
        let monday = date(2024, 6, 10);
        assert_eq!(DatePreset::ThisWeek.range(monday), (monday, monday));
    }

    #[test]
    fn month_and_year_presets_anchor_to_first_day() {
        let today = date(2024, 6, 14);
        assert_eq!(
            DatePreset::ThisMonth.range(today),
            (date(2024, 6, 1), today)
        );
        assert_eq!(DatePreset::ThisYear.range(today), (date(2024, 1, 1), today));
    }

    #[test]
    fn day_bounds_cover_the_whole_last_day() {
        let (start, end) = day_bounds(date(2024, 1, 1), date(2024, 1, 1));
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-02T00:00:00+00:00");

        let inside = date(2024, 1, 1)
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc();
        assert!(inside >= start && inside < end);

        let outside = date(2024, 1, 2).and_time(NaiveTime::MIN).and_utc();
        assert!(outside >= end);
    }

    #[test]
    fn explicit_dates_override_preset() {
        let query = TransactionQuery {
            pagination: Pagination {
                page: None,
                per_page: None,
            },
            preset: Some(DatePreset::ThisYear),
            date_from: Some(date(2024, 3, 5)),
            date_to: Some(date(2024, 3, 6)),
            payment_method: None,
            q: None,
        };
        let (start, end) = query.resolve_range(date(2024, 6, 14)).unwrap();
        assert_eq!(start, day_bounds(date(2024, 3, 5), date(2024, 3, 6)).0);
        assert_eq!(end, day_bounds(date(2024, 3, 5), date(2024, 3, 6)).1);
    }

    #[test]
    fn pagination_clamps_page_and_size() {
        let pagination = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(pagination.normalize(), (1, 100, 0));
    }
}
