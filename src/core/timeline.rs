use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Largest accepted UTC offset, in minutes
pub const MAX_OFFSET_MINUTES: i32 = 18 * 60;

/// A local calendar day expressed as a half-open UTC interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The UTC interval covering `date` in the given timezone
    pub fn for_local_date(date: NaiveDate, offset: FixedOffset) -> Self {
        let start = local_midnight(date, offset);
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let end = local_midnight(next, offset);

        Self { date, start, end }
    }

    pub fn previous_date(&self) -> NaiveDate {
        self.date.checked_sub_days(Days::new(1)).unwrap_or(self.date)
    }

    pub fn next_date(&self) -> NaiveDate {
        self.date.checked_add_days(Days::new(1)).unwrap_or(self.date)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    // Fixed offsets have no gaps, so the mapping is always unique.
    let naive = date.and_time(NaiveTime::MIN);
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Build a fixed offset from minutes east of UTC
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

/// Parse a `YYYY-MM-DD` day, falling back to today in the given timezone
pub fn parse_day_or_today(raw: Option<&str>, offset: FixedOffset, now: DateTime<Utc>) -> NaiveDate {
    let today = now.with_timezone(&offset).date_naive();

    match raw {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|e| {
            tracing::debug!("Invalid date '{}' ({}), using today", value, e);
            today
        }),
        None => today,
    }
}
