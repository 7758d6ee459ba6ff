use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Spreadsheet exports write these for empty date cells.
const NULL_TOKENS: [&str; 3] = ["nan", "nat", "none"];

#[derive(Debug, Clone, Copy)]
enum Layout {
    Date(&'static str),
    DateTime(&'static str),
    Offset(&'static str),
}

/// Tried in order on the value cut at its first '.'.
const EXPLICIT_LAYOUTS: [Layout; 5] = [
    Layout::Date("%d/%m/%Y"),
    Layout::DateTime("%d/%m/%Y %H:%M:%S"),
    Layout::Date("%Y-%m-%d"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
    Layout::Offset("%Y-%m-%d %H:%M:%S%z"),
];

/// Fallback pass, tried on the full value after RFC 3339.
const LENIENT_LAYOUTS: [Layout; 18] = [
    Layout::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Layout::Offset("%Y-%m-%d %H:%M:%S%.f %z"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%dT%H:%M"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%d %H:%M"),
    Layout::DateTime("%d/%m/%Y %H:%M"),
    Layout::DateTime("%Y/%m/%d %H:%M:%S"),
    Layout::DateTime("%Y/%m/%d %H:%M"),
    Layout::DateTime("%m/%d/%Y %H:%M:%S"),
    Layout::Date("%Y/%m/%d"),
    Layout::Date("%m/%d/%Y"),
    Layout::Date("%d-%m-%Y"),
    Layout::Date("%d.%m.%Y"),
    Layout::Date("%d %B %Y"),
    Layout::Date("%B %d, %Y"),
    Layout::Date("%B %d %Y"),
    Layout::Date("%b %d, %Y"),
];

fn try_layout(s: &str, layout: Layout) -> Option<NaiveDateTime> {
    match layout {
        Layout::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN)),
        Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt).ok(),
        Layout::Offset(fmt) => DateTime::parse_from_str(s, fmt).ok().map(|dt| dt.naive_utc()),
    }
}

pub fn is_null_token(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || NULL_TOKENS.iter().any(|n| t.eq_ignore_ascii_case(n))
}

/// Parses an uploaded date cell into a naive date-time.
///
/// Offset-aware inputs are shifted to UTC and the offset is dropped. Returns
/// `None` for blanks, null tokens and anything no layout accepts; callers
/// drop the owning row.
pub fn parse_task_date(raw: &str) -> Option<NaiveDateTime> {
    if is_null_token(raw) {
        return None;
    }
    let full = raw.trim();
    let cut = full.split('.').next().unwrap_or(full).trim();

    if let Some(dt) = EXPLICIT_LAYOUTS.iter().find_map(|l| try_layout(cut, *l)) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(full) {
        return Some(dt.naive_utc());
    }
    LENIENT_LAYOUTS.iter().find_map(|l| try_layout(full, *l))
}

/// Whole days in a span, floored toward negative infinity.
pub fn whole_days(span: Duration) -> i64 {
    span.num_seconds().div_euclid(86_400)
}

pub fn start_of_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}
