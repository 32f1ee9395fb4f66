use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::domain::models::DateRange;

pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%d-%m-%Y"))
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%d/%m/%Y"))
        .ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Rewrites any accepted date spelling as `YYYY-MM-DD`.
pub fn normalize_date(date_str: &str) -> Option<String> {
    parse_date(date_str).map(format_date)
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    name.trim().parse::<Weekday>().ok()
}

/// First day of the week containing `date`.
pub fn week_start_of(date: NaiveDate, first_day: Weekday) -> NaiveDate {
    let offset = (7 + date.weekday().num_days_from_monday() as i64
        - first_day.num_days_from_monday() as i64)
        % 7;
    date - Duration::days(offset)
}

/// Inclusive seven-day span starting at `start`.
pub fn week_range(start: NaiveDate) -> (NaiveDate, NaiveDate) {
    (start, start + Duration::days(6))
}

pub fn week_label(start: NaiveDate) -> String {
    let (start, end) = week_range(start);
    format!("{} - {}", format_date(start), format_date(end))
}

pub fn initial_date_range(today: NaiveDate) -> DateRange {
    let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    DateRange {
        start: format_date(start),
        end: format_date(today),
    }
}

/// Accepts `MONTH`, `WEEK`, `LAST-MONTH` or `YYYY-MM-DD..YYYY-MM-DD`.
pub fn parse_date_range(input: &str, today: NaiveDate) -> Result<DateRange, String> {
    match input.trim().to_uppercase().as_str() {
        "AUTO" | "AUTO-MONTH" | "MONTH" => return Ok(initial_date_range(today)),
        "AUTO-WEEK" | "WEEK" => {
            let start = week_start_of(today, Weekday::Mon);
            return Ok(DateRange {
                start: format_date(start),
                end: format_date(today),
            });
        }
        "LAST-MONTH" => {
            let first_this = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
            let last_prev = first_this - Duration::days(1);
            let first_prev = NaiveDate::from_ymd_opt(last_prev.year(), last_prev.month(), 1)
                .unwrap_or(last_prev);
            return Ok(DateRange {
                start: format_date(first_prev),
                end: format_date(last_prev),
            });
        }
        _ => {}
    }

    let parts: Vec<&str> = input.split("..").collect();
    if parts.len() != 2 {
        return Err(
            "Bad format. Use YYYY-MM-DD..YYYY-MM-DD, MONTH, WEEK or LAST-MONTH".to_string(),
        );
    }
    let start = parse_date(parts[0]).ok_or_else(|| format!("Invalid start date: {}", parts[0].trim()))?;
    let end = parse_date(parts[1]).ok_or_else(|| format!("Invalid end date: {}", parts[1].trim()))?;
    if end < start {
        return Err(format!("Range ends before it starts: {}", input.trim()));
    }

    Ok(DateRange {
        start: format_date(start),
        end: format_date(end),
    })
}

/// Parsed inclusive bounds of a range.
pub fn range_bounds(range: &DateRange) -> Option<(NaiveDate, NaiveDate)> {
    Some((parse_date(&range.start)?, parse_date(&range.end)?))
}
