//! Recurrence scheduling: next-run computation with calendar semantics.
//!
//! Invariant: the returned timestamp is strictly in the future relative to
//! `now` for every frequency variant. The only exception is the explicit
//! `start_at` fast path for future-dated automations.

use crate::types::{Frequency, RecurrenceConfig};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

const DEFAULT_HOUR: u32 = 8;
const DEFAULT_MINUTE: u32 = 0;

/// Compute the next execution timestamp for a recurrence configuration.
pub fn next_run(config: &RecurrenceConfig, now: DateTime<Utc>) -> DateTime<Utc> {
    // Brand-new future-dated automations fire at their start date.
    if let Some(start) = config.start_at {
        if start > now {
            return start;
        }
    }

    let (hour, minute) = parse_time(config.time.as_deref());

    match config.frequency {
        Frequency::Daily => at_time(now.date_naive() + Duration::days(1), hour, minute),
        Frequency::Weekly => {
            let days_ahead = match config.weekday {
                Some(target) => {
                    let target = target.to_chrono().num_days_from_monday() as i64;
                    let today = now.weekday().num_days_from_monday() as i64;
                    let diff = (target - today).rem_euclid(7);
                    // Same weekday rolls a full week; never fires same-day
                    if diff == 0 {
                        7
                    } else {
                        diff
                    }
                }
                None => 7,
            };
            at_time(now.date_naive() + Duration::days(days_ahead), hour, minute)
        }
        Frequency::Monthly => match config.day_of_month {
            Some(dom) => {
                let candidate = at_time(clamped_date(now.year(), now.month(), dom), hour, minute);
                if candidate > now {
                    candidate
                } else {
                    let (year, month) = next_month(now.year(), now.month());
                    at_time(clamped_date(year, month, dom), hour, minute)
                }
            }
            None => {
                let (year, month) = next_month(now.year(), now.month());
                at_time(clamped_date(year, month, now.day()), hour, minute)
            }
        },
        Frequency::Custom => {
            let interval = config.interval_days.unwrap_or(1).max(1);
            at_time(now.date_naive() + Duration::days(interval), hour, minute)
        }
    }
}

/// Render a recurrence configuration as a short human-readable phrase.
pub fn describe(config: &RecurrenceConfig) -> String {
    let (hour, minute) = parse_time(config.time.as_deref());
    let time = format!("{:02}:{:02}", hour, minute);
    match config.frequency {
        Frequency::Daily => format!("every day at {}", time),
        Frequency::Weekly => match config.weekday {
            Some(day) => format!("every {:?} at {}", day, time),
            None => format!("every week at {}", time),
        },
        Frequency::Monthly => match config.day_of_month {
            Some(dom) => format!("every month on day {} at {}", dom, time),
            None => format!("every month at {}", time),
        },
        Frequency::Custom => format!(
            "every {} day(s) at {}",
            config.interval_days.unwrap_or(1).max(1),
            time
        ),
    }
}

/// Parse "HH:mm"; malformed or missing input degrades to 08:00.
fn parse_time(time: Option<&str>) -> (u32, u32) {
    let Some(time) = time else {
        return (DEFAULT_HOUR, DEFAULT_MINUTE);
    };
    let mut parts = time.splitn(2, ':');
    let hour = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minute = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (hour, minute) {
        (Some(h), Some(m)) if h < 24 && m < 60 => (h, m),
        _ => (DEFAULT_HOUR, DEFAULT_MINUTE),
    }
}

fn at_time(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).expect("valid wall time"))
}

/// Date with the day clamped to the month's length (31 -> Feb 28/29).
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let clamped = day.clamp(1, last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, clamped).expect("clamped day is valid")
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .unwrap_or(28)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
