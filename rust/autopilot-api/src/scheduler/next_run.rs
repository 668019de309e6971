//! Next trigger instant for a schedule.
//!
//! All arithmetic is in UTC. Every result is strictly after `now`, so feeding
//! a later `now` back in can never yield an instant that has already passed.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};

use crate::domain::{Frequency, Schedule, TimeOfDay};

/// Monday, Wednesday, Friday (0 = Sunday).
const THREE_WEEKLY_DAYS: [u8; 3] = [1, 3, 5];

/// Compute the next instant `schedule` should fire after `now`.
pub fn compute_next_run(schedule: &Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = next_daily_slot(schedule.time_of_day, now);

    match schedule.frequency {
        Frequency::Once | Frequency::OnceDaily => base,
        Frequency::TwiceDaily => match schedule.second_time_of_day {
            Some(second) => base.min(next_daily_slot(second, now)),
            None => base,
        },
        Frequency::ThreeWeekly => advance_until(base, |day| THREE_WEEKLY_DAYS.contains(&day)),
        Frequency::CustomDays => {
            if schedule.days_of_week.is_empty() {
                base
            } else {
                advance_until(base, |day| schedule.days_of_week.contains(&day))
            }
        }
        Frequency::Weekly => match schedule.day_of_week {
            Some(target) => advance_until(base, |day| day == target),
            None => base,
        },
        Frequency::Monthly => match schedule.day_of_month {
            Some(day_of_month) => monthly_slot(base, day_of_month, schedule.time_of_day, now),
            None => base,
        },
        Frequency::Custom => {
            let interval = schedule.custom_interval.unwrap_or(1).max(1);
            base.checked_add_days(Days::new(u64::from(interval)))
                .unwrap_or(base)
        }
    }
}

/// Today's slot at `time`, or tomorrow's if today's is not after `now`.
fn next_daily_slot(time: TimeOfDay, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = at_time(now.date_naive(), time);
    if today > now {
        today
    } else {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    }
}

fn at_time(date: NaiveDate, time: TimeOfDay) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

/// Step forward a day at a time until the weekday matches. At most six steps.
fn advance_until(start: DateTime<Utc>, matches: impl Fn(u8) -> bool) -> DateTime<Utc> {
    let mut candidate = start;
    for _ in 0..7 {
        if matches(weekday(candidate)) {
            return candidate;
        }
        candidate = candidate.checked_add_days(Days::new(1)).unwrap_or(candidate);
    }
    start
}

fn weekday(ts: DateTime<Utc>) -> u8 {
    // num_days_from_sunday is always 0..=6
    u8::try_from(ts.weekday().num_days_from_sunday()).unwrap_or(0)
}

/// `day_of_month` in the month of `base`, clamped to the month's length,
/// pushed one month forward if that is not after `now`.
fn monthly_slot(
    base: DateTime<Utc>,
    day_of_month: u8,
    time: TimeOfDay,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let (year, month) = (base.year(), base.month());
    let candidate = clamped_date(year, month, day_of_month).map(|date| at_time(date, time));

    match candidate {
        Some(candidate) if candidate > now => candidate,
        _ => {
            let (year, month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            clamped_date(year, month, day_of_month)
                .map(|date| at_time(date, time))
                .unwrap_or(base)
        }
    }
}

fn clamped_date(year: i32, month: u32, day: u8) -> Option<NaiveDate> {
    (1..=u32::from(day.max(1)))
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}
