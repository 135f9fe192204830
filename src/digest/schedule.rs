use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use super::config::ScheduleConfig;

/// Days of history a run covers. The first weekday also covers the weekend.
pub fn lookback_days(local_weekday: Weekday, cfg: &ScheduleConfig) -> u32 {
    if local_weekday == Weekday::Mon {
        cfg.week_start_lookback_days
    } else {
        cfg.default_lookback_days
    }
}

/// Lower bound of "recent" for a run starting at `now`.
pub fn lookback_start(now: DateTime<Utc>, tz: Tz, cfg: &ScheduleConfig) -> DateTime<Utc> {
    let weekday = now.with_timezone(&tz).weekday();
    now - TimeDelta::days(i64::from(lookback_days(weekday, cfg)))
}

/// The date a run is attributed to, in the configured timezone.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// True once per local day, at or after the configured hour.
pub fn is_due(
    now: DateTime<Utc>,
    tz: Tz,
    cfg: &ScheduleConfig,
    last_run: Option<NaiveDate>,
) -> bool {
    let local = now.with_timezone(&tz);
    local.hour() >= cfg.run_at_hour && last_run != Some(local.date_naive())
}
