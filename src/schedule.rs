//! Schedules for silent backups

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed range for interval schedules, in hours
pub const INTERVAL_HOURS: std::ops::RangeInclusive<u32> = 1..=72;

/// Time used when a stored daily time cannot be parsed
const FALLBACK_DAILY_TIME: (u32, u32) = (12, 0);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Interval must be between 1 and 72 hours, got {0}")]
    InvalidInterval(u32),

    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// When silent backups run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Schedule {
    /// Every `hours` hours
    Interval { hours: u32 },
    /// Once a day at `time` (HH:MM, local time)
    Daily { time: String },
}

impl Schedule {
    pub fn interval(hours: u32) -> Result<Self, ScheduleError> {
        if !INTERVAL_HOURS.contains(&hours) {
            return Err(ScheduleError::InvalidInterval(hours));
        }
        Ok(Self::Interval { hours })
    }

    pub fn daily(time: &str) -> Result<Self, ScheduleError> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(time.to_string()))?;
        Ok(Self::Daily {
            time: parsed.format("%H:%M").to_string(),
        })
    }

    /// Next run strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Interval { hours } => {
                let hours = (*hours).clamp(*INTERVAL_HOURS.start(), *INTERVAL_HOURS.end());
                now + Duration::hours(i64::from(hours))
            }
            Self::Daily { time } => {
                let at = daily_time(time);
                let today = now.date().and_time(at);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Interval { hours } => format!("every {} hour(s)", hours),
            Self::Daily { time } => format!("daily at {}", time),
        }
    }
}

fn daily_time(time: &str) -> NaiveTime {
    NaiveTime::parse_from_str(time.trim(), "%H:%M").unwrap_or_else(|_| {
        tracing::warn!("Invalid scheduled time '{}', using 12:00", time);
        NaiveTime::from_hms_opt(FALLBACK_DAILY_TIME.0, FALLBACK_DAILY_TIME.1, 0)
            .unwrap_or(NaiveTime::MIN)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_interval_bounds() {
        assert_eq!(Schedule::interval(6), Ok(Schedule::Interval { hours: 6 }));
        assert_eq!(Schedule::interval(0), Err(ScheduleError::InvalidInterval(0)));
        assert_eq!(Schedule::interval(73), Err(ScheduleError::InvalidInterval(73)));
    }

    #[test]
    fn test_daily_normalizes_time() {
        assert_eq!(
            Schedule::daily(" 7:05 "),
            Ok(Schedule::Daily {
                time: "07:05".to_string()
            })
        );
        assert!(matches!(
            Schedule::daily("25:00"),
            Err(ScheduleError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_interval_next_run() {
        let schedule = Schedule::Interval { hours: 6 };
        assert_eq!(schedule.next_after(at(1, 20, 0)), at(2, 2, 0));
    }

    #[test]
    fn test_daily_next_run_today_or_tomorrow() {
        let schedule = Schedule::Daily {
            time: "21:30".to_string(),
        };
        assert_eq!(schedule.next_after(at(1, 9, 0)), at(1, 21, 30));
        assert_eq!(schedule.next_after(at(1, 21, 30)), at(2, 21, 30));
        assert_eq!(schedule.next_after(at(1, 23, 0)), at(2, 21, 30));
    }

    #[test]
    fn test_unparseable_daily_time_falls_back_to_noon() {
        let schedule = Schedule::Daily {
            time: "noon".to_string(),
        };
        assert_eq!(schedule.next_after(at(1, 9, 0)), at(1, 12, 0));
    }
}
