//! Autopilot schedule definitions.
//!
//! A schedule describes a recurring or one-off content job: when it fires,
//! which articles it works through, and how many of them per run.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    /// One-off job; deactivated once every article is processed.
    Once,
    /// Every day at `time_of_day`. Also accepts the legacy `daily` spelling.
    #[serde(alias = "daily")]
    OnceDaily,
    /// Every day at `time_of_day` and `second_time_of_day`.
    TwiceDaily,
    /// Once a week on `day_of_week`.
    Weekly,
    /// Monday, Wednesday and Friday.
    ThreeWeekly,
    /// Any weekday listed in `days_of_week`.
    CustomDays,
    /// Once a month on `day_of_month`.
    Monthly,
    /// Every `custom_interval` days.
    Custom,
}

impl Frequency {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::OnceDaily => "once-daily",
            Self::TwiceDaily => "twice-daily",
            Self::Weekly => "weekly",
            Self::ThreeWeekly => "three-weekly",
            Self::CustomDays => "custom-days",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    /// Whether the schedule terminates after its article list is exhausted.
    pub fn is_one_off(self) -> bool {
        matches!(self, Self::Once)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ScheduleValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Self::Once),
            "once-daily" | "daily" => Ok(Self::OnceDaily),
            "twice-daily" => Ok(Self::TwiceDaily),
            "weekly" => Ok(Self::Weekly),
            "three-weekly" => Ok(Self::ThreeWeekly),
            "custom-days" => Ok(Self::CustomDays),
            "monthly" => Ok(Self::Monthly),
            "custom" => Ok(Self::Custom),
            other => Err(ScheduleValidationError::UnknownFrequency(other.to_string())),
        }
    }
}

/// Wall-clock time of day (UTC), written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    /// Create a time of day, rejecting out-of-range values.
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleValidationError::InvalidTimeOfDay(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleValidationError;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds are ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleValidationError::InvalidTimeOfDay(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts
            .next()
            .and_then(|h| h.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let minute = parts
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            seconds.parse::<u32>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ScheduleValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Reasons a schedule definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleValidationError {
    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),
    #[error("{0} schedules require {1}")]
    MissingField(Frequency, &'static str),
    #[error("day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDayOfWeek(u8),
    #[error("day of month must be between 1 and 31, got {0}")]
    InvalidDayOfMonth(u8),
    #[error("custom interval must be at least one day")]
    InvalidInterval,
    #[error("articles per run must be at least 1")]
    InvalidBatchSize,
    #[error("schedule name must not be empty")]
    EmptyName,
}

/// A persisted autopilot job definition plus its runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub name: String,

    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
    pub second_time_of_day: Option<TimeOfDay>,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: Option<u8>,
    pub days_of_week: BTreeSet<u8>,
    pub day_of_month: Option<u8>,
    /// Days between runs for [`Frequency::Custom`].
    pub custom_interval: Option<u32>,

    /// Work items in processing order.
    pub article_ids: Vec<String>,
    /// Always a subset of `article_ids`.
    pub processed_article_ids: Vec<String>,
    pub articles_per_run: u32,
    pub auto_publish: bool,
    pub platforms: Vec<String>,

    pub is_active: bool,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub total_runs: u32,
    pub successful_runs: u32,
    pub failed_runs: u32,
    pub last_error: Option<String>,
    /// Run lease; a schedule with a lease in the future is being processed.
    pub claimed_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Create an active daily schedule with no work items.
    ///
    /// `next_run_at` starts at `now`; callers recompute it once the timing
    /// fields are filled in.
    pub fn new(
        tenant_id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        time_of_day: TimeOfDay,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
            name: name.into(),
            frequency: Frequency::OnceDaily,
            time_of_day,
            second_time_of_day: None,
            day_of_week: None,
            days_of_week: BTreeSet::new(),
            day_of_month: None,
            custom_interval: None,
            article_ids: Vec::new(),
            processed_article_ids: Vec::new(),
            articles_per_run: 1,
            auto_publish: false,
            platforms: Vec::new(),
            is_active: true,
            next_run_at: now,
            last_run_at: None,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            last_error: None,
            claimed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check that the timing fields required by `frequency` are present and in range.
    pub fn validate(&self) -> Result<(), ScheduleValidationError> {
        if self.name.trim().is_empty() {
            return Err(ScheduleValidationError::EmptyName);
        }
        if self.articles_per_run == 0 {
            return Err(ScheduleValidationError::InvalidBatchSize);
        }
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(ScheduleValidationError::InvalidDayOfWeek(day));
            }
        }
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(ScheduleValidationError::InvalidDayOfWeek(*day));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(ScheduleValidationError::InvalidDayOfMonth(day));
            }
        }

        match self.frequency {
            Frequency::TwiceDaily if self.second_time_of_day.is_none() => Err(
                ScheduleValidationError::MissingField(self.frequency, "secondTimeOfDay"),
            ),
            Frequency::Weekly if self.day_of_week.is_none() => Err(
                ScheduleValidationError::MissingField(self.frequency, "dayOfWeek"),
            ),
            Frequency::CustomDays if self.days_of_week.is_empty() => Err(
                ScheduleValidationError::MissingField(self.frequency, "daysOfWeek"),
            ),
            Frequency::Monthly if self.day_of_month.is_none() => Err(
                ScheduleValidationError::MissingField(self.frequency, "dayOfMonth"),
            ),
            Frequency::Custom => match self.custom_interval {
                None => Err(ScheduleValidationError::MissingField(
                    self.frequency,
                    "customInterval",
                )),
                Some(0) => Err(ScheduleValidationError::InvalidInterval),
                Some(_) => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Replace the work-item list, dropping duplicates and any processed ids
    /// that are no longer part of it.
    pub fn set_article_ids(&mut self, ids: Vec<String>) {
        let mut seen = HashSet::new();
        self.article_ids = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        let declared: HashSet<&String> = self.article_ids.iter().collect();
        self.processed_article_ids.retain(|id| declared.contains(id));
    }

    /// The next batch: unprocessed ids in declaration order, capped at `articles_per_run`.
    pub fn next_batch(&self) -> Vec<String> {
        let processed: HashSet<&String> = self.processed_article_ids.iter().collect();
        self.article_ids
            .iter()
            .filter(|id| !processed.contains(id))
            .take(self.articles_per_run as usize)
            .cloned()
            .collect()
    }

    /// Mark ids as processed. Ids that are not declared work items are ignored.
    pub fn mark_processed(&mut self, ids: &[String]) {
        for id in ids {
            if self.article_ids.contains(id) && !self.processed_article_ids.contains(id) {
                self.processed_article_ids.push(id.clone());
            }
        }
    }

    /// Every declared work item has been processed.
    pub fn is_exhausted(&self) -> bool {
        let processed: HashSet<&String> = self.processed_article_ids.iter().collect();
        self.article_ids.iter().all(|id| processed.contains(id))
    }

    /// Whether a live lease is held at `now`.
    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Schedule {
        Schedule::new("tenant-1", "project-1", "Blog", TimeOfDay::new(9, 0).unwrap())
    }

    #[test]
    fn test_time_of_day_parsing() {
        assert_eq!("09:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(9, 30).unwrap());
        assert_eq!("7:05:00".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(7, 5).unwrap());
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert_eq!(TimeOfDay::new(6, 0).unwrap().to_string(), "06:00");
    }

    #[test]
    fn test_frequency_accepts_legacy_daily() {
        let freq: Frequency = serde_json::from_str("\"daily\"").unwrap();
        assert_eq!(freq, Frequency::OnceDaily);
        assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::OnceDaily);
        assert_eq!(serde_json::to_string(&Frequency::ThreeWeekly).unwrap(), "\"three-weekly\"");
    }

    #[test]
    fn test_validate_requires_frequency_fields() {
        let mut s = schedule();
        s.frequency = Frequency::Weekly;
        assert_eq!(
            s.validate(),
            Err(ScheduleValidationError::MissingField(Frequency::Weekly, "dayOfWeek"))
        );
        s.day_of_week = Some(7);
        assert_eq!(s.validate(), Err(ScheduleValidationError::InvalidDayOfWeek(7)));
        s.day_of_week = Some(3);
        assert!(s.validate().is_ok());

        s.frequency = Frequency::Custom;
        s.custom_interval = Some(0);
        assert_eq!(s.validate(), Err(ScheduleValidationError::InvalidInterval));
    }

    #[test]
    fn test_next_batch_skips_processed_and_caps() {
        let mut s = schedule();
        s.set_article_ids(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        s.articles_per_run = 2;
        assert_eq!(s.next_batch(), vec!["a".to_string(), "b".to_string()]);

        s.mark_processed(&["a".to_string(), "b".to_string()]);
        assert_eq!(s.next_batch(), vec!["c".to_string(), "d".to_string()]);
        assert!(!s.is_exhausted());

        s.mark_processed(&["c".to_string(), "d".to_string()]);
        assert!(s.next_batch().is_empty());
        assert!(s.is_exhausted());
    }

    #[test]
    fn test_processed_stays_subset_of_articles() {
        let mut s = schedule();
        s.set_article_ids(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(s.article_ids, vec!["a".to_string(), "b".to_string()]);

        s.mark_processed(&["a".to_string(), "ghost".to_string()]);
        assert_eq!(s.processed_article_ids, vec!["a".to_string()]);

        s.set_article_ids(vec!["b".into(), "c".into()]);
        assert!(s.processed_article_ids.is_empty());
    }
}
