//! One-shot and recurring schedules with IANA timezone support.

use super::TaskDomainError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::str::FromStr;

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// When a task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSchedule {
    /// Never fires on its own; runs only on manual trigger.
    Unscheduled,
    /// Fires once at a fixed instant.
    Once {
        /// Firing instant.
        run_at: DateTime<Utc>,
    },
    /// Fires on every occurrence of a cron expression.
    Recurring(CronSchedule),
}

impl TaskSchedule {
    /// Parses an RFC 3339 timestamp into a one-shot schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTimestamp`] when the value does not
    /// parse.
    pub fn once_at(value: &str) -> Result<Self, TaskDomainError> {
        let parsed = DateTime::parse_from_rfc3339(value.trim()).map_err(|err| {
            TaskDomainError::InvalidTimestamp {
                value: value.to_owned(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self::Once {
            run_at: parsed.with_timezone(&Utc),
        })
    }

    /// Parses a five-field cron expression evaluated in `timezone`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCronExpression`] or
    /// [`TaskDomainError::InvalidTimezone`] on malformed input.
    pub fn recurring(expression: &str, timezone: &str) -> Result<Self, TaskDomainError> {
        CronSchedule::parse(expression, timezone).map(Self::Recurring)
    }

    /// Returns the storage name of the schedule kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unscheduled => "none",
            Self::Once { .. } => "once",
            Self::Recurring(_) => "recurring",
        }
    }

    /// First firing instant for a task (re)armed at `now`.
    ///
    /// A one-shot instant in the past is returned unchanged so the next tick
    /// fires it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoUpcomingOccurrence`] when a cron
    /// expression never matches again.
    pub fn first_fire(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, TaskDomainError> {
        match self {
            Self::Unscheduled => Ok(None),
            Self::Once { run_at } => Ok(Some(*run_at)),
            Self::Recurring(cron) => cron.next_after(now).map(Some),
        }
    }
}

/// Validated cron expression bound to a timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    timezone: Tz,
}

impl CronSchedule {
    /// Parses and validates a five-field cron expression.
    ///
    /// Fields are minute, hour, day of month, month and day of week.
    /// Day-of-week numbers follow standard cron, where both `0` and `7` mean
    /// Sunday. `@daily`-style macros are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCronExpression`] or
    /// [`TaskDomainError::InvalidTimezone`] on malformed input.
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, TaskDomainError> {
        let tz = timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| TaskDomainError::InvalidTimezone(timezone.to_owned()))?;
        let normalized = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        let candidate = Self {
            expression: normalized,
            timezone: tz,
        };
        candidate.compile()?;
        Ok(candidate)
    }

    /// Returns the expression as supplied, with whitespace collapsed.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the evaluation timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Earliest matching instant strictly after `instant`.
    ///
    /// When both day of month and day of week are restricted, a day matching
    /// either field matches, as in standard cron.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoUpcomingOccurrence`] when the expression
    /// never matches again.
    pub fn next_after(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, TaskDomainError> {
        let local = instant.with_timezone(&self.timezone);
        self.compile()?
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .map(|next| next.with_timezone(&Utc))
            .min()
            .ok_or_else(|| TaskDomainError::NoUpcomingOccurrence(self.expression.clone()))
    }

    fn compile(&self) -> Result<Vec<cron::Schedule>, TaskDomainError> {
        let invalid = |reason: String| TaskDomainError::InvalidCronExpression {
            expression: self.expression.clone(),
            reason,
        };
        to_seconds_syntax(&self.expression)
            .map_err(invalid)?
            .iter()
            .map(|translated| {
                cron::Schedule::from_str(translated).map_err(|err| invalid(err.to_string()))
            })
            .collect()
    }
}

/// Rewrites a five-field expression into the six-field, seconds-first form
/// the `cron` crate parses.
///
/// The `cron` crate requires both day fields to match. A restricted day of
/// month and day of week therefore become two expressions, one per field.
fn to_seconds_syntax(expression: &str) -> Result<Vec<String>, String> {
    if expression.starts_with('@') {
        return Ok(vec![expression.to_owned()]);
    }
    let fields: Vec<&str> = expression.split(' ').collect();
    let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };
    let weekdays = translate_weekdays(day_of_week)?;
    if is_restricted(day_of_month) && is_restricted(day_of_week) {
        return Ok(vec![
            format!("0 {minute} {hour} {day_of_month} {month} *"),
            format!("0 {minute} {hour} * {month} {weekdays}"),
        ]);
    }
    Ok(vec![format!(
        "0 {minute} {hour} {day_of_month} {month} {weekdays}"
    )])
}

/// A day field starting with `*` or `?` places no restriction.
fn is_restricted(field: &str) -> bool {
    !(field.starts_with('*') || field == "?")
}

/// Replaces numeric day-of-week items with names so `0`/`7` mean Sunday.
fn translate_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_owned());
    }
    let mut items = Vec::new();
    for item in field.split(',') {
        items.push(translate_weekday_item(item)?);
    }
    Ok(items.join(","))
}

fn translate_weekday_item(item: &str) -> Result<String, String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => {
            let parsed = step
                .parse::<usize>()
                .map_err(|_| format!("invalid day-of-week step '{step}'"))?;
            if parsed == 0 {
                return Err("day-of-week step must be positive".to_owned());
            }
            (range, Some(parsed))
        }
        None => (item, None),
    };

    let bounds = match range {
        "*" => Some((0, 6)),
        _ => match range.split_once('-') {
            Some((start, end)) => weekday_number(start)?.zip(weekday_number(end)?),
            None => weekday_number(range)?.map(|day| (day, if step.is_some() { 6 } else { day })),
        },
    };
    let Some((start, end)) = bounds else {
        return Ok(item.to_ascii_uppercase());
    };
    if start > end {
        return Err(format!("day-of-week range '{range}' is reversed"));
    }

    let days: BTreeSet<usize> = (start..=end)
        .step_by(step.unwrap_or(1))
        .map(|day| if day == 7 { 0 } else { day })
        .collect();
    let names: Vec<&str> = days
        .iter()
        .filter_map(|day| WEEKDAY_NAMES.get(*day).copied())
        .collect();
    Ok(names.join(","))
}

/// Parses a numeric day of week; returns `None` for named days.
fn weekday_number(token: &str) -> Result<Option<usize>, String> {
    if !token.chars().all(|ch| ch.is_ascii_digit()) || token.is_empty() {
        return Ok(None);
    }
    let day = token
        .parse::<usize>()
        .map_err(|_| format!("invalid day of week '{token}'"))?;
    if day > 7 {
        return Err(format!("day of week {day} is out of range 0-7"));
    }
    Ok(Some(day))
}
