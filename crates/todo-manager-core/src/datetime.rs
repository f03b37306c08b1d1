use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Duration,
  Local,
  Months,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;
use todo_manager_shared::{
  DEFAULT_DUE_TIME,
  RecurrenceUnit,
  RecurringRule
};

const TIMEZONE_CONFIG_FILE: &str =
  "todo-manager-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TODO_MANAGER_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TODO_MANAGER_TIME_CONFIG";

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Configured household timezone, or
/// `None` to follow the system zone.
pub fn project_timezone()
-> Option<&'static Tz> {
  static PROJECT_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  PROJECT_TZ
    .get_or_init(
      resolve_project_timezone
    )
    .as_ref()
}

/// Current wall-clock time as a naive
/// local date-time. Due dates carry no
/// zone, so every comparison happens in
/// this frame.
#[must_use]
pub fn local_now() -> NaiveDateTime {
  match project_timezone() {
    | Some(tz) => {
      Utc::now()
        .with_timezone(tz)
        .naive_local()
    }
    | None => Local::now().naive_local()
  }
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

fn resolve_project_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return Some(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured household timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

pub fn parse_due_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let token = raw.trim();
  NaiveDate::parse_from_str(
    token,
    DATE_FORMAT
  )
  .with_context(|| {
    format!(
      "invalid due date (expected \
       YYYY-MM-DD): {token:?}"
    )
  })
}

/// Accepts `HH:MM` and `HH:MM:SS`; an
/// empty string means end of day.
pub fn parse_due_time(
  raw: &str
) -> anyhow::Result<NaiveTime> {
  let token = match raw.trim() {
    | "" => DEFAULT_DUE_TIME,
    | other => other
  };

  NaiveTime::parse_from_str(
    token, "%H:%M"
  )
  .or_else(|_| {
    NaiveTime::parse_from_str(
      token, "%H:%M:%S"
    )
  })
  .map_err(|err| {
    anyhow!(
      "invalid due time (expected \
       HH:MM): {token:?}: {err}"
    )
  })
}

#[tracing::instrument(level = "trace")]
pub fn parse_due_instant(
  due_date: &str,
  due_time: Option<&str>
) -> anyhow::Result<NaiveDateTime> {
  let date = parse_due_date(due_date)?;
  let time = parse_due_time(
    due_time.unwrap_or(DEFAULT_DUE_TIME)
  )?;
  Ok(date.and_time(time))
}

/// Whole hours in `span`, rounded toward
/// zero and never negative.
#[must_use]
pub fn whole_hours(
  span: Duration
) -> u64 {
  u64::try_from(span.num_hours())
    .unwrap_or(0)
}

/// Due date of the occurrence following
/// one completed on `completed_on`.
/// Month steps clamp to the last day of
/// the target month.
pub fn next_occurrence(
  completed_on: NaiveDate,
  rule: &RecurringRule
) -> anyhow::Result<NaiveDate> {
  let interval = rule.interval.max(1);
  let next = match rule.unit {
    | RecurrenceUnit::Days => {
      completed_on.checked_add_signed(
        Duration::days(i64::from(
          interval
        ))
      )
    }
    | RecurrenceUnit::Weeks => {
      completed_on.checked_add_signed(
        Duration::weeks(i64::from(
          interval
        ))
      )
    }
    | RecurrenceUnit::Months => {
      completed_on.checked_add_months(
        Months::new(interval)
      )
    }
  };

  next.ok_or_else(|| {
    anyhow!(
      "recurrence overflowed the \
       calendar: {} + {} {}",
      format_date(completed_on),
      interval,
      rule.unit
    )
  })
}

/// Parses a stored completion stamp
/// (`YYYY-MM-DD` or an ISO date-time,
/// optionally zoned) into its date.
pub fn parse_completion_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let token = raw.trim();
  if let Ok(date) = parse_due_date(token)
  {
    return Ok(date);
  }
  if let Ok(dt) =
    chrono::DateTime::parse_from_rfc3339(
      token
    )
  {
    return Ok(dt.naive_local().date());
  }
  let dt = NaiveDateTime::parse_from_str(
    token,
    "%Y-%m-%dT%H:%M:%S%.f"
  )
  .with_context(|| {
    format!(
      "invalid completion timestamp: \
       {token:?}"
    )
  })?;
  Ok(dt.date())
}
