use std::fmt;

use chrono::NaiveDateTime;
use todo_manager_shared::Todo;
use tracing::warn;

use crate::datetime::{
  parse_due_instant,
  whole_hours
};

const URGENT_WINDOW_HOURS: i64 = 24;
const WEEK_HOURS: f64 = 168.0;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum Urgency {
  Completed,
  Overdue,
  Urgent,
  Normal
}

impl fmt::Display for Urgency {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let label = match self {
      | Self::Completed => "completed",
      | Self::Overdue => "overdue",
      | Self::Urgent => "urgent",
      | Self::Normal => "normal"
    };
    f.write_str(label)
  }
}

/// Classification plus the hour counts
/// shown next to overdue and urgent
/// todos.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct Assessment {
  pub urgency:         Urgency,
  pub hours_overdue:   Option<u64>,
  pub hours_remaining: Option<u64>
}

impl Assessment {
  fn plain(urgency: Urgency) -> Self {
    Self {
      urgency,
      hours_overdue: None,
      hours_remaining: None
    }
  }
}

/// Due instant of a todo in local wall
/// clock time. `Ok(None)` when the todo
/// has no due date.
pub fn due_instant(
  todo: &Todo
) -> anyhow::Result<Option<NaiveDateTime>>
{
  let Some(due_date) = todo.due_date()
  else {
    return Ok(None);
  };
  parse_due_instant(
    due_date,
    Some(todo.effective_due_time())
  )
  .map(Some)
}

fn logged_due_instant(
  todo: &Todo
) -> Option<NaiveDateTime> {
  match due_instant(todo) {
    | Ok(due) => due,
    | Err(err) => {
      warn!(
        todo_id = %todo.id,
        due_date = ?todo.due_date,
        due_time = ?todo.due_time,
        error = %err,
        "unparsable due date; treating todo as normal"
      );
      None
    }
  }
}

#[must_use]
pub fn classify(
  todo: &Todo,
  now: NaiveDateTime
) -> Urgency {
  assess(todo, now).urgency
}

/// Overdue when the due instant lies
/// strictly before `now`, urgent inside
/// `[0h, 24h)`, normal otherwise.
/// Completion wins over everything and
/// malformed dates degrade to normal.
#[must_use]
pub fn assess(
  todo: &Todo,
  now: NaiveDateTime
) -> Assessment {
  if todo.completed {
    return Assessment::plain(
      Urgency::Completed
    );
  }

  let Some(due) =
    logged_due_instant(todo)
  else {
    return Assessment::plain(
      Urgency::Normal
    );
  };

  if due < now {
    return Assessment {
      urgency:         Urgency::Overdue,
      hours_overdue:   Some(
        whole_hours(now - due)
      ),
      hours_remaining: None
    };
  }

  let remaining = due - now;
  if remaining.num_seconds()
    < URGENT_WINDOW_HOURS * 3600
  {
    return Assessment {
      urgency:         Urgency::Urgent,
      hours_overdue:   None,
      hours_remaining: Some(
        whole_hours(remaining)
      )
    };
  }

  Assessment::plain(Urgency::Normal)
}

/// Sort key for the urgency ordering:
/// higher means more pressing.
#[must_use]
pub fn urgency_score(
  todo: &Todo,
  now: NaiveDateTime
) -> f64 {
  if todo.completed {
    return 0.0;
  }

  let Some(due) =
    logged_due_instant(todo)
  else {
    return 0.5;
  };

  let hours = (due - now).num_seconds()
    as f64
    / 3600.0;

  if due < now {
    1000.0 - hours
  } else if hours < 24.0 {
    100.0 - hours
  } else if hours < WEEK_HOURS {
    50.0 - hours / 7.0
  } else {
    10.0 - hours / WEEK_HOURS
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };
  use todo_manager_shared::Todo;

  use super::{
    Urgency,
    assess,
    classify,
    urgency_score
  };

  fn at(
    d: u32,
    h: u32,
    m: u32
  ) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
      .and_then(|date| {
        date.and_hms_opt(h, m, 0)
      })
      .expect("valid instant")
  }

  fn due(
    date: &str,
    time: Option<&str>
  ) -> Todo {
    Todo {
      id: "t".to_string(),
      title: "t".to_string(),
      due_date: Some(date.to_string()),
      due_time: time.map(str::to_string),
      ..Todo::default()
    }
  }

  #[test]
  fn reference_instants() {
    let now = at(10, 12, 0);

    assert_eq!(
      classify(
        &due("2024-01-10", Some("11:59")),
        now
      ),
      Urgency::Overdue
    );

    let urgent = assess(
      &due("2024-01-10", Some("23:59")),
      now
    );
    assert_eq!(
      urgent.urgency,
      Urgency::Urgent
    );
    assert_eq!(
      urgent.hours_remaining,
      Some(11)
    );

    assert_eq!(
      classify(
        &due("2024-01-12", None),
        now
      ),
      Urgency::Normal
    );
  }

  #[test]
  fn boundaries() {
    let now = at(10, 12, 0);

    assert_eq!(
      classify(
        &due("2024-01-10", Some("12:00")),
        now
      ),
      Urgency::Urgent,
      "due exactly now is not yet overdue"
    );
    assert_eq!(
      classify(
        &due("2024-01-11", Some("11:59")),
        now
      ),
      Urgency::Urgent
    );
    assert_eq!(
      classify(
        &due("2024-01-11", Some("12:00")),
        now
      ),
      Urgency::Normal,
      "24h remaining is outside the window"
    );
  }

  #[test]
  fn overdue_hours_floor() {
    let now = at(10, 12, 0);
    let report = assess(
      &due("2024-01-09", Some("09:30")),
      now
    );
    assert_eq!(
      report.urgency,
      Urgency::Overdue
    );
    assert_eq!(
      report.hours_overdue,
      Some(26)
    );
    assert_eq!(
      report.hours_remaining,
      None
    );
  }

  #[test]
  fn completed_wins_and_missing_due_is_normal()
   {
    let now = at(10, 12, 0);
    let mut done =
      due("2000-01-01", Some("00:00"));
    done.completed = true;
    assert_eq!(
      classify(&done, now),
      Urgency::Completed
    );

    let undated = Todo {
      id: "u".to_string(),
      ..Todo::default()
    };
    assert_eq!(
      classify(&undated, now),
      Urgency::Normal
    );
  }

  #[test]
  fn malformed_dates_degrade_to_normal() {
    let now = at(10, 12, 0);
    for todo in [
      due("yesterday", None),
      due("2024-01-09", Some("noon")),
      due("2024-13-01", None)
    ] {
      assert_eq!(
        classify(&todo, now),
        Urgency::Normal
      );
      assert!(
        (urgency_score(&todo, now) - 0.5)
          .abs()
          < f64::EPSILON
      );
    }
  }

  #[test]
  fn score_orders_by_pressure() {
    let now = at(10, 12, 0);
    let overdue =
      due("2024-01-09", Some("12:00"));
    let urgent =
      due("2024-01-10", Some("18:00"));
    let this_week =
      due("2024-01-13", None);
    let later = due("2024-03-01", None);
    let undated = Todo::default();
    let mut done = urgent.clone();
    done.completed = true;

    let scores = [
      urgency_score(&overdue, now),
      urgency_score(&urgent, now),
      urgency_score(&this_week, now),
      urgency_score(&later, now),
      urgency_score(&undated, now),
      urgency_score(&done, now)
    ];
    assert!(
      scores
        .windows(2)
        .all(|pair| pair[0] > pair[1]),
      "{scores:?}"
    );
    assert!(
      (scores[0] - 1024.0).abs() < 1e-9
    );
  }
}
