use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use todo_manager_shared::Todo;
use tracing::{
  debug,
  trace
};

use crate::datetime::format_date;
use crate::urgency::{
  Urgency,
  classify,
  urgency_score
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum ActiveFilter {
  #[default]
  All,
  Overdue,
  Urgent,
  Today
}

impl ActiveFilter {
  pub const ALL: [Self; 4] = [
    Self::All,
    Self::Overdue,
    Self::Urgent,
    Self::Today
  ];

  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Overdue => "overdue",
      | Self::Urgent => "urgent",
      | Self::Today => "today"
    }
  }
}

impl fmt::Display for ActiveFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for ActiveFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let key =
      s.trim().to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|f| f.as_key() == key)
      .ok_or_else(|| {
        anyhow!(
          "unknown filter {key:?}; \
           expected all, overdue, \
           urgent or today"
        )
      })
  }
}

/// What the list currently shows. Held by
/// the session and passed in explicitly.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ViewState {
  pub show_completed: bool,
  pub active_filter:  ActiveFilter
}

impl Default for ViewState {
  fn default() -> Self {
    Self {
      show_completed: true,
      active_filter:  ActiveFilter::All
    }
  }
}

impl ViewState {
  #[must_use]
  pub fn matches(
    &self,
    todo: &Todo,
    now: NaiveDateTime
  ) -> bool {
    if !self.show_completed
      && todo.completed
    {
      return false;
    }

    match self.active_filter {
      | ActiveFilter::All => true,
      | ActiveFilter::Overdue => {
        !todo.completed
          && classify(todo, now)
            == Urgency::Overdue
      }
      | ActiveFilter::Urgent => {
        !todo.completed
          && classify(todo, now)
            == Urgency::Urgent
      }
      | ActiveFilter::Today => {
        !todo.completed
          && todo.due_date()
            == Some(
              format_date(now.date())
                .as_str()
            )
      }
    }
  }
}

/// Stable filter over `todos`; input order
/// is preserved.
#[tracing::instrument(
  skip(todos, now),
  fields(count = todos.len())
)]
pub fn apply<'a>(
  todos: &'a [Todo],
  view: &ViewState,
  now: NaiveDateTime
) -> Vec<&'a Todo> {
  let visible: Vec<&Todo> = todos
    .iter()
    .filter(|todo| {
      view.matches(todo, now)
    })
    .collect();
  trace!(
    visible = visible.len(),
    "applied view filter"
  );
  visible
}

/// Header counts. Always computed over
/// the whole collection, independent of
/// the active filter.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct Stats {
  pub total:   usize,
  pub active:  usize,
  pub overdue: usize,
  pub urgent:  usize
}

impl Stats {
  #[must_use]
  pub fn collect(
    todos: &[Todo],
    now: NaiveDateTime
  ) -> Self {
    let mut stats = Self {
      total: todos.len(),
      ..Self::default()
    };

    for todo in
      todos.iter().filter(|t| !t.completed)
    {
      stats.active += 1;
      match classify(todo, now) {
        | Urgency::Overdue => {
          stats.overdue += 1;
        }
        | Urgency::Urgent => {
          stats.urgent += 1;
        }
        | Urgency::Normal
        | Urgency::Completed => {}
      }
    }

    stats
  }

  /// Logs when the provider's own overdue
  /// count disagrees with ours. Ours wins.
  pub fn check_provider_overdue(
    &self,
    provided: Option<u64>
  ) {
    let Some(provided) = provided else {
      return;
    };
    let ours = self.overdue as u64;
    if provided != ours {
      debug!(
        provided,
        computed = ours,
        "provider overdue count differs from computed count"
      );
    }
  }
}

/// Most pressing first. Ties keep input
/// order.
pub fn sort_by_urgency(
  todos: &mut [&Todo],
  now: NaiveDateTime
) {
  todos.sort_by(|a, b| {
    urgency_score(b, now)
      .total_cmp(&urgency_score(a, now))
  });
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };
  use todo_manager_shared::Todo;

  use super::{
    ActiveFilter,
    Stats,
    ViewState,
    apply,
    sort_by_urgency
  };

  fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 10)
      .and_then(|d| {
        d.and_hms_opt(12, 0, 0)
      })
      .unwrap()
  }

  fn todo(
    id: &str,
    due: Option<(&str, &str)>,
    completed: bool
  ) -> Todo {
    Todo {
      id: id.to_string(),
      title: id.to_string(),
      due_date: due
        .map(|(d, _)| d.to_string()),
      due_time: due
        .map(|(_, t)| t.to_string()),
      completed,
      ..Todo::default()
    }
  }

  fn fixture() -> Vec<Todo> {
    vec![
      todo(
        "late",
        Some(("2024-01-09", "08:00")),
        false
      ),
      todo(
        "soon",
        Some(("2024-01-10", "20:00")),
        false
      ),
      todo(
        "tonight-done",
        Some(("2024-01-10", "21:00")),
        true
      ),
      todo("someday", None, false),
      todo(
        "late-morning",
        Some(("2024-01-10", "09:00")),
        false
      ),
      todo(
        "next-week",
        Some(("2024-01-17", "10:00")),
        false
      ),
    ]
  }

  fn ids(todos: &[&Todo]) -> Vec<String> {
    todos
      .iter()
      .map(|t| t.id.clone())
      .collect()
  }

  fn view(
    show_completed: bool,
    active_filter: ActiveFilter
  ) -> ViewState {
    ViewState {
      show_completed,
      active_filter
    }
  }

  #[test]
  fn hide_completed_drops_done_todos() {
    let todos = fixture();
    let visible = apply(
      &todos,
      &view(false, ActiveFilter::All),
      now()
    );
    assert!(
      visible.iter().all(|t| !t.completed)
    );
    assert_eq!(visible.len(), 5);
  }

  #[test]
  fn each_filter_preserves_order() {
    let todos = fixture();

    assert_eq!(
      ids(&apply(
        &todos,
        &view(true, ActiveFilter::Overdue),
        now()
      )),
      vec!["late", "late-morning"]
    );
    assert_eq!(
      ids(&apply(
        &todos,
        &view(true, ActiveFilter::Urgent),
        now()
      )),
      vec!["soon"]
    );
    assert_eq!(
      ids(&apply(
        &todos,
        &view(true, ActiveFilter::Today),
        now()
      )),
      vec!["soon", "late-morning"]
    );
  }

  #[test]
  fn overdue_and_urgent_are_disjoint_subsets()
   {
    let todos = fixture();
    let all = ids(&apply(
      &todos,
      &view(true, ActiveFilter::All),
      now()
    ));
    let overdue = ids(&apply(
      &todos,
      &view(true, ActiveFilter::Overdue),
      now()
    ));
    let urgent = ids(&apply(
      &todos,
      &view(true, ActiveFilter::Urgent),
      now()
    ));

    assert!(
      overdue.iter().all(|id| all.contains(id))
    );
    assert!(
      urgent.iter().all(|id| all.contains(id))
    );
    assert!(
      overdue
        .iter()
        .all(|id| !urgent.contains(id))
    );
  }

  #[test]
  fn stats_ignore_active_filter() {
    let todos = fixture();
    let stats =
      Stats::collect(&todos, now());
    assert_eq!(stats, Stats {
      total:   6,
      active:  5,
      overdue: 2,
      urgent:  1
    });
  }

  #[test]
  fn filter_keys_round_trip() {
    for f in ActiveFilter::ALL {
      assert_eq!(
        f.as_key()
          .parse::<ActiveFilter>()
          .unwrap(),
        f
      );
    }
    assert!(
      "tomorrow"
        .parse::<ActiveFilter>()
        .is_err()
    );
  }

  #[test]
  fn urgency_sort_is_most_pressing_first()
  {
    let todos = fixture();
    let mut visible = apply(
      &todos,
      &view(true, ActiveFilter::All),
      now()
    );
    sort_by_urgency(&mut visible, now());
    assert_eq!(ids(&visible), vec![
      "late",
      "late-morning",
      "soon",
      "next-week",
      "someday",
      "tonight-done"
    ]);
  }
}
