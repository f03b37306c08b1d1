use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use todo_manager_shared::{Person, Snapshot, Todo};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_date, next_occurrence, parse_completion_date};
use crate::filter::{Stats, ViewState, apply, sort_by_urgency};
use crate::people::{display_color, resolve_badges};
use crate::urgency::{Urgency, assess};

const NO_DUE_DATE: &str = "No due date";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, snapshot, view, now))]
    pub fn print_card(
        &self,
        title: &str,
        snapshot: &Snapshot,
        view: &ViewState,
        now: NaiveDateTime,
        by_urgency: bool,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_card(&mut out, title, snapshot, view, now, by_urgency)
    }

    #[tracing::instrument(skip(self, todo, persons, now), fields(todo_id = %todo.id))]
    pub fn print_todo(&self, todo: &Todo, persons: &[Person], now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_todo(&mut out, todo, persons, now)
    }

    pub fn print_persons(&self, persons: &[Person]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_persons(&mut out, persons)
    }

    pub fn write_card<W: Write>(
        &self,
        mut out: W,
        title: &str,
        snapshot: &Snapshot,
        view: &ViewState,
        now: NaiveDateTime,
        by_urgency: bool,
    ) -> anyhow::Result<()> {
        let stats = Stats::collect(&snapshot.todos, now);
        stats.check_provider_overdue(snapshot.overdue_count);

        writeln!(out, "{title}")?;
        writeln!(
            out,
            "{} total, {} active, {} overdue, {} urgent",
            stats.total, stats.active, stats.overdue, stats.urgent
        )?;
        writeln!(
            out,
            "filter: {}{}",
            view.active_filter,
            if view.show_completed { "" } else { " (completed hidden)" }
        )?;
        writeln!(out)?;

        let mut visible = apply(&snapshot.todos, view, now);
        if by_urgency {
            sort_by_urgency(&mut visible, now);
        }
        if visible.is_empty() {
            writeln!(out, "No todos.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Due".to_string(),
            "Type".to_string(),
            "Title".to_string(),
            "People".to_string(),
            "State".to_string(),
        ];

        let rows = visible
            .into_iter()
            .map(|todo| {
                let assessment = assess(todo, now);
                let code = match assessment.urgency {
                    Urgency::Overdue => Some("31"),
                    Urgency::Urgent => Some("33"),
                    Urgency::Completed => Some("2"),
                    Urgency::Normal => None,
                };
                let paint = |text: String| match code {
                    Some(code) => self.paint(&text, code),
                    None => text,
                };

                let mut title = todo.title.clone();
                if todo.recurring {
                    title.push_str(" (recurring)");
                }
                let people = resolve_badges(todo, &snapshot.persons)
                    .into_iter()
                    .map(|badge| badge.name)
                    .collect::<Vec<_>>()
                    .join(", ");

                vec![
                    todo.id.clone(),
                    paint(due_text(todo)),
                    todo.todo_type.label().to_string(),
                    paint(title),
                    people,
                    paint(state_text(todo, now)),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn write_todo<W: Write>(
        &self,
        mut out: W,
        todo: &Todo,
        persons: &[Person],
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        writeln!(out, "id        {}", todo.id)?;
        writeln!(out, "title     {}", todo.title)?;
        if let Some(description) = todo.description.as_deref().filter(|d| !d.trim().is_empty()) {
            writeln!(out, "desc      {description}")?;
        }
        writeln!(out, "due       {}", due_text(todo))?;
        writeln!(out, "type      {}", todo.todo_type.label())?;
        if let Some(rule) = todo.recurring.then_some(todo.recurring_rule).flatten() {
            writeln!(out, "repeats   every {} {}", rule.interval, rule.unit)?;
        }

        let state = state_text(todo, now);
        if !state.is_empty() {
            writeln!(out, "state     {state}")?;
        }

        let badges = resolve_badges(todo, persons);
        if !badges.is_empty() {
            let names = badges
                .iter()
                .map(|badge| format!("{} ({})", badge.name, badge.color))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "people    {names}")?;
        }

        if !todo.items.is_empty() {
            writeln!(out, "items")?;
            for item in &todo.items {
                let mark = if item.checked { "x" } else { " " };
                match item.quantity_text() {
                    Some(quantity) => {
                        writeln!(out, "  [{mark}] {} ({quantity})  {}", item.name, item.id)?;
                    }
                    None => writeln!(out, "  [{mark}] {}  {}", item.name, item.id)?,
                }
            }
        }

        if let Some(result) = todo.result.as_deref().filter(|r| !r.trim().is_empty()) {
            writeln!(out, "result    {result}")?;
        }

        Ok(())
    }

    pub fn write_persons<W: Write>(&self, mut out: W, persons: &[Person]) -> anyhow::Result<()> {
        if persons.is_empty() {
            writeln!(out, "No persons.")?;
            return Ok(());
        }

        let headers = vec!["ID".to_string(), "Name".to_string(), "Color".to_string()];
        let rows = persons
            .iter()
            .map(|person| {
                vec![
                    person.id.clone(),
                    person.name.clone(),
                    display_color(&person.color).to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn due_text(todo: &Todo) -> String {
    match todo.due_date() {
        Some(date) => format!("{date} {}", todo.effective_due_time()),
        None => NO_DUE_DATE.to_string(),
    }
}

fn state_text(todo: &Todo, now: NaiveDateTime) -> String {
    let assessment = assess(todo, now);
    match assessment.urgency {
        Urgency::Overdue => match assessment.hours_overdue {
            Some(hours) => format!("overdue by {hours}h"),
            None => "overdue".to_string(),
        },
        Urgency::Urgent => match assessment.hours_remaining {
            Some(hours) => format!("due in {hours}h"),
            None => "urgent".to_string(),
        },
        Urgency::Completed => match next_due(todo) {
            Some(next) => format!("done, next {next}"),
            None => "done".to_string(),
        },
        Urgency::Normal => String::new(),
    }
}

/// Due date the backend will give the follow-up of a completed recurring
/// todo.
fn next_due(todo: &Todo) -> Option<String> {
    let rule = todo.recurring_rule.filter(|_| todo.recurring)?;
    let completed_on = parse_completion_date(todo.completed_date.as_deref()?).ok()?;
    next_occurrence(completed_on, &rule).ok().map(format_date)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(widths.iter().copied()) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in widths.iter().copied() {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use todo_manager_shared::{
        Item, Person, PersonRef, RecurrenceUnit, RecurringRule, Snapshot, Todo, TodoType,
    };

    use super::{Renderer, strip_ansi};
    use crate::filter::{ActiveFilter, ViewState};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid")
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            todos: vec![
                Todo {
                    id: "late".to_string(),
                    title: "Pay rent".to_string(),
                    due_date: Some("2024-03-01".to_string()),
                    due_time: Some("07:00".to_string()),
                    persons: vec![PersonRef::from("p1")],
                    ..Todo::default()
                },
                Todo {
                    id: "open".to_string(),
                    title: "Read".to_string(),
                    ..Todo::default()
                },
                Todo {
                    id: "done".to_string(),
                    title: "Water plants".to_string(),
                    completed: true,
                    completed_date: Some("2024-01-31".to_string()),
                    recurring: true,
                    recurring_rule: Some(RecurringRule {
                        interval: 1,
                        unit: RecurrenceUnit::Months,
                    }),
                    ..Todo::default()
                },
            ],
            persons: vec![Person {
                id: "p1".to_string(),
                name: "Jürgen".to_string(),
                color: String::new(),
            }],
            overdue_count: Some(1),
        }
    }

    fn card(view: &ViewState, by_urgency: bool) -> String {
        let mut buf = Vec::new();
        Renderer::plain()
            .write_card(&mut buf, "Home", &snapshot(), view, now(), by_urgency)
            .expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn card_shows_stats_and_states() {
        let text = card(&ViewState::default(), false);
        assert!(text.starts_with("Home\n3 total, 2 active, 1 overdue, 0 urgent\n"));
        assert!(text.contains("2024-03-01 07:00"));
        assert!(text.contains("overdue by 5h"));
        assert!(text.contains("No due date"));
        assert!(text.contains("Jürgen"));
        assert!(text.contains("done, next 2024-02-29"));
        assert!(text.contains("Water plants (recurring)"));
    }

    #[test]
    fn filter_and_ordering_apply() {
        let view = ViewState {
            show_completed: false,
            active_filter: ActiveFilter::All,
        };
        let text = card(&view, true);
        assert!(!text.contains("Water plants"));
        let late = text.find("Pay rent").expect("late row");
        let open = text.find("Read").expect("open row");
        assert!(late < open);

        let view = ViewState {
            show_completed: true,
            active_filter: ActiveFilter::Urgent,
        };
        assert!(card(&view, false).contains("No todos."));
    }

    #[test]
    fn todo_detail_lists_items_and_result() {
        let todo = Todo {
            id: "t".to_string(),
            title: "Camping".to_string(),
            todo_type: TodoType::Packing,
            items: vec![
                Item {
                    id: "i1".to_string(),
                    name: "Tent".to_string(),
                    quantity: Some("1".to_string()),
                    checked: true,
                },
                Item {
                    id: "i2".to_string(),
                    name: "Stove".to_string(),
                    quantity: Some(String::new()),
                    checked: false,
                },
            ],
            result: Some("all packed".to_string()),
            ..Todo::default()
        };
        let mut buf = Vec::new();
        Renderer::plain()
            .write_todo(&mut buf, &todo, &[], now())
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("type      Packing list"));
        assert!(text.contains("[x] Tent (1)  i1"));
        assert!(text.contains("[ ] Stove  i2"));
        assert!(text.contains("result    all packed"));
    }

    #[test]
    fn ansi_is_ignored_for_width() {
        assert_eq!(strip_ansi("\x1b[31mlate\x1b[0m"), "late");
    }
}
