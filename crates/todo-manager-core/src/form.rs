use chrono::Utc;
use todo_manager_shared::{
    DEFAULT_DUE_TIME, DEFAULT_PERSON_COLOR, Item, Person, RecurrenceUnit, RecurringRule, Todo,
    TodoDraft, TodoType,
};
use tracing::debug;

use crate::error::CardError;

const DEFAULT_INTERVAL: &str = "1";

/// One person checkbox in the todo editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonOption {
    pub id: String,
    pub name: String,
    pub color: String,
    pub selected: bool,
}

/// One editable checklist row. `checked` is only carried into the draft when
/// the row explicitly holds a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub quantity: String,
    pub checked: Option<bool>,
}

/// Time-based item ids, strictly increasing within one generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIdGen {
    last_millis: i64,
}

impl ItemIdGen {
    pub fn next_id(&mut self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, millis: i64) -> String {
        let stamp = millis.max(self.last_millis + 1);
        self.last_millis = stamp;
        format!("item_{stamp}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoForm {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub due_time: String,
    pub todo_type: TodoType,
    pub recurring: bool,
    pub recurring_interval: String,
    pub recurring_unit: RecurrenceUnit,
    pub persons: Vec<PersonOption>,
    pub items: Vec<ItemRow>,
    pub result: String,
    pub error: Option<String>,
    preserve_item_checks: bool,
    ids: ItemIdGen,
}

impl TodoForm {
    /// Empty editor offering one checkbox per known person.
    pub fn new(persons: &[Person]) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            due_date: String::new(),
            due_time: DEFAULT_DUE_TIME.to_string(),
            todo_type: TodoType::Simple,
            recurring: false,
            recurring_interval: DEFAULT_INTERVAL.to_string(),
            recurring_unit: RecurrenceUnit::Days,
            persons: persons
                .iter()
                .map(|person| PersonOption {
                    id: person.id.clone(),
                    name: person.name.clone(),
                    color: person.color.clone(),
                    selected: false,
                })
                .collect(),
            items: Vec::new(),
            result: String::new(),
            error: None,
            preserve_item_checks: false,
            ids: ItemIdGen::default(),
        }
    }

    /// Keep each item's checked flag through populate/extract instead of
    /// resetting it on save.
    #[must_use]
    pub fn with_preserve_item_checks(mut self, preserve: bool) -> Self {
        self.preserve_item_checks = preserve;
        self
    }

    pub fn reset(&mut self) {
        self.title.clear();
        self.description.clear();
        self.due_date.clear();
        self.due_time = DEFAULT_DUE_TIME.to_string();
        self.todo_type = TodoType::Simple;
        self.recurring = false;
        self.recurring_interval = DEFAULT_INTERVAL.to_string();
        self.recurring_unit = RecurrenceUnit::Days;
        for option in &mut self.persons {
            option.selected = false;
        }
        self.items.clear();
        self.result.clear();
        self.error = None;
    }

    #[tracing::instrument(skip_all, fields(todo_id = %todo.id))]
    pub fn populate(&mut self, todo: &Todo) {
        self.title = todo.title.clone();
        self.description = todo.description.clone().unwrap_or_default();
        self.due_date = todo.due_date.clone().unwrap_or_default();
        self.due_time = todo.effective_due_time().to_string();
        self.todo_type = todo.todo_type;
        self.recurring = todo.recurring;

        let rule = todo.recurring_rule.unwrap_or_default();
        self.recurring_interval = rule.interval.max(1).to_string();
        self.recurring_unit = rule.unit;

        for option in &mut self.persons {
            option.selected = false;
        }
        for person_id in todo.person_ids() {
            match self.persons.iter_mut().find(|o| o.id == person_id) {
                Some(option) => option.selected = true,
                None => debug!(person_id, "assigned person has no checkbox"),
            }
        }

        self.items.clear();
        for (position, item) in todo.items.iter().enumerate() {
            let id = match item.id.trim() {
                "" => format!("{}_item_{position}", todo.id),
                id => id.to_string(),
            };
            self.push_row(id, Some(item));
        }

        self.result = todo.result.clone().unwrap_or_default();
        self.error = None;
    }

    /// Builds the command payload. Fails before reading anything else when
    /// the title is blank.
    #[tracing::instrument(skip_all)]
    pub fn extract(&self) -> Result<TodoDraft, CardError> {
        if self.title.trim().is_empty() {
            return Err(CardError::Validation { field: "Title" });
        }

        let recurring_rule = self.recurring.then(|| RecurringRule {
            interval: parse_interval(&self.recurring_interval),
            unit: self.recurring_unit,
        });

        let items = self
            .items
            .iter()
            .filter(|row| !row.name.trim().is_empty())
            .map(|row| Item {
                id: row.id.clone(),
                name: row.name.clone(),
                quantity: Some(row.quantity.clone()),
                checked: row.checked.unwrap_or(false),
            })
            .collect();

        let result = (self.todo_type == TodoType::Complex && !self.result.trim().is_empty())
            .then(|| self.result.clone());

        Ok(TodoDraft {
            title: self.title.clone(),
            description: non_empty(&self.description),
            due_date: non_empty(self.due_date.trim()),
            due_time: match self.due_time.trim() {
                "" => DEFAULT_DUE_TIME.to_string(),
                time => time.to_string(),
            },
            todo_type: self.todo_type,
            persons: self
                .persons
                .iter()
                .filter(|option| option.selected)
                .map(|option| option.id.clone())
                .collect(),
            recurring: self.recurring,
            recurring_rule,
            items,
            result,
        })
    }

    /// Appends a checklist row, blank when `item` is `None`. Rows without an
    /// id get a fresh generated one.
    pub fn add_item(&mut self, item: Option<&Item>) -> &ItemRow {
        let id = match item.map(|item| item.id.trim()) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.ids.next_id(),
        };
        self.push_row(id, item)
    }

    fn push_row(&mut self, id: String, item: Option<&Item>) -> &ItemRow {
        let row = ItemRow {
            id,
            name: item.map(|item| item.name.clone()).unwrap_or_default(),
            quantity: item
                .and_then(|item| item.quantity.clone())
                .unwrap_or_default(),
            checked: item
                .filter(|_| self.preserve_item_checks)
                .map(|item| item.checked),
        };
        self.items.push(row);
        &self.items[self.items.len() - 1]
    }

    pub fn remove_item(&mut self, item_id: &str) -> Option<ItemRow> {
        let idx = self.items.iter().position(|row| row.id == item_id)?;
        Some(self.items.remove(idx))
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut ItemRow> {
        self.items.iter_mut().find(|row| row.id == item_id)
    }

    /// Returns false when no checkbox exists for `person_id`.
    pub fn set_person(&mut self, person_id: &str, selected: bool) -> bool {
        match self.persons.iter_mut().find(|o| o.id == person_id) {
            Some(option) => {
                option.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn show_items(&self) -> bool {
        self.todo_type.has_items()
    }

    pub fn show_result(&self) -> bool {
        self.todo_type.has_result()
    }
}

fn parse_interval(raw: &str) -> u32 {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|interval| *interval >= 1)
        .unwrap_or(1)
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDraft {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonForm {
    pub name: String,
    pub color: String,
    pub error: Option<String>,
    default_color: String,
}

impl Default for PersonForm {
    fn default() -> Self {
        Self::new(DEFAULT_PERSON_COLOR)
    }
}

impl PersonForm {
    pub fn new(default_color: &str) -> Self {
        Self {
            name: String::new(),
            color: default_color.to_string(),
            error: None,
            default_color: default_color.to_string(),
        }
    }

    pub fn populate(&mut self, person: &Person) {
        self.name = person.name.clone();
        self.color = if person.color.trim().is_empty() {
            self.default_color.clone()
        } else {
            person.color.clone()
        };
        self.error = None;
    }

    pub fn extract(&self) -> Result<PersonDraft, CardError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CardError::Validation { field: "Name" });
        }
        let color = match self.color.trim() {
            "" => self.default_color.clone(),
            color => color.to_string(),
        };
        Ok(PersonDraft {
            name: name.to_string(),
            color,
        })
    }
}
