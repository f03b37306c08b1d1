use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};

pub const DEFAULT_PERSON_COLOR: &str =
  "#1976d2";
pub const DEFAULT_DUE_TIME: &str =
  "23:59";

fn default_person_color() -> String {
  DEFAULT_PERSON_COLOR.to_string()
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TodoType {
  #[default]
  Simple,
  Complex,
  Shopping,
  Packing
}

impl TodoType {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Simple => "simple",
      | Self::Complex => "complex",
      | Self::Shopping => "shopping",
      | Self::Packing => "packing"
    }
  }

  #[must_use]
  pub fn label(self) -> &'static str {
    match self {
      | Self::Simple => "Simple",
      | Self::Complex => "Complex",
      | Self::Shopping => {
        "Shopping list"
      }
      | Self::Packing => "Packing list"
    }
  }

  /// Shopping and packing todos carry
  /// a checklist.
  #[must_use]
  pub fn has_items(self) -> bool {
    matches!(
      self,
      Self::Shopping | Self::Packing
    )
  }

  #[must_use]
  pub fn has_result(self) -> bool {
    self == Self::Complex
  }
}

impl fmt::Display for TodoType {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TodoType {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "simple" => Ok(Self::Simple),
      | "complex" => Ok(Self::Complex),
      | "shopping" => Ok(Self::Shopping),
      | "packing" => Ok(Self::Packing),
      | other => {
        Err(format!(
          "unknown todo type: {other}"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
  #[default]
  Days,
  Weeks,
  Months
}

impl RecurrenceUnit {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Days => "days",
      | Self::Weeks => "weeks",
      | Self::Months => "months"
    }
  }
}

impl fmt::Display for RecurrenceUnit {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RecurrenceUnit {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "days" => Ok(Self::Days),
      | "weeks" => Ok(Self::Weeks),
      | "months" => Ok(Self::Months),
      | other => {
        Err(format!(
          "unknown recurrence unit: \
           {other}"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct RecurringRule {
  pub interval: u32,
  #[serde(default)]
  pub unit:     RecurrenceUnit
}

impl Default for RecurringRule {
  fn default() -> Self {
    Self {
      interval: 1,
      unit:     RecurrenceUnit::Days
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Item {
  #[serde(default)]
  pub id:       String,
  #[serde(default)]
  pub name:     String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub quantity: Option<String>,
  #[serde(default)]
  pub checked:  bool
}

impl Item {
  /// Quantity for display; empty
  /// strings count as absent.
  #[must_use]
  pub fn quantity_text(
    &self
  ) -> Option<&str> {
    self
      .quantity
      .as_deref()
      .filter(|q| !q.trim().is_empty())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Person {
  pub id:    String,
  #[serde(default)]
  pub name:  String,
  #[serde(default = "default_person_color")]
  pub color: String
}

/// A todo's assignee as delivered by the
/// state provider: either the bare
/// person id or an embedded person
/// record.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum PersonRef {
  Id(String),
  Full(Person)
}

impl PersonRef {
  #[must_use]
  pub fn id(&self) -> &str {
    match self {
      | Self::Id(id) => id.as_str(),
      | Self::Full(person) => {
        person.id.as_str()
      }
    }
  }
}

impl From<&str> for PersonRef {
  fn from(id: &str) -> Self {
    Self::Id(id.to_string())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct Todo {
  pub id:             String,
  #[serde(default)]
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub due_date:       Option<String>,
  #[serde(default)]
  pub due_time:       Option<String>,
  #[serde(default)]
  pub todo_type:      TodoType,
  #[serde(default)]
  pub persons:        Vec<PersonRef>,
  #[serde(default)]
  pub recurring:      bool,
  #[serde(default)]
  pub recurring_rule: Option<RecurringRule>,
  #[serde(default)]
  pub items:          Vec<Item>,
  #[serde(default)]
  pub result:         Option<String>,
  #[serde(default)]
  pub completed:      bool,
  #[serde(default)]
  pub completed_date: Option<String>
}

impl Todo {
  /// Due date with blank strings
  /// treated as absent.
  #[must_use]
  pub fn due_date(&self) -> Option<&str> {
    self
      .due_date
      .as_deref()
      .map(str::trim)
      .filter(|d| !d.is_empty())
  }

  #[must_use]
  pub fn effective_due_time(
    &self
  ) -> &str {
    self
      .due_time
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .unwrap_or(DEFAULT_DUE_TIME)
  }

  pub fn person_ids(
    &self
  ) -> impl Iterator<Item = &str> {
    self.persons.iter().map(PersonRef::id)
  }
}

/// The read-only view published by the
/// external state provider.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct Snapshot {
  #[serde(default)]
  pub todos:         Vec<Todo>,
  #[serde(default)]
  pub persons:       Vec<Person>,
  #[serde(default)]
  pub overdue_count: Option<u64>
}

impl Snapshot {
  #[must_use]
  pub fn todo(
    &self,
    todo_id: &str
  ) -> Option<&Todo> {
    self
      .todos
      .iter()
      .find(|todo| todo.id == todo_id)
  }

  #[must_use]
  pub fn person(
    &self,
    person_id: &str
  ) -> Option<&Person> {
    self
      .persons
      .iter()
      .find(|person| person.id == person_id)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoDraft {
  pub title:          String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description:    Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:       Option<String>,
  pub due_time:       String,
  pub todo_type:      TodoType,
  pub persons:        Vec<String>,
  pub recurring:      bool,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub recurring_rule: Option<RecurringRule>,
  pub items:          Vec<Item>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub result:         Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoUpdateArgs {
  pub todo_id: String,
  #[serde(flatten)]
  pub draft:   TodoDraft
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TodoIdArg {
  pub todo_id: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ItemToggleArg {
  pub todo_id: String,
  pub item_id: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct PersonCreate {
  pub person_name:  String,
  pub person_color: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct PersonUpdate {
  pub person_id:    String,
  pub person_name:  String,
  pub person_color: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct PersonIdArg {
  pub person_id: String
}

#[cfg(test)]
mod tests {
  use super::{
    PersonRef,
    Snapshot,
    TodoDraft,
    TodoType,
    TodoUpdateArgs
  };

  #[test]
  fn person_refs_accept_ids_and_records()
  {
    let raw = r##"{
      "todos": [{
        "id": "t1",
        "title": "Groceries",
        "todo_type": "shopping",
        "persons": ["p1", {"id": "p2", "name": "Bo", "color": "#ff0000"}, {"id": "p3"}]
      }],
      "persons": [{"id": "p1", "name": "Al"}]
    }"##;

    let snapshot: Snapshot =
      serde_json::from_str(raw)
        .expect("snapshot parses");
    let todo = &snapshot.todos[0];
    let ids: Vec<&str> =
      todo.person_ids().collect();
    assert_eq!(ids, vec![
      "p1", "p2", "p3"
    ]);
    assert!(matches!(
      todo.persons[0],
      PersonRef::Id(_)
    ));
    assert!(matches!(
      todo.persons[2],
      PersonRef::Full(_)
    ));
    assert_eq!(
      snapshot.persons[0].color,
      "#1976d2"
    );
    assert_eq!(
      todo.todo_type,
      TodoType::Shopping
    );
  }

  #[test]
  fn blank_due_fields_are_absent() {
    let raw = r#"{"id": "t", "title": "x", "due_date": "  ", "due_time": ""}"#;
    let todo: super::Todo =
      serde_json::from_str(raw)
        .expect("todo parses");
    assert_eq!(todo.due_date(), None);
    assert_eq!(
      todo.effective_due_time(),
      "23:59"
    );
  }

  #[test]
  fn update_payload_flattens_draft() {
    let args = TodoUpdateArgs {
      todo_id: "t1".to_string(),
      draft:   TodoDraft {
        title:          "Pack".to_string(),
        description:    None,
        due_date:       Some(
          "2024-01-10".to_string()
        ),
        due_time:       "23:59"
          .to_string(),
        todo_type:      TodoType::Packing,
        persons:        vec![
          "p1".to_string(),
        ],
        recurring:      false,
        recurring_rule: None,
        items:          vec![],
        result:         None
      }
    };

    let value = serde_json::to_value(&args)
      .expect("serializes");
    let obj =
      value.as_object().expect("object");
    assert_eq!(obj["todo_id"], "t1");
    assert_eq!(obj["title"], "Pack");
    assert_eq!(obj["todo_type"], "packing");
    assert_eq!(obj["due_time"], "23:59");
    assert!(!obj.contains_key("description"));
    assert!(
      !obj.contains_key("recurring_rule")
    );
    assert!(!obj.contains_key("result"));
  }
}
