use std::cell::Cell;
use std::fs;
use std::path::Path;

use tempfile::tempdir;
use todo_manager_core::cli::{CardCommand, PersonCommand, TodoArgs};
use todo_manager_core::commands::Card;
use todo_manager_core::config::Config;
use todo_manager_core::dispatch::UserPrompt;
use todo_manager_core::render::Renderer;
use todo_manager_core::snapshot::{Outbox, read_outbox};
use todo_manager_shared::TodoType;

struct Scripted {
    answer: bool,
    asked: Cell<usize>,
}

impl UserPrompt for Scripted {
    fn confirm(&self, _message: &str) -> bool {
        self.asked.set(self.asked.get() + 1);
        self.answer
    }

    fn alert(&self, _message: &str) {}
}

const SNAPSHOT: &str = r##"{
  "todos": [
    {
      "id": "t1",
      "title": "Pack for camping",
      "due_date": "2030-06-01",
      "due_time": "09:30",
      "todo_type": "packing",
      "persons": [{"id": "p1", "name": "Mo", "color": "#ff9800"}],
      "items": [
        {"id": "i1", "name": "Tent", "quantity": "1", "checked": true},
        {"id": "i2", "name": "Lamp", "checked": false}
      ]
    }
  ],
  "persons": [
    {"id": "p1", "name": "Mo", "color": "#ff9800"},
    {"id": "p2", "name": "Lu"}
  ]
}"##;

fn open(dir: &Path, answer: bool) -> Card<Outbox, Scripted> {
    let snapshot = dir.join("snapshot.json");
    fs::write(&snapshot, SNAPSHOT).expect("write snapshot");
    Card::open(
        &Config::default(),
        &snapshot,
        Outbox::new(Some(dir.join("outbox.jsonl"))),
        Scripted {
            answer,
            asked: Cell::new(0),
        },
        Renderer::plain(),
    )
    .expect("open card")
}

#[tokio::test]
async fn edit_add_and_delete_reach_the_outbox() {
    let dir = tempdir().expect("tempdir");
    let mut card = open(dir.path(), true);

    card.execute(CardCommand::Edit {
        todo_id: "t1".to_string(),
        fields: TodoArgs {
            persons: vec!["p2".to_string()],
            items: vec!["Stove=2".to_string()],
            ..TodoArgs::default()
        },
    })
    .await
    .expect("edit");

    card.execute(CardCommand::Add(TodoArgs {
        title: Some("Call plumber".to_string()),
        due: Some("2030-06-02".to_string()),
        todo_type: Some(TodoType::Complex),
        result: Some("booked".to_string()),
        ..TodoArgs::default()
    }))
    .await
    .expect("add");

    card.execute(CardCommand::Delete {
        todo_id: "t1".to_string(),
    })
    .await
    .expect("delete");

    let entries = read_outbox(&dir.path().join("outbox.jsonl")).expect("outbox");
    let names: Vec<&str> = entries.iter().map(|e| e.command.as_str()).collect();
    assert_eq!(names, vec!["update_todo", "create_todo", "delete_todo"]);

    let update = &entries[0].data;
    assert_eq!(update["todo_id"], "t1");
    assert_eq!(update["due_time"], "09:30");
    assert_eq!(update["todo_type"], "packing");
    assert_eq!(update["persons"], serde_json::json!(["p1", "p2"]));
    assert_eq!(update["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(update["items"][0]["checked"], false);
    assert_eq!(update["items"][1]["quantity"], "");
    assert_eq!(update["items"][2]["name"], "Stove");

    let create = &entries[1].data;
    assert_eq!(create["title"], "Call plumber");
    assert_eq!(create["due_time"], "23:59");
    assert_eq!(create["result"], "booked");
    assert!(create.get("todo_id").is_none());
    assert!(create.get("description").is_none());

    assert_eq!(entries[2].data["todo_id"], "t1");
    assert_eq!(card.dispatcher.prompt().asked.get(), 1);
}

#[tokio::test]
async fn rejected_input_never_reaches_the_outbox() {
    let dir = tempdir().expect("tempdir");
    let mut card = open(dir.path(), false);

    let err = card
        .execute(CardCommand::Add(TodoArgs::default()))
        .await
        .expect_err("missing title");
    assert_eq!(err.to_string(), "Title is required.");

    let err = card
        .execute(CardCommand::Edit {
            todo_id: "gone".to_string(),
            fields: TodoArgs::default(),
        })
        .await
        .expect_err("stale id");
    assert_eq!(err.to_string(), "Todo gone no longer exists.");

    card.execute(CardCommand::Person {
        action: PersonCommand::Delete {
            person_id: "p1".to_string(),
        },
    })
    .await
    .expect("declined delete is not an error");

    assert!(card
        .execute(CardCommand::ToggleItem {
            todo_id: "t1".to_string(),
            item_id: "nope".to_string(),
        })
        .await
        .is_err());

    assert!(!dir.path().join("outbox.jsonl").exists());
}

#[tokio::test]
async fn person_commands_and_item_toggle() {
    let dir = tempdir().expect("tempdir");
    let mut card = open(dir.path(), true);

    card.execute(CardCommand::Person {
        action: PersonCommand::Add {
            name: "Ida".to_string(),
            color: None,
        },
    })
    .await
    .expect("add person");
    card.execute(CardCommand::Person {
        action: PersonCommand::Edit {
            person_id: "p2".to_string(),
            name: None,
            color: Some("#00bcd4".to_string()),
        },
    })
    .await
    .expect("edit person");
    card.execute(CardCommand::ToggleItem {
        todo_id: "t1".to_string(),
        item_id: "i2".to_string(),
    })
    .await
    .expect("toggle");
    card.execute(CardCommand::Complete {
        todo_id: "t1".to_string(),
    })
    .await
    .expect("complete");

    let entries = read_outbox(&dir.path().join("outbox.jsonl")).expect("outbox");
    assert_eq!(entries[0].command, "create_person");
    assert_eq!(entries[0].data["person_color"], "#1976d2");
    assert_eq!(entries[1].command, "update_person");
    assert_eq!(entries[1].data["person_name"], "Lu");
    assert_eq!(entries[1].data["person_color"], "#00bcd4");
    assert_eq!(entries[2].data["item_id"], "i2");
    assert_eq!(entries[3].command, "complete_todo");
}
