use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use todo_manager_shared::{
    ItemToggleArg, PersonCreate, PersonIdArg, PersonUpdate, Snapshot, TodoDraft, TodoIdArg,
    TodoUpdateArgs,
};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CardError, CommandError};
use crate::filter::ViewState;
use crate::form::{PersonForm, TodoForm};

/// One invocation of the external command layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateTodo(TodoDraft),
    UpdateTodo(TodoUpdateArgs),
    DeleteTodo(TodoIdArg),
    CompleteTodo(TodoIdArg),
    ToggleItem(ItemToggleArg),
    CreatePerson(PersonCreate),
    UpdatePerson(PersonUpdate),
    DeletePerson(PersonIdArg),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTodo(_) => "create_todo",
            Self::UpdateTodo(_) => "update_todo",
            Self::DeleteTodo(_) => "delete_todo",
            Self::CompleteTodo(_) => "complete_todo",
            Self::ToggleItem(_) => "toggle_item",
            Self::CreatePerson(_) => "create_person",
            Self::UpdatePerson(_) => "update_person",
            Self::DeletePerson(_) => "delete_person",
        }
    }

    /// Payload mapping sent alongside the command name.
    pub fn payload(&self) -> anyhow::Result<Value> {
        let value = match self {
            Self::CreateTodo(draft) => serde_json::to_value(draft),
            Self::UpdateTodo(args) => serde_json::to_value(args),
            Self::DeleteTodo(arg) | Self::CompleteTodo(arg) => serde_json::to_value(arg),
            Self::ToggleItem(arg) => serde_json::to_value(arg),
            Self::CreatePerson(arg) => serde_json::to_value(arg),
            Self::UpdatePerson(arg) => serde_json::to_value(arg),
            Self::DeletePerson(arg) => serde_json::to_value(arg),
        };
        value.with_context(|| format!("failed to encode {} payload", self.name()))
    }
}

/// The external command layer. Implementations perform the round trip and
/// report rejection; they never touch the snapshot the card is showing.
#[allow(async_fn_in_trait)]
pub trait CommandService {
    async fn call(&self, command: &Command) -> Result<(), CommandError>;
}

/// Confirmation dialogs and error alerts.
pub trait UserPrompt {
    fn confirm(&self, message: &str) -> bool;
    fn alert(&self, message: &str);
}

/// Asks the host to re-read the snapshot once `after` has elapsed. The delay
/// gives the provider time to publish the change; it is not a guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied { refresh: RefreshRequest },
    Cancelled,
    Invalid(CardError),
    Failed(CardError),
}

impl Outcome {
    #[must_use]
    pub fn refresh(&self) -> Option<RefreshRequest> {
        match self {
            Self::Applied { refresh } => Some(*refresh),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoEditor {
    pub mode: EditorMode,
    pub form: TodoForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonEditor {
    pub mode: EditorMode,
    pub form: PersonForm,
}

/// UI state of one card. Each concern has at most one open surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub view: ViewState,
    pub todo_editor: Option<TodoEditor>,
    pub person_editor: Option<PersonEditor>,
    pub person_list_open: bool,
}

impl Session {
    pub fn new(view: ViewState) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub settle_delay: Duration,
    pub default_person_color: String,
    pub preserve_item_checks: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            default_person_color: todo_manager_shared::DEFAULT_PERSON_COLOR.to_string(),
            preserve_item_checks: false,
        }
    }
}

impl DispatchSettings {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            settle_delay: cfg.settle_delay()?,
            default_person_color: cfg.default_person_color(),
            preserve_item_checks: cfg.preserve_item_checks(),
        })
    }
}

pub struct Dispatcher<S, P> {
    service: S,
    prompt: P,
    settings: DispatchSettings,
}

impl<S: CommandService, P: UserPrompt> Dispatcher<S, P> {
    pub fn new(service: S, prompt: P, settings: DispatchSettings) -> Self {
        Self {
            service,
            prompt,
            settings,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Opens the todo editor, populated from the snapshot when `todo_id`
    /// names a todo. A stale id opens a blank create form.
    #[tracing::instrument(skip(self, session, snapshot))]
    pub fn open_todo_editor(&self, session: &mut Session, snapshot: &Snapshot, todo_id: Option<&str>) {
        let mut form = TodoForm::new(&snapshot.persons)
            .with_preserve_item_checks(self.settings.preserve_item_checks);

        let mode = match todo_id.map(|id| (id, snapshot.todo(id))) {
            Some((id, Some(todo))) => {
                form.populate(todo);
                EditorMode::Edit(id.to_string())
            }
            Some((id, None)) => {
                warn!(todo_id = %id, "todo not in snapshot; opening blank form");
                let err = CardError::NotFound {
                    kind: "Todo",
                    id: id.to_string(),
                };
                form.error = Some(err.user_message());
                EditorMode::Create
            }
            None => EditorMode::Create,
        };

        session.todo_editor = Some(TodoEditor { mode, form });
    }

    pub fn close_todo_editor(&self, session: &mut Session) {
        session.todo_editor = None;
    }

    #[tracing::instrument(skip(self, session, snapshot))]
    pub fn open_person_editor(
        &self,
        session: &mut Session,
        snapshot: &Snapshot,
        person_id: Option<&str>,
    ) {
        let mut form = PersonForm::new(&self.settings.default_person_color);

        let mode = match person_id.map(|id| (id, snapshot.person(id))) {
            Some((id, Some(person))) => {
                form.populate(person);
                EditorMode::Edit(id.to_string())
            }
            Some((id, None)) => {
                warn!(person_id = %id, "person not in snapshot; opening blank form");
                let err = CardError::NotFound {
                    kind: "Person",
                    id: id.to_string(),
                };
                form.error = Some(err.user_message());
                EditorMode::Create
            }
            None => EditorMode::Create,
        };

        session.person_editor = Some(PersonEditor { mode, form });
    }

    pub fn close_person_editor(&self, session: &mut Session) {
        session.person_editor = None;
    }

    pub fn open_person_list(&self, session: &mut Session) {
        session.person_list_open = true;
    }

    pub fn close_person_list(&self, session: &mut Session) {
        session.person_list_open = false;
    }

    /// Saves the open todo editor as a create or update.
    pub async fn submit_todo(&self, session: &mut Session) -> Outcome {
        let Some(editor) = session.todo_editor.as_mut() else {
            warn!("submit without an open todo editor");
            return Outcome::Cancelled;
        };

        let draft = match editor.form.extract() {
            Ok(draft) => draft,
            Err(err) => {
                editor.form.error = Some(err.user_message());
                return Outcome::Invalid(err);
            }
        };

        let command = match &editor.mode {
            EditorMode::Create => Command::CreateTodo(draft),
            EditorMode::Edit(todo_id) => Command::UpdateTodo(TodoUpdateArgs {
                todo_id: todo_id.clone(),
                draft,
            }),
        };

        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                let message = err.user_message();
                editor.form.error = Some(message.clone());
                self.prompt.alert(&message);
                Outcome::Failed(err)
            }
        }
    }

    pub async fn submit_person(&self, session: &mut Session) -> Outcome {
        let Some(editor) = session.person_editor.as_mut() else {
            warn!("submit without an open person editor");
            return Outcome::Cancelled;
        };

        let draft = match editor.form.extract() {
            Ok(draft) => draft,
            Err(err) => {
                editor.form.error = Some(err.user_message());
                return Outcome::Invalid(err);
            }
        };

        let command = match &editor.mode {
            EditorMode::Create => Command::CreatePerson(PersonCreate {
                person_name: draft.name,
                person_color: draft.color,
            }),
            EditorMode::Edit(person_id) => Command::UpdatePerson(PersonUpdate {
                person_id: person_id.clone(),
                person_name: draft.name,
                person_color: draft.color,
            }),
        };

        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                let message = err.user_message();
                editor.form.error = Some(message.clone());
                self.prompt.alert(&message);
                Outcome::Failed(err)
            }
        }
    }

    pub async fn delete_todo(&self, session: &mut Session, todo_id: &str) -> Outcome {
        if !self.prompt.confirm("Delete this todo?") {
            info!(todo_id, "todo deletion cancelled");
            return Outcome::Cancelled;
        }

        let command = Command::DeleteTodo(TodoIdArg {
            todo_id: todo_id.to_string(),
        });
        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                self.prompt.alert(&format!("Delete failed: {}", command_reason(&err)));
                Outcome::Failed(err)
            }
        }
    }

    /// Deletes a person after confirmation. The backend also drops the
    /// person from every todo they were assigned to.
    pub async fn delete_person(
        &self,
        session: &mut Session,
        snapshot: &Snapshot,
        person_id: &str,
    ) -> Outcome {
        let name = snapshot
            .person(person_id)
            .map_or("this person", |person| person.name.as_str());
        let message = format!(
            "Delete {name}? They will also be removed from all todos they are assigned to."
        );
        if !self.prompt.confirm(&message) {
            info!(person_id, "person deletion cancelled");
            return Outcome::Cancelled;
        }

        let command = Command::DeletePerson(PersonIdArg {
            person_id: person_id.to_string(),
        });
        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                self.prompt.alert(&format!("Delete failed: {}", command_reason(&err)));
                Outcome::Failed(err)
            }
        }
    }

    /// Toggles completion on the backend.
    pub async fn complete_todo(&self, session: &mut Session, todo_id: &str) -> Outcome {
        let command = Command::CompleteTodo(TodoIdArg {
            todo_id: todo_id.to_string(),
        });
        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                self.prompt.alert(&format!("Update failed: {}", command_reason(&err)));
                Outcome::Failed(err)
            }
        }
    }

    pub async fn toggle_item(&self, session: &mut Session, todo_id: &str, item_id: &str) -> Outcome {
        let command = Command::ToggleItem(ItemToggleArg {
            todo_id: todo_id.to_string(),
            item_id: item_id.to_string(),
        });
        match self.send(command).await {
            Ok(refresh) => {
                close_edit_surfaces(session);
                Outcome::Applied { refresh }
            }
            Err(err) => {
                self.prompt
                    .alert(&format!("Item update failed: {}", command_reason(&err)));
                Outcome::Failed(err)
            }
        }
    }

    async fn send(&self, command: Command) -> Result<RefreshRequest, CardError> {
        let name = command.name();
        let request_id = Uuid::new_v4();
        let span = info_span!("dispatch", command = name, %request_id);

        async {
            info!("command invoked");
            match self.service.call(&command).await {
                Ok(()) => {
                    info!(
                        refresh_after_ms = self.settings.settle_delay.as_millis() as u64,
                        "command acknowledged"
                    );
                    Ok(RefreshRequest {
                        after: self.settings.settle_delay,
                    })
                }
                Err(source) => {
                    error!(error = %source, "command failed");
                    Err(CardError::Command {
                        command: name,
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Any accepted command closes both editors. The person list is a view, not
/// an edit surface, and stays open.
fn close_edit_surfaces(session: &mut Session) {
    session.todo_editor = None;
    session.person_editor = None;
}

fn command_reason(err: &CardError) -> String {
    match err {
        CardError::Command { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
