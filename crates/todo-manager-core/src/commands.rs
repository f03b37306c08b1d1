use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use todo_manager_shared::{Snapshot, Todo};
use tracing::{debug, info};

use crate::cli::{CardCommand, ListArgs, PersonCommand};
use crate::config::Config;
use crate::datetime::local_now;
use crate::dispatch::{
    CommandService, DispatchSettings, Dispatcher, EditorMode, Outcome, Session, UserPrompt,
};
use crate::form::TodoForm;
use crate::render::Renderer;
use crate::snapshot::load_snapshot;

/// Everything one invocation works against.
pub struct Card<S, P> {
    pub title: String,
    pub snapshot_path: PathBuf,
    pub snapshot: Snapshot,
    pub session: Session,
    pub dispatcher: Dispatcher<S, P>,
    pub renderer: Renderer,
    pub refresh: bool,
}

impl<S: CommandService, P: UserPrompt> Card<S, P> {
    pub fn open(
        cfg: &Config,
        snapshot_path: &Path,
        service: S,
        prompt: P,
        renderer: Renderer,
    ) -> anyhow::Result<Self> {
        let snapshot = load_snapshot(snapshot_path)?;
        let settings = DispatchSettings::from_config(cfg)?;
        Ok(Self {
            title: cfg.title(),
            snapshot_path: snapshot_path.to_path_buf(),
            snapshot,
            session: Session::new(cfg.view_state()?),
            dispatcher: Dispatcher::new(service, prompt, settings),
            renderer,
            refresh: false,
        })
    }

    #[tracing::instrument(skip(self, command))]
    pub async fn execute(&mut self, command: CardCommand) -> anyhow::Result<()> {
        let outcome = match command {
            CardCommand::List(args) => return self.list(&args),
            CardCommand::Show { todo_id } => {
                let todo = self
                    .snapshot
                    .todo(&todo_id)
                    .ok_or_else(|| anyhow!("todo not found: {todo_id}"))?;
                return self
                    .renderer
                    .print_todo(todo, &self.snapshot.persons, local_now());
            }
            CardCommand::Add(fields) => {
                self.dispatcher
                    .open_todo_editor(&mut self.session, &self.snapshot, None);
                self.fill_todo_form(|form| fields.apply_to(form))?;
                self.dispatcher.submit_todo(&mut self.session).await
            }
            CardCommand::Edit { todo_id, fields } => {
                self.dispatcher
                    .open_todo_editor(&mut self.session, &self.snapshot, Some(&todo_id));
                self.require_edit_mode()?;
                self.fill_todo_form(|form| fields.apply_to(form))?;
                self.dispatcher.submit_todo(&mut self.session).await
            }
            CardCommand::Complete { todo_id } => {
                self.require_todo(&todo_id)?;
                self.dispatcher
                    .complete_todo(&mut self.session, &todo_id)
                    .await
            }
            CardCommand::ToggleItem { todo_id, item_id } => {
                let todo = self.require_todo(&todo_id)?;
                if !todo.items.iter().any(|item| item.id == item_id) {
                    bail!("todo {todo_id} has no item {item_id}");
                }
                self.dispatcher
                    .toggle_item(&mut self.session, &todo_id, &item_id)
                    .await
            }
            CardCommand::Delete { todo_id } => {
                self.dispatcher.delete_todo(&mut self.session, &todo_id).await
            }
            CardCommand::Person { action } => self.person(action).await?,
        };

        self.finish(outcome).await
    }

    async fn person(&mut self, action: PersonCommand) -> anyhow::Result<Outcome> {
        let outcome = match action {
            PersonCommand::List => {
                self.dispatcher.open_person_list(&mut self.session);
                self.renderer.print_persons(&self.snapshot.persons)?;
                self.dispatcher.close_person_list(&mut self.session);
                return Ok(Outcome::Cancelled);
            }
            PersonCommand::Add { name, color } => {
                self.dispatcher
                    .open_person_editor(&mut self.session, &self.snapshot, None);
                if let Some(editor) = self.session.person_editor.as_mut() {
                    editor.form.name = name;
                    if let Some(color) = color {
                        editor.form.color = color;
                    }
                }
                self.dispatcher.submit_person(&mut self.session).await
            }
            PersonCommand::Edit {
                person_id,
                name,
                color,
            } => {
                self.dispatcher
                    .open_person_editor(&mut self.session, &self.snapshot, Some(&person_id));
                let editor = self
                    .session
                    .person_editor
                    .as_mut()
                    .ok_or_else(|| anyhow!("person editor did not open"))?;
                if editor.mode == EditorMode::Create {
                    bail!(
                        "{}",
                        editor.form.error.clone().unwrap_or_default()
                    );
                }
                if let Some(name) = name {
                    editor.form.name = name;
                }
                if let Some(color) = color {
                    editor.form.color = color;
                }
                self.dispatcher.submit_person(&mut self.session).await
            }
            PersonCommand::Delete { person_id } => {
                self.dispatcher
                    .delete_person(&mut self.session, &self.snapshot, &person_id)
                    .await
            }
        };
        Ok(outcome)
    }

    fn list(&mut self, args: &ListArgs) -> anyhow::Result<()> {
        let view = &mut self.session.view;
        if let Some(filter) = args.filter {
            view.active_filter = filter;
        }
        if args.hide_completed {
            view.show_completed = false;
        }
        if args.show_completed {
            view.show_completed = true;
        }
        debug!(?view, "listing");

        self.renderer.print_card(
            &self.title,
            &self.snapshot,
            &self.session.view,
            local_now(),
            args.by_urgency,
        )
    }

    fn fill_todo_form<F>(&mut self, fill: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut TodoForm) -> anyhow::Result<()>,
    {
        let editor = self
            .session
            .todo_editor
            .as_mut()
            .ok_or_else(|| anyhow!("todo editor did not open"))?;
        fill(&mut editor.form)
    }

    fn require_edit_mode(&self) -> anyhow::Result<()> {
        match &self.session.todo_editor {
            Some(editor) if editor.mode == EditorMode::Create => {
                bail!("{}", editor.form.error.clone().unwrap_or_default())
            }
            Some(_) => Ok(()),
            None => Err(anyhow!("todo editor did not open")),
        }
    }

    fn require_todo(&self, todo_id: &str) -> anyhow::Result<&Todo> {
        self.snapshot
            .todo(todo_id)
            .ok_or_else(|| anyhow!("todo not found: {todo_id}"))
    }

    /// Turns a dispatch outcome into the process result, honouring the
    /// refresh request when `--refresh` was given.
    async fn finish(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        match outcome {
            Outcome::Applied { refresh } => {
                info!(after_ms = refresh.after.as_millis() as u64, "refresh requested");
                if self.refresh {
                    tokio::time::sleep(refresh.after).await;
                    self.snapshot = load_snapshot(&self.snapshot_path)
                        .context("failed to refresh snapshot")?;
                    self.list(&ListArgs::default())?;
                }
                Ok(())
            }
            Outcome::Cancelled => Ok(()),
            Outcome::Invalid(err) => Err(anyhow!(err.user_message())),
            Outcome::Failed(err) => Err(anyhow::Error::new(err)),
        }
    }
}
