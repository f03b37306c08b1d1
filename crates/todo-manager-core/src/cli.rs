use std::ffi::OsString;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use todo_manager_shared::{RecurrenceUnit, TodoType};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::dispatch::UserPrompt;
use crate::filter::ActiveFilter;
use crate::form::TodoForm;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo-card",
    version,
    about = "Household todo card: list todos and emit backend commands",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "cardrc", global = true)]
    pub cardrc: Option<PathBuf>,

    /// Snapshot JSON published by the state provider.
    #[arg(long = "snapshot", global = true)]
    pub snapshot: Option<PathBuf>,

    /// Where commands are written; `-` for stdout.
    #[arg(long = "outbox", global = true)]
    pub outbox: Option<PathBuf>,

    /// Answer yes to confirmations.
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// After a command is accepted, wait the settle delay and print the
    /// refreshed card.
    #[arg(long = "refresh", global = true)]
    pub refresh: bool,

    #[command(subcommand)]
    pub command: Option<CardCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CardCommand {
    /// Show the card.
    List(ListArgs),
    /// Show one todo with its items.
    Show { todo_id: String },
    Add(TodoArgs),
    Edit {
        todo_id: String,
        #[command(flatten)]
        fields: TodoArgs,
    },
    /// Toggle completion.
    Complete { todo_id: String },
    ToggleItem { todo_id: String, item_id: String },
    Delete { todo_id: String },
    Person {
        #[command(subcommand)]
        action: PersonCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PersonCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Edit {
        person_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Delete { person_id: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub filter: Option<ActiveFilter>,

    #[arg(long, conflicts_with = "show_completed")]
    pub hide_completed: bool,

    #[arg(long)]
    pub show_completed: bool,

    /// Most pressing todos first.
    #[arg(long)]
    pub by_urgency: bool,
}

/// Field edits applied on top of a populated todo form.
#[derive(Args, Debug, Clone, Default)]
pub struct TodoArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// `YYYY-MM-DD`; empty clears the due date.
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub time: Option<String>,

    #[arg(long = "type")]
    pub todo_type: Option<TodoType>,

    /// Assign a person by id.
    #[arg(long = "person", action = ArgAction::Append)]
    pub persons: Vec<String>,

    #[arg(long = "unassign", action = ArgAction::Append)]
    pub unassign: Vec<String>,

    #[arg(long, conflicts_with = "no_recurring")]
    pub recurring: bool,

    #[arg(long)]
    pub no_recurring: bool,

    /// Recurrence interval; implies `--recurring`.
    #[arg(long)]
    pub every: Option<String>,

    #[arg(long)]
    pub unit: Option<RecurrenceUnit>,

    /// Checklist entry as `name` or `name=quantity`.
    #[arg(long = "item", action = ArgAction::Append)]
    pub items: Vec<String>,

    #[arg(long = "remove-item", action = ArgAction::Append)]
    pub remove_items: Vec<String>,

    #[arg(long)]
    pub result: Option<String>,
}

impl TodoArgs {
    #[tracing::instrument(skip_all)]
    pub fn apply_to(&self, form: &mut TodoForm) -> anyhow::Result<()> {
        if let Some(title) = &self.title {
            form.title = title.clone();
        }
        if let Some(description) = &self.description {
            form.description = description.clone();
        }
        if let Some(due) = &self.due {
            form.due_date = due.trim().to_string();
        }
        if let Some(time) = &self.time {
            form.due_time = time.trim().to_string();
        }
        if let Some(todo_type) = self.todo_type {
            form.todo_type = todo_type;
        }

        for person_id in &self.unassign {
            form.set_person(person_id, false);
        }
        for person_id in &self.persons {
            if !form.set_person(person_id, true) {
                bail!("unknown person: {person_id}");
            }
        }

        if self.no_recurring {
            form.recurring = false;
        }
        if self.recurring || self.every.is_some() {
            form.recurring = true;
        }
        if let Some(every) = &self.every {
            form.recurring_interval = every.clone();
        }
        if let Some(unit) = self.unit {
            form.recurring_unit = unit;
        }

        for item_id in &self.remove_items {
            if form.remove_item(item_id).is_none() {
                warn!(item_id = %item_id, "no such item to remove");
            }
        }
        for raw in &self.items {
            let (name, quantity) = match raw.split_once('=') {
                Some((name, quantity)) => (name.trim(), quantity.trim()),
                None => (raw.trim(), ""),
            };
            let id = form.add_item(None).id.clone();
            if let Some(row) = form.item_mut(&id) {
                row.name = name.to_string();
                row.quantity = quantity.to_string();
            }
        }

        if let Some(result) = &self.result {
            form.result = result.clone();
        }

        Ok(())
    }
}

/// Confirmations on the controlling terminal. Without a terminal only
/// `--yes` confirms.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    pub assume_yes: bool,
}

impl UserPrompt for TerminalPrompt {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            debug!(message, "confirmation assumed");
            return true;
        }
        if !io::stdin().is_terminal() {
            warn!(message, "no terminal to confirm on; pass --yes");
            return false;
        }

        let mut err = io::stderr().lock();
        if write!(err, "{message} [y/N] ").and_then(|()| err.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (verbose, quiet) {
        (_, q) if q >= 2 => "error",
        (_, 1) => "warn",
        (v, _) if v >= 3 => "trace",
        (2, _) => "debug",
        (1, _) => "info",
        _ => "warn",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` tokens out of the argument list so they
/// do not reach clap.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    for (idx, arg) in raw.iter().enumerate() {
        let text = arg.to_string_lossy();
        let parsed = (idx > 0)
            .then(|| text.strip_prefix("rc."))
            .flatten()
            .and_then(|rest| rest.split_once('='));

        match parsed {
            Some((key, value)) => {
                debug!(key, value, "captured positional rc override");
                overrides.push((key.to_string(), value.to_string()));
            }
            None => cleaned.push(arg.clone()),
        }
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
