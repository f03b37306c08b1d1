use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use todo_manager_shared::Snapshot;
use tracing::{debug, info, warn};

use crate::dispatch::{Command, CommandService};
use crate::error::CommandError;

/// Reads the provider's published snapshot. A missing file is an empty
/// snapshot; a malformed one is an error.
#[tracing::instrument(skip(path), fields(file = %path.display()))]
pub fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    if !path.exists() {
        warn!("snapshot file does not exist; showing an empty card");
        return Ok(Snapshot::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Snapshot::default());
    }

    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing snapshot {}", path.display()))?;
    info!(
        todos = snapshot.todos.len(),
        persons = snapshot.persons.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

/// One line of the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub command: String,
    pub data: Value,
}

impl OutboxEntry {
    pub fn from_command(command: &Command) -> anyhow::Result<Self> {
        Ok(Self {
            command: command.name().to_string(),
            data: command.payload()?,
        })
    }
}

/// Hands commands to the host as JSON lines, either on stdout or appended to
/// a file the host watches.
#[derive(Debug, Clone)]
pub struct Outbox {
    path: Option<PathBuf>,
}

impl Outbox {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    #[tracing::instrument(skip(self, entry), fields(command = %entry.command))]
    fn append(&self, entry: &OutboxEntry) -> anyhow::Result<()> {
        let line = serde_json::to_string(entry)?;

        let Some(path) = &self.path else {
            let mut out = io::stdout().lock();
            writeln!(out, "{line}")?;
            out.flush()?;
            return Ok(());
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed opening outbox {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed writing outbox {}", path.display()))?;
        debug!(file = %path.display(), "appended to outbox");
        Ok(())
    }
}

impl CommandService for Outbox {
    async fn call(&self, command: &Command) -> Result<(), CommandError> {
        let entry = OutboxEntry::from_command(command)?;
        self.append(&entry)?;
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
pub fn read_outbox(path: &Path) -> anyhow::Result<Vec<OutboxEntry>> {
    debug!(file = %path.display(), "loading outbox");
    let file = fs::File::open(path)
        .with_context(|| format!("failed opening outbox {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: OutboxEntry = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(entry);
    }

    Ok(out)
}
