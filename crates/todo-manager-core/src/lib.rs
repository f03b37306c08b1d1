pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod form;
pub mod people;
pub mod render;
pub mod snapshot;
pub mod urgency;

use std::ffi::OsString;
use std::path::Path;

use anyhow::{
  Context,
  anyhow
};
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::{
  CardCommand,
  ListArgs,
  TerminalPrompt
};
use crate::commands::Card;
use crate::snapshot::Outbox;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting todo-card"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.cardrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let snapshot_path = cli
    .snapshot
    .or_else(|| cfg.snapshot_path())
    .ok_or_else(|| {
      anyhow!(
        "no snapshot location; pass \
         --snapshot or set \
         snapshot.location"
      )
    })?;

  let outbox_path = match cli.outbox {
    | Some(path)
      if path == Path::new("-") =>
    {
      None
    }
    | Some(path) => Some(path),
    | None => cfg.outbox_path()
  };

  let renderer =
    render::Renderer::new(&cfg)?;
  let mut card = Card::open(
    &cfg,
    &snapshot_path,
    Outbox::new(outbox_path),
    TerminalPrompt {
      assume_yes: cli.yes
    },
    renderer
  )
  .with_context(|| {
    format!(
      "failed to open card from {}",
      snapshot_path.display()
    )
  })?;
  card.refresh = cli.refresh;

  let command =
    cli.command.unwrap_or_else(|| {
      CardCommand::List(
        ListArgs::default()
      )
    });

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_time()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  runtime
    .block_on(card.execute(command))?;

  info!("done");
  Ok(())
}
