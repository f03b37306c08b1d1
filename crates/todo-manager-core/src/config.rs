use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use todo_manager_shared::DEFAULT_PERSON_COLOR;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::filter::{
  ActiveFilter,
  ViewState
};

const CARDRC_ENV_VAR: &str =
  "TODO_CARDRC";
const DEFAULT_TITLE: &str =
  "ToDo Manager";
const DEFAULT_SETTLE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("title", DEFAULT_TITLE),
      ("show_completed", "on"),
      ("filter.default", "all"),
      ("refresh.settle_ms", "500"),
      (
        "person.default_color",
        DEFAULT_PERSON_COLOR
      ),
      ("form.preserve_item_checks", "off"),
      (
        "snapshot.location",
        "~/.todo-manager/snapshot.json"
      ),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    cardrc_override
  ))]
  pub fn load(
    cardrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();

    let cardrc = resolve_cardrc_path(
      cardrc_override
    )?;
    if let Some(path) = cardrc {
      info!(cardrc = %path.display(), "loading cardrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no cardrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn title(&self) -> String {
    self
      .get("title")
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_TITLE.to_string()
      })
  }

  /// Initial list view: completed todos
  /// are shown unless disabled.
  pub fn view_state(
    &self
  ) -> anyhow::Result<ViewState> {
    let active_filter = match self
      .get("filter.default")
    {
      | Some(raw) => raw
        .parse::<ActiveFilter>()
        .context(
          "invalid filter.default"
        )?,
      | None => ActiveFilter::All
    };

    Ok(ViewState {
      show_completed: self
        .get_bool("show_completed")
        .unwrap_or(true),
      active_filter
    })
  }

  pub fn settle_delay(
    &self
  ) -> anyhow::Result<Duration> {
    let Some(raw) =
      self.get("refresh.settle_ms")
    else {
      return Ok(Duration::from_millis(
        DEFAULT_SETTLE_MS
      ));
    };
    let ms =
      raw.trim().parse::<u64>().with_context(
        || {
          format!(
            "invalid refresh.settle_ms: \
             {raw}"
          )
        }
      )?;
    Ok(Duration::from_millis(ms))
  }

  pub fn default_person_color(
    &self
  ) -> String {
    self
      .get("person.default_color")
      .filter(|c| !c.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_PERSON_COLOR.to_string()
      })
  }

  pub fn preserve_item_checks(
    &self
  ) -> bool {
    self
      .get_bool(
        "form.preserve_item_checks"
      )
      .unwrap_or(false)
  }

  pub fn snapshot_path(
    &self
  ) -> Option<PathBuf> {
    self
      .get("snapshot.location")
      .filter(|p| !p.trim().is_empty())
      .map(|p| expand_tilde(Path::new(&p)))
  }

  /// `None` means commands go to
  /// stdout.
  pub fn outbox_path(
    &self
  ) -> Option<PathBuf> {
    self
      .get("outbox.location")
      .filter(|p| !p.trim().is_empty())
      .map(|p| expand_tilde(Path::new(&p)))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      // `#` also starts colors, so only
      // ` # ` opens a trailing comment.
      if let Some((before, _)) =
        line.split_once(" # ")
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_cardrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(cardrc_env) =
    std::env::var(CARDRC_ENV_VAR)
  {
    if cardrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      cardrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping cardrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".todocardrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
