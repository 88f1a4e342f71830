use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::filter::FilterMode;
use crate::sort::SortKey;
use crate::store::DEFAULT_TASKS_KEY;

const RC_ENV_VAR: &str = "DOCKETRC";
const RC_FILE_NAME: &str = ".docketrc";
const MAX_INCLUDE_DEPTH: usize = 8;

/// Every setting docket reads, with its built-in value.
const KNOWN_SETTINGS: &[(&str, &str)] = &[
  ("data.location", "~/.docket"),
  ("storage.key", DEFAULT_TASKS_KEY),
  ("default.filter", "all"),
  ("default.sort", "dueDate"),
  ("color", "on")
];

/// Layered docket settings: built-ins, then the docketrc (and its
/// includes), then `rc.` overrides from the command line.
#[derive(Debug, Clone)]
pub struct Config {
  values:           BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

/// A meaningful docketrc line.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Set(&'a str, &'a str)
}

impl Default for Config {
  fn default() -> Self {
    Self {
      values:       KNOWN_SETTINGS
        .iter()
        .map(|(key, value)| {
          (
            (*key).to_string(),
            (*value).to_string()
          )
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();
    match locate_rc(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "loading docketrc");
        cfg.read_rc(&path, 0)?;
      }
      | None => {
        debug!(
          "no docketrc; using built-in \
           settings"
        )
      }
    }
    cfg.validate()?;
    Ok(cfg)
  }

  /// Applies `key=value` pairs on top of the loaded settings. A leading
  /// `rc.` on the key is dropped.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .unwrap_or(&key);
      debug!(key, value = %value, "applying override");
      self.set(key, &value);
    }
    self.validate()
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .values
      .get(key)
      .map(String::as_str)
  }

  /// Reads an on/off switch. Values other than the usual spellings are
  /// an error rather than "off".
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<bool> {
    let raw =
      self.get(key).ok_or_else(|| {
        anyhow!("missing setting {key}")
      })?;
    parse_switch(raw).ok_or_else(|| {
      anyhow!(
        "invalid {key} setting `{raw}`; \
         expected on or off"
      )
    })
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .map(str::trim)
      .filter(|key| !key.is_empty())
      .unwrap_or(DEFAULT_TASKS_KEY)
      .to_string()
  }

  pub fn default_filter(
    &self
  ) -> FilterMode {
    self
      .get("default.filter")
      .map(FilterMode::parse)
      .unwrap_or_default()
  }

  pub fn default_sort(&self) -> SortKey {
    self
      .get("default.sort")
      .map(SortKey::parse)
      .unwrap_or_default()
  }

  /// Directory holding the task data: the command-line override if
  /// given, else `data.location`.
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    if let Some(dir) = override_dir {
      return Ok(dir.to_path_buf());
    }
    match self
      .get("data.location")
      .map(str::trim)
      .filter(|raw| !raw.is_empty())
    {
      | Some(raw) => Ok(expand_home(raw)),
      | None => {
        dirs::home_dir()
          .map(|home| {
            home.join(".docket")
          })
          .context(
            "cannot determine home \
             directory"
          )
      }
    }
  }

  fn validate(
    &self
  ) -> anyhow::Result<()> {
    self.get_bool("color")?;
    Ok(())
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    if !KNOWN_SETTINGS
      .iter()
      .any(|(known, _)| *known == key)
    {
      warn!(key, "unknown docket setting; keeping it anyway");
    }
    trace!(key, value, "setting");
    self
      .values
      .insert(key.to_string(), value.to_string());
  }

  #[tracing::instrument(skip(self))]
  fn read_rc(
    &mut self,
    path: &Path,
    depth: usize
  ) -> anyhow::Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
      bail!(
        "includes nested more than \
         {MAX_INCLUDE_DEPTH} deep at {}",
        path.display()
      );
    }

    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self
      .loaded_files
      .push(path.to_path_buf());

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        })?;
      match line {
        | None => {}
        | Some(RcLine::Set(key, value)) => {
          self.set(key, value)
        }
        | Some(RcLine::Include(target)) => {
          let target =
            include_target(path, target);
          if target.is_file() {
            self.read_rc(
              &target,
              depth + 1
            )?;
          } else {
            warn!(include = %target.display(), "include not found; skipping");
          }
        }
      }
    }

    Ok(())
  }
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(None);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      bail!("include needs a path");
    }
    return Ok(Some(RcLine::Include(
      target
    )));
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(Some(RcLine::Set(
        key.trim(),
        value.trim()
      )))
    }
    | _ => {
      Err(anyhow!(
        "expected `key = value`, found \
         `{line}`"
      ))
    }
  }
}

/// The docketrc to read: `--config`, else `DOCKETRC` (empty or
/// `/dev/null` disables it), else `~/.docketrc` when present.
fn locate_rc(
  rc_override: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = rc_override {
    return Some(path.to_path_buf());
  }

  match std::env::var_os(RC_ENV_VAR) {
    | Some(raw)
      if raw.is_empty()
        || Path::new(&raw)
          == Path::new("/dev/null") =>
    {
      None
    }
    | Some(raw) => Some(raw.into()),
    | None => {
      dirs::home_dir()
        .map(|home| {
          home.join(RC_FILE_NAME)
        })
        .filter(|path| path.is_file())
    }
  }
}

/// Resolves an include relative to the file that names it.
fn include_target(
  rc: &Path,
  target: &str
) -> PathBuf {
  let target = expand_home(target);
  if target.is_absolute() {
    return target;
  }
  rc.parent()
    .unwrap_or_else(|| Path::new("."))
    .join(target)
}

fn expand_home(raw: &str) -> PathBuf {
  match raw
    .strip_prefix("~/")
    .zip(dirs::home_dir())
  {
    | Some((rest, home)) => {
      home.join(rest)
    }
    | None => PathBuf::from(raw)
  }
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}
