use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{
  trace,
  warn
};

use crate::datetime::local_date;
use crate::task::{
  Priority,
  Task
};

const PROJECT_PREFIX: &str =
  "project:";

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub enum FilterMode {
  #[default]
  All,
  Active,
  Completed,
  Today,
  Tomorrow,
  Overdue,
  High,
  Project(String)
}

impl FilterMode {
  /// Parses a mode name. Unknown names fall back to [`FilterMode::All`].
  pub fn parse(raw: &str) -> Self {
    let token = raw.trim();
    if let Some(id) =
      strip_project_prefix(token)
    {
      return Self::Project(
        id.trim().to_string()
      );
    }

    match token
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" | "" => Self::All,
      | "active" | "pending" => {
        Self::Active
      }
      | "completed" | "done" => {
        Self::Completed
      }
      | "today" => Self::Today,
      | "tomorrow" => Self::Tomorrow,
      | "overdue" => Self::Overdue,
      | "high" => Self::High,
      | other => {
        warn!(
          mode = other,
          "unknown filter mode; showing all tasks"
        );
        Self::All
      }
    }
  }

  pub fn matches(
    &self,
    task: &Task,
    now: &DateTime<Tz>
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Active => !task.completed,
      | Self::Completed => {
        task.completed
      }
      | Self::Today => {
        due_day(task, now)
          == now.date_naive()
      }
      | Self::Tomorrow => {
        Some(due_day(task, now))
          == now.date_naive().succ_opt()
      }
      | Self::Overdue => {
        !task.completed
          && due_day(task, now)
            < now.date_naive()
      }
      | Self::High => {
        task.priority == Priority::High
      }
      | Self::Project(id) => {
        task.project_id == *id
      }
    }
  }
}

/// `project:` prefix, matched without regard to case. The id keeps its
/// own case.
fn strip_project_prefix(
  token: &str
) -> Option<&str> {
  let head = token
    .get(..PROJECT_PREFIX.len())?;
  head
    .eq_ignore_ascii_case(PROJECT_PREFIX)
    .then(|| {
      &token[PROJECT_PREFIX.len()..]
    })
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::All => f.write_str("all"),
      | Self::Active => {
        f.write_str("active")
      }
      | Self::Completed => {
        f.write_str("completed")
      }
      | Self::Today => {
        f.write_str("today")
      }
      | Self::Tomorrow => {
        f.write_str("tomorrow")
      }
      | Self::Overdue => {
        f.write_str("overdue")
      }
      | Self::High => f.write_str("high"),
      | Self::Project(id) => {
        write!(f, "{PROJECT_PREFIX}{id}")
      }
    }
  }
}

fn due_day(
  task: &Task,
  now: &DateTime<Tz>
) -> chrono::NaiveDate {
  local_date(
    task.due_date,
    &now.timezone()
  )
}

/// Selects the tasks matching `mode`, keeping their relative order.
#[tracing::instrument(skip(tasks, mode, now), fields(mode = %mode))]
pub fn filter_tasks<'a>(
  tasks: &'a [Task],
  mode: &FilterMode,
  now: &DateTime<Tz>
) -> Vec<&'a Task> {
  let out: Vec<&Task> = tasks
    .iter()
    .filter(|task| mode.matches(task, now))
    .collect();
  trace!(
    total = tasks.len(),
    matched = out.len(),
    "filtered tasks"
  );
  out
}
