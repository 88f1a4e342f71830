use std::cmp::Ordering;
use std::fmt;

use deunicode::deunicode;
use tracing::warn;

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum SortKey {
  #[default]
  DueDate,
  Priority,
  Alphabetical,
  Creation,
  /// Leaves the input order alone.
  Unsorted
}

impl SortKey {
  /// Parses a key name. Unknown names map to [`SortKey::Unsorted`].
  pub fn parse(raw: &str) -> Self {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "duedate" | "due" => {
        Self::DueDate
      }
      | "priority" | "pri" => {
        Self::Priority
      }
      | "alphabetical" | "alpha"
      | "title" => Self::Alphabetical,
      | "creation" | "created" => {
        Self::Creation
      }
      | "none" => Self::Unsorted,
      | other => {
        warn!(
          key = other,
          "unknown sort key; keeping filter order"
        );
        Self::Unsorted
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::DueDate => "dueDate",
      | Self::Priority => "priority",
      | Self::Alphabetical => {
        "alphabetical"
      }
      | Self::Creation => "creation",
      | Self::Unsorted => "none"
    }
  }

  pub fn compare(
    self,
    a: &Task,
    b: &Task
  ) -> Ordering {
    match self {
      | Self::DueDate => {
        a.due_date.cmp(&b.due_date)
      }
      | Self::Priority => {
        a.priority
          .rank()
          .cmp(&b.priority.rank())
      }
      | Self::Alphabetical => {
        compare_titles(
          &a.title, &b.title
        )
      }
      | Self::Creation => {
        a.created_at.cmp(&b.created_at)
      }
      | Self::Unsorted => {
        Ordering::Equal
      }
    }
  }
}

impl fmt::Display for SortKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Human ordering for titles: accents and case only break ties.
fn compare_titles(
  a: &str,
  b: &str
) -> Ordering {
  collation_key(a)
    .cmp(&collation_key(b))
    .then_with(|| {
      a.to_lowercase()
        .cmp(&b.to_lowercase())
    })
    .then_with(|| b.cmp(a))
}

fn collation_key(s: &str) -> String {
  deunicode(s).to_lowercase()
}

/// Orders `tasks` by `key`. Equal keys keep their incoming order.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn sort_tasks(
  tasks: &mut [&Task],
  key: SortKey
) {
  if key == SortKey::Unsorted {
    return;
  }
  tasks.sort_by(|a, b| key.compare(a, b));
}
