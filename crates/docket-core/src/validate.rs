//! Gatekeeping for create/update payloads.

use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  local_date,
  noon_on
};
use crate::error::ValidationError;
use crate::project::DEFAULT_PROJECT_ID;
use crate::task::{
  Category,
  Priority,
  Task
};

/// Candidate task fields as entered by the user. Every field but the title
/// may be omitted; unknown fields are ignored on deserialization.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
  #[serde(default)]
  pub title:      String,
  #[serde(default)]
  pub due_date:   Option<NaiveDate>,
  #[serde(default)]
  pub priority:   Option<Priority>,
  #[serde(default)]
  pub category:   Option<Category>,
  #[serde(default)]
  pub project_id: Option<String>
}

impl TaskPayload {
  pub fn titled(
    title: impl Into<String>
  ) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }

  /// Form contents for editing an existing task.
  pub fn from_task(
    task: &Task,
    tz: &Tz
  ) -> Self {
    Self {
      title:      task.title.clone(),
      due_date:   Some(local_date(
        task.due_date,
        tz
      )),
      priority:   Some(task.priority),
      category:   Some(task.category),
      project_id: Some(
        task.project_id.clone()
      )
    }
  }
}

/// A payload that passed validation, with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
  pub title:      String,
  pub due_date:   DateTime<Utc>,
  pub priority:   Priority,
  pub category:   Category,
  pub project_id: String
}

impl TaskForm {
  pub fn apply_to(
    self,
    task: &mut Task
  ) {
    task.title = self.title;
    task.due_date = self.due_date;
    task.priority = self.priority;
    task.category = self.category;
    task.project_id = self.project_id;
  }
}

/// Validates `payload` and fills defaults relative to `now`.
///
/// The only rejection is a title that is empty after trimming. A missing
/// due date means today; the date is pinned to noon in `now`'s timezone.
pub fn validate(
  payload: TaskPayload,
  now: &DateTime<Tz>
) -> Result<TaskForm, ValidationError> {
  let title = payload.title.trim();
  if title.is_empty() {
    tracing::debug!(
      "rejected payload with empty title"
    );
    return Err(
      ValidationError::EmptyTitle
    );
  }

  let day = payload
    .due_date
    .unwrap_or_else(|| now.date_naive());

  let project_id = payload
    .project_id
    .map(|id| id.trim().to_string())
    .filter(|id| !id.is_empty())
    .unwrap_or_else(|| {
      DEFAULT_PROJECT_ID.to_string()
    });

  Ok(TaskForm {
    title: title.to_string(),
    due_date: noon_on(
      day,
      &now.timezone()
    ),
    priority: payload
      .priority
      .unwrap_or_default(),
    category: payload
      .category
      .unwrap_or_default(),
    project_id
  })
}
