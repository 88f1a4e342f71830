use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::project::DEFAULT_PROJECT_ID;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Severity rank used for ordering; lower sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other}")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    #[default]
    Personal,
    Health,
    Finance,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Health => "health",
            Category::Finance => "finance",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(Category::Work),
            "personal" => Ok(Category::Personal),
            "health" => Ok(Category::Health),
            "finance" => Ok(Category::Finance),
            "other" => Ok(Category::Other),
            other => Err(anyhow!("invalid category: {other}")),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub category: Category,

    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Fields written by other clients; carried through saves untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_project_id() -> String {
    DEFAULT_PROJECT_ID.to_string()
}

impl Task {
    pub fn new(
        id: String,
        title: String,
        created_at: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            completed: false,
            created_at,
            due_date,
            priority: Priority::default(),
            category: Category::default(),
            project_id: default_project_id(),
            extra: BTreeMap::new(),
        }
    }
}

/// The fixed sample collection used when nothing usable is persisted.
pub fn seed_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let mut proposal = Task::new(
        "1".to_string(),
        "Complete project proposal".to_string(),
        now,
        now + Duration::days(2),
    );
    proposal.priority = Priority::High;
    proposal.category = Category::Work;
    proposal.project_id = "2".to_string();

    let mut groceries = Task::new(
        "2".to_string(),
        "Buy groceries".to_string(),
        now,
        now + Duration::days(1),
    );
    groceries.priority = Priority::Medium;
    groceries.category = Category::Personal;
    groceries.project_id = "1".to_string();

    let mut run = Task::new("3".to_string(), "Go for a run".to_string(), now, now);
    run.completed = true;
    run.priority = Priority::Low;
    run.category = Category::Health;
    run.project_id = "1".to_string();

    vec![proposal, groceries, run]
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn deserializes_original_records_with_missing_optional_fields() {
        let raw = r#"{
            "id": "1700000000000",
            "title": "Old task",
            "completed": false,
            "createdAt": "2023-11-14T22:13:20.000Z",
            "dueDate": "2023-11-15T12:00:00.000Z",
            "priority": "high"
        }"#;

        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.category, Category::Personal);
        assert_eq!(task.project_id, DEFAULT_PROJECT_ID);
        assert!(task.extra.is_empty());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = r#"{"id":"9","title":"t","completed":true,
            "createdAt":"2026-01-01T00:00:00Z","dueDate":"2026-01-02T12:00:00Z",
            "priority":"low","category":"finance","projectId":"3","pinned":true}"#;

        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert_eq!(task.extra.get("pinned"), Some(&serde_json::Value::Bool(true)));

        let text = serde_json::to_string(&task).expect("serialize");
        assert!(text.contains("\"pinned\":true"));
        assert!(text.contains("\"projectId\":\"3\""));
    }

    #[test]
    fn seed_has_one_task_per_priority_and_one_completed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let seed = seed_tasks(now);

        assert_eq!(seed.len(), 3);
        assert_eq!(seed.iter().filter(|t| t.completed).count(), 1);
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert!(seed.iter().any(|t| t.priority == priority));
        }
        assert_eq!(seed[0].due_date, now + Duration::days(2));
    }

    #[test]
    fn priority_parse_accepts_short_forms() {
        assert_eq!("H".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("med".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
