use std::fs;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use docket_core::datastore::{DataStore, KeyValueStore};
use docket_core::filter::{FilterMode, filter_tasks};
use docket_core::project::{Project, ProjectRegistry, StaticRegistry};
use docket_core::sort::{SortKey, sort_tasks};
use docket_core::stats::Stats;
use docket_core::store::{DEFAULT_TASKS_KEY, LoadSource, TaskStore};
use docket_core::task::{Priority, Task};
use docket_core::{StoreError, TaskPayload, ValidationError};
use tempfile::tempdir;

fn now() -> DateTime<Tz> {
    Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0)
        .unwrap()
        .with_timezone(&chrono_tz::UTC)
}

fn open(dir: &std::path::Path) -> TaskStore<DataStore> {
    let datastore = DataStore::open(dir).expect("open datastore");
    TaskStore::new(datastore, DEFAULT_TASKS_KEY)
}

#[test]
fn seed_statistics() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());

    assert!(matches!(store.load(now().with_timezone(&Utc)), LoadSource::Seeded));
    assert_eq!(
        store.stats(),
        Stats {
            total: 3,
            completed: 1,
            percentage: 33
        }
    );
}

#[test]
fn blank_title_is_rejected_without_side_effects() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    let _ = store.load(now().with_timezone(&Utc));
    let before = fs::read_to_string(temp.path().join("tasks.json")).expect("seed written");

    let mut payload = TaskPayload::titled("  ");
    payload.priority = Some(Priority::High);
    let err = store.create(payload, &now()).expect_err("must reject");

    assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));
    assert_eq!(store.len(), 3);
    assert_eq!(
        fs::read_to_string(temp.path().join("tasks.json")).expect("still there"),
        before
    );
}

#[test]
fn created_task_shows_up_under_tomorrow_and_high() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    let _ = store.load(now().with_timezone(&Utc));

    let payload: TaskPayload = serde_json::from_str(
        r#"{"title":"Pay rent","dueDate":"2026-10-20","priority":"high","projectId":"2"}"#,
    )
    .expect("payload");
    let rent = store.create(payload, &now()).expect("create").value;
    assert!(store.storage().get(DEFAULT_TASKS_KEY).expect("read").is_some());

    let tomorrow = filter_tasks(store.tasks(), &FilterMode::parse("tomorrow"), &now());
    assert!(tomorrow.iter().any(|t| t.id == rent.id));

    let high = filter_tasks(store.tasks(), &FilterMode::parse("high"), &now());
    assert!(high.iter().any(|t| t.id == rent.id));

    let registry = StaticRegistry::default();
    assert_eq!(registry.get_project(&rent.project_id).name, "Work");
}

#[test]
fn unparsable_storage_recovers_to_seed() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("tasks.json"), "<<definitely not json>>").expect("corrupt");

    let mut store = open(temp.path());
    let source = store.load(now().with_timezone(&Utc));

    assert!(matches!(source, LoadSource::Recovered { .. }));
    assert_eq!(store.len(), 3);

    let rewritten = fs::read_to_string(temp.path().join("tasks.json")).expect("reseeded");
    let parsed: Vec<Task> = serde_json::from_str(&rewritten).expect("valid after recovery");
    assert_eq!(parsed.len(), 3);
}

#[test]
fn priority_sort_orders_high_medium_low() {
    let base = now().with_timezone(&Utc);
    let mut tasks = Vec::new();
    for (id, priority) in [("l", Priority::Low), ("h", Priority::High), ("m", Priority::Medium)] {
        let mut task = Task::new(id.to_string(), id.to_string(), base, base);
        task.priority = priority;
        tasks.push(task);
    }

    let mut refs: Vec<&Task> = tasks.iter().collect();
    sort_tasks(&mut refs, SortKey::parse("priority"));
    let order: Vec<Priority> = refs.iter().map(|t| t.priority).collect();
    assert_eq!(order, vec![Priority::High, Priority::Medium, Priority::Low]);
}

#[test]
fn mutations_survive_a_reopen() {
    let temp = tempdir().expect("tempdir");
    let (kept_id, dropped_id) = {
        let mut store = open(temp.path());
        let _ = store.load(now().with_timezone(&Utc));

        let kept = store.create(TaskPayload::titled("Keep me"), &now()).expect("create").value;
        let dropped = store.create(TaskPayload::titled("Drop me"), &now()).expect("create").value;
        let toggled = store.toggle_complete(&kept.id).expect("toggle");
        assert!(toggled.is_durable());
        let deleted = store.delete(&dropped.id);
        assert!(deleted.value.is_some());
        (kept.id, dropped.id)
    };

    let mut reopened = open(temp.path());
    assert!(matches!(
        reopened.load(now().with_timezone(&Utc)),
        LoadSource::Stored { count: 4 }
    ));
    assert!(reopened.get(&kept_id).expect("kept").completed);
    assert!(matches!(reopened.get(&dropped_id), Err(StoreError::NotFound { .. })));
}

#[test]
fn edit_keeps_identity_and_overdue_respects_completion() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    let _ = store.load(now().with_timezone(&Utc) - Duration::days(5));

    // The seed was created five days ago, so its first two tasks are overdue now.
    let overdue = filter_tasks(store.tasks(), &FilterMode::Overdue, &now());
    let ids: Vec<&str> = overdue.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let original = store.get("1").expect("seed task").clone();
    let mut payload = TaskPayload::from_task(&original, &chrono_tz::UTC);
    payload.title = "Complete project proposal v2".to_string();
    let edited = store.update("1", payload, &now()).expect("update").value;

    assert_eq!(edited.id, original.id);
    assert_eq!(edited.created_at, original.created_at);
    assert_eq!(edited.project_id, "2");
    assert_eq!(edited.priority, Priority::High);
}

#[test]
fn orphaned_project_resolves_to_no_project() {
    let registry = StaticRegistry::new(vec![Project::new("2", "Work", "green")]);
    assert_eq!(registry.get_project("1"), Project::no_project());
}
