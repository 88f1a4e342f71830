//! The task store: sole owner of the task collection.
//!
//! Every mutation goes through [`TaskStore`] and is written back to the
//! key-value store before the call returns. A failed write does not roll the
//! mutation back; it is handed to the caller alongside the result.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::datastore::KeyValueStore;
use crate::error::{PersistenceError, StoreError, StoreResult};
use crate::filter::{FilterMode, filter_tasks};
use crate::sort::{SortKey, sort_tasks};
use crate::stats::Stats;
use crate::task::{Task, seed_tasks};
use crate::validate::{TaskPayload, validate};

/// Storage key used when none is configured.
pub const DEFAULT_TASKS_KEY: &str = "tasks";

/// Result of a mutation that was applied in memory.
#[derive(Debug)]
#[must_use]
pub struct Applied<T> {
    pub value: T,
    /// Set when the change could not be written; it is live for this session
    /// only.
    pub write_error: Option<PersistenceError>,
}

impl<T> Applied<T> {
    pub fn is_durable(&self) -> bool {
        self.write_error.is_none()
    }
}

/// Where the collection came from on [`TaskStore::load`].
#[derive(Debug)]
pub enum LoadSource {
    Stored { count: usize },
    Seeded,
    Recovered { error: PersistenceError },
}

/// One render cycle's worth of derived data.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub tasks: Vec<Task>,
    pub stats: Stats,
}

#[derive(Debug)]
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Creates an empty store; call [`TaskStore::load`] to populate it.
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            tasks: Vec::new(),
        }
    }

    /// Reads the collection from storage, falling back to the seed set when
    /// nothing usable is stored. Never fails.
    #[instrument(skip(self, now), fields(key = %self.key))]
    pub fn load(&mut self, now: DateTime<Utc>) -> LoadSource {
        let source = match self.read_stored() {
            Ok(Some(tasks)) => {
                let count = tasks.len();
                self.tasks = tasks;
                info!(count, "loaded stored tasks");
                return LoadSource::Stored { count };
            }
            Ok(None) => {
                info!("no stored tasks; seeding sample set");
                LoadSource::Seeded
            }
            Err(error) => {
                warn!(error = %error, cause = ?std::error::Error::source(&error), "stored tasks unreadable; seeding sample set");
                LoadSource::Recovered { error }
            }
        };

        self.tasks = seed_tasks(now);
        if let Err(err) = self.save() {
            warn!(error = %err, "failed to persist seed tasks");
        }
        source
    }

    fn read_stored(&self) -> Result<Option<Vec<Task>>, PersistenceError> {
        let raw = self
            .storage
            .get(&self.key)
            .map_err(|source| PersistenceError::Read {
                key: self.key.clone(),
                source,
            })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PersistenceError::Decode {
                key: self.key.clone(),
                source,
            })
    }

    /// Writes the whole collection under the configured key.
    #[instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let text =
            serde_json::to_string(&self.tasks).map_err(|source| PersistenceError::Encode {
                key: self.key.clone(),
                source,
            })?;
        self.storage
            .set(&self.key, &text)
            .map_err(|source| PersistenceError::Write {
                key: self.key.clone(),
                source,
            })?;
        debug!(bytes = text.len(), "saved tasks");
        Ok(())
    }

    fn persist<T>(&mut self, value: T) -> Applied<T> {
        let write_error = self.save().err();
        if let Some(err) = &write_error {
            warn!(error = %err, "change applied in memory but not persisted");
        }
        Applied { value, write_error }
    }

    #[instrument(skip(self, payload, now))]
    pub fn create(
        &mut self,
        payload: TaskPayload,
        now: &DateTime<Tz>,
    ) -> StoreResult<Applied<Task>> {
        let form = validate(payload, now)?;

        let mut task = Task::new(
            self.fresh_id(),
            String::new(),
            now.with_timezone(&Utc),
            form.due_date,
        );
        form.apply_to(&mut task);
        self.tasks.push(task.clone());

        info!(id = %task.id, count = self.tasks.len(), "task created");
        Ok(self.persist(task))
    }

    /// Replaces the editable fields of task `id`; identity, creation time and
    /// completion are kept.
    #[instrument(skip(self, payload, now))]
    pub fn update(
        &mut self,
        id: &str,
        payload: TaskPayload,
        now: &DateTime<Tz>,
    ) -> StoreResult<Applied<Task>> {
        let form = validate(payload, now)?;
        let task = self.find_mut(id)?;
        form.apply_to(task);
        let updated = task.clone();

        info!(id, "task updated");
        Ok(self.persist(updated))
    }

    #[instrument(skip(self))]
    pub fn toggle_complete(&mut self, id: &str) -> StoreResult<Applied<Task>> {
        let task = self.find_mut(id)?;
        task.completed = !task.completed;
        let toggled = task.clone();

        info!(id, completed = toggled.completed, "task toggled");
        Ok(self.persist(toggled))
    }

    /// Removes task `id`. Returns the removed task, or `None` (without
    /// touching storage) when no such task exists.
    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Applied<Option<Task>> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(id, "delete of unknown task ignored");
            return Applied {
                value: None,
                write_error: None,
            };
        };

        let removed = self.tasks.remove(idx);
        info!(id, count = self.tasks.len(), "task deleted");
        self.persist(Some(removed))
    }

    pub fn get(&self, id: &str) -> StoreResult<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> Stats {
        Stats::from_tasks(&self.tasks)
    }

    /// Filters, then sorts, the current collection; stats always cover the
    /// whole collection.
    pub fn view(&self, mode: &FilterMode, key: SortKey, now: &DateTime<Tz>) -> TaskView {
        let mut selected = filter_tasks(&self.tasks, mode, now);
        sort_tasks(&mut selected, key);
        TaskView {
            tasks: selected.into_iter().cloned().collect(),
            stats: self.stats(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn find_mut(&mut self, id: &str) -> StoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn fresh_id(&self) -> String {
        let taken: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        loop {
            let candidate = Uuid::now_v7().to_string();
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            warn!(id = %candidate, "generated task id already in use; drawing again");
        }
    }
}
