use anyhow::{Context, anyhow};
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, FormArgs};
use crate::config::Config;
use crate::datastore::KeyValueStore;
use crate::datetime::parse_due_date;
use crate::error::PersistenceError;
use crate::filter::FilterMode;
use crate::project::ProjectRegistry;
use crate::render::Renderer;
use crate::sort::SortKey;
use crate::store::{Applied, TaskStore};
use crate::validate::TaskPayload;

#[instrument(skip(store, cfg, registry, renderer, command, now))]
pub fn dispatch<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    registry: &dyn ProjectRegistry,
    renderer: &mut Renderer,
    command: Command,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add { title, form } => cmd_add(store, title, form, now),
        Command::Edit { id, title, form } => cmd_edit(store, &id, title, form, now),
        Command::Toggle { id } => cmd_toggle(store, &id),
        Command::Delete { id } => cmd_delete(store, &id),
        Command::List { filter, sort } => {
            let mode = filter
                .map(|raw| FilterMode::parse(&raw))
                .unwrap_or_else(|| cfg.default_filter());
            let key = sort
                .map(|raw| SortKey::parse(&raw))
                .unwrap_or_else(|| cfg.default_sort());
            cmd_list(store, registry, renderer, &mode, key, now)
        }
        Command::Show { id } => {
            let id = resolve_id(store, &id)?;
            let task = store.get(&id)?;
            renderer.print_task_info(task, registry, &now.timezone())
        }
        Command::Stats => renderer.print_stats(&store.stats()),
        Command::Projects => renderer.print_projects(registry, store.tasks()),
    }
}

#[instrument(skip(store, form, now))]
fn cmd_add<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    title: String,
    form: FormArgs,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    let mut payload = TaskPayload::titled(title);
    apply_form_args(&mut payload, form, now)?;

    let applied = store.create(payload, now)?;
    info!(id = %applied.value.id, "command add");
    report_write(&applied);
    println!("Task added ({}).", applied.value.id);
    Ok(())
}

#[instrument(skip(store, title, form, now))]
fn cmd_edit<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    id: &str,
    title: Option<String>,
    form: FormArgs,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    let id = resolve_id(store, id)?;
    let current = store.get(&id)?;
    let mut payload = TaskPayload::from_task(current, &now.timezone());
    if let Some(title) = title {
        payload.title = title;
    }
    apply_form_args(&mut payload, form, now)?;

    let applied = store.update(&id, payload, now)?;
    report_write(&applied);
    println!("Task updated.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_toggle<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str) -> anyhow::Result<()> {
    let id = resolve_id(store, id)?;
    let applied = store.toggle_complete(&id)?;
    report_write(&applied);
    if applied.value.completed {
        println!("Task completed!");
    } else {
        println!("Task marked as incomplete.");
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str) -> anyhow::Result<()> {
    let id = resolve_id(store, id)?;
    let applied = store.delete(&id);
    report_write(&applied);
    match applied.value {
        Some(_) => println!("Task deleted."),
        None => println!("No task {id}."),
    }
    Ok(())
}

#[instrument(skip(store, registry, renderer, now))]
fn cmd_list<S: KeyValueStore>(
    store: &TaskStore<S>,
    registry: &dyn ProjectRegistry,
    renderer: &mut Renderer,
    mode: &FilterMode,
    key: SortKey,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    let view = store.view(mode, key, now);
    if let FilterMode::Project(id) = mode {
        println!("Project: {}", registry.get_project(id).name);
    }
    renderer.print_task_table(&view.tasks, registry, now)?;
    println!();
    println!(
        "{} shown, {} of {} completed ({}%)",
        view.tasks.len(),
        view.stats.completed,
        view.stats.total,
        view.stats.percentage
    );
    Ok(())
}

fn apply_form_args(payload: &mut TaskPayload, form: FormArgs, now: &DateTime<Tz>) -> anyhow::Result<()> {
    if let Some(due) = form.due {
        payload.due_date = Some(parse_due_date(&due, now.date_naive())?);
    }
    if let Some(priority) = form.priority {
        payload.priority = Some(priority.parse()?);
    }
    if let Some(category) = form.category {
        payload.category = Some(category.parse()?);
    }
    if let Some(project) = form.project {
        payload.project_id = Some(project);
    }
    Ok(())
}

fn report_write<T>(applied: &Applied<T>) {
    if let Some(err) = &applied.write_error {
        warn!(error = %err, "write failed");
        eprintln!("warning: {}; this change may not survive a restart", describe(err));
    }
}

fn describe(err: &PersistenceError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

/// Resolves an exact id or a unique id suffix, as shown in listings.
pub fn resolve_id<S: KeyValueStore>(store: &TaskStore<S>, token: &str) -> anyhow::Result<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }
    if store.get(token).is_ok() {
        return Ok(token.to_string());
    }

    let mut matches = store.tasks().iter().filter(|t| t.id.ends_with(token));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("task not found: {token}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous task id: {token}"))
            .context("use more characters of the id");
    }
    Ok(first.id.clone())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::datastore::MemoryStore;
    use crate::store::DEFAULT_TASKS_KEY;

    fn now() -> DateTime<Tz> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0)
            .unwrap()
            .with_timezone(&chrono_tz::UTC)
    }

    fn store() -> TaskStore<MemoryStore> {
        let mut store = TaskStore::new(MemoryStore::new(), DEFAULT_TASKS_KEY);
        let _ = store.load(now().with_timezone(&Utc));
        store
    }

    #[test]
    fn resolve_id_accepts_exact_and_unique_suffix() {
        let mut store = store();
        let created = store
            .create(TaskPayload::titled("long id"), &now())
            .expect("create")
            .value;
        let suffix = &created.id[created.id.len() - 8..];

        assert_eq!(resolve_id(&store, "2").expect("exact"), "2");
        assert_eq!(resolve_id(&store, suffix).expect("suffix"), created.id);
        assert!(resolve_id(&store, "missing-id").is_err());
    }

    #[test]
    fn resolve_id_rejects_blank_tokens_even_with_one_task() {
        let mut store = store();
        for id in ["1", "2"] {
            let _ = store.delete(id);
        }
        assert_eq!(store.len(), 1);

        assert!(resolve_id(&store, "").is_err());
        assert!(resolve_id(&store, "   ").is_err());
        assert_eq!(resolve_id(&store, "3").expect("exact"), "3");
    }

    #[test]
    fn form_args_fill_payload_fields() {
        let mut payload = TaskPayload::titled("x");
        apply_form_args(
            &mut payload,
            FormArgs {
                due: Some("tomorrow".to_string()),
                priority: Some("high".to_string()),
                category: Some("work".to_string()),
                project: Some("3".to_string()),
            },
            &now(),
        )
        .expect("apply");

        assert_eq!(payload.due_date, now().date_naive().succ_opt());
        assert_eq!(payload.project_id.as_deref(), Some("3"));
        assert!(apply_form_args(
            &mut payload,
            FormArgs {
                priority: Some("urgent".to_string()),
                ..FormArgs::default()
            },
            &now(),
        )
        .is_err());
    }
}
