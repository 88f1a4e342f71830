pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod project;
pub mod render;
pub mod sort;
pub mod stats;
pub mod store;
pub mod task;
pub mod validate;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

pub use crate::error::{
  PersistenceError,
  StoreError,
  ValidationError
};
pub use crate::filter::FilterMode;
pub use crate::sort::SortKey;
pub use crate::stats::Stats;
pub use crate::store::{
  Applied,
  LoadSource,
  TaskStore
};
pub use crate::task::{
  Category,
  Priority,
  Task
};
pub use crate::validate::TaskPayload;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
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
    "starting docket CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let datastore =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut clock =
    datetime::ReferenceClock::new(
      datetime::local_now()
    );
  let mut store = TaskStore::new(
    datastore,
    cfg.storage_key()
  );
  if let LoadSource::Recovered {
    error
  } = store.load(
    clock.now().with_timezone(&Utc)
  )
  {
    warn!(error = %error, "stored tasks were unreadable");
    eprintln!(
      "warning: saved tasks could not \
       be read; starting from sample \
       tasks"
    );
  }

  let registry =
    project::StaticRegistry::default();
  let mut renderer =
    render::Renderer::new(&cfg)?;
  clock.tick(Utc::now());
  let now = clock.now();
  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::List {
        filter: None,
        sort:   None
      }
    });

  commands::dispatch(
    &mut store,
    &cfg,
    &registry,
    &mut renderer,
    command,
    &now
  )?;

  info!("done");
  Ok(())
}
