pub mod app;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod datastore;
pub mod datekey;
pub mod history;
pub mod recurrence;
pub mod render;
pub mod task;
pub mod undo;
pub mod views;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::commands::Outcome;

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
    "starting daybook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
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

  let today = datekey::today_key(
    cfg.timezone().as_ref()
  );
  let mut planner =
    match store.load_session()? {
      | Some(session) => {
        app::Planner::from_session(
          session, &today
        )
      }
      | None => {
        app::Planner::new(&today)
      }
    };

  let mut changed = false;
  if let Some(raw) = cli.date.as_deref()
  {
    let key = commands::resolve_date(
      raw, &today
    )?;
    changed |= key
      != planner.selected_date();
    planner.select_date(&key);
  }

  let command = match cli.command {
    | Some(command) => command,
    | None => {
      cli::Command::from_default_name(
        &cfg
          .get("default.command")
          .unwrap_or_default()
      )?
    }
  };

  let renderer =
    render::Renderer::new(&cfg);
  let outcome = commands::dispatch(
    &mut planner,
    &renderer,
    command,
    &today
  )?;

  if changed
    || outcome == Outcome::Changed
  {
    store
      .save_session(
        &planner.to_session()
      )
      .context(
        "failed to save session"
      )?;
  }

  info!("done");
  Ok(())
}
