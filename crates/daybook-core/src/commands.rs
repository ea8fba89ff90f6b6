use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::app::{ImportOutcome, Planner};
use crate::cli::Command;
use crate::codec::{CodecError, export_file_name};
use crate::confirm::{Confirm, Fixed, StdinConfirm};
use crate::datastore::write_atomic;
use crate::datekey::{is_canonical, parse_month_key};
use crate::recurrence::{self, RecurrenceRequest};
use crate::render::Renderer;
use crate::task::Status;

/// Whether the command changed anything the datastore should keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
}

#[instrument(skip(planner, renderer, command))]
pub fn dispatch(
    planner: &mut Planner,
    renderer: &Renderer,
    command: Command,
    today: &str,
) -> anyhow::Result<Outcome> {
    debug!(?command, selected = %planner.selected_date(), "dispatching command");

    match command {
        Command::Add {
            text,
            repeat,
            every,
            days,
            until,
        } => {
            let recurrence = recurrence::build(repeat, every.as_deref(), days.as_deref())?;
            let until = match until {
                Some(raw) => resolve_date(&raw, today)?,
                None => planner.selected_date().to_string(),
            };
            cmd_add(
                planner,
                &text.join(" "),
                &RecurrenceRequest { recurrence, until },
            )
        }
        Command::Status { id, status } => cmd_status(planner, id, status.parse()?),
        Command::Edit { id, text } => cmd_edit(planner, id, &text.join(" ")),
        Command::Delete { id } => cmd_delete(planner, id),
        Command::Undo => cmd_undo(planner),
        Command::Redo => cmd_redo(planner),
        Command::Board => {
            renderer.print_board(io::stdout().lock(), planner)?;
            Ok(Outcome::Unchanged)
        }
        Command::Calendar { month, prev, next } => {
            let before = planner.view_month();
            if let Some(raw) = month.as_deref() {
                let (year, month) = parse_month_key(raw)
                    .ok_or_else(|| anyhow!("invalid month: {raw} (expected YYYY-MM)"))?;
                planner.set_view_month(year, month);
            }
            let delta = next.unwrap_or(0).saturating_sub(prev.unwrap_or(0));
            if delta != 0 {
                planner.navigate_month(delta);
            }
            renderer.print_calendar(io::stdout().lock(), planner)?;
            Ok(if planner.view_month() != before {
                Outcome::Changed
            } else {
                Outcome::Unchanged
            })
        }
        Command::Select { date } => {
            let key = resolve_date(&date, today)?;
            if key == today {
                planner.go_to_today(today);
            } else {
                planner.select_date(&key);
            }
            println!("Selected {key}.");
            Ok(Outcome::Changed)
        }
        Command::Export { path } => cmd_export(planner, path.as_deref()),
        Command::Import { path, yes } => {
            let confirm: &dyn Confirm = if yes { &Fixed(true) } else { &StdinConfirm };
            cmd_import(planner, &path, today, confirm)
        }
    }
}

/// Accepts `today` or a canonical date-key.
pub fn resolve_date(raw: &str, today: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("today") {
        return Ok(today.to_string());
    }
    if is_canonical(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(anyhow!("invalid date: {trimmed} (expected YYYY-MM-DD)"))
    }
}

fn cmd_add(planner: &mut Planner, text: &str, request: &RecurrenceRequest) -> anyhow::Result<Outcome> {
    info!("command add");

    let ids = planner.add_task(text, request);
    match ids.as_slice() {
        [] => {
            println!("Nothing to add.");
            Ok(Outcome::Unchanged)
        }
        [id] => {
            println!("Created task {id}.");
            Ok(Outcome::Changed)
        }
        [first, .., last] => {
            println!("Created {} tasks ({first}..{last}).", ids.len());
            Ok(Outcome::Changed)
        }
    }
}

fn cmd_status(planner: &mut Planner, id: u64, status: Status) -> anyhow::Result<Outcome> {
    info!("command status");

    if planner.update_status(id, status) {
        println!("Task {id} is now {}.", status.label());
        Ok(Outcome::Changed)
    } else {
        not_found(planner, id)
    }
}

fn cmd_edit(planner: &mut Planner, id: u64, text: &str) -> anyhow::Result<Outcome> {
    info!("command edit");

    if planner.edit_text(id, text) {
        println!("Updated task {id}.");
        Ok(Outcome::Changed)
    } else {
        not_found(planner, id)
    }
}

fn cmd_delete(planner: &mut Planner, id: u64) -> anyhow::Result<Outcome> {
    info!("command delete");

    if planner.delete_task(id) {
        println!("Deleted task {id}.");
        Ok(Outcome::Changed)
    } else {
        not_found(planner, id)
    }
}

fn not_found(planner: &Planner, id: u64) -> anyhow::Result<Outcome> {
    warn!(id, date = %planner.selected_date(), "task not found on selected date");
    println!("No task {id} on {}.", planner.selected_date());
    Ok(Outcome::Unchanged)
}

fn cmd_undo(planner: &mut Planner) -> anyhow::Result<Outcome> {
    info!("command undo");

    if planner.undo() {
        println!("Undo completed.");
        Ok(Outcome::Changed)
    } else {
        println!("Nothing to undo.");
        Ok(Outcome::Unchanged)
    }
}

fn cmd_redo(planner: &mut Planner) -> anyhow::Result<Outcome> {
    info!("command redo");

    if planner.redo() {
        println!("Redo completed.");
        Ok(Outcome::Changed)
    } else {
        println!("Nothing to redo.");
        Ok(Outcome::Unchanged)
    }
}

fn cmd_export(planner: &Planner, path: Option<&Path>) -> anyhow::Result<Outcome> {
    info!("command export");

    let text = planner.export_text(Utc::now())?;
    let Some(path) = path else {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")?;
        return Ok(Outcome::Unchanged);
    };

    let target = if path.is_dir() {
        path.join(export_file_name(planner.selected_date()))
    } else {
        path.to_path_buf()
    };
    write_atomic(&target, text.as_bytes())
        .with_context(|| format!("failed to export to {}", target.display()))?;
    println!("Exported to {}.", target.display());
    Ok(Outcome::Unchanged)
}

fn cmd_import(
    planner: &mut Planner,
    path: &Path,
    today: &str,
    confirm: &dyn Confirm,
) -> anyhow::Result<Outcome> {
    info!("command import");

    let text = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;

    match planner.import_text(&text, today, confirm) {
        Ok(ImportOutcome::Loaded {
            tasks,
            dropped_buckets,
            repaired_tasks,
        }) => {
            println!("Load successful");
            if dropped_buckets > 0 || repaired_tasks > 0 {
                println!(
                    "Loaded {tasks} task(s); skipped {dropped_buckets} invalid date(s), repaired {repaired_tasks} task(s)."
                );
            }
            Ok(Outcome::Changed)
        }
        Ok(ImportOutcome::Cancelled) => {
            println!("Import cancelled.");
            Ok(Outcome::Unchanged)
        }
        Err(err) if err.downcast_ref::<CodecError>().is_some() => {
            println!("{err}");
            Ok(Outcome::Unchanged)
        }
        Err(err) => Err(err),
    }
}
