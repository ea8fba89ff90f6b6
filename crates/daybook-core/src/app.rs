use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::codec::{self, Imported, now_millis};
use crate::confirm::Confirm;
use crate::datekey::{from_key, is_canonical, month_key, shift_month};
use crate::history::History;
use crate::recurrence::{self, Recurrence, RecurrenceRequest};
use crate::task::{Status, Task};
use crate::undo::{Snapshot, UndoHistory};
use crate::views::{self, Grouped, StatusCounts};

/// In-progress text edit of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub task_id: u64,
    pub text: String,
}

/// Interaction state that never survives undo, redo or import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub open_menu: Option<u64>,
    pub editing: Option<EditBuffer>,
}

impl UiState {
    fn reset(&mut self) {
        self.open_menu = None;
        self.editing = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Loaded {
        tasks: usize,
        dropped_buckets: usize,
        repaired_tasks: usize,
    },
    Cancelled,
}

/// What the datastore keeps between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub selected_date: String,
    pub view_month: (i32, u32),
    pub history: History,
    #[serde(default)]
    pub stacks: UndoHistory,
}

/// Single state container: the durable history plus navigation, undo
/// stacks and transient UI state, changed only through the methods below.
#[derive(Debug, Clone)]
pub struct Planner {
    history: History,
    selected_date: String,
    view_month: (i32, u32),
    stacks: UndoHistory,
    ui: UiState,
    last_issued_id: u64,
}

impl Planner {
    pub fn new(today: &str) -> Self {
        let mut history = History::new();
        history.ensure_bucket(today);
        Self {
            history,
            selected_date: today.to_string(),
            view_month: month_of(today),
            stacks: UndoHistory::new(),
            ui: UiState::default(),
            last_issued_id: 0,
        }
    }

    pub fn from_session(session: Session, today: &str) -> Self {
        let selected_date = if is_canonical(&session.selected_date) {
            session.selected_date
        } else {
            today.to_string()
        };
        let mut history = session.history;
        history.ensure_bucket(&selected_date);
        let last_issued_id = history.max_id().unwrap_or(0);
        Self {
            history,
            selected_date,
            view_month: session.view_month,
            stacks: session.stacks,
            ui: UiState::default(),
            last_issued_id,
        }
    }

    pub fn to_session(&self) -> Session {
        Session {
            selected_date: self.selected_date.clone(),
            view_month: self.view_month,
            history: self.history.clone(),
            stacks: self.stacks.clone(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selected_date(&self) -> &str {
        &self.selected_date
    }

    pub fn view_month(&self) -> (i32, u32) {
        self.view_month
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn stacks(&self) -> &UndoHistory {
        &self.stacks
    }

    pub fn can_undo(&self) -> bool {
        self.stacks.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stacks.can_redo()
    }

    pub fn selected_tasks(&self) -> &[Task] {
        self.history.bucket(&self.selected_date)
    }

    pub fn grouped(&self) -> Grouped<'_> {
        views::grouped(self.selected_tasks())
    }

    pub fn counts(&self) -> StatusCounts {
        views::counts(self.selected_tasks())
    }

    pub fn progress_percent(&self) -> u8 {
        views::progress_percent(self.selected_tasks())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            history: self.history.clone(),
            selected_date: self.selected_date.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.history = snapshot.history;
        self.selected_date = snapshot.selected_date;
        self.history.ensure_bucket(&self.selected_date);
        self.ui.reset();
    }

    fn next_base_id(&self) -> u64 {
        now_millis().max(self.last_issued_id.saturating_add(1))
    }

    /// Adds one task per generated date and returns the new ids. Blank text
    /// adds nothing.
    #[instrument(skip(self, text), fields(mode = request.recurrence.mode_name()))]
    pub fn add_task(&mut self, text: &str, request: &RecurrenceRequest) -> Vec<u64> {
        if text.trim().is_empty() {
            debug!("ignoring add with blank text");
            return Vec::new();
        }

        let dates = recurrence::generate(&self.selected_date, &request.recurrence, &request.until);
        let series_id = match request.recurrence {
            Recurrence::None => None,
            _ => Some(recurrence::mint_series_id()),
        };
        let ids = recurrence::batch_ids(self.next_base_id(), dates.len());

        self.stacks.record(self.snapshot());
        for (date, id) in dates.iter().zip(&ids) {
            let task = Task::new_todo(*id, text.to_string(), series_id.clone());
            self.history.insert_task(date, task);
        }
        if let Some(last) = ids.last() {
            self.last_issued_id = *last;
        }

        info!(
            count = ids.len(),
            first = dates.first().map(String::as_str).unwrap_or_default(),
            last = dates.last().map(String::as_str).unwrap_or_default(),
            series = ?series_id,
            "added task"
        );
        ids
    }

    #[instrument(skip(self))]
    pub fn update_status(&mut self, id: u64, status: Status) -> bool {
        self.ui.open_menu = None;
        if self.history.find_task(&self.selected_date, id).is_none() {
            debug!(date = %self.selected_date, "no such task; status unchanged");
            return false;
        }

        self.stacks.record(self.snapshot());
        if let Some(task) = self.history.find_task_mut(&self.selected_date, id) {
            task.status = status;
        }
        info!(date = %self.selected_date, "status updated");
        true
    }

    #[instrument(skip(self, text))]
    pub fn edit_text(&mut self, id: u64, text: &str) -> bool {
        if self.history.find_task(&self.selected_date, id).is_none() {
            debug!(date = %self.selected_date, "no such task; text unchanged");
            return false;
        }

        self.stacks.record(self.snapshot());
        if let Some(task) = self.history.find_task_mut(&self.selected_date, id) {
            task.text = text.to_string();
        }
        info!(date = %self.selected_date, "task text edited");
        true
    }

    #[instrument(skip(self))]
    pub fn delete_task(&mut self, id: u64) -> bool {
        if self.history.find_task(&self.selected_date, id).is_none() {
            debug!(date = %self.selected_date, "no such task; nothing deleted");
            return false;
        }

        self.stacks.record(self.snapshot());
        self.history.remove_task(&self.selected_date, id);
        if self.ui.open_menu == Some(id) {
            self.ui.open_menu = None;
        }
        if self.ui.editing.as_ref().is_some_and(|edit| edit.task_id == id) {
            self.ui.editing = None;
        }
        info!(date = %self.selected_date, "task deleted");
        true
    }

    pub fn open_status_menu(&mut self, id: u64) {
        self.ui.open_menu = Some(id);
    }

    pub fn close_menus(&mut self) {
        self.ui.open_menu = None;
    }

    pub fn begin_edit(&mut self, id: u64) -> bool {
        let Some(task) = self.history.find_task(&self.selected_date, id) else {
            return false;
        };
        self.ui.editing = Some(EditBuffer {
            task_id: id,
            text: task.text.clone(),
        });
        true
    }

    pub fn set_edit_text(&mut self, text: &str) {
        if let Some(edit) = self.ui.editing.as_mut() {
            edit.text = text.to_string();
        }
    }

    /// Saves the edit buffer; used for both explicit save and focus loss.
    pub fn commit_edit(&mut self) -> bool {
        let Some(edit) = self.ui.editing.take() else {
            return false;
        };
        self.edit_text(edit.task_id, &edit.text)
    }

    pub fn cancel_edit(&mut self) {
        self.ui.editing = None;
    }

    #[instrument(skip(self))]
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.stacks.undo(self.snapshot()) else {
            debug!("nothing to undo");
            return false;
        };
        self.restore(previous);
        info!(
            undo_depth = self.stacks.undo_depth(),
            redo_depth = self.stacks.redo_depth(),
            "undo applied"
        );
        true
    }

    #[instrument(skip(self))]
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.stacks.redo(self.snapshot()) else {
            debug!("nothing to redo");
            return false;
        };
        self.restore(next);
        info!(
            undo_depth = self.stacks.undo_depth(),
            redo_depth = self.stacks.redo_depth(),
            "redo applied"
        );
        true
    }

    /// Navigation is not recorded for undo and leaves redo intact.
    pub fn select_date(&mut self, key: &str) -> bool {
        if !is_canonical(key) {
            return false;
        }
        self.selected_date = key.to_string();
        self.history.ensure_bucket(key);
        self.view_month = month_of(key);
        self.ui.reset();
        debug!(date = key, "selected date");
        true
    }

    pub fn navigate_month(&mut self, delta: i32) {
        let (year, month) = self.view_month;
        self.set_view_month_unchecked(shift_month(year, month, delta));
    }

    pub fn set_view_month(&mut self, year: i32, month: u32) -> bool {
        if !(1..=12).contains(&month) {
            return false;
        }
        self.set_view_month_unchecked((year, month));
        true
    }

    fn set_view_month_unchecked(&mut self, view: (i32, u32)) {
        self.view_month = view;
        debug!(month = %month_key(view.0, view.1), "viewing month");
    }

    pub fn go_to_today(&mut self, today: &str) -> bool {
        self.select_date(today)
    }

    pub fn export_text(&self, now: DateTime<Utc>) -> anyhow::Result<String> {
        codec::export_document(&self.history, &self.selected_date, now)
    }

    /// Replaces all state with an exported document. Asks first when the
    /// current store holds any task. The import becomes the new baseline:
    /// both undo stacks are emptied.
    #[instrument(skip(self, text, confirm))]
    pub fn import_text(
        &mut self,
        text: &str,
        today: &str,
        confirm: &dyn Confirm,
    ) -> anyhow::Result<ImportOutcome> {
        if self.history.has_any_tasks()
            && !confirm.confirm("Loading a file replaces all current tasks. Continue?")?
        {
            info!("import cancelled by user");
            return Ok(ImportOutcome::Cancelled);
        }

        let Imported {
            history,
            selected_date,
            dropped_buckets,
            repaired_tasks,
        } = codec::import_document(text, today)?;

        let tasks = history.total_tasks();
        self.last_issued_id = self.last_issued_id.max(history.max_id().unwrap_or(0));
        self.history = history;
        self.view_month = month_of(&selected_date);
        self.selected_date = selected_date;
        self.stacks.clear();
        self.ui.reset();

        Ok(ImportOutcome::Loaded {
            tasks,
            dropped_buckets,
            repaired_tasks,
        })
    }
}

fn month_of(key: &str) -> (i32, u32) {
    let date = from_key(key);
    (date.year(), date.month())
}
