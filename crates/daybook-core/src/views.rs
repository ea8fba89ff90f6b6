//! Read models recomputed from the history store on every call.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};

use crate::history::History;
use crate::task::{Status, Task};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouped<'a> {
    pub todo: Vec<&'a Task>,
    pub ongoing: Vec<&'a Task>,
    pub completed: Vec<&'a Task>,
}

impl<'a> Grouped<'a> {
    pub fn column(&self, status: Status) -> &[&'a Task] {
        match status {
            Status::Todo => &self.todo,
            Status::Ongoing => &self.ongoing,
            Status::Completed => &self.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub todo: usize,
    pub ongoing: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.todo + self.ongoing + self.completed
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Todo => self.todo,
            Status::Ongoing => self.ongoing,
            Status::Completed => self.completed,
        }
    }
}

pub fn grouped(tasks: &[Task]) -> Grouped<'_> {
    let mut out = Grouped::default();
    for task in tasks {
        match task.status {
            Status::Todo => out.todo.push(task),
            Status::Ongoing => out.ongoing.push(task),
            Status::Completed => out.completed.push(task),
        }
    }
    out
}

pub fn counts(tasks: &[Task]) -> StatusCounts {
    let mut out = StatusCounts::default();
    for task in tasks {
        match task.status {
            Status::Todo => out.todo += 1,
            Status::Ongoing => out.ongoing += 1,
            Status::Completed => out.completed += 1,
        }
    }
    out
}

/// Share of completed tasks, rounded to the nearest percent. 0 for an empty day.
pub fn progress_percent(tasks: &[Task]) -> u8 {
    let c = counts(tasks);
    let total = c.total();
    if total == 0 {
        return 0;
    }
    ((c.completed * 100 + total / 2) / total) as u8
}

pub fn marked_dates(history: &History) -> BTreeSet<String> {
    history.marked_dates()
}

/// Monday-first weeks covering `year-month`; days outside the month are `None`.
pub fn month_grid(year: i32, month: u32) -> Vec<[Option<NaiveDate>; 7]> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let lead = first.weekday().num_days_from_monday() as usize;

    let mut weeks = Vec::new();
    let mut week = [None; 7];
    let mut slot = lead;
    let mut day = first;
    while day.month() == month {
        week[slot] = Some(day);
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [None; 7];
            slot = 0;
        }
        match day.checked_add_signed(Duration::days(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    if slot > 0 {
        weeks.push(week);
    }
    weeks
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{counts, grouped, month_grid, progress_percent};
    use crate::task::{Status, Task};

    fn with_status(id: u64, status: Status) -> Task {
        let mut task = Task::new_todo(id, format!("task {id}"), None);
        task.status = status;
        task
    }

    #[test]
    fn groups_preserve_bucket_order() {
        let tasks = vec![
            with_status(1, Status::Ongoing),
            with_status(2, Status::Todo),
            with_status(3, Status::Ongoing),
            with_status(4, Status::Completed),
        ];
        let g = grouped(&tasks);
        let ongoing: Vec<u64> = g.ongoing.iter().map(|t| t.id).collect();
        assert_eq!(ongoing, vec![1, 3]);
        assert_eq!(g.column(Status::Todo).len(), 1);

        let c = counts(&tasks);
        assert_eq!((c.todo, c.ongoing, c.completed, c.total()), (1, 2, 1, 4));
    }

    #[test]
    fn progress_rounds_and_handles_empty_days() {
        assert_eq!(progress_percent(&[]), 0);
        let tasks = vec![
            with_status(1, Status::Completed),
            with_status(2, Status::Todo),
            with_status(3, Status::Ongoing),
        ];
        assert_eq!(progress_percent(&tasks), 33);
        let tasks = vec![with_status(1, Status::Completed), with_status(2, Status::Todo)];
        assert_eq!(progress_percent(&tasks), 50);
        let tasks = vec![
            with_status(1, Status::Completed),
            with_status(2, Status::Completed),
            with_status(3, Status::Todo),
        ];
        assert_eq!(progress_percent(&tasks), 67);
    }

    #[test]
    fn month_grid_is_monday_first() {
        // January 2024 starts on a Monday and spans five weeks.
        let jan = month_grid(2024, 1);
        assert_eq!(jan.len(), 5);
        assert_eq!(jan[0][0], NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(jan[4][2], NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(jan[4][3], None);

        // September 2024 starts on a Sunday.
        let sep = month_grid(2024, 9);
        assert_eq!(sep[0][5], None);
        assert_eq!(sep[0][6], NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(sep.len(), 6);

        assert!(month_grid(2024, 13).is_empty());
    }
}
