use std::io::{IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::app::Planner;
use crate::config::{Config, Theme};
use crate::datekey::{from_key, to_key};
use crate::task::Status;
use crate::views::{self, month_grid};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone)]
pub struct Renderer {
    ansi: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self::with_terminal(cfg, std::io::stdout().is_terminal())
    }

    fn with_terminal(cfg: &Config, is_terminal: bool) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        Self {
            ansi: color && is_terminal,
            theme: cfg.theme(),
        }
    }

    pub fn plain() -> Self {
        Self {
            ansi: false,
            theme: Theme::Light,
        }
    }

    /// Tasks of the selected date, grouped To Do / Ongoing / Completed.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn print_board<W: Write>(&self, mut out: W, planner: &Planner) -> anyhow::Result<()> {
        let date = planner.selected_date();
        let weekday = from_key(date).format("%a");
        writeln!(out, "{} ({weekday})", self.paint(date, "1"))?;

        let grouped = planner.grouped();
        let counts = planner.counts();
        if counts.total() == 0 {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Task".to_string(),
            "Series".to_string(),
        ];
        let mut rows = Vec::with_capacity(counts.total());
        for status in Status::ALL {
            for task in grouped.column(status) {
                rows.push(vec![
                    self.paint(&task.id.to_string(), "33"),
                    self.paint(status.label(), self.status_code(status)),
                    task.text.clone(),
                    task.series_id
                        .as_deref()
                        .map(short_series)
                        .unwrap_or_default(),
                ]);
            }
        }
        write_table(&mut out, headers, rows)?;

        let summary = Status::ALL
            .iter()
            .map(|status| format!("{} {}", status.label(), counts.get(*status)))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out)?;
        writeln!(out, "{summary}  |  {}% done", planner.progress_percent())?;
        Ok(())
    }

    /// Month grid of the viewed month. `*` marks days with tasks, brackets
    /// mark the selected day.
    #[tracing::instrument(skip(self, out, planner))]
    pub fn print_calendar<W: Write>(&self, mut out: W, planner: &Planner) -> anyhow::Result<()> {
        let (year, month) = planner.view_month();
        let marked = views::marked_dates(planner.history());
        let selected = planner.selected_date();

        let name = MONTH_NAMES
            .get(month.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("?");
        writeln!(out, "{}", self.paint(&format!("{name} {year}"), "1"))?;
        writeln!(out, " Mo   Tu   We   Th   Fr   Sa   Su")?;

        for week in month_grid(year, month) {
            let cells: Vec<String> = week
                .iter()
                .map(|day| match day {
                    Some(date) => self.calendar_cell(*date, selected, marked.contains(&to_key(*date))),
                    None => "    ".to_string(),
                })
                .collect();
            writeln!(out, "{}", cells.join(" ").trim_end())?;
        }
        Ok(())
    }

    fn calendar_cell(&self, date: NaiveDate, selected: &str, marked: bool) -> String {
        let key = to_key(date);
        let mark = if marked { "*" } else { " " };
        let cell = if key == selected {
            format!("[{:>2}]", date.day())
        } else {
            format!(" {:>2}{mark}", date.day())
        };
        if key == selected {
            self.paint(&cell, "7")
        } else if marked {
            self.paint(&cell, self.status_code(Status::Todo))
        } else {
            cell
        }
    }

    fn status_code(&self, status: Status) -> &'static str {
        match (self.theme, status) {
            (Theme::Light, Status::Todo) => "34",
            (Theme::Light, Status::Ongoing) => "36",
            (Theme::Light, Status::Completed) => "32",
            (Theme::Dark, Status::Todo) => "94",
            (Theme::Dark, Status::Ongoing) => "96",
            (Theme::Dark, Status::Completed) => "92",
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.ansi {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_series(series: &str) -> String {
    series.chars().take(8).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
