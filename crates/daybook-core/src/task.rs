use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Ongoing,
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::Ongoing, Status::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Ongoing => "ongoing",
            Status::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Todo => "To Do",
            Status::Ongoing => "Ongoing",
            Status::Completed => "Completed",
        }
    }

    /// Strict wire-name lookup used by the import codec.
    pub fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" | "to-do" | "to_do" => Ok(Status::Todo),
            "ongoing" | "doing" => Ok(Status::Ongoing),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(anyhow!(
                "unknown status: {other} (expected todo, ongoing or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,

    pub text: String,

    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
}

impl Task {
    pub fn new_todo(id: u64, text: String, series_id: Option<String>) -> Self {
        Self {
            id,
            text,
            status: Status::Todo,
            series_id,
        }
    }
}
