use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::debug;

/// Yes/no prompt used before destructive actions.
pub trait Confirm {
    fn confirm(&self, message: &str) -> anyhow::Result<bool>;
}

/// Fixed answer, for `--yes` and for callers without a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub bool);

impl Confirm for Fixed {
    fn confirm(&self, message: &str) -> anyhow::Result<bool> {
        debug!(message, answer = self.0, "confirmation answered without prompting");
        Ok(self.0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, message: &str) -> anyhow::Result<bool> {
        let mut err = io::stderr().lock();
        write!(err, "{message} [y/N] ")?;
        err.flush()?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed reading confirmation from stdin")?;
        Ok(parse_answer(&line))
    }
}

fn parse_answer(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
