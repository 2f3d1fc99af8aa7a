//! Aggregate progress of a batch run.

use serde::Serialize;

/// `(completed, total)` counters published after every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Files finished so far, successful or not
    pub completed: usize,
    /// Files in the run
    pub total: usize,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Progress percentage (0-100). An empty run counts as done.
    pub fn percentage(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            (self.completed * 100) / self.total
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Files converted successfully
    pub succeeded: usize,
    /// Files that failed or were cancelled
    pub failed: usize,
    /// Files in the run
    pub total: usize,
    /// Whether the run stopped early on request
    pub cancelled: bool,
    /// File name of the delivered archive, if one was produced and delivered
    pub archive_name: Option<String>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    /// The user-facing completion message.
    ///
    /// Always reports `succeeded/total`; adds a hint pointing at the console
    /// when something failed.
    pub fn message(&self) -> String {
        let mut message = format!(
            "{}/{} billeder blev konverteret",
            self.succeeded, self.total
        );
        if !self.all_succeeded() {
            message.push_str(
                "\nNogle billeder kunne ikke konverteres. Se konsollen for detaljer.",
            );
        }
        message
    }
}
