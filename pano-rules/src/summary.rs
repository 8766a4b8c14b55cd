use colored::Colorize;
use serde::Serialize;

use crate::resolve::Outcome;
use crate::rules::RuleDocument;

/// Totals printed at the end of a `flatten` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub rules: usize,
    pub skipped: usize,
    pub catalog_issues: usize,
    /// `UNKNOWN:` markers across all expanded lists.
    pub unknown: usize,
    /// `DAG:` markers across all expanded lists.
    pub dynamic: usize,
    /// `CYCLE:` markers across all expanded lists.
    pub cycles: usize,
}

impl RunTally {
    pub fn record(&mut self, document: &RuleDocument) {
        self.rules += 1;
        for value in document.expanded.resolved_lists().into_iter().flatten() {
            match Outcome::parse(value) {
                Outcome::Unknown(_) => self.unknown += 1,
                Outcome::Dynamic(_) => self.dynamic += 1,
                Outcome::Cycle(_) => self.cycles += 1,
                Outcome::Value(_) => {}
            }
        }
    }
}

pub fn render(tally: RunTally) -> String {
    format!(
        "flatten_summary rules={} skipped={} catalog_issues={} unknown={} dynamic={} cycles={}",
        tally.rules,
        tally.skipped,
        tally.catalog_issues,
        tally.unknown,
        tally.dynamic,
        tally.cycles
    )
}

pub fn render_colored(tally: RunTally) -> String {
    render(tally).cyan().to_string()
}
