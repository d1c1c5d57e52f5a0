//! Run and checkpoint statistics.
//!
//! - `RunSummary`: what one `annotate` run did
//! - `DatasetSummary`: class distribution of a checkpoint, optionally per `rhythmic`

use std::collections::HashMap;
use std::time::Duration;

use comfy_table::{Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use songci_core::fmt_num;

use crate::dataset::Dataset;
use crate::model::SentimentClass;

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn new_table(title: &str, columns: &[&str]) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold)];
    header.extend(columns.iter().map(|c| Cell::new(c).fg(Color::Cyan)));
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

// =============================================================================
// Run summary
// =============================================================================

/// Counters for a single run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total_rows: usize,
    /// Rows already processed when the run started
    pub already_processed: usize,
    /// Rows reaching a terminal state during this run (skips included)
    pub completed: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub errors: usize,
    /// Rows left unprocessed because shutdown was requested
    pub remaining: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Count one committed outcome
    pub fn record(&mut self, class: SentimentClass) {
        self.completed += 1;
        match class {
            SentimentClass::Skip => self.skipped += 1,
            SentimentClass::Error => self.errors += 1,
            _ => self.succeeded += 1,
        }
    }

    /// Rows processed after this run, earlier runs included
    pub fn processed_total(&self) -> usize {
        self.already_processed + self.completed
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = new_table("Sentiment run", &["Value", "%"]);
        let rows = [
            ("Rows", self.total_rows, None),
            ("Already processed", self.already_processed, None),
            ("Completed this run", self.completed, None),
            ("Succeeded", self.succeeded, Some(Color::Green)),
            ("Skipped (blank)", self.skipped, None),
            ("Errors", self.errors, Some(Color::Red)),
            ("Remaining", self.remaining, None),
        ];
        for (label, n, color) in rows {
            let mut cells = [
                Cell::new(label),
                Cell::new(fmt_num(n)),
                Cell::new(format!("{:.1}", pct(n, self.total_rows))),
            ];
            if let Some(color) = color.filter(|_| n > 0) {
                cells = cells.map(|c| c.fg(color));
            }
            table.add_row(cells);
        }
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
            Cell::new(""),
        ]);
        format!("\n{table}")
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "{} {}/{} rows processed ({} this run: {} ok, {} skipped, {} errors) [{:.1}s]",
            if self.interrupted { "Interrupted:" } else { "Done:" },
            fmt_num(self.processed_total()),
            fmt_num(self.total_rows),
            fmt_num(self.completed),
            fmt_num(self.succeeded),
            fmt_num(self.skipped),
            fmt_num(self.errors),
            self.elapsed.as_secs_f64()
        );
    }
}

// =============================================================================
// Checkpoint summary
// =============================================================================

/// Per-class count and score sum
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassTally {
    pub count: usize,
    pub score_sum: f64,
}

impl ClassTally {
    fn add(&mut self, score: f64) {
        self.count += 1;
        self.score_sum += score;
    }

    pub fn mean_score(&self) -> Option<f64> {
        (self.count > 0).then(|| self.score_sum / self.count as f64)
    }
}

/// Class breakdown for one `rhythmic` (tune pattern) value
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub name: String,
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub mean_score: Option<f64>,
}

impl GroupSummary {
    /// Most frequent substantive class, ties resolved positive > neutral > negative
    pub fn dominant(&self) -> Option<SentimentClass> {
        [
            (SentimentClass::Positive, self.positive),
            (SentimentClass::Neutral, self.neutral),
            (SentimentClass::Negative, self.negative),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .fold(None, |best: Option<(SentimentClass, usize)>, (c, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((c, n)),
        })
        .map(|(c, _)| c)
    }
}

/// Distribution of outcomes in a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub total_rows: usize,
    pub processed: usize,
    pub classes: Vec<(SentimentClass, ClassTally)>,
    /// Largest `rhythmic` groups, by processed substantive rows
    pub top_groups: Vec<GroupSummary>,
}

/// Column used for per-tune breakdowns
pub const GROUP_COLUMN: &str = "rhythmic";

impl DatasetSummary {
    /// Summarize `dataset`, keeping the `top` largest `rhythmic` groups.
    ///
    /// Sentinel rows count toward their class but never toward mean scores
    /// or group breakdowns.
    pub fn compute(dataset: &Dataset, top: usize) -> Self {
        let mut tallies: HashMap<SentimentClass, ClassTally> = HashMap::new();
        let group_idx = dataset.column_index(GROUP_COLUMN);
        let mut groups: HashMap<&str, (GroupSummary, f64)> = HashMap::new();

        for row in dataset.rows() {
            let Some(outcome) = &row.outcome else {
                continue;
            };
            let class = outcome.sentiment_class;
            tallies.entry(class).or_default().add(outcome.sentiment_score);

            if class.is_sentinel() {
                continue;
            }
            let Some(name) = group_idx
                .and_then(|i| row.fields.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            let (group, score_sum) = groups.entry(name).or_insert_with(|| {
                (
                    GroupSummary {
                        name: name.to_string(),
                        total: 0,
                        positive: 0,
                        negative: 0,
                        neutral: 0,
                        mean_score: None,
                    },
                    0.0,
                )
            });
            group.total += 1;
            *score_sum += outcome.sentiment_score;
            match class {
                SentimentClass::Positive => group.positive += 1,
                SentimentClass::Negative => group.negative += 1,
                _ => group.neutral += 1,
            }
        }

        let classes = SentimentClass::ALL
            .into_iter()
            .map(|c| (c, tallies.get(&c).copied().unwrap_or_default()))
            .collect();

        let mut top_groups: Vec<GroupSummary> = groups
            .into_values()
            .map(|(mut g, sum)| {
                g.mean_score = Some(sum / g.total as f64);
                g
            })
            .collect();
        top_groups.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        top_groups.truncate(top);

        Self {
            total_rows: dataset.len(),
            processed: dataset.processed_count(),
            classes,
            top_groups,
        }
    }

    pub fn tally(&self, class: SentimentClass) -> ClassTally {
        self.classes
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.total_rows - self.processed
    }

    /// Format class and group tables as a string.
    pub fn format_table(&self) -> String {
        let mut table = new_table("Checkpoint", &["Rows", "%", "Mean score"]);
        table.add_row(vec![
            Cell::new("Processed"),
            Cell::new(fmt_num(self.processed)),
            Cell::new(format!("{:.1}", pct(self.processed, self.total_rows))),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Pending"),
            Cell::new(fmt_num(self.pending())),
            Cell::new(format!("{:.1}", pct(self.pending(), self.total_rows))),
            Cell::new(""),
        ]);
        for (class, tally) in &self.classes {
            let mean = match tally.mean_score() {
                Some(m) if !class.is_sentinel() => format!("{m:.3}"),
                _ => String::new(),
            };
            table.add_row(vec![
                Cell::new(format!("  {class}")),
                Cell::new(fmt_num(tally.count)),
                Cell::new(format!("{:.1}", pct(tally.count, self.processed))),
                Cell::new(mean),
            ]);
        }
        let mut out = format!("\n{table}");

        if !self.top_groups.is_empty() {
            let mut groups = new_table(
                GROUP_COLUMN,
                &["Poems", "positive", "neutral", "negative", "Dominant", "Mean score"],
            );
            for g in &self.top_groups {
                groups.add_row(vec![
                    Cell::new(&g.name),
                    Cell::new(fmt_num(g.total)),
                    Cell::new(g.positive),
                    Cell::new(g.neutral),
                    Cell::new(g.negative),
                    Cell::new(g.dominant().map_or("", SentimentClass::as_str)),
                    Cell::new(g.mean_score.map_or(String::new(), |m| format!("{m:.3}"))),
                ]);
            }
            out.push_str(&format!("\n{groups}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetRow;
    use crate::model::ClassificationResult;

    fn row(rhythmic: &str, outcome: Option<ClassificationResult>) -> DatasetRow {
        DatasetRow {
            fields: vec!["text".to_string(), rhythmic.to_string()],
            outcome,
        }
    }

    fn result(class: SentimentClass, score: f64) -> Option<ClassificationResult> {
        Some(ClassificationResult::new(class, score, vec![], "x"))
    }

    fn sample() -> Dataset {
        let rows = vec![
            row("浣溪沙", result(SentimentClass::Positive, 0.8)),
            row("浣溪沙", result(SentimentClass::Negative, 0.6)),
            row("浣溪沙", result(SentimentClass::Positive, 0.4)),
            row("水调歌头", result(SentimentClass::Neutral, 0.2)),
            row("水调歌头", Some(ClassificationResult::retries_exhausted())),
            row("念奴娇", Some(ClassificationResult::skip())),
            row("念奴娇", None),
        ];
        Dataset::new(
            vec!["content".to_string(), "rhythmic".to_string()],
            "content",
            rows,
        )
        .unwrap()
    }

    #[test]
    fn class_tallies() {
        let s = DatasetSummary::compute(&sample(), 10);
        assert_eq!(s.total_rows, 7);
        assert_eq!(s.processed, 6);
        assert_eq!(s.pending(), 1);
        let pos = s.tally(SentimentClass::Positive);
        assert_eq!(pos.count, 2);
        assert!((pos.mean_score().unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(s.tally(SentimentClass::Error).count, 1);
        assert_eq!(s.tally(SentimentClass::Skip).count, 1);
    }

    #[test]
    fn groups_exclude_sentinels_and_sort_by_size() {
        let s = DatasetSummary::compute(&sample(), 10);
        let names: Vec<&str> = s.top_groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["浣溪沙", "水调歌头"]);
        let first = &s.top_groups[0];
        assert_eq!((first.positive, first.negative, first.neutral), (2, 1, 0));
        assert_eq!(first.dominant(), Some(SentimentClass::Positive));
        assert_eq!(s.top_groups[1].total, 1);

        let top1 = DatasetSummary::compute(&sample(), 1);
        assert_eq!(top1.top_groups.len(), 1);
    }

    #[test]
    fn run_summary_records() {
        let mut summary = RunSummary {
            total_rows: 5,
            already_processed: 1,
            ..Default::default()
        };
        summary.record(SentimentClass::Skip);
        summary.record(SentimentClass::Error);
        summary.record(SentimentClass::Neutral);
        assert_eq!(summary.completed, 3);
        assert_eq!((summary.succeeded, summary.skipped, summary.errors), (1, 1, 1));
        assert_eq!(summary.processed_total(), 4);
        assert!(summary.format_table().contains("Completed this run"));
    }

    #[test]
    fn tables_render() {
        let out = DatasetSummary::compute(&sample(), 5).format_table();
        assert!(out.contains("Checkpoint"));
        assert!(out.contains("浣溪沙"));
    }
}
