//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use pagewatch_core::{Item, PublishOutcome, PublishStatus, RunSummary, TargetKey};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a stored snapshot
    pub fn print_snapshot(&self, key: &TargetKey, items: &[Item]) {
        match self.format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("No snapshot stored for {}.", key);
                    return;
                }
                println!("Snapshot: {}", key);
                println!();
                for item in items {
                    print_item(item, "");
                }
                println!("\n{} item(s)", items.len());
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "key": key,
                "items": items,
            })),
            OutputFormat::Quiet => {
                for item in items {
                    println!("{}", item.link);
                }
            }
        }
    }

    /// Print the result of a monitoring run
    pub fn print_run_summary(&self, summary: &RunSummary) {
        match self.format {
            OutputFormat::Human => {
                let changed: Vec<_> = summary.changed().collect();
                let unchanged: Vec<_> = summary.unchanged().collect();

                if !changed.is_empty() {
                    println!("── Changed ({}) ──", changed.len());
                    for report in changed {
                        let first = if report.first_run { " (first check)" } else { "" };
                        println!(
                            "{}: {} new item(s){}",
                            report.target,
                            report.new_items.len(),
                            first
                        );
                        for item in &report.new_items {
                            print_item(item, "  ");
                        }
                    }
                    println!();
                }

                if !unchanged.is_empty() {
                    println!("── No change ({}) ──", unchanged.len());
                    for report in unchanged {
                        println!("{}", report.target);
                    }
                    println!();
                }

                if !summary.failures.is_empty() {
                    println!("── Errors ({}) ──", summary.failures.len());
                    for failure in &summary.failures {
                        println!("{} <{}>", failure.target, failure.target.url);
                        println!("  {}", failure.error);
                    }
                    println!();
                }

                self.print_publish(&summary.publish);
            }
            OutputFormat::Json => {
                let failures: Vec<_> = summary
                    .failures
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "target": f.target,
                            "error": f.error.to_string(),
                        })
                    })
                    .collect();
                let changed: Vec<_> = summary.changed().collect();
                let unchanged: Vec<_> = summary.unchanged().collect();
                print_json(&serde_json::json!({
                    "started_at": summary.started_at,
                    "finished_at": summary.finished_at,
                    "changed": changed,
                    "unchanged": unchanged,
                    "failed": failures,
                    "publish": publish_json(&summary.publish),
                    "unpublished": summary.unpublished,
                }));
            }
            OutputFormat::Quiet => {
                for report in summary.changed() {
                    for item in &report.new_items {
                        println!("{}", item.link);
                    }
                }
            }
        }
    }

    /// Print a publish result
    pub fn print_publish(&self, status: &PublishStatus) {
        match self.format {
            OutputFormat::Human => match status {
                PublishStatus::Failed(e) => println!("⚠ {}", e),
                PublishStatus::Done(PublishOutcome::Published { .. }) => {
                    println!("✓ Remote: {}", status)
                }
                _ => println!("Remote: {}", status),
            },
            OutputFormat::Json => print_json(&publish_json(status)),
            OutputFormat::Quiet => {
                if let PublishStatus::Failed(e) = status {
                    eprintln!("{}", e);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_item(item: &Item, indent: &str) {
    let date = if item.has_timestamp() {
        item.timestamp.as_str()
    } else {
        "no date"
    };
    println!("{}- {} ({})", indent, truncate(&item.title, 80), date);
    println!("{}  Link: {}", indent, item.link);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

fn publish_json(status: &PublishStatus) -> serde_json::Value {
    match status {
        PublishStatus::Disabled => serde_json::json!({"status": "disabled"}),
        PublishStatus::Done(PublishOutcome::NothingDirty) => {
            serde_json::json!({"status": "nothing_dirty"})
        }
        PublishStatus::Done(PublishOutcome::SkippedUnchanged { documents }) => {
            serde_json::json!({"status": "skipped_unchanged", "documents": documents})
        }
        PublishStatus::Done(PublishOutcome::Published {
            commit,
            paths,
            attempts,
        }) => serde_json::json!({
            "status": "published",
            "commit": commit,
            "paths": paths,
            "attempts": attempts,
        }),
        PublishStatus::Failed(e) => serde_json::json!({
            "status": "failed",
            "step": e.step().to_string(),
            "error": e.to_string(),
        }),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
