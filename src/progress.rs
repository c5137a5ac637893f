//! Progress reporting and terminal summaries
//!
//! Provides a live spinner fed from [`AnalysisStats`] and the summary
//! blocks printed when an operation completes.

use crate::info::{DatabaseInfo, ServerOverview};
use crate::store::KeyValue;
use crate::walker::aggregator::{AnalysisReport, AnalysisStats};
use crate::walker::inspector::KeyDetail;
use crate::walker::seeder::{SeedOutcome, SeedStatus};
use crate::walker::SearchResult;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Refresh interval of the background updater
const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// Progress reporter that displays analysis status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Stop signal for the background updater
    stop: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Update the progress display from live counters
    pub fn update(&self, stats: &AnalysisStats, total: usize, elapsed: Duration) {
        let inspected = stats.inspected();
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            inspected as f64 / secs
        } else {
            0.0
        };

        let msg = format!(
            "Keys: {}/{} | Size: {} | Failed: {} | Rate: {:.0}/s",
            format_number(inspected),
            format_number(total as u64),
            format_size(stats.bytes(), BINARY),
            format_number(stats.failed()),
            rate,
        );

        self.bar.set_message(msg);
    }

    /// Refresh from `stats` in the background until finished
    pub fn watch(self: &Arc<Self>, stats: Arc<AnalysisStats>, total: usize) -> JoinHandle<()> {
        let reporter = Arc::clone(self);
        let start = Instant::now();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            while !reporter.stop.load(Ordering::SeqCst) {
                ticker.tick().await;
                reporter.update(&stats, total, start.elapsed());
            }
        })
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn format_bytes(bytes: i64) -> String {
    format_size(bytes.max(0) as u64, BINARY)
}

fn rule() {
    println!("{}", style("─".repeat(50)).dim());
}

/// Print a header at the start of an operation
pub fn print_header(url: &str, db: i64, operation: &str) {
    println!();
    println!(
        "{} {}",
        style("redis-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    rule();
    println!("  {} {}", style("Server:").bold(), url);
    println!("  {} {}", style("Database:").bold(), db);
    println!("  {} {}", style("Operation:").bold(), operation);
    println!();
}

/// Print the result of a memory analysis, with the `top` largest keys
pub fn print_analysis_summary(report: &AnalysisReport, duration: Duration, top: usize) {
    let secs = duration.as_secs_f64();
    let rate = if secs > 0.0 {
        report.processed as f64 / secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Analysis Complete").green().bold());
    rule();
    println!(
        "  {} {} of {}",
        style("Keys:").bold(),
        format_number(report.processed as u64),
        format_number(report.requested as u64)
    );
    println!("  {} {}", style("Total Size:").bold(), format_bytes(report.total_size_bytes));
    println!("  {} {}", style("Strategy:").bold(), report.strategy);
    println!(
        "  {} {:.1}s ({:.0} keys/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    if report.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(report.failed as u64)
        );
    }

    if top > 0 && !report.records.is_empty() {
        let mut largest: Vec<_> = report.records.iter().collect();
        largest.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));

        println!();
        println!("  {}", style("Largest keys:").bold());
        for record in largest.into_iter().take(top) {
            println!(
                "    {:>10}  {:<6}  {}",
                format_bytes(record.size_bytes),
                record.key_type,
                record.name
            );
        }
    }
    println!();
}

/// Print the result of a substring search
pub fn print_search_summary(result: &SearchResult) {
    for key in &result.matches {
        println!("{}", key);
    }
    println!();
    println!(
        "  {} {} matches for '{}' ({}, {} of {} keys scanned)",
        style("Search:").bold(),
        format_number(result.matches.len() as u64),
        result.search_text,
        if result.case_sensitive {
            "case-sensitive"
        } else {
            "case-insensitive"
        },
        format_number(result.total_scanned),
        format_number(result.total_count.max(0) as u64)
    );
}

/// Print the result of a seeding run
pub fn print_seed_summary(outcome: &SeedOutcome) {
    let title = match outcome.status {
        SeedStatus::Completed => style("Seed Complete").green().bold(),
        SeedStatus::DeadlineExceeded => style("Seed Timed Out (partially completed)").yellow().bold(),
        SeedStatus::Cancelled => style("Seed Cancelled (partially completed)").yellow().bold(),
        SeedStatus::Failed => style("Seed Failed").red().bold(),
    };

    let secs = outcome.elapsed_ms as f64 / 1000.0;
    let rate = if secs > 0.0 {
        outcome.added as f64 / secs
    } else {
        0.0
    };

    println!();
    println!("{}", title);
    rule();
    println!(
        "  {} {} of {}",
        style("Added:").bold(),
        format_number(outcome.added),
        format_number(outcome.requested)
    );
    println!(
        "  {} {:.1}s ({:.0} keys/sec)",
        style("Duration:").bold(),
        secs,
        rate
    );
    if outcome.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(outcome.failed)
        );
    }
    println!();
}

/// Print a single key with its value
pub fn print_detail(detail: &KeyDetail) {
    let record = &detail.record;
    println!("{}", style(&record.name).cyan().bold());
    rule();
    println!("  {} {}", style("Type:").bold(), record.key_type);
    println!("  {} {}", style("Size:").bold(), format_bytes(record.size_bytes));
    let ttl = if record.ttl_seconds < 0 {
        "none".to_string()
    } else {
        format!("{}s", record.ttl_seconds)
    };
    println!("  {} {}", style("TTL:").bold(), ttl);
    println!("  {}", style("Value:").bold());

    match &detail.value {
        KeyValue::String(text) => println!("    {}", text),
        KeyValue::Hash(fields) => {
            for (field, value) in fields {
                println!("    {} => {}", field, value);
            }
        }
        KeyValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("    [{}] {}", i, item);
            }
        }
        KeyValue::Set(members) => {
            for member in members {
                println!("    {}", member);
            }
        }
        KeyValue::ZSet(members) => {
            for (member, score) in members {
                println!("    {} ({})", member, score);
            }
        }
        KeyValue::Unsupported => println!("    {}", style("(unsupported type)").dim()),
    }
}

/// Print per-database key counters
pub fn print_databases(databases: &[DatabaseInfo]) {
    println!(
        "  {:<6} {:>12} {:>12} {:>12}",
        style("DB").bold(),
        style("Keys").bold(),
        style("Expires").bold(),
        style("Avg TTL").bold()
    );
    for db in databases {
        println!(
            "  {:<6} {:>12} {:>12} {:>12}",
            format!("db{}", db.database),
            format_number(db.keys.max(0) as u64),
            format_number(db.expires.max(0) as u64),
            db.avg_ttl
        );
    }
}

/// Print a short server overview
pub fn print_overview(overview: &ServerOverview) {
    println!("{}", style("Server").green().bold());
    rule();
    for field in [
        "redis_version",
        "redis_mode",
        "os",
        "uptime_in_days",
        "connected_clients",
        "used_memory_human",
        "maxmemory_human",
        "total_commands_processed",
    ] {
        if let Some(value) = overview.get(field) {
            println!("  {:<26} {}", style(field).bold(), value);
        }
    }
    println!();
    print_databases(&overview.keyspace);
}
