//! redis-walker - Redis Key-Space Scanner and Memory Analyzer
//!
//! Entry point for the CLI application.

use anyhow::{bail, Context, Result};
use clap::Parser;
use redis_walker::cancel::Cancellation;
use redis_walker::config::{CliArgs, Command, WalkerConfig};
use redis_walker::progress::{
    format_number, print_analysis_summary, print_databases, print_detail, print_header,
    print_overview, print_search_summary, print_seed_summary, ProgressReporter,
};
use redis_walker::store::KeyType;
use redis_walker::walker::editor::parse_value;
use redis_walker::walker::{AnalysisReport, KeyspaceWalker, SeedStatus};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = WalkerConfig::from_args(args).context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(async { run_async(config).await })
}

async fn run_async(config: WalkerConfig) -> Result<()> {
    let cancel = Cancellation::new();
    install_signal_handler(&cancel)?;

    let walker = KeyspaceWalker::connect(&config).context("Failed to initialize walker")?;
    let db = config.db;

    match config.command.clone() {
        Command::Keys {
            pattern,
            batch_size,
        } => {
            let walker = walker.with_scan_count(batch_size);
            let result = walker
                .keys(&cancel, db, pattern.as_deref())
                .await
                .context("Key listing failed")?;

            if config.json {
                print_json(&result)?;
            } else {
                for key in &result.keys {
                    println!("{}", key);
                }
                info!(keys = result.total_count, "Listed keys");
            }
        }

        Command::Search {
            text,
            case_sensitive,
        } => {
            let result = walker
                .search(&cancel, db, &text, case_sensitive)
                .await
                .context("Search failed")?;

            if config.json {
                print_json(&result)?;
            } else {
                print_search_summary(&result);
            }
        }

        Command::Analyze {
            pattern,
            strategy,
            concurrency,
            batch_size,
            top,
        } => {
            let walker = walker.with_scan_count(batch_size);
            if config.show_progress {
                print_header(&config.url.to_display_string(), db, "analyze");
            }

            let start = Instant::now();
            let progress = config.show_progress.then(|| Arc::new(ProgressReporter::new()));
            if let Some(p) = &progress {
                p.set_status("Scanning keys...");
            }

            let keys = walker
                .keys(&cancel, db, pattern.as_deref())
                .await
                .context("Key scan failed")?
                .keys;

            let watcher = progress
                .as_ref()
                .map(|p| p.watch(walker.stats(), keys.len()));
            let result = walker
                .analyze_keys(&cancel, db, &keys, strategy, concurrency)
                .await;
            finish_progress(progress.as_deref(), &result);
            if let Some(handle) = watcher {
                handle.abort();
            }

            let report = result.context("Memory analysis failed")?;
            if config.json {
                print_json(&report)?;
            } else {
                print_analysis_summary(&report, start.elapsed(), top);
            }
        }

        Command::Batch { keys, concurrency } => {
            let start = Instant::now();
            let progress = config.show_progress.then(|| Arc::new(ProgressReporter::new()));
            let watcher = progress
                .as_ref()
                .map(|p| p.watch(walker.stats(), keys.len()));

            let result = walker.batch(&cancel, db, &keys, concurrency).await;
            finish_progress(progress.as_deref(), &result);
            if let Some(handle) = watcher {
                handle.abort();
            }

            let report = result.context("Batch analysis failed")?;
            if config.json {
                print_json(&report)?;
            } else {
                print_analysis_summary(&report, start.elapsed(), keys.len());
            }
        }

        Command::Detail { key } => {
            let detail = walker
                .detail(&cancel, db, &key)
                .await
                .with_context(|| format!("Failed to read key '{}'", key))?;

            if config.json {
                print_json(&detail)?;
            } else {
                print_detail(&detail);
            }
        }

        Command::Info => {
            let overview = walker
                .overview(&cancel, db)
                .await
                .context("Failed to read server info")?;

            if config.json {
                print_json(&overview)?;
            } else {
                print_overview(&overview);
            }
        }

        Command::Databases => {
            let databases = walker
                .databases(&cancel)
                .await
                .context("Failed to list databases")?;

            if config.json {
                print_json(&databases)?;
            } else {
                print_databases(&databases);
            }
        }

        Command::Delete { key } => {
            let removed = walker
                .delete(&cancel, db, &key)
                .await
                .with_context(|| format!("Failed to delete key '{}'", key))?;

            if config.json {
                print_json(&serde_json::json!({ "key": key, "deleted": removed }))?;
            } else if removed {
                println!("Deleted '{}'", key);
            } else {
                println!("Key '{}' not found", key);
            }
        }

        Command::Set {
            key,
            key_type,
            value,
            ttl,
        } => {
            let key_type = KeyType::from_type_reply(&key_type.to_lowercase());
            let parsed = serde_json::from_str::<serde_json::Value>(&value);
            let json = match parsed {
                Ok(json) => json,
                // Plain text is accepted for strings
                Err(_) if key_type == KeyType::String => serde_json::Value::String(value),
                Err(e) => return Err(e).context("Value is not valid JSON"),
            };
            let value = parse_value(key_type, &json).context("Invalid value")?;

            walker
                .set(&cancel, db, &key, &value, ttl)
                .await
                .with_context(|| format!("Failed to write key '{}'", key))?;

            if config.json {
                print_json(&serde_json::json!({ "key": key, "type": key_type }))?;
            } else {
                println!("Wrote {} key '{}'", key_type, key);
            }
        }

        Command::Seed {
            count,
            workers,
            deadline,
        } => {
            if config.show_progress {
                print_header(&config.url.to_display_string(), db, "seed");
            }

            let progress = config.show_progress.then(ProgressReporter::new);
            if let Some(p) = &progress {
                p.set_status(&format!(
                    "Writing {} keys with {} workers...",
                    format_number(count),
                    workers
                ));
            }

            let outcome = walker
                .seed(&cancel, db, count, workers, deadline.into())
                .await;

            if let Some(p) = &progress {
                p.finish_and_clear();
            }

            if config.json {
                print_json(&outcome)?;
            } else {
                print_seed_summary(&outcome);
            }

            if outcome.status == SeedStatus::Failed {
                bail!("Seeding failed: no key could be written");
            }
        }
    }

    Ok(())
}

/// Cancel the root scope on Ctrl-C; a second Ctrl-C exits immediately
fn install_signal_handler(cancel: &Cancellation) -> Result<()> {
    let token = cancel.token().clone();
    let interrupted = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            eprintln!("\nForce shutdown!");
            std::process::exit(130);
        }
        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        token.cancel();
    })
    .context("Failed to set signal handler")?;

    Ok(())
}

fn finish_progress(
    progress: Option<&ProgressReporter>,
    result: &redis_walker::Result<AnalysisReport>,
) {
    if let Some(p) = progress {
        match result {
            Ok(_) => p.finish_and_clear(),
            Err(_) => p.finish("Analysis interrupted"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("redis_walker=debug,warn")
    } else {
        EnvFilter::new("redis_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
