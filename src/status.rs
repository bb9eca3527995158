// System status display: DB stats, last HOT run, notification and cache counts.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::db::Database;
use crate::pipeline::hot_posts::{HotPostSummary, LAST_RUN_KEY, LAST_SUMMARY_KEY};

/// Display system status to the terminal.
///
/// `db_file` is the SQLite path when that backend is in use; it is only used
/// for the size line.
pub async fn show(db: &Arc<dyn Database>, db_display: &str, db_file: Option<&str>) -> Result<()> {
    match db_file {
        Some(path) => {
            let file_size = std::fs::metadata(path)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            println!("Database: {db_display} ({file_size})");
        }
        None => println!("Database: {db_display}"),
    }

    // Last HOT run
    match db.get_job_state(LAST_RUN_KEY).await? {
        Some(at) => {
            println!("Last HOT run: {at}");
            if let Some(json) = db.get_job_state(LAST_SUMMARY_KEY).await? {
                if let Ok(summary) = serde_json::from_str::<HotPostSummary>(&json) {
                    println!(
                        "  {} ranked, {} sent, {} failed, {} skipped, {} already notified",
                        summary.total_hot_posts,
                        summary.notifications_sent,
                        summary.notifications_failed,
                        summary.notifications_skipped,
                        summary.already_notified
                    );
                }
            }
        }
        None => {
            println!("Last HOT run: never");
            println!("  Run `pitchside hot-posts` to rank and notify");
        }
    }

    // Notifications by kind
    let counts = db.notification_counts().await?;
    if counts.is_empty() {
        println!("Notifications: none written yet");
    } else {
        let parts: Vec<String> = counts.iter().map(|(k, n)| format!("{k}: {n}")).collect();
        println!("Notifications: {}", parts.join(", "));
    }

    // Media cache index
    let cache = db.cache_status_counts().await?;
    if cache.is_empty() {
        println!("Media cache: empty");
        println!("  Run `pitchside convert` or `pitchside mirror` to populate it");
    } else {
        println!("Media cache:");
        for (asset_type, status, count) in &cache {
            let status = match status.as_str() {
                "ready" => status.green(),
                "error" => status.red(),
                _ => status.yellow(),
            };
            println!("  {asset_type:<14} {status:<8} {count}");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
