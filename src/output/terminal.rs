// Colored terminal output for HOT rankings and media job summaries.
//
// main.rs delegates all table formatting here.

use colored::Colorize;

use crate::hot::ScoredCandidate;
use crate::pipeline::convert::BucketSummary;
use crate::pipeline::hot_posts::HotPostSummary;
use crate::pipeline::mirror::{ImageOrigin, ResolvedImage};

/// Display the ranked HOT list and the notification tallies.
pub fn display_hot_posts(ranked: &[ScoredCandidate], summary: &HotPostSummary, notify_max_rank: u32) {
    if ranked.is_empty() {
        println!("No HOT posts in the current window.");
        return;
    }

    let heading = if summary.dry_run {
        format!("=== HOT Posts ({} ranked, dry run) ===", ranked.len())
    } else {
        format!("=== HOT Posts ({} ranked) ===", ranked.len())
    };
    println!("\n{}", heading.bold());
    println!();

    println!(
        "  {:>4}  {:<40} {:>9}  {:>6}  {:>5}  {:>4}  {:<12}",
        "Rank".dimmed(),
        "Title".dimmed(),
        "Score".dimmed(),
        "Views".dimmed(),
        "Likes".dimmed(),
        "Cmts".dimmed(),
        "Board".dimmed(),
    );
    println!("  {}", "-".repeat(92).dimmed());

    for candidate in ranked {
        let rank = candidate.rank.unwrap_or_default();
        let rank_str = format!("{rank:>4}.");
        let rank_str = if rank <= notify_max_rank {
            rank_str.red().bold()
        } else {
            rank_str.normal()
        };
        let s = &candidate.snapshot;
        println!(
            "  {} {:<40} {:>9.2}  {:>6}  {:>5}  {:>4}  {:<12}",
            rank_str,
            super::truncate_chars(&s.title, 37),
            candidate.score,
            s.views,
            s.likes,
            s.comment_count,
            s.board_slug,
        );
    }

    println!();
    if summary.dry_run {
        println!("  {} no notifications written", "~".yellow());
    } else {
        println!(
            "  {} {} notifications sent",
            "✓".green(),
            summary.notifications_sent
        );
    }
    if summary.already_notified > 0 {
        println!(
            "  {} {} already notified within the cooldown",
            "-".dimmed(),
            summary.already_notified
        );
    }
    if summary.notifications_skipped > 0 {
        println!(
            "  {} {} posts without an author",
            "-".dimmed(),
            summary.notifications_skipped
        );
    }
    if summary.notifications_failed > 0 {
        println!(
            "  {} {} notifications failed (see logs)",
            "!!".red().bold(),
            summary.notifications_failed
        );
    }
}

/// Display per-bucket results of a bulk conversion or backfill.
pub fn display_bucket_summaries(summaries: &[BucketSummary]) {
    if summaries.is_empty() {
        return;
    }

    println!("\n{}", "=== Media Summary ===".bold());
    println!();
    println!(
        "  {:<10} {:>7} {:>7} {:>7} {:>7} {:>8} {:>7}",
        "Bucket".dimmed(),
        "Total".dimmed(),
        "Done".dimmed(),
        "Skip".dimmed(),
        "Error".dimmed(),
        "Timeout".dimmed(),
        "Rate".dimmed(),
    );
    println!("  {}", "-".repeat(60).dimmed());

    for s in summaries {
        let rate = format!("{:.1}%", s.success_rate());
        let rate = if s.failed == 0 && s.timed_out == 0 {
            rate.green()
        } else {
            rate.yellow()
        };
        println!(
            "  {:<10} {:>7} {:>7} {:>7} {:>7} {:>8} {:>7}",
            s.bucket, s.total, s.succeeded, s.skipped, s.failed, s.timed_out, rate
        );
    }
    println!();
}

/// One-line result for a bucket, printed as soon as it finishes.
pub fn display_bucket_done(s: &BucketSummary) {
    let line = format!(
        "  {} {}: {} converted, {} skipped, {} failed ({:.1}%)",
        if s.failed == 0 { "✓" } else { "!" },
        s.bucket,
        s.succeeded,
        s.skipped,
        s.failed,
        s.success_rate()
    );
    if s.failed == 0 {
        println!("{}", line.green());
    } else {
        println!("{}", line.yellow());
    }
}

/// Display a resolved image URL.
pub fn display_resolved(resolved: &ResolvedImage) {
    let origin = match resolved.origin {
        ImageOrigin::Cached => "cached".green(),
        ImageOrigin::Mirrored => "mirrored".cyan(),
        ImageOrigin::Origin => "origin".yellow(),
    };
    println!("{} [{}]", resolved.url, origin);
}
