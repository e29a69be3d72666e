//! cast-queue - Manage scheduled casts
//!
//! Lists the queue, shows per-status counts, cancels pending casts and puts
//! failed or cancelled casts back in line.

use clap::{Parser, Subcommand};
use libcastflow::logging::LoggingConfig;
use libcastflow::{CastFlowError, Config, Database, PostStatus, QueueStats, Result, ScheduledPost};
use std::time::Duration;
use tracing::{debug, warn};

const LIST_LIMIT: usize = 500;

#[derive(Parser, Debug)]
#[command(name = "cast-queue")]
#[command(version)]
#[command(about = "Manage scheduled casts")]
#[command(long_about = "\
cast-queue - Manage scheduled casts

DESCRIPTION:
    cast-queue inspects and edits the scheduled cast queue used by cast-send
    and cast-api. Failed casts are never retried automatically; `retry` is
    the way to put one back in the queue.

COMMANDS:
    list    List casts (all statuses by default)
    stats   Show counts per status
    cancel  Cancel a cast that has not been published yet
    retry   Reschedule a failed or cancelled cast (--force: also publishing)

USAGE EXAMPLES:
    # List scheduled casts
    cast-queue list --status scheduled

    # List everything as JSON
    cast-queue list --format json

    # Retry a failed cast in 10 minutes
    cast-queue retry <POST_ID> --in 10m

    # Requeue a cast stranded mid-publish
    cast-queue retry <POST_ID> --force

    # Cancel a pending cast
    cast-queue cancel <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/cast-flow/config.toml
    Override with CAST_FLOW_CONFIG, or the database with CAST_FLOW_DB_PATH.

EXIT CODES:
    0 - Success
    1 - Operation failed
    3 - Invalid input (unknown post, bad status, bad duration)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List casts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only show casts with this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cancel a scheduled cast
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Reschedule a failed or cancelled cast
    Retry {
        /// Post ID to retry
        post_id: String,

        /// Delay before the retry (e.g. "10m", "2h"); defaults to now
        #[arg(long = "in", value_name = "DURATION")]
        delay: Option<String>,

        /// Also requeue a post stuck in `publishing` (its cast may be live)
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    debug!("Using database at {}", config.database.path);

    match cli.command {
        Commands::List { format, status } => cmd_list(&db, &format, status.as_deref()).await,
        Commands::Stats { format } => cmd_stats(&db, &format).await,
        Commands::Cancel { post_id } => cmd_cancel(&db, &post_id).await,
        Commands::Retry {
            post_id,
            delay,
            force,
        } => cmd_retry(&db, &post_id, delay.as_deref(), force).await,
    }
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(CastFlowError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CastFlowError::InvalidInput(format!("Failed to encode output: {}", e)))
}

async fn cmd_list(db: &Database, format: &str, status: Option<&str>) -> Result<()> {
    validate_format(format)?;
    let status = status.map(str::parse::<PostStatus>).transpose()?;

    let posts = db.list_posts(status, LIST_LIMIT).await?;

    if format == "json" {
        println!("{}", to_json(&posts)?);
    } else {
        let now = chrono::Utc::now().timestamp();
        for post in &posts {
            println!("{}", format_post_line(post, now));
        }
    }

    Ok(())
}

async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;
    let stats = db.queue_stats().await?;

    if format == "json" {
        println!("{}", to_json(&stats)?);
    } else {
        print!("{}", format_stats(&stats, chrono::Utc::now().timestamp()));
    }

    Ok(())
}

async fn cmd_cancel(db: &Database, post_id: &str) -> Result<()> {
    if db.cancel_post(post_id).await? {
        println!("Cancelled post {}", post_id);
        return Ok(());
    }

    match db.get_post(post_id).await? {
        None => Err(CastFlowError::InvalidInput(format!("Post not found: {}", post_id))),
        Some(post) => Err(CastFlowError::InvalidInput(format!(
            "Post {} is {}; only scheduled posts can be cancelled",
            post_id, post.status
        ))),
    }
}

async fn cmd_retry(db: &Database, post_id: &str, delay: Option<&str>, force: bool) -> Result<()> {
    let delay = match delay {
        Some(text) => humantime::parse_duration(text).map_err(|e| {
            CastFlowError::InvalidInput(format!("Invalid duration '{}': {}", text, e))
        })?,
        None => Duration::ZERO,
    };
    let now = chrono::Utc::now().timestamp();
    let scheduled_at = retry_time(now, delay)?;

    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| CastFlowError::InvalidInput(format!("Post not found: {}", post_id)))?;

    let rescheduled = if force {
        db.force_reschedule_post(post_id, scheduled_at).await?
    } else {
        db.reschedule_post(post_id, scheduled_at).await?
    };

    if !rescheduled {
        let allowed = if force {
            "failed, cancelled or publishing"
        } else {
            "failed or cancelled"
        };
        let hint = if !force && post.status == PostStatus::Publishing {
            " (use --force to requeue a post stuck mid-publish)"
        } else {
            ""
        };
        return Err(CastFlowError::InvalidInput(format!(
            "Post {} is {}; only {} posts can be retried{}",
            post_id, post.status, allowed, hint
        )));
    }

    if post.status == PostStatus::Publishing {
        warn!("Requeued post {} from publishing", post_id);
        eprintln!(
            "Warning: post {} was mid-publish; its cast may already be live",
            post_id
        );
    }

    println!(
        "Rescheduled post {} {}",
        post_id,
        format_time_until(now, scheduled_at)
    );
    Ok(())
}

/// Unix time `delay` after `now`, rejecting delays that overflow
fn retry_time(now: i64, delay: Duration) -> Result<i64> {
    i64::try_from(delay.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| {
            CastFlowError::InvalidInput(format!(
                "Retry delay of {}s is too large",
                delay.as_secs()
            ))
        })
}

fn format_post_line(post: &ScheduledPost, now: i64) -> String {
    let preview = truncate_content(&post.body.joined_text().replace('\n', " "), 50);
    let when = match post.status {
        PostStatus::Scheduled => format_time_until(now, post.scheduled_at),
        _ => post.status.to_string(),
    };

    match &post.error_message {
        Some(error) => format!("{} | {} | {} | {}", post.id, preview, when, error),
        None => format!("{} | {} | {}", post.id, preview, when),
    }
}

fn format_stats(stats: &QueueStats, now: i64) -> String {
    let mut out = format!(
        "scheduled:  {}\npublishing: {}\nposted:     {}\nfailed:     {}\ncancelled:  {}\n",
        stats.scheduled, stats.publishing, stats.posted, stats.failed, stats.cancelled
    );
    if let Some(next) = stats.next_due {
        out.push_str(&format!("next due:   {}\n", format_time_until(now, next)));
    }
    out
}

/// Truncate to `max_chars` characters with an ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libcastflow::PostBody;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_content("short", 10), "short");
        assert_eq!(truncate_content("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_format_time_until() {
        assert_eq!(format_time_until(1000, 900), "overdue");
        assert_eq!(format_time_until(1000, 1030), "now");
        assert_eq!(format_time_until(0, 120), "in 2 minutes");
        assert_eq!(format_time_until(0, 3600), "in 1 hour");
        assert_eq!(format_time_until(0, 3 * 86_400), "in 3 days");
    }

    #[test]
    fn test_post_line_shows_error_for_failed() {
        let mut post = ScheduledPost::new(1, PostBody::from("line one\nline two"), 0);
        post.status = PostStatus::Failed;
        post.error_message = Some("Posting failed: nope".to_string());

        let line = format_post_line(&post, 100);
        assert!(line.contains("line one line two"));
        assert!(line.contains("| failed |"));
        assert!(line.ends_with("Posting failed: nope"));
    }

    #[test]
    fn test_stats_text_includes_next_due() {
        let stats = QueueStats {
            scheduled: 2,
            failed: 1,
            next_due: Some(7200),
            ..Default::default()
        };
        let text = format_stats(&stats, 0);
        assert!(text.contains("scheduled:  2"));
        assert!(text.contains("failed:     1"));
        assert!(text.contains("next due:   in 2 hours"));
    }

    #[test]
    fn test_retry_time_rejects_overflow() {
        assert_eq!(retry_time(1000, Duration::from_secs(600)).unwrap(), 1600);
        assert_eq!(retry_time(1000, Duration::ZERO).unwrap(), 1000);
        assert!(retry_time(1000, Duration::from_secs(u64::MAX)).is_err());
        assert!(retry_time(i64::MAX - 10, Duration::from_secs(60)).is_err());
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("text").is_ok());
        assert!(validate_format("json").is_ok());
        assert!(validate_format("yaml").is_err());
    }
}
