//! CLI command: `quotawatch sessions`

use super::open_store;
use super::quota::{format_amount, format_duration};
use chrono::Utc;

/// Run the sessions subcommand.
pub async fn run(limit: i64, json: bool) -> anyhow::Result<()> {
    let store = open_store().await?;
    let sessions = store.list_sessions(limit.max(1)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    println!();
    println!("  Sessions");
    println!("  {}", "-".repeat(92));
    println!(
        "  {:<10} {:<12} {:<7} {:<18} {:<12} {:<10} Consumed",
        "ID", "Provider", "Kind", "Started", "Duration", "Snapshots"
    );
    println!("  {}", "-".repeat(92));

    if sessions.is_empty() {
        println!("  (no sessions recorded yet)");
    }

    let now = Utc::now();
    for session in &sessions {
        let peaks = store.session_peaks(session.id).await?;
        let consumed = peaks
            .iter()
            .map(|p| format!("{}={}", p.quota_name, format_amount(p.consumed())))
            .collect::<Vec<_>>()
            .join(", ");
        let duration = session.ended_at.unwrap_or(now) - session.started_at;
        let duration = if session.is_open() {
            format!("{} (open)", format_duration(&duration))
        } else {
            format_duration(&duration)
        };

        println!(
            "  {:<10} {:<12} {:<7} {:<18} {:<12} {:<10} {}",
            &session.id.simple().to_string()[..8],
            session.provider.as_str(),
            session.kind.as_str(),
            session.started_at.format("%Y-%m-%d %H:%M").to_string(),
            duration,
            session.snapshot_count,
            consumed
        );
    }
    println!();
    Ok(())
}
