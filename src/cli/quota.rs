//! CLI commands: `quotawatch summary` and `quotawatch cycles`
//!
//! Read straight from the local database; no provider is contacted.

use super::open_store;
use crate::api::providers::{
    load_cycle_history, load_provider_summary, load_quota_summary, CycleHistory, QuotaSummary,
};
use chrono::{DateTime, Duration, Utc};
use quotawatch_core::Provider;

/// Run the summary subcommand.
pub async fn run_summary(provider: Provider, quota: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store().await?;

    if let Some(quota) = quota {
        let summary = load_quota_summary(&store, provider, quota).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary_header(provider, None);
            print_summary_row(&summary);
            println!();
        }
        return Ok(());
    }

    let summary = load_provider_summary(&store, provider).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary_header(provider, summary.plan.as_deref());
    if summary.quotas.is_empty() {
        println!("  (no snapshots recorded yet)");
    }
    for quota in &summary.quotas {
        print_summary_row(quota);
    }
    if let Some(at) = summary.captured_at {
        println!("  {}", "-".repeat(86));
        println!("  Last poll: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
    Ok(())
}

/// Run the cycles subcommand.
pub async fn run_cycles(provider: Provider, quota: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store().await?;
    let history = load_cycle_history(&store, provider, quota).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        print_cycles(provider, &history);
    }
    Ok(())
}

fn print_summary_header(provider: Provider, plan: Option<&str>) {
    println!();
    match plan {
        Some(plan) => println!("  {} ({})", provider.label(), plan),
        None => println!("  {}", provider.label()),
    }
    println!("  {}", "-".repeat(86));
    println!(
        "  {:<22} {:<22} {:<12} {:<16} Projected",
        "Quota", "Used / Limit", "Rate/h", "Reset In"
    );
    println!("  {}", "-".repeat(86));
}

fn print_summary_row(quota: &QuotaSummary) {
    let s = &quota.summary;
    let usage = if s.unlimited {
        "unlimited".to_string()
    } else {
        let pct = s
            .usage_percent
            .map(|p| format!(" ({p:.0}%)"))
            .unwrap_or_default();
        format!("{} / {}{}", format_amount(s.current_used), format_amount(s.limit), pct)
    };
    let rate = s
        .current_rate
        .map_or_else(|| "-".to_string(), |r| format!("{r:.1}"));
    let reset = format_reset(s.time_until_reset());
    let projected = s
        .projected_usage
        .map_or_else(|| "-".to_string(), format_amount);

    println!(
        "  {:<22} {:<22} {:<12} {:<16} {}",
        quota.display_name, usage, rate, reset, projected
    );
}

fn print_cycles(provider: Provider, history: &CycleHistory) {
    println!();
    println!("  {} / {}", provider.label(), history.display_name);
    println!("  {}", "-".repeat(78));
    println!(
        "  {:<18} {:<18} {:<14} {:<12} Duration",
        "Start", "End", "Consumed", "Peak"
    );
    println!("  {}", "-".repeat(78));

    if history.history.is_empty() && history.active.is_none() {
        println!("  (no cycles recorded yet)");
    }

    let now = Utc::now();
    for cycle in history.history.iter().chain(history.active.iter()) {
        let end = cycle
            .cycle_end
            .map_or_else(|| "active".to_string(), |e| format_timestamp(&e));
        println!(
            "  {:<18} {:<18} {:<14} {:<12} {}",
            format_timestamp(&cycle.cycle_start),
            end,
            format_amount(cycle.total_delta),
            format_amount(cycle.peak_used),
            format_duration(&cycle.duration(now))
        );
    }
    println!();
}

// ── helpers ──────────────────────────────────────────────────────────────

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn format_reset(until: Option<Duration>) -> String {
    match until {
        Some(d) if d.num_seconds() <= 0 => "overdue".to_string(),
        Some(d) => format_duration(&d),
        None => "-".to_string(),
    }
}

/// Largest two units of a duration, e.g. "3d 4h" or "12m"
pub(crate) fn format_duration(d: &Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

/// Whole numbers without decimals, fractional ones with one
pub(crate) fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format_number_with_commas(value as i64)
    } else {
        format!("{value:.1}")
    }
}

fn format_number_with_commas(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::minutes(12)), "12m");
        assert_eq!(format_duration(&Duration::minutes(125)), "2h 5m");
        assert_eq!(format_duration(&Duration::hours(76)), "3d 4h");
        assert_eq!(format_duration(&Duration::seconds(-30)), "0m");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1500.0), "1,500");
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(12.34), "12.3");
        assert_eq!(format_amount(-2000.0), "-2,000");
    }

    #[test]
    fn test_format_reset() {
        assert_eq!(format_reset(None), "-");
        assert_eq!(format_reset(Some(Duration::seconds(-5))), "overdue");
        assert_eq!(format_reset(Some(Duration::hours(5))), "5h 0m");
    }
}
