//! Statistics command implementations

use anyhow::{Context, Result};
use tally_core::{config::Config, CategoryAggregate, StatisticsQuery, TransactionKind};

use super::open_gateway;

pub async fn cmd_stats(config: &Config, query: StatisticsQuery, json: bool) -> Result<()> {
    let gateway = open_gateway(config)?;
    let statistics = gateway
        .category_statistics(&query)
        .await
        .context("Failed to load category statistics")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statistics)?);
        return Ok(());
    }

    let heading = match query.date {
        Some(date) => format!("{} ({})", query.period, date),
        None => query.period.to_string(),
    };
    println!();
    println!("📊 Category statistics · {}", heading);
    print_statistics(&statistics);
    Ok(())
}

/// Print aggregates grouped by kind, largest total first
pub fn print_statistics(statistics: &[CategoryAggregate]) {
    if statistics.is_empty() {
        println!("   No categorized transactions in this period.");
        return;
    }

    for kind in [TransactionKind::Expense, TransactionKind::Income] {
        let mut rows: Vec<&CategoryAggregate> =
            statistics.iter().filter(|a| a.kind() == kind).collect();
        if rows.is_empty() {
            continue;
        }
        rows.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));

        let total: f64 = rows.iter().map(|a| a.total_amount).sum();
        println!("   ─────────────────────────────────────────────");
        println!("   {} · {:.2}", kind, total);
        for agg in rows {
            println!(
                "   {:<20} {:>12.2}   ({} tx)",
                agg.category.as_str(),
                agg.total_amount,
                agg.transaction_count
            );
        }
    }
}
