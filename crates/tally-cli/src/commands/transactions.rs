//! Transaction command implementations

use anyhow::Result;
use tally_core::{config::Config, SortSpec, Transaction, TransactionListController};

use super::{open_controller, truncate};

pub async fn cmd_list(
    config: &Config,
    page: u32,
    sort: Option<SortSpec>,
    json: bool,
) -> Result<()> {
    let controller = open_controller(config, sort)?;
    controller.set_page(page).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&controller.page())?);
        return Ok(());
    }

    print_page(&controller);
    Ok(())
}

/// One aligned line per transaction, expenses in red and income in green
pub fn format_transaction(tx: &Transaction) -> String {
    let amount_str = if tx.amount < 0.0 {
        format!("\x1b[31m{:.2} {}\x1b[0m", tx.amount, tx.currency) // Red for expenses
    } else {
        format!("\x1b[32m+{:.2} {}\x1b[0m", tx.amount, tx.currency) // Green for income
    };
    let category = tx.category().map_or("-", |c| c.as_str());

    format!(
        "   [{:>4}] {} │ {:>22} │ {:<17} │ {}",
        tx.id,
        tx.date,
        amount_str,
        truncate(category, 17),
        truncate(&tx.description, 40)
    )
}

/// Print the visible (filtered) transactions with a paging footer
pub fn print_page(controller: &TransactionListController) {
    let snapshot = controller.snapshot();

    if snapshot.transactions.is_empty() {
        if snapshot.filter.is_empty() {
            println!("No transactions found.");
        } else {
            println!("No transactions on this page match the current filter.");
        }
    } else {
        println!();
        println!("📝 Transactions (sorted by {})", snapshot.sort);
        println!("   ─────────────────────────────────────────────────────────────");
        for tx in &snapshot.transactions {
            println!("{}", format_transaction(tx));
        }
    }

    println!();
    println!(
        "   Page {} of {} · {} transactions",
        snapshot.current_page,
        snapshot.total_pages.max(1),
        snapshot.total_transactions
    );
    if let Some(ref error) = snapshot.error {
        println!("   ⚠️  {}", error);
    }
}
